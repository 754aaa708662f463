//! Test-only shape encoder: writes a [`Shape`] through a [`StreamWriter`] in the exact order the
//! decoder reads it.

use crate::codec::{Layout, LinearWriter, SplitWriter, StreamWriter};
use crate::cursor::{ByteWriter, LengthPrefix};
use crate::skin_migration::LegacySkins;
use crate::{
    BasicData, Bounds, DecalData, IntegerSet, Material, MaterialList, Mesh, Node, Object,
    ObjectState, Primitive, Quat16, Sequence, Shape, SkinData, SortedData, SubShape,
};
use glam::{Vec2, Vec3, Vec4};

#[derive(Clone, Debug, Default)]
pub(crate) struct EncodeOptions {
    /// Skin tail written for versions below 23.
    pub legacy: Option<LegacySkins>,
    /// Mesh slot list written for versions below 16; defaults to `0..meshes.len()`.
    pub mesh_slots: Option<Vec<i32>>,
    /// Ground-frame count written even when the version has no such field.
    pub stray_ground_count: Option<u32>,
}

pub(crate) fn encode(shape: &Shape, layout: Layout, version: u16) -> Vec<u8> {
    encode_with(shape, layout, version, &EncodeOptions::default())
}

pub(crate) fn encode_with(
    shape: &Shape,
    layout: Layout,
    version: u16,
    opts: &EncodeOptions,
) -> Vec<u8> {
    match layout {
        Layout::Linear => write_shape(LinearWriter::new(version), shape, opts),
        Layout::Split => write_shape(SplitWriter::new(version), shape, opts),
    }
}

fn count(w: &mut impl StreamWriter, n: usize) {
    w.write(n as u32);
}

fn write_point(w: &mut impl StreamWriter, p: Vec3) {
    w.write_slice(&p.to_array());
}

fn write_point2(w: &mut impl StreamWriter, p: Vec2) {
    w.write_slice(&p.to_array());
}

fn write_point4(w: &mut impl StreamWriter, p: Vec4) {
    w.write_slice(&p.to_array());
}

fn write_quat(w: &mut impl StreamWriter, q: Quat16) {
    w.write_slice(&[q.x, q.y, q.z, q.w]);
}

fn write_bounds(w: &mut impl StreamWriter, b: Bounds) {
    write_point(w, b.min);
    write_point(w, b.max);
}

fn write_primitives(w: &mut impl StreamWriter, prims: &[Primitive]) {
    count(w, prims.len());
    for p in prims {
        w.write(p.first_element);
        w.write(p.num_elements);
        w.write(p.mat_index);
    }
}

fn write_counted<T: crate::cursor::Scalar>(w: &mut impl StreamWriter, values: &[T]) {
    count(w, values.len());
    w.write_slice(values);
}

/// Normals and encoded normals, one per vertex.
fn write_normals(w: &mut impl StreamWriter, basic: &BasicData) {
    for i in 0..basic.verts.len() {
        write_point(w, basic.normals.get(i).copied().unwrap_or(Vec3::ZERO));
    }
    if w.version() > 21 {
        for i in 0..basic.verts.len() {
            w.write(basic.encoded_normals.get(i).copied().unwrap_or(0u8));
        }
    }
}

pub(crate) fn write_basic(w: &mut impl StreamWriter, b: &BasicData) {
    w.store_check();
    w.write(b.num_frames);
    w.write(b.num_mat_frames);
    w.write(b.parent);
    write_bounds(w, b.bounds);
    write_point(w, b.center);
    w.write(b.radius);

    count(w, b.verts.len());
    if b.owns_geometry() {
        b.verts.iter().for_each(|&v| write_point(w, v));
    }
    count(w, b.tverts.len());
    if b.owns_geometry() {
        b.tverts.iter().for_each(|&t| write_point2(w, t));
        write_normals(w, b);
    }

    write_primitives(w, &b.primitives);
    write_counted(w, &b.indices);
    write_counted(w, &b.merge_indices);
    w.write(b.verts_per_frame);
    w.write(b.flags);
    w.store_check();
}

fn write_skin(w: &mut impl StreamWriter, s: &SkinData) {
    write_basic(w, &s.basic);
    if s.basic.owns_geometry() {
        count(w, s.basic.verts.len());
        s.basic.verts.iter().for_each(|&v| write_point(w, v));
        write_normals(w, &s.basic);
        count(w, s.node_transforms.len());
        for m in &s.node_transforms {
            w.write_slice(&m.to_cols_array());
        }
        count(w, s.vertex_index.len());
        w.write_slice(&s.vertex_index);
        w.write_slice(&s.bone_index);
        w.write_slice(&s.weight);
        write_counted(w, &s.node_index);
    } else {
        w.write_slice(&[0u32; 4]);
    }
    w.store_check();
}

fn write_decal(w: &mut impl StreamWriter, d: &DecalData) {
    write_primitives(w, &d.primitives);
    write_counted(w, &d.indices);
    write_counted(w, &d.start_primitive);
    count(w, d.tex_gen_s.len());
    d.tex_gen_s.iter().for_each(|&v| write_point4(w, v));
    count(w, d.tex_gen_t.len());
    d.tex_gen_t.iter().for_each(|&v| write_point4(w, v));
    w.write(d.mat_index);
    w.store_check();
}

fn write_sorted(w: &mut impl StreamWriter, s: &SortedData) {
    write_basic(w, &s.basic);
    count(w, s.clusters.len());
    for c in &s.clusters {
        w.write(c.start_primitive);
        w.write(c.end_primitive);
        write_point(w, c.normal);
        w.write(c.k);
        w.write(c.front_cluster);
        w.write(c.back_cluster);
    }
    write_counted(w, &s.start_cluster);
    write_counted(w, &s.first_verts);
    write_counted(w, &s.num_verts);
    write_counted(w, &s.first_tverts);
    w.write(u8::from(s.always_write_depth));
    w.store_check();
}

pub(crate) fn write_mesh(w: &mut impl StreamWriter, mesh: &Mesh) {
    w.write(mesh.mesh_type().tag());
    match mesh {
        Mesh::Null => {}
        Mesh::Standard(b) => write_basic(w, b),
        Mesh::Skin(s) => write_skin(w, s),
        Mesh::Decal(d) => write_decal(w, d),
        Mesh::Sorted(s) => write_sorted(w, s),
    }
}

fn write_integer_set(out: &mut ByteWriter, set: &IntegerSet) {
    let words = set.to_u32_words();
    let num_ints = set.iter().last().map_or(0, |i| i + 1);
    out.write(num_ints as u32);
    out.write(words.len() as u32);
    for word in words {
        out.write(word);
    }
}

fn write_sequence(out: &mut ByteWriter, seq: &Sequence) {
    out.write(seq.name);
    out.write(seq.flags);
    out.write(seq.num_keyframes);
    out.write(seq.duration);
    out.write(seq.priority);
    out.write(seq.first_ground_frame);
    out.write(seq.num_ground_frames);
    out.write(seq.base_rotation);
    out.write(seq.base_translation);
    out.write(seq.base_scale);
    out.write(seq.base_object_state);
    out.write(seq.base_decal_state);
    out.write(seq.first_trigger);
    out.write(seq.num_triggers);
    out.write(seq.tool_begin);
    for set in seq.matters() {
        write_integer_set(out, set);
    }
}

fn write_material_list(out: &mut ByteWriter, list: &MaterialList) {
    out.write(MaterialList::BINARY_VERSION);
    out.write(list.len() as u32);
    for m in list.iter() {
        out.write_len_prefixed_string(&m.name, LengthPrefix::U8);
    }
    list.iter().for_each(|m| out.write(m.flags));
    list.iter().for_each(|m| out.write(m.reflectance_map));
    list.iter().for_each(|m| out.write(m.bump_map));
    list.iter().for_each(|m| out.write(m.detail_map));
    list.iter().for_each(|m| out.write(m.detail_scale));
    list.iter().for_each(|m| out.write(m.reflection_amount));
}

fn write_shape<W: StreamWriter>(mut w: W, shape: &Shape, opts: &EncodeOptions) -> Vec<u8> {
    let version = w.version();

    let base = w.base_mut();
    base.write(shape.sequences.len() as u32);
    for seq in &shape.sequences {
        write_sequence(base, seq);
    }
    write_material_list(base, &shape.materials);

    count(&mut w, shape.nodes.len());
    count(&mut w, shape.objects.len());
    count(&mut w, shape.decals.len());
    count(&mut w, shape.sub_shapes.len());
    count(&mut w, shape.ifl_materials.len());
    if version >= 22 {
        count(&mut w, shape.node_rotations.len());
        count(&mut w, shape.node_translations.len());
        count(&mut w, shape.node_uniform_scales.len());
        count(&mut w, shape.node_aligned_scales.len());
        count(&mut w, shape.node_arbitrary_scale_factors.len());
    } else {
        count(&mut w, shape.nodes.len() + shape.node_rotations.len());
    }
    if version > 23 {
        count(&mut w, shape.ground_translations.len());
    } else if let Some(stray) = opts.stray_ground_count {
        w.write(stray);
    }
    count(&mut w, shape.object_states.len());
    count(&mut w, shape.decal_states.len());
    count(&mut w, shape.triggers.len());
    count(&mut w, shape.detail_levels.len());
    count(&mut w, shape.meshes.len());
    let legacy = opts.legacy.clone().unwrap_or_else(|| LegacySkins {
        meshes: Vec::new(),
        detail_first_skin: vec![0; shape.detail_levels.len()],
        detail_num_skins: vec![0; shape.detail_levels.len()],
    });
    if version < 23 {
        count(&mut w, legacy.meshes.len());
    }
    count(&mut w, shape.names.len());
    w.write(shape.smallest_visible_size);
    w.write(shape.smallest_visible_detail_level);
    w.store_check();

    w.write(shape.radius);
    w.write(shape.tube_radius);
    write_point(&mut w, shape.center);
    write_bounds(&mut w, shape.bounds);
    w.store_check();

    for n in &shape.nodes {
        w.write_slice(&[n.name, n.parent, -1, -1, -1]);
    }
    w.store_check();
    for o in &shape.objects {
        w.write_slice(&[o.name, o.num_meshes, o.first_mesh, o.node, -1, -1]);
    }
    w.store_check();
    for d in &shape.decals {
        w.write_slice(&[d.name, d.num_meshes, d.first_mesh, d.object, -1]);
    }
    w.store_check();
    for ifl in &shape.ifl_materials {
        w.write(ifl.name);
        w.write(ifl.slot);
        w.write(ifl.first_frame);
        w.write(ifl.time);
        w.write(ifl.num_frames);
    }
    w.store_check();

    let subs = &shape.sub_shapes;
    subs.iter().for_each(|s| w.write(s.first_node));
    subs.iter().for_each(|s| w.write(s.first_object));
    subs.iter().for_each(|s| w.write(s.first_decal));
    w.store_check();
    subs.iter().for_each(|s| w.write(s.num_nodes));
    subs.iter().for_each(|s| w.write(s.num_objects));
    subs.iter().for_each(|s| w.write(s.num_decals));
    w.store_check();

    let slots: Vec<i32> = opts
        .mesh_slots
        .clone()
        .unwrap_or_else(|| (0..shape.meshes.len() as i32).collect());
    if version < 16 {
        write_counted(&mut w, &slots);
    }

    for (q, t) in shape.default_rotations.iter().zip(&shape.default_translations) {
        write_quat(&mut w, *q);
        write_point(&mut w, *t);
    }
    shape.node_translations.iter().for_each(|&t| write_point(&mut w, t));
    shape.node_rotations.iter().for_each(|&q| write_quat(&mut w, q));
    w.store_check();

    if version > 21 {
        w.write_slice(&shape.node_uniform_scales);
        shape.node_aligned_scales.iter().for_each(|&s| write_point(&mut w, s));
        for (f, r) in shape
            .node_arbitrary_scale_factors
            .iter()
            .zip(&shape.node_arbitrary_scale_rotations)
        {
            write_point(&mut w, *f);
            write_quat(&mut w, *r);
        }
    }
    w.store_check();

    if version > 23 {
        for (t, r) in shape.ground_translations.iter().zip(&shape.ground_rotations) {
            write_point(&mut w, *t);
            write_quat(&mut w, *r);
        }
    }
    w.store_check();

    for st in &shape.object_states {
        w.write(st.vis);
        w.write(st.frame);
        w.write(st.mat_frame);
    }
    w.store_check();
    shape.decal_states.iter().for_each(|d| w.write(d.frame));
    w.store_check();
    for t in &shape.triggers {
        w.write(t.state);
        w.write(t.pos);
    }
    w.store_check();
    for dl in &shape.detail_levels {
        w.write(dl.name);
        w.write(dl.sub_shape);
        w.write(dl.object_detail);
        w.write(dl.size);
        w.write(dl.avg_error);
        w.write(dl.max_error);
        w.write(dl.poly_count);
    }
    w.store_check();

    if version < 16 {
        for (mesh, &slot) in shape.meshes.iter().zip(&slots) {
            if slot >= 0 {
                write_mesh(&mut w, mesh);
            }
        }
    } else {
        shape.meshes.iter().for_each(|m| write_mesh(&mut w, m));
    }
    w.store_check();

    for name in shape.names.iter() {
        w.write_name(name);
    }
    w.store_check();

    if version < 23 {
        w.write_slice(&legacy.detail_first_skin);
        w.write_slice(&legacy.detail_num_skins);
        w.store_check();
        legacy.meshes.iter().for_each(|m| write_mesh(&mut w, m));
        w.store_check();
    }

    w.finish()
}

/// Small but complete shape: a two-node skeleton, one object with a textured quad at two
/// detail levels, one sequence and one material.
pub(crate) fn sample_shape(version: u16) -> Shape {
    let mut shape = Shape {
        version: u32::from(version),
        radius: 2.0,
        tube_radius: 1.5,
        center: Vec3::new(0.0, 0.0, 0.5),
        bounds: Bounds {
            min: Vec3::new(-1.0, -1.0, 0.0),
            max: Vec3::new(1.0, 1.0, 1.0),
        },
        smallest_visible_size: 4,
        smallest_visible_detail_level: 1,
        ..Shape::default()
    };
    let root = shape.names.push("root") as i32;
    let hand = shape.names.push("hand") as i32;
    let quad = shape.names.push("quad") as i32;
    let detail_hi = shape.names.push("detail64") as i32;
    let detail_lo = shape.names.push("detail8") as i32;
    let wave = shape.names.push("wave") as i32;

    shape.nodes = vec![
        Node {
            name: root,
            ..Node::default()
        },
        Node {
            name: hand,
            parent: 0,
            ..Node::default()
        },
    ];
    shape.objects = vec![Object {
        name: quad,
        num_meshes: 2,
        first_mesh: 0,
        node: 1,
        ..Object::default()
    }];
    shape.sub_shapes = vec![SubShape {
        num_nodes: 2,
        num_objects: 1,
        ..SubShape::default()
    }];
    shape.detail_levels = vec![
        crate::DetailLevel {
            name: detail_hi,
            sub_shape: 0,
            object_detail: 0,
            size: 64.0,
            poly_count: 2,
            ..Default::default()
        },
        crate::DetailLevel {
            name: detail_lo,
            sub_shape: 0,
            object_detail: 1,
            size: 8.0,
            poly_count: 2,
            ..Default::default()
        },
    ];
    shape.object_states = vec![ObjectState::default(); 3];
    shape.default_rotations = vec![Quat16::IDENTITY; 2];
    shape.default_translations = vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)];
    shape.node_rotations = vec![Quat16::IDENTITY, Quat16 { x: 0, y: 0, z: 23170, w: 23170 }];
    shape.node_translations = vec![Vec3::ZERO, Vec3::X];

    let mut seq = Sequence {
        name: wave,
        flags: Sequence::CYCLIC,
        num_keyframes: 2,
        duration: 1.0,
        base_rotation: 0,
        base_translation: 0,
        base_object_state: 1,
        ..Sequence::default()
    };
    seq.rotation_matters.insert(1);
    seq.translation_matters.insert(1);
    seq.vis_matters.insert(0);
    shape.sequences = vec![seq];

    let mut skin = Material::new("textures/skin.png");
    skin.flags = Material::S_WRAP | Material::T_WRAP;
    shape.materials = MaterialList {
        materials: vec![skin],
    };

    let quad_mesh = quad_mesh(version, 0);
    let child = Mesh::Standard(BasicData {
        parent: 0,
        ..mesh_basic(&quad_mesh).clone_header()
    });
    shape.meshes = vec![quad_mesh, child];
    shape
}

fn mesh_basic(mesh: &Mesh) -> &BasicData {
    match mesh.basic() {
        Some(b) => b,
        None => panic!("mesh without basic data"),
    }
}

impl BasicData {
    /// Copy of everything but the owned geometry.
    fn clone_header(&self) -> Self {
        Self {
            verts: Vec::new(),
            tverts: Vec::new(),
            normals: Vec::new(),
            encoded_normals: Vec::new(),
            ..self.clone()
        }
    }
}

/// Two-triangle quad drawing material `material`.
pub(crate) fn quad_mesh(version: u16, material: u32) -> Mesh {
    Mesh::Standard(quad_basic(version, material))
}

pub(crate) fn quad_basic(version: u16, material: u32) -> BasicData {
    let verts = vec![
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    BasicData {
        bounds: Bounds {
            min: Vec3::new(-1.0, -1.0, 0.0),
            max: Vec3::new(1.0, 1.0, 1.0),
        },
        center: Vec3::new(0.0, 0.0, 0.5),
        radius: 1.5,
        tverts: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
        normals: vec![Vec3::Z; verts.len()],
        encoded_normals: if version > 21 {
            vec![7; verts.len()]
        } else {
            Vec::new()
        },
        verts,
        primitives: vec![Primitive {
            first_element: 0,
            num_elements: 6,
            mat_index: Primitive::INDEXED | material,
        }],
        indices: vec![0, 1, 2, 0, 2, 3],
        verts_per_frame: 4,
        ..BasicData::default()
    }
}

/// Skin mesh with its own geometry bound to nodes 0 and 1.
/// Skin drawing the geometry of mesh `parent`.
pub(crate) fn parented_skin_mesh(version: u16, parent: i32) -> Mesh {
    Mesh::Skin(SkinData {
        basic: BasicData {
            parent,
            ..quad_basic(version, 0).clone_header()
        },
        ..SkinData::default()
    })
}

pub(crate) fn skin_mesh(version: u16) -> Mesh {
    Mesh::Skin(SkinData {
        basic: quad_basic(version, 0),
        node_transforms: vec![glam::Mat4::IDENTITY, glam::Mat4::from_translation(Vec3::X)],
        vertex_index: vec![0, 1, 2, 3],
        bone_index: vec![0, 0, 1, 1],
        weight: vec![1.0, 1.0, 0.5, 0.5],
        node_index: vec![0, 1],
    })
}
