//! Version-aware field sequencing for a whole shape.
//!
//! [`decode_shape`] wraps the buffer in the codec for the requested [`Layout`] and walks the
//! shape in stored order. Both layouts share the same walk through [`ShapeStream`]; only the
//! split layout gives `read_check` any teeth.

use crate::codec::{Layout, LinearCodec, ShapeStream, SplitCodec};
use crate::cursor::{ByteCursor, LengthPrefix, ScalarWidth};
use crate::graph;
use crate::integer_set::IntegerSet;
use crate::material::{Material, MaterialList};
use crate::mesh::{
    BasicData, Cluster, DecalData, Mesh, MeshType, Primitive, SkinData, SortedData,
};
use crate::model::{
    Bounds, Decal, DecalState, DetailLevel, IflMaterial, Node, Object, ObjectState, Quat16,
    Sequence, Shape, SubShape, Trigger,
};
use crate::skin_migration::{self, LegacySkins};
use crate::Error;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Bytes of a stored sequence before its matters sets.
const SEQUENCE_FIXED_BYTES: usize = 15 * 4;

/// Decodes a shape stored in `layout`.
pub fn decode_shape(bytes: &[u8], layout: Layout) -> Result<Shape, Error> {
    match layout {
        Layout::Linear => read_shape(LinearCodec::new(bytes)?, layout),
        Layout::Split => read_shape(SplitCodec::new(bytes)?, layout),
    }
}

/// Decodes a shape, picking the layout with [`Layout::detect`].
pub fn decode_shape_auto(bytes: &[u8]) -> Result<Shape, Error> {
    let layout = Layout::detect(bytes).ok_or(Error::Truncated {
        stream: "header",
        offset: 0,
        need: 4,
        have: bytes.len(),
    })?;
    decode_shape(bytes, layout)
}

impl Shape {
    pub fn from_bytes(bytes: &[u8], layout: Layout) -> Result<Self, Error> {
        decode_shape(bytes, layout)
    }
}

/// Entity counts stored ahead of the shape body.
#[derive(Clone, Debug, Default)]
struct Counts {
    nodes: usize,
    objects: usize,
    decals: usize,
    sub_shapes: usize,
    ifl_materials: usize,
    node_rotations: usize,
    node_translations: usize,
    uniform_scales: usize,
    aligned_scales: usize,
    arbitrary_scales: usize,
    ground_frames: usize,
    object_states: usize,
    decal_states: usize,
    triggers: usize,
    details: usize,
    meshes: usize,
    skins: usize,
    names: usize,
}

fn read_count<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<usize, Error> {
    Ok(s.read_u32()? as usize)
}

/// Fails unless `count` records of `per` scalars of `width` remain.
fn ensure<'a, S: ShapeStream<'a>>(
    s: &S,
    width: ScalarWidth,
    count: usize,
    per: usize,
) -> Result<(), Error> {
    s.ensure_available(width, count.checked_mul(per).unwrap_or(usize::MAX))
}

fn read_counts<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Counts, Error> {
    let version = s.version();
    let mut c = Counts {
        nodes: read_count(s)?,
        objects: read_count(s)?,
        decals: read_count(s)?,
        sub_shapes: read_count(s)?,
        ifl_materials: read_count(s)?,
        ..Counts::default()
    };

    if version >= 22 {
        c.node_rotations = read_count(s)?;
        c.node_translations = read_count(s)?;
        c.uniform_scales = read_count(s)?;
        c.aligned_scales = read_count(s)?;
        c.arbitrary_scales = read_count(s)?;
    } else {
        // Older files store rest pose and keyframes as one combined count.
        let combined = read_count(s)?;
        let keys = combined.checked_sub(c.nodes).ok_or_else(|| Error::Malformed {
            context: "node keyframe count",
            message: format!("combined count {combined} is below node count {}", c.nodes),
        })?;
        c.node_rotations = keys;
        c.node_translations = keys;
    }

    if version > 23 {
        c.ground_frames = read_count(s)?;
    }

    c.object_states = read_count(s)?;
    c.decal_states = read_count(s)?;
    c.triggers = read_count(s)?;
    c.details = read_count(s)?;
    c.meshes = read_count(s)?;
    if version < 23 {
        c.skins = read_count(s)?;
    }
    c.names = read_count(s)?;
    Ok(c)
}

fn read_point<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Vec3, Error> {
    Ok(Vec3::new(s.read_f32()?, s.read_f32()?, s.read_f32()?))
}

fn read_point2<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Vec2, Error> {
    Ok(Vec2::new(s.read_f32()?, s.read_f32()?))
}

fn read_point4<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Vec4, Error> {
    Ok(Vec4::new(s.read_f32()?, s.read_f32()?, s.read_f32()?, s.read_f32()?))
}

fn read_quat16<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Quat16, Error> {
    Ok(Quat16 {
        x: s.read_i16()?,
        y: s.read_i16()?,
        z: s.read_i16()?,
        w: s.read_i16()?,
    })
}

fn read_bounds<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Bounds, Error> {
    Ok(Bounds {
        min: read_point(s)?,
        max: read_point(s)?,
    })
}

fn read_points<'a, S: ShapeStream<'a>>(s: &mut S, count: usize) -> Result<Vec<Vec3>, Error> {
    ensure(s, ScalarWidth::Word, count, 3)?;
    (0..count).map(|_| read_point(s)).collect()
}

fn read_quats<'a, S: ShapeStream<'a>>(s: &mut S, count: usize) -> Result<Vec<Quat16>, Error> {
    ensure(s, ScalarWidth::Half, count, 4)?;
    (0..count).map(|_| read_quat16(s)).collect()
}

/// Reads `count` interleaved (point, rotation) pairs.
fn read_point_quats<'a, S: ShapeStream<'a>>(
    s: &mut S,
    count: usize,
) -> Result<(Vec<Vec3>, Vec<Quat16>), Error> {
    ensure(s, ScalarWidth::Word, count, 3)?;
    ensure(s, ScalarWidth::Half, count, 4)?;
    let mut points = Vec::with_capacity(count);
    let mut quats = Vec::with_capacity(count);
    for _ in 0..count {
        points.push(read_point(s)?);
        quats.push(read_quat16(s)?);
    }
    Ok((points, quats))
}

/// Reads `count` records of `words` 32-bit fields each.
fn read_records<'a, S, T>(
    s: &mut S,
    count: usize,
    words: usize,
    mut read: impl FnMut(&mut S) -> Result<T, Error>,
) -> Result<Vec<T>, Error>
where
    S: ShapeStream<'a>,
{
    ensure(s, ScalarWidth::Word, count, words)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read(s)?);
    }
    Ok(out)
}

/// Reads a `u32` count followed by that many scalars.
fn read_counted<'a, S: ShapeStream<'a>, T: crate::cursor::Scalar>(
    s: &mut S,
) -> Result<Vec<T>, Error> {
    let count = read_count(s)?;
    s.read_array(count)
}

fn read_node<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Node, Error> {
    let name = s.read_i32()?;
    let parent = s.read_i32()?;
    // first_object, first_child, next_sibling: rebuilt by the graph pass.
    for _ in 0..3 {
        s.read_i32()?;
    }
    Ok(Node {
        name,
        parent,
        ..Node::default()
    })
}

fn read_object<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Object, Error> {
    let name = s.read_i32()?;
    let num_meshes = s.read_i32()?;
    let first_mesh = s.read_i32()?;
    let node = s.read_i32()?;
    // next_sibling, first_decal
    s.read_i32()?;
    s.read_i32()?;
    Ok(Object {
        name,
        num_meshes,
        first_mesh,
        node,
        ..Object::default()
    })
}

fn read_decal<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Decal, Error> {
    let name = s.read_i32()?;
    let num_meshes = s.read_i32()?;
    let first_mesh = s.read_i32()?;
    let object = s.read_i32()?;
    // next_sibling
    s.read_i32()?;
    Ok(Decal {
        name,
        num_meshes,
        first_mesh,
        object,
        ..Decal::default()
    })
}

fn read_ifl_material<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<IflMaterial, Error> {
    Ok(IflMaterial {
        name: s.read_i32()?,
        slot: s.read_i32()?,
        first_frame: s.read_i32()?,
        time: s.read_f32()?,
        num_frames: s.read_i32()?,
    })
}

fn read_detail_level<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<DetailLevel, Error> {
    Ok(DetailLevel {
        name: s.read_i32()?,
        sub_shape: s.read_i32()?,
        object_detail: s.read_i32()?,
        size: s.read_f32()?,
        avg_error: s.read_f32()?,
        max_error: s.read_f32()?,
        poly_count: s.read_i32()?,
    })
}

fn read_sub_shapes<'a, S: ShapeStream<'a>>(s: &mut S, count: usize) -> Result<Vec<SubShape>, Error> {
    ensure(s, ScalarWidth::Word, count, 3)?;
    let mut subs = vec![SubShape::default(); count];
    for sub in subs.iter_mut() {
        sub.first_node = s.read_i32()?;
    }
    for sub in subs.iter_mut() {
        sub.first_object = s.read_i32()?;
    }
    for sub in subs.iter_mut() {
        sub.first_decal = s.read_i32()?;
    }
    s.read_check()?;

    ensure(s, ScalarWidth::Word, count, 3)?;
    for sub in subs.iter_mut() {
        sub.num_nodes = s.read_i32()?;
    }
    for sub in subs.iter_mut() {
        sub.num_objects = s.read_i32()?;
    }
    for sub in subs.iter_mut() {
        sub.num_decals = s.read_i32()?;
    }
    s.read_check()?;
    Ok(subs)
}

fn read_primitives<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Vec<Primitive>, Error> {
    let count = read_count(s)?;
    read_records(s, count, 3, |s| {
        Ok(Primitive {
            first_element: s.read_i32()?,
            num_elements: s.read_i32()?,
            mat_index: s.read_u32()?,
        })
    })
}

fn read_basic<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<BasicData, Error> {
    s.read_check()?;
    let mut basic = BasicData {
        num_frames: s.read_u32()?,
        num_mat_frames: s.read_u32()?,
        parent: s.read_i32()?,
        bounds: read_bounds(s)?,
        center: read_point(s)?,
        radius: s.read_f32()?,
        ..BasicData::default()
    };

    // Meshes with a parent borrow its geometry; their own counts are read and dropped.
    let num_verts = read_count(s)?;
    if basic.owns_geometry() {
        basic.verts = read_points(s, num_verts)?;
    }
    let num_tverts = read_count(s)?;
    if basic.owns_geometry() {
        ensure(s, ScalarWidth::Word, num_tverts, 2)?;
        basic.tverts = (0..num_tverts)
            .map(|_| read_point2(s))
            .collect::<Result<_, _>>()?;
        basic.normals = read_points(s, basic.verts.len())?;
        if s.version() > 21 {
            basic.encoded_normals = s.read_array(basic.verts.len())?;
        }
    }

    basic.primitives = read_primitives(s)?;
    basic.indices = read_counted(s)?;
    basic.merge_indices = read_counted(s)?;
    basic.verts_per_frame = s.read_u32()?;
    basic.flags = s.read_u32()?;
    s.read_check()?;
    Ok(basic)
}

fn read_skin<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<SkinData, Error> {
    let mut skin = SkinData {
        basic: read_basic(s)?,
        ..SkinData::default()
    };

    if skin.basic.owns_geometry() {
        // Initial (bind pose) vertices and normals replace the ones above.
        let num_verts = read_count(s)?;
        skin.basic.verts = read_points(s, num_verts)?;
        skin.basic.normals = read_points(s, num_verts)?;
        if s.version() > 21 {
            skin.basic.encoded_normals = s.read_array(num_verts)?;
        }

        let num_transforms = read_count(s)?;
        skin.node_transforms = read_records(s, num_transforms, 16, |s| {
            let mut cols = [0.0f32; 16];
            for v in cols.iter_mut() {
                *v = s.read_f32()?;
            }
            Ok(Mat4::from_cols_array(&cols))
        })?;

        let num_weights = read_count(s)?;
        ensure(s, ScalarWidth::Word, num_weights, 3)?;
        skin.vertex_index = s.read_array(num_weights)?;
        skin.bone_index = s.read_array(num_weights)?;
        skin.weight = s.read_array(num_weights)?;

        skin.node_index = read_counted(s)?;
    } else {
        // Vertex, transform, weight and node-index counts of the parent.
        for _ in 0..4 {
            s.read_u32()?;
        }
    }
    s.read_check()?;
    Ok(skin)
}

fn read_decal_mesh<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<DecalData, Error> {
    let primitives = read_primitives(s)?;
    let indices = read_counted(s)?;
    let start_primitive = read_counted(s)?;
    let num_s = read_count(s)?;
    let tex_gen_s = read_records(s, num_s, 4, |s| read_point4(s))?;
    let num_t = read_count(s)?;
    let tex_gen_t = read_records(s, num_t, 4, |s| read_point4(s))?;
    let mat_index = s.read_i32()?;
    s.read_check()?;
    Ok(DecalData {
        primitives,
        indices,
        start_primitive,
        tex_gen_s,
        tex_gen_t,
        mat_index,
    })
}

fn read_sorted<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<SortedData, Error> {
    let basic = read_basic(s)?;
    let num_clusters = read_count(s)?;
    let clusters = read_records(s, num_clusters, 8, |s| {
        Ok(Cluster {
            start_primitive: s.read_i32()?,
            end_primitive: s.read_i32()?,
            normal: read_point(s)?,
            k: s.read_f32()?,
            front_cluster: s.read_i32()?,
            back_cluster: s.read_i32()?,
        })
    })?;
    let start_cluster = read_counted(s)?;
    let first_verts = read_counted(s)?;
    let num_verts = read_counted(s)?;
    let first_tverts = read_counted(s)?;
    let always_write_depth = s.read_u8()? != 0;
    s.read_check()?;
    Ok(SortedData {
        basic,
        clusters,
        start_cluster,
        first_verts,
        num_verts,
        first_tverts,
        always_write_depth,
    })
}

/// Reads one mesh payload selected by an already-read type tag.
fn read_mesh<'a, S: ShapeStream<'a>>(s: &mut S, tag: u32) -> Result<Mesh, Error> {
    let kind = MeshType::from_tag(tag).ok_or(Error::UnknownMeshType { tag })?;
    Ok(match kind {
        MeshType::Null => Mesh::Null,
        MeshType::Standard => Mesh::Standard(read_basic(s)?),
        MeshType::Skin => Mesh::Skin(read_skin(s)?),
        MeshType::Decal => Mesh::Decal(read_decal_mesh(s)?),
        MeshType::Sorted => Mesh::Sorted(read_sorted(s)?),
    })
}

pub(crate) fn read_tagged_mesh<'a, S: ShapeStream<'a>>(s: &mut S) -> Result<Mesh, Error> {
    let tag = s.read_u32()?;
    read_mesh(s, tag)
}

/// Reads the mesh block. Versions before 16 scatter meshes through a slot list.
fn read_meshes<'a, S: ShapeStream<'a>>(
    s: &mut S,
    count: usize,
    slots: Option<&[i32]>,
) -> Result<Vec<Mesh>, Error> {
    let Some(slots) = slots else {
        return read_records(s, count, 1, |s| read_tagged_mesh(s));
    };

    if slots.len() != count {
        return Err(Error::Malformed {
            context: "mesh index list",
            message: format!("{} entries for {count} meshes", slots.len()),
        });
    }
    // Position `i` holds the next stored mesh when its entry is non-negative.
    let mut meshes = Vec::with_capacity(count);
    for &slot in slots {
        meshes.push(if slot >= 0 {
            read_tagged_mesh(s)?
        } else {
            Mesh::Null
        });
    }
    Ok(meshes)
}

fn read_legacy_skins<'a, S: ShapeStream<'a>>(
    s: &mut S,
    details: usize,
    skins: usize,
) -> Result<LegacySkins, Error> {
    let detail_first_skin = s.read_array(details)?;
    let detail_num_skins = s.read_array(details)?;
    s.read_check()?;

    let meshes = read_records(s, skins, 1, |s| {
        let tag = s.read_u32()?;
        match MeshType::from_tag(tag) {
            Some(MeshType::Skin | MeshType::Null) => read_mesh(s, tag),
            Some(_) => Err(Error::Malformed {
                context: "legacy skin block",
                message: format!("mesh tag {tag} is not a skin"),
            }),
            None => Err(Error::UnknownMeshType { tag }),
        }
    })?;
    s.read_check()?;

    Ok(LegacySkins {
        meshes,
        detail_first_skin,
        detail_num_skins,
    })
}

fn read_integer_set(base: &mut ByteCursor<'_>) -> Result<IntegerSet, Error> {
    // Highest member + 1 as written by the exporter; the words carry the same information.
    let _num_ints = base.read_u32()?;
    let num_words = base.read_u32()? as usize;
    if num_words > IntegerSet::MAX_STORED_WORDS {
        return Err(Error::Malformed {
            context: "integer set",
            message: format!(
                "{num_words} words exceed capacity of {}",
                IntegerSet::MAX_STORED_WORDS
            ),
        });
    }
    let words: Vec<u32> = base.read_array(num_words)?;
    IntegerSet::from_u32_words(&words).ok_or_else(|| Error::Malformed {
        context: "integer set",
        message: format!("{num_words} words"),
    })
}

fn read_sequence(base: &mut ByteCursor<'_>) -> Result<Sequence, Error> {
    base.ensure(SEQUENCE_FIXED_BYTES)?;
    let mut seq = Sequence {
        name: base.read_i32()?,
        flags: base.read_u32()?,
        num_keyframes: base.read_i32()?,
        duration: base.read_f32()?,
        priority: base.read_i32()?,
        first_ground_frame: base.read_i32()?,
        num_ground_frames: base.read_i32()?,
        base_rotation: base.read_i32()?,
        base_translation: base.read_i32()?,
        base_scale: base.read_i32()?,
        base_object_state: base.read_i32()?,
        base_decal_state: base.read_i32()?,
        first_trigger: base.read_i32()?,
        num_triggers: base.read_i32()?,
        tool_begin: base.read_f32()?,
        ..Sequence::default()
    };
    seq.rotation_matters = read_integer_set(base)?;
    seq.translation_matters = read_integer_set(base)?;
    seq.scale_matters = read_integer_set(base)?;
    seq.decal_matters = read_integer_set(base)?;
    seq.ifl_matters = read_integer_set(base)?;
    seq.vis_matters = read_integer_set(base)?;
    seq.frame_matters = read_integer_set(base)?;
    seq.mat_frame_matters = read_integer_set(base)?;
    Ok(seq)
}

fn read_sequences(base: &mut ByteCursor<'_>) -> Result<Vec<Sequence>, Error> {
    let count = base.read_u32()? as usize;
    // Fixed fields plus eight empty sets.
    base.ensure_elements(count, SEQUENCE_FIXED_BYTES + 8 * 8)?;
    (0..count).map(|_| read_sequence(base)).collect()
}

fn read_material_list(base: &mut ByteCursor<'_>) -> Result<MaterialList, Error> {
    let version = base.read_u8()?;
    if version != MaterialList::BINARY_VERSION {
        return Err(Error::Malformed {
            context: "material list",
            message: format!(
                "version {version}, expected {}",
                MaterialList::BINARY_VERSION
            ),
        });
    }
    let count = base.read_u32()? as usize;
    base.ensure_elements(count, 1 + 6 * 4)?;

    let mut materials = Vec::with_capacity(count);
    for _ in 0..count {
        materials.push(Material::new(
            base.read_len_prefixed_string(LengthPrefix::U8)?,
        ));
    }
    for m in materials.iter_mut() {
        m.flags = base.read_u32()?;
    }
    for m in materials.iter_mut() {
        m.reflectance_map = base.read_i32()?;
    }
    for m in materials.iter_mut() {
        m.bump_map = base.read_i32()?;
    }
    for m in materials.iter_mut() {
        m.detail_map = base.read_i32()?;
    }
    for m in materials.iter_mut() {
        m.detail_scale = base.read_f32()?;
    }
    for m in materials.iter_mut() {
        m.reflection_amount = base.read_f32()?;
    }
    Ok(MaterialList { materials })
}

fn read_shape<'a, S: ShapeStream<'a>>(mut s: S, layout: Layout) -> Result<Shape, Error> {
    let version = s.version();
    let sequences = read_sequences(s.base())?;
    let materials = read_material_list(s.base())?;

    let c = read_counts(&mut s)?;
    log::debug!(
        "decoding {layout:?} shape v{version} (exporter {}): {} nodes, {} objects, {} meshes, {} skins, {} sequences",
        s.exporter_version(),
        c.nodes,
        c.objects,
        c.meshes,
        c.skins,
        sequences.len()
    );

    let mut shape = Shape {
        version,
        exporter_version: s.exporter_version(),
        sequences,
        materials,
        ..Shape::default()
    };
    shape.smallest_visible_size = s.read_i32()?;
    shape.smallest_visible_detail_level = s.read_i32()?;
    s.read_check()?;

    shape.radius = s.read_f32()?;
    shape.tube_radius = s.read_f32()?;
    shape.center = read_point(&mut s)?;
    shape.bounds = read_bounds(&mut s)?;
    s.read_check()?;

    shape.nodes = read_records(&mut s, c.nodes, 5, |s| read_node(s))?;
    s.read_check()?;
    shape.objects = read_records(&mut s, c.objects, 6, |s| read_object(s))?;
    s.read_check()?;
    shape.decals = read_records(&mut s, c.decals, 5, |s| read_decal(s))?;
    s.read_check()?;
    shape.ifl_materials = read_records(&mut s, c.ifl_materials, 5, |s| read_ifl_material(s))?;
    s.read_check()?;

    shape.sub_shapes = read_sub_shapes(&mut s, c.sub_shapes)?;

    let mesh_slots = if version < 16 {
        Some(read_counted::<_, i32>(&mut s)?)
    } else {
        None
    };

    (shape.default_translations, shape.default_rotations) = {
        ensure(&s, ScalarWidth::Word, c.nodes, 3)?;
        ensure(&s, ScalarWidth::Half, c.nodes, 4)?;
        let mut translations = Vec::with_capacity(c.nodes);
        let mut rotations = Vec::with_capacity(c.nodes);
        for _ in 0..c.nodes {
            rotations.push(read_quat16(&mut s)?);
            translations.push(read_point(&mut s)?);
        }
        (translations, rotations)
    };
    shape.node_translations = read_points(&mut s, c.node_translations)?;
    shape.node_rotations = read_quats(&mut s, c.node_rotations)?;
    s.read_check()?;

    if version > 21 {
        shape.node_uniform_scales = s.read_array(c.uniform_scales)?;
        shape.node_aligned_scales = read_points(&mut s, c.aligned_scales)?;
        (
            shape.node_arbitrary_scale_factors,
            shape.node_arbitrary_scale_rotations,
        ) = read_point_quats(&mut s, c.arbitrary_scales)?;
    }
    s.read_check()?;

    (shape.ground_translations, shape.ground_rotations) =
        read_point_quats(&mut s, c.ground_frames)?;
    s.read_check()?;

    shape.object_states = read_records(&mut s, c.object_states, 3, |s| {
        Ok(ObjectState {
            vis: s.read_f32()?,
            frame: s.read_i32()?,
            mat_frame: s.read_i32()?,
        })
    })?;
    s.read_check()?;
    shape.decal_states = read_records(&mut s, c.decal_states, 1, |s| {
        Ok(DecalState {
            frame: s.read_i32()?,
        })
    })?;
    s.read_check()?;
    shape.triggers = read_records(&mut s, c.triggers, 2, |s| {
        Ok(Trigger {
            state: s.read_u32()?,
            pos: s.read_f32()?,
        })
    })?;
    s.read_check()?;
    shape.detail_levels = read_records(&mut s, c.details, 7, |s| read_detail_level(s))?;
    s.read_check()?;

    shape.meshes = read_meshes(&mut s, c.meshes, mesh_slots.as_deref())?;
    s.read_check()?;

    ensure(&s, ScalarWidth::Byte, c.names, 1)?;
    for _ in 0..c.names {
        let name = s.read_name()?;
        shape.names.push(name);
    }
    s.read_check()?;

    let legacy = if version < 23 {
        Some(read_legacy_skins(&mut s, c.details, c.skins)?)
    } else {
        None
    };

    validate(&shape)?;
    graph::build_links(&mut shape);
    let stored_objects = shape.objects.len();

    if let Some(legacy) = legacy {
        if legacy.meshes.iter().any(|m| !m.is_null()) {
            if shape.object_states.len() < shape.objects.len() {
                return Err(Error::InvariantViolation {
                    message: format!(
                        "{} object states for {} objects before the legacy skin pass",
                        shape.object_states.len(),
                        shape.objects.len()
                    ),
                });
            }
            let summary = skin_migration::migrate_legacy_skins(&mut shape, legacy);
            log::debug!(
                "legacy skins: {} objects added, {} skins moved, {} dropped",
                summary.objects_added,
                summary.skins_moved,
                summary.skins_dropped
            );
        }
    }

    // Only the stored objects, not the ones added for legacy skins.
    shape.previous_merge = vec![-1; stored_objects];
    shape.export_merge = version >= 23;
    Ok(shape)
}

fn check_index(kind: &'static str, index: i32, len: usize) -> Result<(), Error> {
    match usize::try_from(index) {
        Ok(i) if i >= len => Err(Error::InvalidIndex {
            kind,
            index: i64::from(index),
            len,
        }),
        Ok(_) => Ok(()),
        Err(_) if index == -1 => Ok(()),
        Err(_) => Err(Error::InvalidIndex {
            kind,
            index: i64::from(index),
            len,
        }),
    }
}

fn check_range(kind: &'static str, first: i32, count: i32, len: usize) -> Result<(), Error> {
    let bad = || Error::InvalidIndex {
        kind,
        index: i64::from(first) + i64::from(count),
        len,
    };
    if first < 0 || count < 0 {
        return Err(bad());
    }
    if i64::from(first) + i64::from(count) > len as i64 {
        return Err(bad());
    }
    Ok(())
}

/// Checks every stored cross reference once all arrays are in place.
fn validate(shape: &Shape) -> Result<(), Error> {
    let names = shape.names.len();
    let (nodes, objects, decals, meshes) = (
        shape.nodes.len(),
        shape.objects.len(),
        shape.decals.len(),
        shape.meshes.len(),
    );

    for n in &shape.nodes {
        check_index("node name", n.name, names)?;
        check_index("node parent", n.parent, nodes)?;
    }
    for o in &shape.objects {
        check_index("object name", o.name, names)?;
        check_index("object node", o.node, nodes)?;
        check_range("object mesh", o.first_mesh, o.num_meshes, meshes)?;
    }
    for d in &shape.decals {
        check_index("decal name", d.name, names)?;
        check_index("decal object", d.object, objects)?;
        check_range("decal mesh", d.first_mesh, d.num_meshes, meshes)?;
    }
    for sub in &shape.sub_shapes {
        check_range("subshape node", sub.first_node, sub.num_nodes, nodes)?;
        check_range("subshape object", sub.first_object, sub.num_objects, objects)?;
        check_range("subshape decal", sub.first_decal, sub.num_decals, decals)?;
    }
    for dl in &shape.detail_levels {
        check_index("detail level name", dl.name, names)?;
        check_index("detail level subshape", dl.sub_shape, shape.sub_shapes.len())?;
    }
    for seq in &shape.sequences {
        check_index("sequence name", seq.name, names)?;
    }
    for ifl in &shape.ifl_materials {
        check_index("ifl material name", ifl.name, names)?;
    }
    Ok(())
}
