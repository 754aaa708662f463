use crate::graph::{build_links, link_decals, link_nodes, link_objects, mark_first_translucent};
use crate::{
    Decal, Material, MaterialList, Mesh, Node, Object, Primitive, Shape, SubShape, fixtures,
};

fn nodes_with_parents(parents: &[i32]) -> Vec<Node> {
    parents
        .iter()
        .map(|&parent| Node {
            parent,
            ..Node::default()
        })
        .collect()
}

#[test]
fn node_children_and_siblings() {
    let mut nodes = nodes_with_parents(&[-1, 0, 0, 1]);
    link_nodes(&mut nodes);

    assert_eq!(nodes[0].first_child, 1);
    assert_eq!(nodes[1].next_sibling, 2);
    assert_eq!(nodes[1].first_child, 3);
    assert_eq!(nodes[2].first_child, -1);
    assert_eq!(nodes[2].next_sibling, -1);
    assert_eq!(nodes[3].next_sibling, -1);
    assert_eq!(nodes[0].next_sibling, -1);
}

#[test]
fn later_children_append_to_sibling_tail() {
    let mut nodes = nodes_with_parents(&[-1, 0, 1, 0, 1, 0]);
    link_nodes(&mut nodes);

    let mut children = Vec::new();
    let mut next = nodes[0].first_child;
    while next >= 0 {
        children.push(next);
        next = nodes[next as usize].next_sibling;
    }
    assert_eq!(children, vec![1, 3, 5]);
    assert_eq!(nodes[1].first_child, 2);
    assert_eq!(nodes[2].next_sibling, 4);
}

#[test]
fn relinking_is_idempotent() {
    let mut nodes = nodes_with_parents(&[-1, 0, 0, 1]);
    link_nodes(&mut nodes);
    let once = nodes.clone();
    link_nodes(&mut nodes);
    assert_eq!(nodes, once);
}

#[test]
fn objects_chain_under_nodes_and_decals_under_objects() {
    let mut nodes = nodes_with_parents(&[-1, 0]);
    let mut objects = vec![
        Object {
            node: 1,
            ..Object::default()
        },
        Object {
            node: -1,
            ..Object::default()
        },
        Object {
            node: 1,
            ..Object::default()
        },
        Object {
            node: 0,
            ..Object::default()
        },
    ];
    let mut decals = vec![
        Decal {
            object: 2,
            ..Decal::default()
        },
        Decal {
            object: 2,
            ..Decal::default()
        },
    ];
    link_objects(&mut objects, &mut nodes);
    link_decals(&mut decals, &mut objects);

    assert_eq!(nodes[1].first_object, 0);
    assert_eq!(objects[0].next_sibling, 2);
    assert_eq!(objects[2].next_sibling, -1);
    assert_eq!(nodes[0].first_object, 3);
    assert_eq!(objects[1].next_sibling, -1);

    assert_eq!(objects[2].first_decal, 0);
    assert_eq!(decals[0].next_sibling, 1);
    assert_eq!(objects[0].first_decal, -1);
}

fn material(flags: u32) -> Material {
    let mut m = Material::new("m");
    m.flags = flags;
    m
}

fn mesh_with_material(mat_index: u32) -> Mesh {
    Mesh::Standard(crate::BasicData {
        primitives: vec![Primitive {
            first_element: 0,
            num_elements: 3,
            mat_index,
        }],
        ..crate::BasicData::default()
    })
}

/// Four objects with one mesh each, split over two subshapes.
fn translucency_shape(mesh_materials: [u32; 4]) -> Shape {
    Shape {
        objects: (0..4)
            .map(|i| Object {
                num_meshes: 1,
                first_mesh: i,
                ..Object::default()
            })
            .collect(),
        meshes: mesh_materials.into_iter().map(mesh_with_material).collect(),
        sub_shapes: vec![
            SubShape {
                num_objects: 2,
                ..SubShape::default()
            },
            SubShape {
                first_object: 2,
                num_objects: 2,
                ..SubShape::default()
            },
        ],
        materials: MaterialList {
            materials: vec![
                material(0),
                material(Material::TRANSLUCENT),
                material(Material::TRANSLUCENT | Material::DETAIL_MAP_ONLY),
            ],
        },
        ..Shape::default()
    }
}

#[test]
fn first_translucent_object_marks_its_subshape() {
    let mut shape = translucency_shape([0, 0, 0, 1]);
    mark_first_translucent(&mut shape);
    assert_eq!(shape.sub_shapes[0].first_translucent, -1);
    assert_eq!(shape.sub_shapes[1].first_translucent, 3);
}

#[test]
fn translucent_scan_stops_at_first_hit_for_whole_shape() {
    let mut shape = translucency_shape([1, 0, 1, 0]);
    mark_first_translucent(&mut shape);
    assert_eq!(shape.sub_shapes[0].first_translucent, 0);
    // Object 2 is translucent too, but the scan is already over.
    assert_eq!(shape.sub_shapes[1].first_translucent, -1);
}

#[test]
fn auxiliary_and_missing_materials_are_not_translucent() {
    let mut shape = translucency_shape([2, Primitive::NO_MATERIAL | 1, 9, 0]);
    mark_first_translucent(&mut shape);
    assert!(shape.sub_shapes.iter().all(|s| s.first_translucent == -1));
}

#[test]
fn build_links_on_sample_shape() {
    let mut shape = fixtures::sample_shape(24);
    build_links(&mut shape);
    assert_eq!(shape.nodes[0].first_child, 1);
    assert_eq!(shape.nodes[1].first_object, 0);
    assert_eq!(shape.sub_shapes[0].first_translucent, -1);
}
