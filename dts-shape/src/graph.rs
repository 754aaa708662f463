//! Links that shape files never store: child and sibling chains, and the translucency split of
//! each subshape.
//!
//! Chains are built in index order. A child is either its parent's first child or appended to
//! the tail of the sibling chain that starts there.

use crate::material::Material;
use crate::model::{Decal, Node, Object, Shape, index_of};

/// Rebuilds every derived field of `shape` from the stored parent references.
pub fn build_links(shape: &mut Shape) {
    link_nodes(&mut shape.nodes);
    link_objects(&mut shape.objects, &mut shape.nodes);
    link_decals(&mut shape.decals, &mut shape.objects);
    mark_first_translucent(shape);
}

/// Last entry of the chain starting at `head`.
fn chain_tail(head: usize, next: impl Fn(usize) -> i32) -> usize {
    let mut tail = head;
    while let Some(n) = index_of(next(tail)) {
        tail = n;
    }
    tail
}

pub fn link_nodes(nodes: &mut [Node]) {
    for node in nodes.iter_mut() {
        node.first_child = -1;
        node.next_sibling = -1;
    }
    for i in 0..nodes.len() {
        let Some(parent) = index_of(nodes[i].parent).filter(|&p| p < nodes.len()) else {
            continue;
        };
        match index_of(nodes[parent].first_child) {
            None => nodes[parent].first_child = i as i32,
            Some(head) => {
                let tail = chain_tail(head, |n| nodes[n].next_sibling);
                nodes[tail].next_sibling = i as i32;
            }
        }
    }
}

pub fn link_objects(objects: &mut [Object], nodes: &mut [Node]) {
    for node in nodes.iter_mut() {
        node.first_object = -1;
    }
    for object in objects.iter_mut() {
        object.next_sibling = -1;
    }
    for i in 0..objects.len() {
        let Some(node) = index_of(objects[i].node).filter(|&n| n < nodes.len()) else {
            continue;
        };
        match index_of(nodes[node].first_object) {
            None => nodes[node].first_object = i as i32,
            Some(head) => {
                let tail = chain_tail(head, |o| objects[o].next_sibling);
                objects[tail].next_sibling = i as i32;
            }
        }
    }
}

pub fn link_decals(decals: &mut [Decal], objects: &mut [Object]) {
    for object in objects.iter_mut() {
        object.first_decal = -1;
    }
    for decal in decals.iter_mut() {
        decal.next_sibling = -1;
    }
    for i in 0..decals.len() {
        let Some(object) = index_of(decals[i].object).filter(|&o| o < objects.len()) else {
            continue;
        };
        match index_of(objects[object].first_decal) {
            None => objects[object].first_decal = i as i32,
            Some(head) => {
                let tail = chain_tail(head, |d| decals[d].next_sibling);
                decals[tail].next_sibling = i as i32;
            }
        }
    }
}

/// Sets `first_translucent` on the subshape holding the first object that draws a translucent
/// material. The scan stops there for the whole shape, so later subshapes keep `-1`.
pub fn mark_first_translucent(shape: &mut Shape) {
    for sub in shape.sub_shapes.iter_mut() {
        sub.first_translucent = -1;
    }
    let Some((sub, object)) = find_first_translucent(shape) else {
        return;
    };
    shape.sub_shapes[sub].first_translucent = object as i32;
}

fn find_first_translucent(shape: &Shape) -> Option<(usize, usize)> {
    for (si, sub) in shape.sub_shapes.iter().enumerate() {
        for oi in sub.object_range() {
            let Some(object) = shape.objects.get(oi) else {
                continue;
            };
            for mesh in object.mesh_range().filter_map(|m| shape.meshes.get(m)) {
                let translucent = mesh.primitives().iter().any(|p| {
                    p.material_index()
                        .and_then(|m| shape.materials.flags(m))
                        .is_some_and(|f| {
                            f & Material::TRANSLUCENT != 0 && f & Material::AUXILIARY_MAP == 0
                        })
                });
                if translucent {
                    return Some((si, oi));
                }
            }
        }
    }
    None
}
