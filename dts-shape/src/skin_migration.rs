//! Repacks skin meshes of pre-v23 shapes into regular objects.
//!
//! Older files keep skins in a tail block after the regular meshes, with one `[first, count)`
//! range into that block per detail level. Current shapes expect every mesh to belong to an
//! object with one slot per detail level, so each pass over the detail levels gathers at most
//! one skin per level into a new unnamed object.
//!
//! Arrays are rebuilt rather than edited in place: the new mesh list is the regular meshes
//! followed by the repacked skins, and the new object-state list gets the default states
//! spliced in after the original objects' entries.

use crate::mesh::Mesh;
use crate::model::{Object, ObjectState, Shape};

/// Skin tail of a pre-v23 shape as read from the file.
#[derive(Clone, Debug, Default)]
pub struct LegacySkins {
    /// Skin or null meshes, in stored order.
    pub meshes: Vec<Mesh>,
    /// Per detail level: first entry of its range in `meshes`.
    pub detail_first_skin: Vec<i32>,
    /// Per detail level: length of that range.
    pub detail_num_skins: Vec<i32>,
}

impl LegacySkins {
    pub fn present(&self) -> usize {
        self.meshes.iter().filter(|m| !m.is_null()).count()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MigrationSummary {
    pub objects_added: usize,
    pub skins_moved: usize,
    /// Skins no detail-level range reaches.
    pub skins_dropped: usize,
}

/// Moves the legacy skins into synthetic objects appended after `shape.objects`.
///
/// Each synthetic object gets one default [`ObjectState`] inserted right after the states of
/// the original objects, and every sequence's `base_object_state` is shifted past them.
///
/// # Panics
///
/// If `shape.object_states` holds fewer entries than `shape.objects`, or the two per-detail
/// arrays differ in length. The decoder checks both before calling.
pub fn migrate_legacy_skins(shape: &mut Shape, skins: LegacySkins) -> MigrationSummary {
    let LegacySkins {
        meshes: mut tail,
        detail_first_skin,
        detail_num_skins,
    } = skins;

    assert_eq!(
        detail_first_skin.len(),
        detail_num_skins.len(),
        "legacy skin ranges differ in length"
    );
    assert!(
        shape.object_states.len() >= shape.objects.len(),
        "{} object states for {} objects",
        shape.object_states.len(),
        shape.objects.len()
    );

    let mut summary = MigrationSummary::default();
    let present = tail.iter().filter(|m| !m.is_null()).count();
    let num_details = detail_first_skin.len();
    if present == 0 {
        return summary;
    }
    if num_details == 0 {
        log::warn!("{present} legacy skins dropped: shape has no detail levels");
        summary.skins_dropped = present;
        return summary;
    }

    let num_meshes = shape.meshes.len();
    let original_objects = shape.objects.len();
    let mut repacked: Vec<Mesh> = Vec::with_capacity(tail.len());
    let mut synthetic: Vec<Object> = Vec::new();

    while summary.skins_moved < present {
        let first_mesh = num_meshes + repacked.len();
        let mut slots = 0usize;
        let mut took = false;

        for (&first, &count) in detail_first_skin.iter().zip(&detail_num_skins) {
            let range = match (usize::try_from(first), usize::try_from(count)) {
                (Ok(first), Ok(count)) => first..first.saturating_add(count).min(tail.len()),
                _ => 0..0,
            };
            match range.into_iter().find(|&i| !tail[i].is_null()) {
                Some(i) => {
                    repacked.push(std::mem::take(&mut tail[i]));
                    summary.skins_moved += 1;
                    took = true;
                }
                None => repacked.push(Mesh::Null),
            }
            slots += 1;
        }

        while slots > 0 && repacked.last().is_some_and(Mesh::is_null) {
            repacked.pop();
            slots -= 1;
        }

        if slots > 0 {
            synthetic.push(Object {
                name: -1,
                num_meshes: slots as i32,
                first_mesh: first_mesh as i32,
                ..Object::default()
            });
        }

        if !took {
            summary.skins_dropped = present - summary.skins_moved;
            log::warn!(
                "{} legacy skins dropped: no detail-level range reaches them",
                summary.skins_dropped
            );
            break;
        }
    }

    summary.objects_added = synthetic.len();
    shape.meshes.extend(repacked);
    shape.objects.extend(synthetic);

    if summary.objects_added > 0 {
        if let [sub] = shape.sub_shapes.as_mut_slice() {
            sub.num_objects += summary.objects_added as i32;
        }

        let added = summary.objects_added;
        let mut states = Vec::with_capacity(shape.object_states.len() + added);
        states.extend_from_slice(&shape.object_states[..original_objects]);
        states.extend(std::iter::repeat_n(ObjectState::default(), added));
        states.extend_from_slice(&shape.object_states[original_objects..]);
        shape.object_states = states;

        for seq in shape.sequences.iter_mut() {
            seq.base_object_state += added as i32;
        }
    }

    summary
}
