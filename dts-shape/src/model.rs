use crate::integer_set::IntegerSet;
use crate::material::MaterialList;
use crate::mesh::Mesh;
use glam::{Quat, Vec3};

/// Converts a stored `-1`-or-index value into an index.
pub(crate) fn index_of(raw: i32) -> Option<usize> {
    usize::try_from(raw).ok()
}

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Rotation quantized to four signed 16-bit components.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quat16 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub w: i16,
}

impl Quat16 {
    const SCALE: f32 = 32767.0;

    pub const IDENTITY: Self = Self {
        x: 0,
        y: 0,
        z: 0,
        w: i16::MAX,
    };

    pub fn to_quat(self) -> Quat {
        Quat::from_xyzw(
            f32::from(self.x) / Self::SCALE,
            f32::from(self.y) / Self::SCALE,
            f32::from(self.z) / Self::SCALE,
            f32::from(self.w) / Self::SCALE,
        )
    }

    /// Quantizes a unit quaternion.
    pub fn from_quat(q: Quat) -> Self {
        let q16 = |v: f32| (v.clamp(-1.0, 1.0) * Self::SCALE).round() as i16;
        Self {
            x: q16(q.x),
            y: q16(q.y),
            z: q16(q.z),
            w: q16(q.w),
        }
    }
}

/// Skeleton node. `first_object`, `first_child` and `next_sibling` are derived after decode.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub name: i32,
    pub parent: i32,
    pub first_object: i32,
    pub first_child: i32,
    pub next_sibling: i32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: -1,
            parent: -1,
            first_object: -1,
            first_child: -1,
            next_sibling: -1,
        }
    }
}

impl Node {
    pub fn parent_index(&self) -> Option<usize> {
        index_of(self.parent)
    }
}

/// Renderable object: one mesh slot per detail level, attached to a node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Object {
    pub name: i32,
    pub num_meshes: i32,
    pub first_mesh: i32,
    pub node: i32,
    pub next_sibling: i32,
    pub first_decal: i32,
}

impl Default for Object {
    fn default() -> Self {
        Self {
            name: -1,
            num_meshes: 0,
            first_mesh: 0,
            node: -1,
            next_sibling: -1,
            first_decal: -1,
        }
    }
}

impl Object {
    /// Indices of this object's mesh slots in `Shape::meshes`.
    pub fn mesh_range(&self) -> std::ops::Range<usize> {
        let first = index_of(self.first_mesh).unwrap_or(0);
        first..first + index_of(self.num_meshes).unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decal {
    pub name: i32,
    pub num_meshes: i32,
    pub first_mesh: i32,
    pub object: i32,
    pub next_sibling: i32,
}

impl Default for Decal {
    fn default() -> Self {
        Self {
            name: -1,
            num_meshes: 0,
            first_mesh: 0,
            object: -1,
            next_sibling: -1,
        }
    }
}

impl Decal {
    pub fn mesh_range(&self) -> std::ops::Range<usize> {
        let first = index_of(self.first_mesh).unwrap_or(0);
        first..first + index_of(self.num_meshes).unwrap_or(0)
    }
}

/// Contiguous slice of the node, object and decal arrays.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubShape {
    pub first_node: i32,
    pub first_object: i32,
    pub first_decal: i32,
    pub num_nodes: i32,
    pub num_objects: i32,
    pub num_decals: i32,
    /// First object drawn in the translucent pass, or -1. Derived after decode.
    pub first_translucent: i32,
}

impl Default for SubShape {
    fn default() -> Self {
        Self {
            first_node: 0,
            first_object: 0,
            first_decal: 0,
            num_nodes: 0,
            num_objects: 0,
            num_decals: 0,
            first_translucent: -1,
        }
    }
}

impl SubShape {
    pub fn object_range(&self) -> std::ops::Range<usize> {
        let first = index_of(self.first_object).unwrap_or(0);
        first..first + index_of(self.num_objects).unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetailLevel {
    pub name: i32,
    pub sub_shape: i32,
    /// Mesh slot drawn for every object at this level.
    pub object_detail: i32,
    pub size: f32,
    pub avg_error: f32,
    pub max_error: f32,
    pub poly_count: i32,
}

/// Flipbook material driven by a sequence of frame materials.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IflMaterial {
    pub name: i32,
    pub slot: i32,
    pub first_frame: i32,
    pub time: f32,
    pub num_frames: i32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectState {
    pub vis: f32,
    pub frame: i32,
    pub mat_frame: i32,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            vis: 1.0,
            frame: 0,
            mat_frame: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecalState {
    pub frame: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trigger {
    pub state: u32,
    pub pos: f32,
}

impl Trigger {
    pub const STATE_ON: u32 = 1 << 31;
    pub const INVERT_ON_REVERSE: u32 = 1 << 30;
    pub const STATE_MASK: u32 = (1 << 30) - 1;

    /// Trigger that switches `state` (1-based) on or off at `pos`.
    pub fn new(state: u32, on: bool, pos: f32, invert_on_reverse: bool) -> Self {
        let mut bits = match state {
            1..=30 => 1 << (state - 1),
            _ => 0,
        };
        if on {
            bits |= Self::STATE_ON;
        }
        if invert_on_reverse {
            bits |= Self::INVERT_ON_REVERSE;
        }
        Self { state: bits, pos }
    }

    pub fn is_on(&self) -> bool {
        self.state & Self::STATE_ON != 0
    }

    pub fn inverts_on_reverse(&self) -> bool {
        self.state & Self::INVERT_ON_REVERSE != 0
    }

    /// 1-based index of the trigger state this trigger drives.
    pub fn state_index(&self) -> Option<u32> {
        let bits = self.state & Self::STATE_MASK;
        (bits != 0).then(|| bits.trailing_zeros() + 1)
    }
}

/// Animation sequence: a window into the shared keyframe arrays plus the sets of entities
/// each channel animates.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sequence {
    pub name: i32,
    pub flags: u32,
    pub num_keyframes: i32,
    pub duration: f32,
    pub priority: i32,
    pub first_ground_frame: i32,
    pub num_ground_frames: i32,
    pub base_rotation: i32,
    pub base_translation: i32,
    pub base_scale: i32,
    pub base_object_state: i32,
    pub base_decal_state: i32,
    pub first_trigger: i32,
    pub num_triggers: i32,
    pub tool_begin: f32,
    pub rotation_matters: IntegerSet,
    pub translation_matters: IntegerSet,
    pub scale_matters: IntegerSet,
    pub decal_matters: IntegerSet,
    pub ifl_matters: IntegerSet,
    pub vis_matters: IntegerSet,
    pub frame_matters: IntegerSet,
    pub mat_frame_matters: IntegerSet,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            name: -1,
            flags: 0,
            num_keyframes: 0,
            duration: 0.0,
            priority: 0,
            first_ground_frame: -1,
            num_ground_frames: 0,
            base_rotation: -1,
            base_translation: -1,
            base_scale: -1,
            base_object_state: -1,
            base_decal_state: -1,
            first_trigger: -1,
            num_triggers: 0,
            tool_begin: 0.0,
            rotation_matters: IntegerSet::new(),
            translation_matters: IntegerSet::new(),
            scale_matters: IntegerSet::new(),
            decal_matters: IntegerSet::new(),
            ifl_matters: IntegerSet::new(),
            vis_matters: IntegerSet::new(),
            frame_matters: IntegerSet::new(),
            mat_frame_matters: IntegerSet::new(),
        }
    }
}

impl Sequence {
    pub const UNIFORM_SCALE: u32 = 0x0001;
    pub const ALIGNED_SCALE: u32 = 0x0002;
    pub const ARBITRARY_SCALE: u32 = 0x0004;
    pub const BLEND: u32 = 0x0008;
    pub const CYCLIC: u32 = 0x0010;
    pub const MAKE_PATH: u32 = 0x0020;
    pub const IFL_INIT: u32 = 0x0040;
    pub const HAS_TRANSLUCENCY: u32 = 0x0080;

    pub const ANY_SCALE: u32 = Self::UNIFORM_SCALE | Self::ALIGNED_SCALE | Self::ARBITRARY_SCALE;

    pub fn is_cyclic(&self) -> bool {
        self.flags & Self::CYCLIC != 0
    }

    pub fn is_blend(&self) -> bool {
        self.flags & Self::BLEND != 0
    }

    pub fn animates_scale(&self) -> bool {
        self.flags & Self::ANY_SCALE != 0
    }

    /// The eight matters sets in their stored order.
    pub fn matters(&self) -> [&IntegerSet; 8] {
        [
            &self.rotation_matters,
            &self.translation_matters,
            &self.scale_matters,
            &self.decal_matters,
            &self.ifl_matters,
            &self.vis_matters,
            &self.frame_matters,
            &self.mat_frame_matters,
        ]
    }
}

/// String pool addressed by position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends without deduplicating, so indices match the stored order.
    pub fn push(&mut self, name: impl Into<String>) -> usize {
        self.names.push(name.into());
        self.names.len() - 1
    }

    /// Index of `name` (compared case-insensitively), appending it if missing.
    pub fn add(&mut self, name: &str) -> usize {
        match self.find(name) {
            Some(i) => i,
            None => self.push(name),
        }
    }

    /// Index of `name` (compared exactly), appending it if missing.
    pub fn insert(&mut self, name: &str) -> usize {
        match self.names.iter().position(|n| n == name) {
            Some(i) => i,
            None => self.push(name),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Case-insensitive lookup.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// A decoded shape.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub version: u32,
    pub exporter_version: u32,

    pub radius: f32,
    pub tube_radius: f32,
    pub center: Vec3,
    pub bounds: Bounds,
    pub smallest_visible_size: i32,
    pub smallest_visible_detail_level: i32,

    pub nodes: Vec<Node>,
    pub objects: Vec<Object>,
    pub decals: Vec<Decal>,
    pub sub_shapes: Vec<SubShape>,
    pub ifl_materials: Vec<IflMaterial>,
    pub meshes: Vec<Mesh>,
    pub sequences: Vec<Sequence>,
    pub triggers: Vec<Trigger>,
    pub detail_levels: Vec<DetailLevel>,
    pub object_states: Vec<ObjectState>,
    pub decal_states: Vec<DecalState>,

    /// Rest pose, one entry per node.
    pub default_rotations: Vec<Quat16>,
    pub default_translations: Vec<Vec3>,

    pub node_rotations: Vec<Quat16>,
    pub node_translations: Vec<Vec3>,
    pub node_uniform_scales: Vec<f32>,
    pub node_aligned_scales: Vec<Vec3>,
    pub node_arbitrary_scale_factors: Vec<Vec3>,
    pub node_arbitrary_scale_rotations: Vec<Quat16>,

    pub ground_translations: Vec<Vec3>,
    pub ground_rotations: Vec<Quat16>,

    pub names: NameTable,
    pub materials: MaterialList,

    /// Per-object merge bookkeeping for detail blending; -1 when unset.
    pub previous_merge: Vec<i32>,
    pub export_merge: bool,
}

impl Shape {
    /// Name at a stored name index; `-1` and out-of-range indices give `None`.
    pub fn name(&self, index: i32) -> Option<&str> {
        self.names.get(index_of(index)?)
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| self.name(n.name).is_some_and(|s| s.eq_ignore_ascii_case(name)))
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(self.node_index(name)?)
    }

    pub fn object_index(&self, name: &str) -> Option<usize> {
        self.objects
            .iter()
            .position(|o| self.name(o.name).is_some_and(|s| s.eq_ignore_ascii_case(name)))
    }

    pub fn sequence(&self, name: &str) -> Option<(usize, &Sequence)> {
        self.sequences
            .iter()
            .enumerate()
            .find(|(_, s)| self.name(s.name).is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Whether `mesh` is left out when drawing starts at detail level `skip_detail`.
    ///
    /// `object` and `decal` are where the search starts; the walk only moves forward, so callers
    /// iterating meshes in order can carry them along.
    pub fn check_skip(&self, mesh: usize, object: usize, decal: usize, skip_detail: usize) -> bool {
        if skip_detail == 0 {
            return false;
        }
        let Some(level) = self.detail_levels.get(skip_detail) else {
            return false;
        };
        let Some(skip_sub) = index_of(level.sub_shape) else {
            return false;
        };
        let Some(sub) = self.sub_shapes.get(skip_sub) else {
            return false;
        };
        let next_sub = self.sub_shapes.get(skip_sub + 1);
        let object_detail = i64::from(level.object_detail);

        let mut current = object;
        while let Some(obj) = self.objects.get(current) {
            let start = i64::from(obj.first_mesh);
            let m = mesh as i64;
            if m < start {
                break;
            }
            if m < start + i64::from(obj.num_meshes) {
                if i64::from(sub.first_object) > current as i64 {
                    return true;
                }
                if next_sub.is_none_or(|n| (current as i64) < i64::from(n.first_object)) {
                    return m - start < object_detail;
                }
                return false;
            }
            current += 1;
        }

        let mut current = decal;
        while let Some(dec) = self.decals.get(current) {
            let start = i64::from(dec.first_mesh);
            let m = mesh as i64;
            if m < start {
                break;
            }
            if m < start + i64::from(dec.num_meshes) {
                if i64::from(sub.first_decal) > current as i64 {
                    return true;
                }
                if next_sub.is_none_or(|n| (current as i64) < i64::from(n.first_decal)) {
                    return m - start < object_detail;
                }
                return false;
            }
            current += 1;
        }
        false
    }
}
