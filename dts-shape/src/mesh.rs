use crate::model::{Bounds, index_of};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Mesh kind as stored in the low bits of a mesh's type tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeshType {
    Standard,
    Skin,
    Decal,
    Sorted,
    Null,
}

impl MeshType {
    /// Bits of a stored tag that select the mesh kind.
    pub const TAG_MASK: u32 = 0x7;

    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag & Self::TAG_MASK {
            0 => Self::Standard,
            1 => Self::Skin,
            2 => Self::Decal,
            3 => Self::Sorted,
            4 => Self::Null,
            _ => return None,
        })
    }

    pub fn tag(self) -> u32 {
        match self {
            Self::Standard => 0,
            Self::Skin => 1,
            Self::Decal => 2,
            Self::Sorted => 3,
            Self::Null => 4,
        }
    }
}

/// A decoded mesh. The payload is selected by the stored type tag alone.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mesh {
    Standard(BasicData),
    Skin(SkinData),
    Decal(DecalData),
    Sorted(SortedData),
    #[default]
    Null,
}

impl Mesh {
    pub fn mesh_type(&self) -> MeshType {
        match self {
            Self::Standard(_) => MeshType::Standard,
            Self::Skin(_) => MeshType::Skin,
            Self::Decal(_) => MeshType::Decal,
            Self::Sorted(_) => MeshType::Sorted,
            Self::Null => MeshType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Shared vertex payload of standard, skin and sorted meshes.
    pub fn basic(&self) -> Option<&BasicData> {
        match self {
            Self::Standard(b) => Some(b),
            Self::Skin(s) => Some(&s.basic),
            Self::Sorted(s) => Some(&s.basic),
            Self::Decal(_) | Self::Null => None,
        }
    }

    pub fn basic_mut(&mut self) -> Option<&mut BasicData> {
        match self {
            Self::Standard(b) => Some(b),
            Self::Skin(s) => Some(&mut s.basic),
            Self::Sorted(s) => Some(&mut s.basic),
            Self::Decal(_) | Self::Null => None,
        }
    }

    pub fn primitives(&self) -> &[Primitive] {
        match self {
            Self::Decal(d) => &d.primitives,
            _ => self.basic().map_or(&[], |b| b.primitives.as_slice()),
        }
    }

    /// Mesh whose vertices this one borrows, if any.
    pub fn parent(&self) -> Option<usize> {
        self.basic().and_then(|b| index_of(b.parent))
    }

    pub fn flags(&self) -> u32 {
        self.basic().map_or(0, |b| b.flags)
    }

    /// Triangles drawn by the shared primitives (decals are not counted).
    pub fn poly_count(&self) -> usize {
        self.basic()
            .map_or(0, |b| b.primitives.iter().map(Primitive::triangle_count).sum())
    }

    pub fn node_index_count(&self) -> usize {
        match self {
            Self::Skin(s) => s.node_index.len(),
            _ => 0,
        }
    }

    /// Node driving bone slot `bone` of a skin mesh.
    pub fn node_index(&self, bone: usize) -> Option<i32> {
        match self {
            Self::Skin(s) => s.node_index.get(bone).copied(),
            _ => None,
        }
    }
}

/// Vertex data shared by standard, skin and sorted meshes.
///
/// A mesh with `parent >= 0` stores no vertices, texture coordinates or normals of its own;
/// it draws with the geometry of the referenced mesh.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicData {
    pub num_frames: u32,
    pub num_mat_frames: u32,
    pub parent: i32,
    pub bounds: Bounds,
    pub center: Vec3,
    pub radius: f32,
    pub verts: Vec<Vec3>,
    pub tverts: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub encoded_normals: Vec<u8>,
    pub primitives: Vec<Primitive>,
    pub indices: Vec<u16>,
    pub merge_indices: Vec<u16>,
    pub verts_per_frame: u32,
    pub flags: u32,
}

impl Default for BasicData {
    fn default() -> Self {
        Self {
            num_frames: 1,
            num_mat_frames: 1,
            parent: -1,
            bounds: Bounds::default(),
            center: Vec3::ZERO,
            radius: 0.0,
            verts: Vec::new(),
            tverts: Vec::new(),
            normals: Vec::new(),
            encoded_normals: Vec::new(),
            primitives: Vec::new(),
            indices: Vec::new(),
            merge_indices: Vec::new(),
            verts_per_frame: 0,
            flags: 0,
        }
    }
}

impl BasicData {
    pub const BILLBOARD: u32 = 1 << 31;
    pub const HAS_DETAIL: u32 = 1 << 30;
    pub const BILLBOARD_Z: u32 = 1 << 29;
    pub const ENCODED_NORMALS: u32 = 1 << 28;

    pub fn owns_geometry(&self) -> bool {
        self.parent < 0
    }

    /// Axis-aligned box around the stored vertices, or `None` without vertices.
    pub fn vertex_bounds(&self) -> Option<Bounds> {
        let first = *self.verts.first()?;
        let (min, max) = self
            .verts
            .iter()
            .fold((first, first), |(min, max), v| (min.min(*v), max.max(*v)));
        Some(Bounds { min, max })
    }

    /// Distance from `center` to the farthest stored vertex.
    pub fn compute_radius(&self, center: Vec3) -> f32 {
        self.verts
            .iter()
            .map(|v| v.distance_squared(center))
            .fold(0.0f32, f32::max)
            .sqrt()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkinData {
    pub basic: BasicData,
    /// Inverse bind transform per bone slot.
    pub node_transforms: Vec<Mat4>,
    pub vertex_index: Vec<i32>,
    pub bone_index: Vec<i32>,
    pub weight: Vec<f32>,
    pub node_index: Vec<i32>,
}

/// Decal payload: projected primitives with per-frame texture generation planes.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecalData {
    pub primitives: Vec<Primitive>,
    pub indices: Vec<u16>,
    /// Per-frame offsets into `primitives`.
    pub start_primitive: Vec<i32>,
    pub tex_gen_s: Vec<Vec4>,
    pub tex_gen_t: Vec<Vec4>,
    pub mat_index: i32,
}

impl DecalData {
    /// Primitives active on `frame`: `[start[f], start[f + 1])`, the last frame running to
    /// the end of the primitive array.
    pub fn frame_primitives(&self, frame: usize) -> Option<&[Primitive]> {
        let start = index_of(*self.start_primitive.get(frame)?)?;
        let end = match self.start_primitive.get(frame + 1) {
            Some(&next) => index_of(next)?,
            None => self.primitives.len(),
        };
        self.primitives.get(start..end)
    }

    pub fn num_frames(&self) -> usize {
        self.start_primitive.len()
    }
}

/// Sorted mesh: shared vertex data plus BSP clusters for back-to-front drawing.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortedData {
    pub basic: BasicData,
    pub clusters: Vec<Cluster>,
    pub start_cluster: Vec<i32>,
    pub first_verts: Vec<i32>,
    pub num_verts: Vec<i32>,
    pub first_tverts: Vec<i32>,
    pub always_write_depth: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    Triangles,
    Strip,
    Fan,
}

/// Draw range into a mesh's index buffer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Primitive {
    pub first_element: i32,
    pub num_elements: i32,
    /// Material index in the low 28 bits, draw flags above.
    pub mat_index: u32,
}

impl Primitive {
    pub const STRIP: u32 = 1 << 30;
    pub const FAN: u32 = 1 << 31;
    pub const TYPE_MASK: u32 = Self::STRIP | Self::FAN;
    pub const INDEXED: u32 = 1 << 29;
    pub const NO_MATERIAL: u32 = 1 << 28;
    pub const MATERIAL_MASK: u32 = 0x0FFF_FFFF;

    pub fn kind(&self) -> PrimitiveKind {
        if self.mat_index & Self::FAN != 0 {
            PrimitiveKind::Fan
        } else if self.mat_index & Self::STRIP != 0 {
            PrimitiveKind::Strip
        } else {
            PrimitiveKind::Triangles
        }
    }

    pub fn material_index(&self) -> Option<usize> {
        if self.mat_index & Self::NO_MATERIAL != 0 {
            return None;
        }
        Some((self.mat_index & Self::MATERIAL_MASK) as usize)
    }

    pub fn triangle_count(&self) -> usize {
        let n = usize::try_from(self.num_elements).unwrap_or(0);
        match self.kind() {
            PrimitiveKind::Triangles => n / 3,
            PrimitiveKind::Strip | PrimitiveKind::Fan => n.saturating_sub(2),
        }
    }
}

/// BSP cluster of a sorted mesh.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cluster {
    pub start_primitive: i32,
    pub end_primitive: i32,
    pub normal: Vec3,
    pub k: f32,
    pub front_cluster: i32,
    pub back_cluster: i32,
}
