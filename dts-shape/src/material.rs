/// One entry of a shape's material list.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    pub name: String,
    pub flags: u32,
    pub reflectance_map: i32,
    pub bump_map: i32,
    pub detail_map: i32,
    pub detail_scale: f32,
    pub reflection_amount: f32,
}

impl Material {
    pub const S_WRAP: u32 = 0x0000_0001;
    pub const T_WRAP: u32 = 0x0000_0002;
    pub const TRANSLUCENT: u32 = 0x0000_0004;
    pub const ADDITIVE: u32 = 0x0000_0008;
    pub const SUBTRACTIVE: u32 = 0x0000_0010;
    pub const SELF_ILLUMINATING: u32 = 0x0000_0020;
    pub const NEVER_ENV_MAP: u32 = 0x0000_0040;
    pub const NO_MIP_MAP: u32 = 0x0000_0080;
    pub const MIP_MAP_ZERO_BORDER: u32 = 0x0000_0100;
    pub const IFL_MATERIAL: u32 = 0x0800_0000;
    pub const IFL_FRAME: u32 = 0x1000_0000;
    pub const DETAIL_MAP_ONLY: u32 = 0x2000_0000;
    pub const BUMP_MAP_ONLY: u32 = 0x4000_0000;
    pub const REFLECTANCE_MAP_ONLY: u32 = 0x8000_0000;

    /// Materials that only exist as a secondary map of another material.
    pub const AUXILIARY_MAP: u32 = Self::DETAIL_MAP_ONLY
        | Self::BUMP_MAP_ONLY
        | Self::REFLECTANCE_MAP_ONLY
        | Self::IFL_FRAME;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reflectance_map: -1,
            bump_map: -1,
            detail_map: -1,
            detail_scale: 1.0,
            reflection_amount: 1.0,
            ..Self::default()
        }
    }

    pub fn is_translucent(&self) -> bool {
        self.flags & Self::TRANSLUCENT != 0
    }

    pub fn is_auxiliary(&self) -> bool {
        self.flags & Self::AUXILIARY_MAP != 0
    }

    /// Texture name with any exporter tool path removed.
    pub fn texture_name(&self) -> &str {
        strip_tool_path(&self.name)
    }
}

/// Material list stored alongside the shape.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialList {
    pub materials: Vec<Material>,
}

impl MaterialList {
    /// Leading version byte of a stored material list.
    pub const BINARY_VERSION: u8 = 1;

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn flags(&self, index: usize) -> Option<u32> {
        self.materials.get(index).map(|m| m.flags)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Material> {
        self.materials.iter()
    }
}

/// Drops the directory part of an exporter path.
///
/// Only names containing a `/` are touched: the cut is after the last `\` following the last
/// `/`, or after that `/` itself. Names with backslashes alone are kept whole.
pub fn strip_tool_path(name: &str) -> &str {
    let Some(slash) = name.rfind('/') else {
        return name;
    };
    let tail = &name[slash + 1..];
    match tail.rfind('\\') {
        Some(pos) => &tail[pos + 1..],
        None => tail,
    }
}
