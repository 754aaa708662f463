//! Shape format versions and header constants.

/// Magic word opening a linear-layout shape.
pub const LINEAR_MAGIC: u32 = 861_099_076;

/// Oldest shape version the decoder accepts.
pub const MIN_VERSION: u32 = 15;

/// Newest shape version the decoder accepts.
pub const MAX_VERSION: u32 = 24;

/// Version written by the container writers when none is requested.
pub const DEFAULT_VERSION: u16 = 24;

/// Exporter version packed into the high half of a linear header word.
pub const LINEAR_EXPORTER_VERSION: u16 = 2;

/// Exporter version packed into the high half of a split header word.
pub const SPLIT_EXPORTER_VERSION: u16 = 1;

/// Splits a packed header word into `(version, exporter_version)`.
pub fn unpack_version(word: u32) -> (u16, u16) {
    ((word & 0xFFFF) as u16, (word >> 16) as u16)
}

pub fn pack_version(version: u16, exporter: u16) -> u32 {
    u32::from(version) | (u32::from(exporter) << 16)
}

pub fn is_supported(version: u32) -> bool {
    (MIN_VERSION..=MAX_VERSION).contains(&version)
}
