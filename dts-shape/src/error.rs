use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported shape version {version} (supported: 15..=24)")]
    UnsupportedVersion { version: u32 },

    #[error("invalid header magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },

    #[error("unexpected end of {stream} data at offset {offset:#x} (need {need} bytes, have {have})")]
    Truncated {
        stream: &'static str,
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error(
        "checkpoint {expected} mismatch (8-bit: {found8}, 16-bit: {found16}, 32-bit: {found32})"
    )]
    ChecksumMismatch {
        expected: u32,
        found8: u8,
        found16: u16,
        found32: u32,
    },

    #[error("invalid split header: {message}")]
    InvalidHeader { message: String },

    #[error("unknown mesh type tag {tag:#x}")]
    UnknownMeshType { tag: u32 },

    #[error("{kind} index {index} out of range (len={len})")]
    InvalidIndex {
        kind: &'static str,
        index: i64,
        len: usize,
    },

    #[error("{context}: {message}")]
    Malformed {
        context: &'static str,
        message: String,
    },

    #[error("invariant violated: {message}")]
    InvariantViolation { message: String },
}

/// Name used by callers that only deal with the decode entry points.
pub type DecodeError = Error;
