//! Physical layouts of a shape file.
//!
//! A shape is always decoded through [`ShapeStream`], whichever way its bytes are laid out:
//!
//! - [`linear`]: one little-endian stream behind a 16-byte magic header. Checkpoints are no-ops.
//! - [`split`]: three parallel streams holding 32-, 16- and 8-bit scalars respectively, with
//!   a counter checkpoint written to all three at every guard.
//!
//! Sequences and the material list live in the *base* stream in both layouts. For the linear
//! layout that is the same cursor; for the split layout it is whatever follows the split block.

pub mod linear;
pub mod split;

use crate::Error;
use crate::cursor::{ByteCursor, ByteWriter, LengthPrefix, Scalar, ScalarWidth};
use crate::version::LINEAR_MAGIC;

pub use linear::{LinearCodec, LinearWriter};
pub use split::{Checkpoint, SplitCodec, SplitHeader, SplitWriter};

/// Which physical layout a buffer uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layout {
    Linear,
    Split,
}

impl Layout {
    /// Guesses the layout from the first header word: the linear magic, or else split.
    ///
    /// Returns `None` when the buffer is too short to hold any header.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        let word = bytes.get(..4)?;
        let first = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        if first == LINEAR_MAGIC {
            Some(Self::Linear)
        } else {
            Some(Self::Split)
        }
    }
}

/// Version-aware scalar reader shared by both layouts.
pub trait ShapeStream<'a> {
    /// Shape format version from the header.
    fn version(&self) -> u32;

    fn exporter_version(&self) -> u32;

    /// Reads one scalar. The split layout picks the stream from `T::WIDTH`.
    fn read<T: Scalar>(&mut self) -> Result<T, Error>;

    /// Consumes one checkpoint and verifies it against the running counter.
    fn read_check(&mut self) -> Result<(), Error>;

    /// Fails with [`Error::Truncated`] unless `count` scalars of `width` remain.
    fn ensure_available(&self, width: ScalarWidth, count: usize) -> Result<(), Error>;

    /// Reads a name-table string (`u8` length + raw bytes) from the byte-width stream.
    fn read_name(&mut self) -> Result<String, Error>;

    /// Cursor for the data stored outside the scalar streams (sequences, materials).
    fn base(&mut self) -> &mut ByteCursor<'a>;

    fn read_u8(&mut self) -> Result<u8, Error> {
        self.read()
    }

    fn read_i16(&mut self) -> Result<i16, Error> {
        self.read()
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        self.read()
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        self.read()
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        self.read()
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        self.read()
    }

    /// Reads a run of scalars after checking the run fits.
    fn read_array<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>, Error> {
        self.ensure_available(T::WIDTH, count)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read()?);
        }
        Ok(out)
    }
}

/// Counterpart of [`ShapeStream`] used to produce buffers in either layout.
pub trait StreamWriter {
    fn version(&self) -> u32;

    fn write<T: Scalar>(&mut self, value: T);

    fn store_check(&mut self);

    fn write_name(&mut self, name: &str);

    fn base_mut(&mut self) -> &mut ByteWriter;

    /// Assembles the final buffer, header included.
    fn finish(self) -> Vec<u8>
    where
        Self: Sized;

    fn write_slice<T: Scalar>(&mut self, values: &[T]) {
        for &v in values {
            self.write(v);
        }
    }
}

pub(crate) fn write_name_to(out: &mut ByteWriter, name: &str) {
    out.write_len_prefixed_string(name, LengthPrefix::U8);
}
