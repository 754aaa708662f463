//! Bounds-checked little-endian cursors.
//!
//! [`ByteCursor`] reads from a borrowed slice, [`ByteWriter`] appends to an owned buffer. Every
//! read checks the remaining length first, so a short buffer surfaces as [`Error::Truncated`]
//! instead of a panic.

use crate::Error;
use byteorder::{ByteOrder, LittleEndian};

/// Width class of a scalar; the split layout routes each class to its own stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScalarWidth {
    Byte,
    Half,
    Word,
}

impl ScalarWidth {
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }
}

/// A fixed-width value that can be read from or appended to a little-endian buffer.
pub trait Scalar: Copy {
    const WIDTH: ScalarWidth;

    fn decode(bytes: &[u8]) -> Self;

    fn encode(self, out: &mut Vec<u8>);
}

impl Scalar for u8 {
    const WIDTH: ScalarWidth = ScalarWidth::Byte;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Scalar for i8 {
    const WIDTH: ScalarWidth = ScalarWidth::Byte;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
}

macro_rules! impl_scalar {
    ($ty:ty, $width:expr, $size:expr, $read:ident, $write:ident) => {
        impl Scalar for $ty {
            const WIDTH: ScalarWidth = $width;

            fn decode(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes)
            }

            fn encode(self, out: &mut Vec<u8>) {
                let mut buf = [0u8; $size];
                LittleEndian::$write(&mut buf, self);
                out.extend_from_slice(&buf);
            }
        }
    };
}

impl_scalar!(u16, ScalarWidth::Half, 2, read_u16, write_u16);
impl_scalar!(i16, ScalarWidth::Half, 2, read_i16, write_i16);
impl_scalar!(u32, ScalarWidth::Word, 4, read_u32, write_u32);
impl_scalar!(i32, ScalarWidth::Word, 4, read_i32, write_i32);
impl_scalar!(f32, ScalarWidth::Word, 4, read_f32, write_f32);

/// Width of the length prefix in front of a string.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LengthPrefix {
    U8,
    U16,
}

/// Sequential reader over a borrowed byte window.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    label: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::labeled(data, "shape")
    }

    /// A cursor whose truncation errors name `label` as the failing stream.
    pub fn labeled(data: &'a [u8], label: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            label,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Fails unless `n` more bytes can be read.
    pub fn ensure(&self, n: usize) -> Result<(), Error> {
        if n > self.remaining() {
            return Err(Error::Truncated {
                stream: self.label,
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }

    /// Fails unless `count` elements of `element_size` bytes each can be read.
    pub fn ensure_elements(&self, count: usize, element_size: usize) -> Result<(), Error> {
        let need = count.checked_mul(element_size).ok_or(Error::Truncated {
            stream: self.label,
            offset: self.pos,
            need: usize::MAX,
            have: self.remaining(),
        })?;
        self.ensure(need)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read<T: Scalar>(&mut self) -> Result<T, Error> {
        let bytes = self.read_bytes(T::WIDTH.bytes())?;
        Ok(T::decode(bytes))
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.read()
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.read()
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        self.read()
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.read()
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.read()
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        self.read()
    }

    /// Reads `count` scalars, checking the whole run against the buffer before allocating.
    pub fn read_array<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>, Error> {
        self.ensure_elements(count, T::WIDTH.bytes())?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read()?);
        }
        Ok(out)
    }

    /// Reads a string stored as a length prefix followed by raw bytes (no terminator).
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected; old exporters wrote
    /// whatever code page the artist's machine used.
    pub fn read_len_prefixed_string(&mut self, prefix: LengthPrefix) -> Result<String, Error> {
        let offset = self.pos;
        let len = match prefix {
            LengthPrefix::U8 => usize::from(self.read_u8()?),
            LengthPrefix::U16 => usize::from(self.read_u16()?),
        };
        let bytes = self.read_bytes(len)?;
        Ok(decode_string(bytes, self.label, offset))
    }
}

pub(crate) fn decode_string(bytes: &[u8], stream: &str, offset: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            log::warn!("non UTF-8 string in {stream} stream at offset {offset:#x}: {e}");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Append-only little-endian writer.
#[derive(Clone, Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn write<T: Scalar>(&mut self, value: T) {
        value.encode(&mut self.buf);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes `s` behind a length prefix. Strings longer than the prefix can express are cut.
    pub fn write_len_prefixed_string(&mut self, s: &str, prefix: LengthPrefix) {
        let bytes = s.as_bytes();
        let len = match prefix {
            LengthPrefix::U8 => {
                let len = bytes.len().min(usize::from(u8::MAX));
                self.write(len as u8);
                len
            }
            LengthPrefix::U16 => {
                let len = bytes.len().min(usize::from(u16::MAX));
                self.write(len as u16);
                len
            }
        };
        self.buf.extend_from_slice(&bytes[..len]);
    }

    /// Pads with zero bytes until the length is a multiple of `align`.
    pub fn pad_to(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
