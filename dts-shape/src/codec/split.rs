//! The split layout.
//!
//! ```text
//! [u32] version | exporter << 16
//! [u32] total words in the split block
//! [u32] word offset of the 16-bit stream
//! [u32] word offset of the 8-bit stream
//! [total * 4 bytes] 32-bit stream ‖ 16-bit stream ‖ 8-bit stream
//! [...] base stream (sequences, material list)
//! ```
//!
//! All offsets are counted in 4-byte words from the end of the header, so the 16-bit stream
//! always holds an even number of entries and the 8-bit stream a multiple of four.

use super::{ShapeStream, StreamWriter, write_name_to};
use crate::Error;
use crate::cursor::{ByteCursor, ByteWriter, Scalar, ScalarWidth, decode_string};
use crate::version::{SPLIT_EXPORTER_VERSION, is_supported, pack_version, unpack_version};

const HEADER_LEN: usize = 16;

/// Decoded split-layout header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SplitHeader {
    pub version: u16,
    pub exporter_version: u16,
    pub total_words: u32,
    pub offset16: u32,
    pub offset8: u32,
}

impl SplitHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = ByteCursor::labeled(bytes, "header");
        let (version, exporter_version) = unpack_version(cursor.read_u32()?);
        let total_words = cursor.read_u32()?;
        let offset16 = cursor.read_u32()?;
        let offset8 = cursor.read_u32()?;
        Ok(Self {
            version,
            exporter_version,
            total_words,
            offset16,
            offset8,
        })
    }

    /// Byte ranges of the three streams relative to the end of the header.
    fn stream_ranges(&self) -> Result<[std::ops::Range<usize>; 3], Error> {
        if self.offset16 > self.offset8 || self.offset8 > self.total_words {
            return Err(Error::InvalidHeader {
                message: format!(
                    "offsets out of order: 16-bit at {}, 8-bit at {}, total {}",
                    self.offset16, self.offset8, self.total_words
                ),
            });
        }
        let bytes_of = |words: u32| (words as usize).checked_mul(4);
        let (Some(b), Some(c), Some(end)) = (
            bytes_of(self.offset16),
            bytes_of(self.offset8),
            bytes_of(self.total_words),
        ) else {
            return Err(Error::InvalidHeader {
                message: format!("total word count {} overflows", self.total_words),
            });
        };
        Ok([0..b, b..c, c..end])
    }
}

/// Running checkpoint counter shared by the three split streams.
///
/// Each checkpoint stores the counter truncated to 8, 16 and 32 bits in the matching stream.
/// Any field skipped or added upstream shifts at least one stream, so the next checkpoint reads
/// a value from the wrong place.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Checkpoint {
    count: u32,
}

impl Checkpoint {
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Values for the next checkpoint, advancing the counter.
    pub fn issue(&mut self) -> (u8, u16, u32) {
        let c = self.count;
        self.count = self.count.wrapping_add(1);
        (c as u8, c as u16, c)
    }

    /// Compares the three stored truncations with the expected counter, advancing it.
    pub fn verify(&mut self, found8: u8, found16: u16, found32: u32) -> Result<(), Error> {
        let (e8, e16, e32) = self.issue();
        if found8 != e8 || found16 != e16 || found32 != e32 {
            return Err(Error::ChecksumMismatch {
                expected: e32,
                found8,
                found16,
                found32,
            });
        }
        log::trace!("checkpoint {e32} ok");
        Ok(())
    }
}

/// Reader over the three split streams plus the trailing base stream.
#[derive(Clone, Debug)]
pub struct SplitCodec<'a> {
    header: SplitHeader,
    words: ByteCursor<'a>,
    halves: ByteCursor<'a>,
    bytes: ByteCursor<'a>,
    base: ByteCursor<'a>,
    checkpoint: Checkpoint,
}

impl<'a> SplitCodec<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, Error> {
        let header = SplitHeader::parse(bytes)?;
        if !is_supported(u32::from(header.version)) {
            return Err(Error::UnsupportedVersion {
                version: u32::from(header.version),
            });
        }

        let [a, b, c] = header.stream_ranges()?;
        let body = &bytes[HEADER_LEN..];
        if c.end > body.len() {
            return Err(Error::Truncated {
                stream: "split",
                offset: HEADER_LEN,
                need: c.end,
                have: body.len(),
            });
        }

        Ok(Self {
            header,
            words: ByteCursor::labeled(&body[a], "32-bit"),
            halves: ByteCursor::labeled(&body[b], "16-bit"),
            bytes: ByteCursor::labeled(&body[c.clone()], "8-bit"),
            base: ByteCursor::labeled(&body[c.end..], "base"),
            checkpoint: Checkpoint::default(),
        })
    }

    pub fn header(&self) -> &SplitHeader {
        &self.header
    }

    fn stream(&self, width: ScalarWidth) -> &ByteCursor<'a> {
        match width {
            ScalarWidth::Word => &self.words,
            ScalarWidth::Half => &self.halves,
            ScalarWidth::Byte => &self.bytes,
        }
    }

    fn stream_mut(&mut self, width: ScalarWidth) -> &mut ByteCursor<'a> {
        match width {
            ScalarWidth::Word => &mut self.words,
            ScalarWidth::Half => &mut self.halves,
            ScalarWidth::Byte => &mut self.bytes,
        }
    }
}

impl<'a> ShapeStream<'a> for SplitCodec<'a> {
    fn version(&self) -> u32 {
        u32::from(self.header.version)
    }

    fn exporter_version(&self) -> u32 {
        u32::from(self.header.exporter_version)
    }

    fn read<T: Scalar>(&mut self) -> Result<T, Error> {
        self.stream_mut(T::WIDTH).read()
    }

    fn read_check(&mut self) -> Result<(), Error> {
        let found8 = self.bytes.read_u8()?;
        let found16 = self.halves.read_u16()?;
        let found32 = self.words.read_u32()?;
        self.checkpoint.verify(found8, found16, found32)
    }

    fn ensure_available(&self, width: ScalarWidth, count: usize) -> Result<(), Error> {
        self.stream(width).ensure_elements(count, width.bytes())
    }

    fn read_name(&mut self) -> Result<String, Error> {
        let offset = self.bytes.position();
        let len = usize::from(self.bytes.read_u8()?);
        let raw = self.bytes.read_bytes(len)?;
        Ok(decode_string(raw, self.bytes.label(), offset))
    }

    fn base(&mut self) -> &mut ByteCursor<'a> {
        &mut self.base
    }
}

/// Writer that routes scalars into three streams and assembles the split layout on `finish`.
#[derive(Clone, Debug)]
pub struct SplitWriter {
    version: u16,
    words: ByteWriter,
    halves: ByteWriter,
    bytes: ByteWriter,
    base: ByteWriter,
    checkpoint: Checkpoint,
}

impl SplitWriter {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            words: ByteWriter::new(),
            halves: ByteWriter::new(),
            bytes: ByteWriter::new(),
            base: ByteWriter::new(),
            checkpoint: Checkpoint::default(),
        }
    }

    fn stream_mut(&mut self, width: ScalarWidth) -> &mut ByteWriter {
        match width {
            ScalarWidth::Word => &mut self.words,
            ScalarWidth::Half => &mut self.halves,
            ScalarWidth::Byte => &mut self.bytes,
        }
    }
}

impl StreamWriter for SplitWriter {
    fn version(&self) -> u32 {
        u32::from(self.version)
    }

    fn write<T: Scalar>(&mut self, value: T) {
        self.stream_mut(T::WIDTH).write(value);
    }

    fn store_check(&mut self) {
        let (c8, c16, c32) = self.checkpoint.issue();
        self.bytes.write(c8);
        self.halves.write(c16);
        self.words.write(c32);
    }

    fn write_name(&mut self, name: &str) {
        write_name_to(&mut self.bytes, name);
    }

    fn base_mut(&mut self) -> &mut ByteWriter {
        &mut self.base
    }

    fn finish(mut self) -> Vec<u8> {
        // Whole words only: an even count of 16-bit entries, a multiple of four bytes.
        self.halves.pad_to(4);
        self.bytes.pad_to(4);

        let offset16 = (self.words.position() / 4) as u32;
        let offset8 = offset16 + (self.halves.position() / 4) as u32;
        let total_words = offset8 + (self.bytes.position() / 4) as u32;

        let mut out = ByteWriter::new();
        out.write(pack_version(self.version, SPLIT_EXPORTER_VERSION));
        out.write(total_words);
        out.write(offset16);
        out.write(offset8);
        out.write_bytes(self.words.as_bytes());
        out.write_bytes(self.halves.as_bytes());
        out.write_bytes(self.bytes.as_bytes());
        out.write_bytes(self.base.as_bytes());
        out.into_bytes()
    }
}
