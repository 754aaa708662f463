use super::{ShapeStream, StreamWriter, write_name_to};
use crate::Error;
use crate::cursor::{ByteCursor, ByteWriter, LengthPrefix, Scalar, ScalarWidth};
use crate::version::{LINEAR_EXPORTER_VERSION, LINEAR_MAGIC, is_supported, pack_version, unpack_version};

const HEADER_LEN: usize = 16;

/// Reader for the linear layout: `[magic, version | exporter << 16, 0, 0]` then one stream.
#[derive(Clone, Debug)]
pub struct LinearCodec<'a> {
    cursor: ByteCursor<'a>,
    version: u16,
    exporter: u16,
}

impl<'a> LinearCodec<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, Error> {
        let mut cursor = ByteCursor::labeled(bytes, "linear");
        cursor.ensure(HEADER_LEN)?;
        let magic = cursor.read_u32()?;
        if magic != LINEAR_MAGIC {
            return Err(Error::InvalidMagic {
                expected: LINEAR_MAGIC,
                found: magic,
            });
        }
        let (version, exporter) = unpack_version(cursor.read_u32()?);
        // Two reserved words.
        cursor.skip(8)?;

        if !is_supported(u32::from(version)) {
            return Err(Error::UnsupportedVersion {
                version: u32::from(version),
            });
        }

        Ok(Self {
            cursor,
            version,
            exporter,
        })
    }
}

impl<'a> ShapeStream<'a> for LinearCodec<'a> {
    fn version(&self) -> u32 {
        u32::from(self.version)
    }

    fn exporter_version(&self) -> u32 {
        u32::from(self.exporter)
    }

    fn read<T: Scalar>(&mut self) -> Result<T, Error> {
        self.cursor.read()
    }

    fn read_check(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn ensure_available(&self, width: ScalarWidth, count: usize) -> Result<(), Error> {
        self.cursor.ensure_elements(count, width.bytes())
    }

    fn read_name(&mut self) -> Result<String, Error> {
        self.cursor.read_len_prefixed_string(LengthPrefix::U8)
    }

    fn base(&mut self) -> &mut ByteCursor<'a> {
        &mut self.cursor
    }
}

/// Writer producing a linear-layout buffer.
#[derive(Clone, Debug)]
pub struct LinearWriter {
    out: ByteWriter,
    version: u16,
}

impl LinearWriter {
    pub fn new(version: u16) -> Self {
        let mut out = ByteWriter::new();
        out.write(LINEAR_MAGIC);
        out.write(pack_version(version, LINEAR_EXPORTER_VERSION));
        out.write(0u32);
        out.write(0u32);
        Self { out, version }
    }
}

impl StreamWriter for LinearWriter {
    fn version(&self) -> u32 {
        u32::from(self.version)
    }

    fn write<T: Scalar>(&mut self, value: T) {
        self.out.write(value);
    }

    fn store_check(&mut self) {}

    fn write_name(&mut self, name: &str) {
        write_name_to(&mut self.out, name);
    }

    fn base_mut(&mut self) -> &mut ByteWriter {
        &mut self.out
    }

    fn finish(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}
