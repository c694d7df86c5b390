///! Record file layout shared by every output table
///!
///! ```text
///! header  magic u32 | version u16 | reserved u16
///! body    records, little-endian
///! footer  count u64 | crc64 u64 (CRC-64-ISO over header, body and count)
///! ```
///!
///! The count lives in the footer so tables can be streamed without
///! knowing their size up front.

use anyhow::{Context, Result};
use crc::{Crc, Digest, CRC_64_GO_ISO};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const VERSION: u16 = 1;
const HEADER_LEN: usize = 8;
const FOOTER_LEN: usize = 16;

/// CRC-64-ISO algorithm
pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// A fixed or variable length record stored in a table file
pub trait Record: Sized {
    /// Smallest encoded size; bounds the record count a body can hold
    const MIN_LEN: usize = 1;

    fn encode(&self, out: &mut Vec<u8>);
    fn decode(input: &mut Decoder<'_>) -> Result<Self>;
}

/// Cursor over a record body
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        anyhow::ensure!(
            end <= self.bytes.len(),
            "truncated record at byte {} (need {} more)",
            self.pos,
            N
        );
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => anyhow::bail!("invalid boolean byte {other}"),
        }
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    pub fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        anyhow::ensure!(
            self.pos + len <= self.bytes.len(),
            "truncated string at byte {}",
            self.pos
        );
        let raw = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(raw.to_vec()).context("string is not valid UTF-8")
    }
}

pub fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

macro_rules! scalar_record {
    ($ty:ty, $read:ident) => {
        impl Record for $ty {
            const MIN_LEN: usize = std::mem::size_of::<$ty>();

            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(input: &mut Decoder<'_>) -> Result<Self> {
                input.$read()
            }
        }
    };
}

scalar_record!(i16, i16);
scalar_record!(u32, u32);
scalar_record!(i32, i32);

impl Record for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        input.bool()
    }
}

/// Streaming table writer; the footer is written by `finish`.
pub struct RecordWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    digest: Digest<'static, u64>,
    scratch: Vec<u8>,
    count: u64,
}

impl RecordWriter {
    pub fn create<P: AsRef<Path>>(path: P, magic: u32) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        let mut digest = CRC64.digest();

        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(&magic.to_le_bytes());
        header.extend_from_slice(&VERSION.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        writer.write_all(&header)?;
        digest.update(&header);

        Ok(Self {
            path,
            writer,
            digest,
            scratch: Vec::with_capacity(64),
            count: 0,
        })
    }

    pub fn push<R: Record>(&mut self, record: &R) -> io::Result<()> {
        self.scratch.clear();
        record.encode(&mut self.scratch);
        self.writer.write_all(&self.scratch)?;
        self.digest.update(&self.scratch);
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the footer and flushes; returns the record count.
    pub fn finish(mut self) -> io::Result<u64> {
        let count_bytes = self.count.to_le_bytes();
        self.digest.update(&count_bytes);
        let crc = self.digest.finalize();
        self.writer.write_all(&count_bytes)?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.flush()?;
        Ok(self.count)
    }
}

/// Write a whole table in one go
pub fn write_records<P: AsRef<Path>, R: Record>(path: P, magic: u32, records: &[R]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = RecordWriter::create(path, magic)
        .with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer.push(record)?;
    }
    writer.finish()?;
    Ok(())
}

/// Read and verify a whole table
pub fn read_records<P: AsRef<Path>, R: Record>(path: P, magic: u32) -> Result<Vec<R>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    anyhow::ensure!(
        bytes.len() >= HEADER_LEN + FOOTER_LEN,
        "{} is too short to be a record file",
        path.display()
    );

    let (content, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
    let mut footer = Decoder::new(footer);
    let count = footer.u64()?;
    let stored_crc = footer.u64()?;

    let mut digest = CRC64.digest();
    digest.update(content);
    digest.update(&count.to_le_bytes());
    let computed_crc = digest.finalize();
    anyhow::ensure!(
        computed_crc == stored_crc,
        "CRC64 mismatch in {}: computed 0x{:016X}, stored 0x{:016X}",
        path.display(),
        computed_crc,
        stored_crc
    );

    let mut header = Decoder::new(&content[..HEADER_LEN]);
    let found_magic = header.u32()?;
    anyhow::ensure!(
        found_magic == magic,
        "bad magic in {}: expected 0x{:08X}, found 0x{:08X}",
        path.display(),
        magic,
        found_magic
    );
    let version = header.u16()?;
    anyhow::ensure!(
        version == VERSION,
        "unsupported version {} in {}",
        version,
        path.display()
    );

    let body_len = content.len() - HEADER_LEN;
    let max_records = (body_len / R::MIN_LEN.max(1)) as u64;
    anyhow::ensure!(
        count <= max_records,
        "{} claims {} records but its body holds at most {}",
        path.display(),
        count,
        max_records
    );

    let mut body = Decoder::new(&content[HEADER_LEN..]);
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(R::decode(&mut body).with_context(|| format!("decoding {}", path.display()))?);
    }
    anyhow::ensure!(
        body.is_empty(),
        "trailing bytes after {} records in {}",
        count,
        path.display()
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;

    const MAGIC: u32 = 0x54455354; // "TEST"

    #[test]
    fn test_scalar_table_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("weights");
        write_records(&path, MAGIC, &[3i32, -7, i32::MAX])?;
        let loaded: Vec<i32> = read_records(&path, MAGIC)?;
        assert_eq!(loaded, vec![3, -7, i32::MAX]);
        Ok(())
    }

    #[test]
    fn test_empty_table() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("flags");
        write_records::<_, bool>(&path, MAGIC, &[])?;
        let loaded: Vec<bool> = read_records(&path, MAGIC)?;
        assert!(loaded.is_empty());
        Ok(())
    }

    #[test]
    fn test_corruption_detected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("weights");
        write_records(&path, MAGIC, &[1u32, 2, 3])?;

        let mut file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.seek(SeekFrom::Start(HEADER_LEN as u64 + 4))?;
        file.write_all(&[0xFF])?;
        drop(file);

        let err = read_records::<_, u32>(&path, MAGIC).unwrap_err();
        assert!(err.to_string().contains("CRC64 mismatch"), "{err}");
        Ok(())
    }

    #[test]
    fn test_oversized_count_rejected_before_decoding() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("weights");

        // Two u32 records behind a footer that claims far more
        let mut content = Vec::new();
        content.extend_from_slice(&MAGIC.to_le_bytes());
        content.extend_from_slice(&VERSION.to_le_bytes());
        content.extend_from_slice(&0u16.to_le_bytes());
        content.extend_from_slice(&7u32.to_le_bytes());
        content.extend_from_slice(&9u32.to_le_bytes());
        let count = u64::MAX / 2;
        let mut digest = CRC64.digest();
        digest.update(&content);
        digest.update(&count.to_le_bytes());
        let crc = digest.finalize();
        content.extend_from_slice(&count.to_le_bytes());
        content.extend_from_slice(&crc.to_le_bytes());
        std::fs::write(&path, &content)?;

        let err = read_records::<_, u32>(&path, MAGIC).unwrap_err();
        assert!(err.to_string().contains("holds at most 2"), "{err}");
        Ok(())
    }

    #[test]
    fn test_wrong_magic_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("weights");
        write_records(&path, MAGIC, &[1u32])?;
        assert!(read_records::<_, u32>(&path, MAGIC + 1).is_err());
        Ok(())
    }

    #[test]
    fn test_strings_decode() -> Result<()> {
        let mut out = Vec::new();
        put_str(&mut out, "Mo-Fr 07:00-09:00");
        put_str(&mut out, "");
        let mut input = Decoder::new(&out);
        assert_eq!(input.string()?, "Mo-Fr 07:00-09:00");
        assert_eq!(input.string()?, "");
        assert!(input.is_empty());
        assert!(input.u8().is_err());
        Ok(())
    }
}
