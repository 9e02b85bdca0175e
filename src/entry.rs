//! One packed file: the in-memory [`PakEntry`] and its 316-byte footer
//! [`EntryRecord`].
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 256  | location, UTF-8, NUL padded |
//! | 256    | 4    | compressed size |
//! | 260    | 4    | raw size |
//! | 264    | 4    | allocated size |
//! | 268    | 4    | payload offset |
//! | 272    | 4    | seed (zero) |
//! | 276    | 4    | checksum (zero) |
//! | 280    | 36   | zero padding |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::codec::ZlibCodec;
use crate::error::{PakError, Result};
use crate::path;

pub const LOCATION_LEN: usize = 256;
pub const RECORD_SIZE: u64 = 316;
const RESERVED_LEN: usize = 36;

// ── EntryRecord ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Raw field bytes; run through [`path::sanitize`] to get a location.
    pub location: [u8; LOCATION_LEN],
    pub compressed_size: u32,
    pub raw_size: u32,
    pub allocated_size: u32,
    pub offset: u32,
    pub seed: u32,
    pub checksum: u32,
}

impl EntryRecord {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.location)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.raw_size)?;
        writer.write_u32::<LittleEndian>(self.allocated_size)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.seed)?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        writer.write_all(&[0u8; RESERVED_LEN])?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut location = [0u8; LOCATION_LEN];
        reader.read_exact(&mut location)?;
        let record = Self {
            location,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            raw_size: reader.read_u32::<LittleEndian>()?,
            allocated_size: reader.read_u32::<LittleEndian>()?,
            offset: reader.read_u32::<LittleEndian>()?,
            seed: reader.read_u32::<LittleEndian>()?,
            checksum: reader.read_u32::<LittleEndian>()?,
        };
        let mut reserved = [0u8; RESERVED_LEN];
        reader.read_exact(&mut reserved)?;
        Ok(record)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_SIZE as usize);
        self.write(&mut buf).expect("writing to a Vec cannot fail");
        buf
    }

    /// The sanitized location carried by this record.
    pub fn location(&self) -> String {
        path::sanitize(&self.location)
    }
}

/// Encode `location` into the fixed field, refusing to truncate.
pub fn encode_location(location: &str) -> Result<[u8; LOCATION_LEN]> {
    let bytes = location.as_bytes();
    if bytes.len() > LOCATION_LEN {
        return Err(PakError::LocationTooLong {
            location: location.to_owned(),
            len: bytes.len(),
            max: LOCATION_LEN,
        });
    }
    let mut field = [0u8; LOCATION_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

// ── PakEntry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    location: String,
    raw_size: u32,
    compressed_size: u32,
    allocated_size: u32,
    offset: u32,
    payload: Vec<u8>,
}

impl PakEntry {
    /// Compress `data` into a new entry.  The offset stays zero until the
    /// archive is written.
    pub fn from_bytes(location: &str, data: &[u8], codec: &ZlibCodec) -> Result<Self> {
        if !path::is_valid_location(location) {
            return Err(PakError::InvalidLocation(location.to_owned()));
        }
        encode_location(location)?;
        let mut entry = Self {
            location: location.to_owned(),
            raw_size: 0,
            compressed_size: 0,
            allocated_size: 0,
            offset: 0,
            payload: Vec::new(),
        };
        entry.replace_content(data, codec)?;
        Ok(entry)
    }

    /// Read and compress a file from disk.
    pub fn from_file(source: &Path, location: &str, codec: &ZlibCodec) -> Result<Self> {
        if !source.is_file() {
            return Err(PakError::SourceNotFound(source.to_path_buf()));
        }
        let data = fs::read(source)?;
        Self::from_bytes(location, &data, codec)
    }

    /// Rebuild an entry from its footer record and the payload the container
    /// fetched at `record.offset`.
    pub fn from_record(record: &EntryRecord, payload: Vec<u8>) -> Self {
        Self {
            location: record.location(),
            raw_size: record.raw_size,
            compressed_size: record.compressed_size,
            allocated_size: record.allocated_size,
            offset: record.offset,
            payload,
        }
    }

    pub fn to_record(&self) -> Result<EntryRecord> {
        Ok(EntryRecord {
            location: encode_location(&self.location)?,
            compressed_size: self.compressed_size,
            raw_size: self.raw_size,
            allocated_size: self.compressed_size,
            offset: self.offset,
            seed: 0,
            checksum: 0,
        })
    }

    /// Recompress with new content.  The offset is left alone; it is only
    /// meaningful again after the next write pass.
    pub fn replace_content(&mut self, data: &[u8], codec: &ZlibCodec) -> Result<()> {
        let raw_size = u32::try_from(data.len()).map_err(|_| PakError::TooLarge(data.len() as u64))?;
        let payload = codec.compress(data)?;
        let compressed_size =
            u32::try_from(payload.len()).map_err(|_| PakError::TooLarge(payload.len() as u64))?;
        self.raw_size = raw_size;
        self.compressed_size = compressed_size;
        self.allocated_size = compressed_size;
        self.payload = payload;
        Ok(())
    }

    /// The uncompressed content.  An entry with no payload and a raw size of
    /// zero is an empty file, not a corrupt one.
    pub fn decompressed(&self) -> Result<Vec<u8>> {
        if self.payload.is_empty() && self.raw_size == 0 {
            return Ok(Vec::new());
        }
        Ok(ZlibCodec::default().decompress(&self.payload)?)
    }

    pub fn is_empty_placeholder(&self) -> bool {
        self.raw_size == 0 && self.compressed_size == 0
    }

    pub fn location(&self) -> &str { &self.location }
    pub fn raw_size(&self) -> u32 { self.raw_size }
    pub fn compressed_size(&self) -> u32 { self.compressed_size }
    pub fn allocated_size(&self) -> u32 { self.allocated_size }
    pub fn offset(&self) -> u32 { self.offset }
    pub fn payload(&self) -> &[u8] { &self.payload }

    pub(crate) fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }
}

// ── EntryInfo ────────────────────────────────────────────────────────────────

/// Lightweight descriptor for listings.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub location: String,
    pub raw_size: u32,
    pub compressed_size: u32,
    pub allocated_size: u32,
    pub offset: u32,
}

impl From<&PakEntry> for EntryInfo {
    fn from(e: &PakEntry) -> Self {
        EntryInfo {
            location: e.location.clone(),
            raw_size: e.raw_size,
            compressed_size: e.compressed_size,
            allocated_size: e.allocated_size,
            offset: e.offset,
        }
    }
}
