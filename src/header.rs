//! The fixed 1024-byte block at the start of every `.pak` file.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 256  | magic string, NUL padded |
//! | 256    | 4    | version (`0x0B`) |
//! | 260    | 4    | file count |
//! | 264    | 4    | footer table offset |
//! | 268    | 4    | reserved, zero |
//! | 272    | 752  | zero padding |
//!
//! All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

pub const MAGIC: &[u8] = b"EyedentityGames Packing File 0.1";
pub const VERSION: u32 = 0x0B;

pub const MAGIC_LEN: usize = 256;
pub const HEADER_SIZE: u64 = 1024;
/// Byte position of the file-count field; the table offset follows it.
pub const FILE_COUNT_POS: u64 = 260;
pub const TABLE_OFFSET_POS: u64 = 264;

const PADDING_LEN: usize = HEADER_SIZE as usize - MAGIC_LEN - 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakHeader {
    pub magic: [u8; MAGIC_LEN],
    pub version: u32,
    pub file_count: u32,
    pub table_offset: u32,
}

impl Default for PakHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl PakHeader {
    /// Header for a fresh archive: count and table offset are placeholders
    /// until the archive is closed.
    pub fn new() -> Self {
        let mut magic = [0u8; MAGIC_LEN];
        magic[..MAGIC.len()].copy_from_slice(MAGIC);
        Self {
            magic,
            version: VERSION,
            file_count: 0,
            table_offset: 0,
        }
    }

    pub fn has_known_magic(&self) -> bool {
        self.magic.starts_with(MAGIC) && self.magic[MAGIC.len()..].iter().all(|&b| b == 0)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.file_count)?;
        writer.write_u32::<LittleEndian>(self.table_offset)?;
        writer.write_u32::<LittleEndian>(0)?;
        writer.write_all(&[0u8; PADDING_LEN])?;
        Ok(())
    }

    /// Reads the whole block.  Magic and version are returned as found;
    /// deciding what to do with an unfamiliar value is up to the caller.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut magic = [0u8; MAGIC_LEN];
        reader.read_exact(&mut magic)?;
        let version = reader.read_u32::<LittleEndian>()?;
        let file_count = reader.read_u32::<LittleEndian>()?;
        let table_offset = reader.read_u32::<LittleEndian>()?;
        let _reserved = reader.read_u32::<LittleEndian>()?;
        let mut padding = [0u8; PADDING_LEN];
        reader.read_exact(&mut padding)?;
        Ok(Self { magic, version, file_count, table_offset })
    }

    /// Overwrite the count and table offset fields of an already written
    /// header, leaving the stream positioned right after them.
    pub fn patch<W: Write + Seek>(&self, mut writer: W) -> io::Result<()> {
        writer.seek(SeekFrom::Start(FILE_COUNT_POS))?;
        writer.write_u32::<LittleEndian>(self.file_count)?;
        writer.write_u32::<LittleEndian>(self.table_offset)?;
        Ok(())
    }
}
