use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum PakError {
    /// Input file or folder for an add, or the archive for a read-open.
    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Not a .pak path: {0}")]
    NotAPakPath(PathBuf),
    /// Write-open never replaces an existing archive.
    #[error("Archive already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("Location must start with \"/\" or \"\\\": {0:?}")]
    InvalidLocation(String),
    #[error("Location is {len} bytes, the record field holds {max}: {location:?}")]
    LocationTooLong { location: String, len: usize, max: usize },
    #[error("No entry at location {0:?}")]
    EntryNotFound(String),
    /// Offsets and sizes are u32 on disk.
    #[error("Archive grows past the 4 GiB format limit ({0} bytes)")]
    TooLarge(u64),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PakError {
    pub fn is_corrupt_payload(&self) -> bool {
        matches!(self, PakError::Codec(CodecError::CorruptPayload(_)))
    }
}

pub type Result<T, E = PakError> = std::result::Result<T, E>;
