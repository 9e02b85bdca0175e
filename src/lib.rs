pub mod codec;
pub mod error;
pub mod header;
pub mod entry;
pub mod path;
pub mod archive;

pub use archive::{ArchiveState, ExtractSummary, LocationStyle, PakArchive, PakOptions};
pub use codec::{CodecError, ZlibCodec};
pub use entry::{EntryInfo, EntryRecord, PakEntry};
pub use error::PakError;
pub use header::PakHeader;
