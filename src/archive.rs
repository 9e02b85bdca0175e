//! High-level [`PakArchive`] API.
//!
//! ```no_run
//! use dnpak::archive::PakArchive;
//!
//! // Write
//! let mut pak = PakArchive::create("out.pak")?;
//! pak.add_file("resource/ext/table.dnt", "\\resource\\ext\\table.dnt")?;
//! pak.close()?;
//!
//! // Read, edit, write back
//! let mut pak = PakArchive::open("out.pak")?;
//! let data = pak.find("\\resource\\ext\\table.dnt").unwrap().decompressed()?;
//! pak.edit("\\resource\\ext\\table.dnt", &data[..data.len() / 2])?;
//! pak.close()?;
//! # Ok::<(), dnpak::PakError>(())
//! ```
//!
//! # Write pass
//! Nothing but the placeholder header reaches disk until [`PakArchive::close`].
//! Close then writes every payload back to back from byte 1024, assigning
//! offsets in entry order, patches the header count and table offset, and
//! appends the footer table.  An archive opened for reading is rewritten the
//! same way once anything was added or edited.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::codec::{ZlibCodec, DEFAULT_COMPRESSION_LEVEL};
use crate::entry::{EntryRecord, PakEntry, RECORD_SIZE};
use crate::error::{PakError, Result};
use crate::header::{PakHeader, HEADER_SIZE, VERSION};
use crate::path;

const PAK_EXTENSION: &str = "pak";

// ── PakOptions ────────────────────────────────────────────────────────────────

/// Separator used for locations generated by [`PakArchive::add_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationStyle {
    /// `/resource/ext/a.dnt`
    #[default]
    Unix,
    /// `\resource\ext\a.dnt`
    Windows,
}

impl LocationStyle {
    pub fn separator(self) -> char {
        match self {
            LocationStyle::Unix => '/',
            LocationStyle::Windows => '\\',
        }
    }
}

/// Configuration for [`PakArchive::create_with_options`] and
/// [`PakArchive::open_with_options`].
#[derive(Debug, Clone)]
pub struct PakOptions {
    /// zlib level, 0..=9.
    pub compression_level: u32,
    pub location_style: LocationStyle,
}

impl Default for PakOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            location_style: LocationStyle::default(),
        }
    }
}

// ── ArchiveState ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    /// Created by [`PakArchive::create`]; close always writes.
    Writing,
    /// Opened by [`PakArchive::open`] and not touched; close only releases.
    ReadOnly,
    /// Opened for reading, then added to or edited; close rewrites.
    ReadDirty,
}

impl ArchiveState {
    pub fn needs_write(self) -> bool {
        self != ArchiveState::ReadOnly
    }
}

// ── ExtractSummary ────────────────────────────────────────────────────────────

/// Outcome of [`PakArchive::extract`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub written: usize,
    /// Zero-size placeholders skipped in strict mode.
    pub skipped_empty: usize,
    /// Files the OS refused to write.
    pub skipped_denied: usize,
}

// ── PakArchive ────────────────────────────────────────────────────────────────

pub struct PakArchive {
    path: PathBuf,
    file: File,
    state: ArchiveState,
    header: PakHeader,
    entries: Vec<PakEntry>,
    codec: ZlibCodec,
    options: PakOptions,
}

impl PakArchive {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, PakOptions::default())
    }

    /// Start a new archive.  An existing file at `path` is never replaced.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn create_with_options<P: AsRef<Path>>(path: P, options: PakOptions) -> Result<Self> {
        let path = pak_path(path.as_ref())?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PakError::AlreadyExists(path.clone()),
                _ => PakError::Io(e),
            })?;

        let header = PakHeader::new();
        header.write(&mut file)?;
        debug!("created archive");

        Ok(Self {
            path,
            file,
            state: ArchiveState::Writing,
            header,
            entries: Vec::new(),
            codec: ZlibCodec::new(options.compression_level),
            options,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, PakOptions::default())
    }

    /// Open an existing archive for reading and in-place update.  Every
    /// payload is loaded into memory.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: PakOptions) -> Result<Self> {
        let path = pak_path(path.as_ref())?;
        if !path.is_file() {
            return Err(PakError::SourceNotFound(path));
        }
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let header = PakHeader::read(&mut file)?;
        if !header.has_known_magic() || header.version != VERSION {
            warn!(version = header.version, "unfamiliar archive header, reading anyway");
        }

        let mut entries = Vec::with_capacity(header.file_count.min(4096) as usize);
        for i in 0..u64::from(header.file_count) {
            file.seek(SeekFrom::Start(u64::from(header.table_offset) + i * RECORD_SIZE))?;
            let record = EntryRecord::read(&mut file)?;

            file.seek(SeekFrom::Start(u64::from(record.offset)))?;
            let mut payload = vec![0u8; record.allocated_size as usize];
            file.read_exact(&mut payload)?;

            let entry = PakEntry::from_record(&record, payload);
            trace!(location = entry.location(), offset = entry.offset(), "read entry");
            entries.push(entry);
        }
        debug!(count = entries.len(), table_offset = header.table_offset, "opened archive");

        Ok(Self {
            path,
            file,
            state: ArchiveState::ReadOnly,
            header,
            entries,
            codec: ZlibCodec::new(options.compression_level),
            options,
        })
    }

    // ── Mutation ─────────────────────────────────────────────────────────────

    /// Pack the file at `source` under `location`, which must start with
    /// `/` or `\`.
    pub fn add_file<P: AsRef<Path>>(&mut self, source: P, location: &str) -> Result<()> {
        let entry = PakEntry::from_file(source.as_ref(), location, &self.codec)?;
        self.push(entry);
        Ok(())
    }

    /// Pack in-memory content under `location`.
    pub fn add_bytes(&mut self, location: &str, data: &[u8]) -> Result<()> {
        let entry = PakEntry::from_bytes(location, data, &self.codec)?;
        self.push(entry);
        Ok(())
    }

    /// Pack every regular file below `folder`, using its path relative to
    /// `folder` as location.  Files are visited in name order.  Returns the
    /// number of files added.
    pub fn add_files<P: AsRef<Path>>(&mut self, folder: P) -> Result<usize> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(PakError::SourceNotFound(folder.to_path_buf()));
        }
        let sep = self.options.location_style.separator();
        let mut added = 0;
        for dir_entry in WalkDir::new(folder).sort_by_file_name() {
            let dir_entry = dir_entry.map_err(io::Error::from)?;
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let relative = dir_entry.path().strip_prefix(folder).unwrap_or(dir_entry.path());
            let location = path::location_from_relative(relative, sep);
            self.add_file(dir_entry.path(), &location)?;
            added += 1;
        }
        debug!(folder = %folder.display(), added, "added folder");
        Ok(added)
    }

    /// Replace the content of the first entry at `location`.
    pub fn edit(&mut self, location: &str, data: &[u8]) -> Result<()> {
        let index = self
            .position(location)
            .ok_or_else(|| PakError::EntryNotFound(location.to_owned()))?;
        self.edit_at(index, data)
    }

    /// Replace the content of the entry at `index` (see [`Self::position`]).
    pub fn edit_at(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let codec = self.codec;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| PakError::EntryNotFound(format!("#{index}")))?;
        entry.replace_content(data, &codec)?;
        trace!(location = entry.location(), raw_size = entry.raw_size(), "edited entry");
        self.mark_dirty();
        Ok(())
    }

    fn push(&mut self, entry: PakEntry) {
        trace!(
            location = entry.location(),
            raw_size = entry.raw_size(),
            compressed_size = entry.compressed_size(),
            "added entry"
        );
        self.entries.push(entry);
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        if self.state == ArchiveState::ReadOnly {
            self.state = ArchiveState::ReadDirty;
        }
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// First entry whose location equals `location`.
    pub fn find(&self, location: &str) -> Option<&PakEntry> {
        self.entries.iter().find(|e| e.location() == location)
    }

    pub fn position(&self, location: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.location() == location)
    }

    pub fn entries(&self) -> &[PakEntry] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn state(&self) -> ArchiveState { self.state }
    pub fn is_dirty(&self) -> bool { self.state.needs_write() }
    pub fn path(&self) -> &Path { &self.path }

    /// Header as last read or written; count and table offset are refreshed
    /// by [`Self::close`].
    pub fn header(&self) -> &PakHeader { &self.header }

    // ── Extraction ───────────────────────────────────────────────────────────

    /// The archive path without its `.pak` extension.
    pub fn default_extract_dir(&self) -> PathBuf {
        self.path.with_extension("")
    }

    /// Write every entry below `output_dir`.
    ///
    /// With `strict`, entries whose raw and compressed sizes are both zero
    /// are skipped.  A file the OS refuses with `PermissionDenied` is logged,
    /// counted in [`ExtractSummary::skipped_denied`], and extraction moves on;
    /// any other failure stops extraction and is returned.
    #[tracing::instrument(skip(self, output_dir), fields(output_dir = %output_dir.as_ref().display()))]
    pub fn extract<P: AsRef<Path>>(&self, output_dir: P, strict: bool) -> Result<ExtractSummary> {
        let output_dir = output_dir.as_ref();
        let mut summary = ExtractSummary::default();

        for entry in &self.entries {
            if strict && entry.is_empty_placeholder() {
                summary.skipped_empty += 1;
                continue;
            }
            let target = path::output_path(output_dir, entry.location());
            let data = entry.decompressed()?;
            match write_output(&target, &data) {
                Ok(()) => summary.written += 1,
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    warn!(path = %target.display(), "permission denied, skipping");
                    summary.skipped_denied += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!(?summary, "extracted archive");
        Ok(summary)
    }

    // ── Close ────────────────────────────────────────────────────────────────

    /// Persist pending work and release the file.
    ///
    /// Consuming `self` drops the handle and the entry list whether or not
    /// the write pass succeeds.  Returns the header as it now stands on disk.
    #[tracing::instrument(skip(self))]
    pub fn close(mut self) -> Result<PakHeader> {
        if self.state.needs_write() {
            self.write_out()?;
            debug!(
                path = %self.path.display(),
                state = ?self.state,
                file_count = self.header.file_count,
                table_offset = self.header.table_offset,
                "wrote archive"
            );
        }
        self.state = ArchiveState::ReadOnly;
        Ok(self.header.clone())
    }

    fn write_out(&mut self) -> Result<()> {
        // Reject bad records before any payload byte is overwritten.
        let mut records = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            records.push(entry.to_record()?);
        }
        let file_count =
            u32::try_from(self.entries.len()).map_err(|_| PakError::TooLarge(self.entries.len() as u64))?;

        let mut out = BufWriter::new(&mut self.file);
        out.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut position = HEADER_SIZE;
        for (entry, record) in self.entries.iter_mut().zip(records.iter_mut()) {
            let offset = u32::try_from(position).map_err(|_| PakError::TooLarge(position))?;
            entry.set_offset(offset);
            record.offset = offset;
            out.write_all(entry.payload())?;
            position += entry.payload().len() as u64;
        }

        self.header.file_count = file_count;
        self.header.table_offset = u32::try_from(position).map_err(|_| PakError::TooLarge(position))?;
        self.header.patch(&mut out)?;

        out.seek(SeekFrom::Start(position))?;
        for record in &records {
            record.write(&mut out)?;
        }
        let end = position + records.len() as u64 * RECORD_SIZE;
        out.flush()?;
        drop(out);

        // A rewrite may be shorter than what was there before.
        self.file.set_len(end)?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for PakArchive {
    fn drop(&mut self) {
        if self.state.needs_write() {
            warn!(path = %self.path.display(), "archive dropped with unwritten changes");
        }
    }
}

impl fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PakArchive")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("file_count", &self.header.file_count)
            .field("table_offset", &self.header.table_offset)
            .field("entries", &self.entries.len())
            .finish()
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn pak_path(path: &Path) -> Result<PathBuf> {
    match path.extension() {
        Some(ext) if ext == PAK_EXTENSION => Ok(path.to_path_buf()),
        _ => Err(PakError::NotAPakPath(path.to_path_buf())),
    }
}

fn write_output(target: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(target)?.write_all(data)
}
