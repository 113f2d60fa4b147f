//! Archive walking, path resolution, and the query surface.
//!
//! The archive is an immutable byte slice and every operation is a fresh
//! linear scan over its header chain; no state survives between calls, so
//! concurrent queries against the same slice are safe by construction.

use std::fmt;

use log::trace;
use thiserror::Error;

use crate::format::{Block, EntryType, FormatError, UstarHeader, BLOCK_SIZE};
use crate::paths::{is_immediate_child, rewrite_link_target};

/// Resolution gives up after this many link hops (the usual ELOOP bound),
/// so cyclic link chains terminate instead of spinning.
pub const SYMLINK_MAX_HOPS: usize = 40;

/// Per-query failures, keeping the distinct causes distinct.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No entry matches the given path.
    #[error("no entry at the given path")]
    NotFound,

    /// The path resolved to an entry of the wrong kind for the query.
    #[error("entry is a {0}, not the kind the query expects")]
    WrongType(EntryType),

    /// Link indirection exceeded [`SYMLINK_MAX_HOPS`].
    #[error("too many levels of symbolic links")]
    TooManyLinks,

    /// A read offset before the start or past the end of the content.
    #[error("offset outside the file's content")]
    OffsetOutOfRange,

    /// The scan hit a malformed record or the slice ends before the data
    /// a header declares.
    #[error("archive damaged or cut short mid-scan")]
    Truncated,
}

/// One archive entry: its header and the content region that follows it.
#[derive(Clone, Copy)]
pub struct Entry<'a> {
    /// The decoded header record.
    pub header: &'a UstarHeader,
    /// Content bytes, clamped to the end of the archive slice.  Shorter
    /// than the declared size when the archive is physically truncated.
    pub content: &'a [u8],
}

impl<'a> Entry<'a> {
    /// The entry's path.
    pub fn name(&self) -> &'a [u8] {
        self.header.name_bytes()
    }

    /// The entry's type tag.
    pub fn entry_type(&self) -> EntryType {
        self.header.entry_type()
    }
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &String::from_utf8_lossy(self.name()))
            .field("entry_type", &self.entry_type())
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Lazy walk of the header chain from offset 0.
///
/// The walk ends at the first record whose name starts with NUL, at the
/// end of the slice, or at the first malformed record (yielded once as an
/// `Err`); the iterator fuses afterwards.
#[derive(Debug)]
pub struct Entries<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Result<Entry<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header = match UstarHeader::decode(&self.data[self.pos..]) {
            Ok(Block::Entry(header)) => header,
            Ok(Block::EndOfArchive) => {
                self.done = true;
                return None;
            }
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let declared = header.entry_size();
        let content_start = self.pos + BLOCK_SIZE;
        let content = if header.entry_type().has_content() {
            let available = (self.data.len() - content_start) as u64;
            &self.data[content_start..content_start + declared.min(available) as usize]
        } else {
            &[]
        };

        // Advance over the content region, padded to the block boundary.
        // A declared size reaching past the slice pins the cursor to the
        // end, where the next step reports end-of-archive.
        let footprint = if header.entry_type().has_content() {
            declared
                .checked_next_multiple_of(BLOCK_SIZE as u64)
                .unwrap_or(u64::MAX)
        } else {
            0
        };
        self.pos = match (content_start as u64).checked_add(footprint) {
            Some(next) if next <= self.data.len() as u64 => next as usize,
            _ => self.data.len(),
        };

        Some(Ok(Entry { header, content }))
    }
}

/// A ustar archive viewed in place.
///
/// Holding the bytes as a plain slice makes every query a pure function:
/// there is no read cursor to race on and nothing carried between calls.
#[derive(Clone, Copy, Debug)]
pub struct Archive<'a> {
    data: &'a [u8],
}

impl<'a> Archive<'a> {
    /// View `data` as an archive.  No validation happens up front.
    pub fn new(data: &'a [u8]) -> Self {
        Archive { data }
    }

    /// Walk the header chain from the start.
    pub fn entries(&self) -> Entries<'a> {
        Entries {
            data: self.data,
            pos: 0,
            done: false,
        }
    }

    /// Count the archive's valid headers, failing fast on the first
    /// structural defect.
    pub fn validate(&self) -> Result<u64, FormatError> {
        let mut valid = 0;
        for entry in self.entries() {
            entry?;
            valid += 1;
        }
        Ok(valid)
    }

    /// Exact-name lookup; first match wins, links are not followed.
    fn find(&self, path: &[u8]) -> Result<Entry<'a>, QueryError> {
        for entry in self.entries() {
            let entry = entry.map_err(|_| QueryError::Truncated)?;
            if entry.name() == path {
                return Ok(entry);
            }
        }
        Err(QueryError::NotFound)
    }

    /// Lookup for a link target: an exact miss retries with a trailing
    /// slash, so a target written as `d` still reaches the directory
    /// entry `d/`.
    fn find_link_target(&self, target: &[u8]) -> Result<Entry<'a>, QueryError> {
        match self.find(target) {
            Err(QueryError::NotFound) if !target.ends_with(b"/") => {
                let mut with_slash = target.to_vec();
                with_slash.push(b'/');
                self.find(&with_slash)
            }
            result => result,
        }
    }

    /// Resolve `path` to a non-link entry, following symlink and hardlink
    /// indirection up to [`SYMLINK_MAX_HOPS`] times.
    pub fn resolve(&self, path: &[u8]) -> Result<Entry<'a>, QueryError> {
        let mut entry = self.find(path)?;
        for _ in 0..SYMLINK_MAX_HOPS {
            if !entry.entry_type().is_link() {
                return Ok(entry);
            }
            let target = rewrite_link_target(entry.name(), entry.header.link_target_bytes());
            trace!(
                "following link {:?} -> {:?}",
                String::from_utf8_lossy(entry.name()),
                String::from_utf8_lossy(&target)
            );
            entry = self.find_link_target(&target)?;
        }
        Err(QueryError::TooManyLinks)
    }

    /// True when any entry matches `path` byte for byte, whatever its
    /// type.
    pub fn exists(&self, path: &[u8]) -> bool {
        self.find(path).is_ok()
    }

    /// True when `path` itself is a directory entry.  Links are not
    /// followed: a symlink to a directory is not a directory.
    pub fn is_dir(&self, path: &[u8]) -> bool {
        self.find(path).is_ok_and(|e| e.entry_type().is_dir())
    }

    /// True when `path` itself is a regular file entry (either encoding).
    pub fn is_file(&self, path: &[u8]) -> bool {
        self.find(path).is_ok_and(|e| e.entry_type().is_file())
    }

    /// True when `path` itself is a symbolic or hard link entry.
    pub fn is_symlink(&self, path: &[u8]) -> bool {
        self.find(path).is_ok_and(|e| e.entry_type().is_link())
    }

    /// List the immediate children of the directory at `path`.
    ///
    /// Link indirection applies to `path` itself but not to the children,
    /// which come back by their own full names, in archive order, capped
    /// at `capacity` entries.
    pub fn list(&self, path: &[u8], capacity: usize) -> Result<Listing<'a>, QueryError> {
        let dir = self.resolve(path)?;
        if !dir.entry_type().is_dir() {
            return Err(QueryError::WrongType(dir.entry_type()));
        }

        let parent = dir.name();
        let mut listing = Listing::default();
        for entry in self.entries() {
            // A malformed record ends collection with what we have.
            let Ok(entry) = entry else { break };
            if !is_immediate_child(parent, entry.name()) {
                continue;
            }
            if listing.entries.len() == capacity {
                listing.truncated = true;
                break;
            }
            listing.entries.push(entry.name());
        }
        trace!(
            "listed {} children of {:?} (truncated: {})",
            listing.entries.len(),
            String::from_utf8_lossy(parent),
            listing.truncated
        );
        Ok(listing)
    }

    /// Read up to `dest.len()` content bytes starting at `offset` from
    /// the regular file at `path`, resolving links first.
    pub fn read_file(
        &self,
        path: &[u8],
        offset: i64,
        dest: &mut [u8],
    ) -> Result<ReadStatus, QueryError> {
        if offset < 0 {
            return Err(QueryError::OffsetOutOfRange);
        }
        let offset = offset as u64;

        let entry = self.resolve(path)?;
        if !entry.entry_type().is_file() {
            return Err(QueryError::WrongType(entry.entry_type()));
        }

        let size = entry.header.entry_size();
        if offset >= size {
            return Err(QueryError::OffsetOutOfRange);
        }

        let available = size - offset;
        let wanted = available.min(dest.len() as u64) as usize;
        let start = offset as usize;
        let Some(source) = entry.content.get(start..start + wanted) else {
            return Err(QueryError::Truncated);
        };
        dest[..wanted].copy_from_slice(source);

        if wanted as u64 == available {
            Ok(ReadStatus::Complete {
                bytes_written: wanted,
            })
        } else {
            Ok(ReadStatus::Partial {
                bytes_written: wanted,
                remaining: available - wanted as u64,
            })
        }
    }
}

/// A directory listing: child names in archive order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Listing<'a> {
    /// Full names of the immediate children.
    pub entries: Vec<&'a [u8]>,
    /// True when collection stopped at the capacity cap with children
    /// still unvisited.
    pub truncated: bool,
}

/// Outcome of a successful [`Archive::read_file`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// The destination received everything from the offset to the end of
    /// the file.
    Complete {
        /// Bytes copied into the destination.
        bytes_written: usize,
    },
    /// The destination filled up first.
    Partial {
        /// Bytes copied into the destination.
        bytes_written: usize,
        /// Content bytes that follow the copied region.
        remaining: u64,
    },
}
