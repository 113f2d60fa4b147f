//! Read-only inspector for POSIX ustar archives held in memory.
//!
//! The whole archive is a `&[u8]`; [`Archive`] wraps it and answers
//! validation, existence, type, listing, and partial-read queries with
//! nothing but linear scans over the 512-byte header chain.

pub mod archive;
pub mod dump;
pub mod format;
mod paths;

pub use archive::{Archive, Entries, Entry, Listing, QueryError, ReadStatus, SYMLINK_MAX_HOPS};
pub use format::{Block, EntryType, FormatError, UstarHeader, BLOCK_SIZE};
