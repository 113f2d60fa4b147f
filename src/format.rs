//! On-disk POSIX ustar format definitions.
//!
//! Everything here is a pure view over one 512-byte header record: the
//! zerocopy struct layout, octal ASCII field parsing, checksum arithmetic,
//! and the decode step that classifies a record as an entry, the end of
//! the archive, or a structural defect.

use std::fmt;

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of one archive record (header or content block).
pub const BLOCK_SIZE: usize = 512;

/// Magic marker of a ustar header ("ustar" and a NUL).
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Version marker of a ustar header ("00", no NUL).
pub const USTAR_VERSION: &[u8; 2] = b"00";

/// Structural defects in a header record, in the order they are checked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The magic field is not exactly `"ustar\0"`.
    #[error("bad magic (expected \"ustar\\0\")")]
    MagicMismatch,

    /// The version field is not exactly `"00"`.
    #[error("bad version (expected \"00\")")]
    VersionMismatch,

    /// The stored checksum does not match the computed byte-sum.
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// The octal checksum recorded in the header.
        stored: u64,
        /// The byte-sum computed over the record.
        computed: u64,
    },
}

/// Outcome of decoding one record.
#[derive(Debug)]
pub enum Block<'a> {
    /// A valid entry header.
    Entry(&'a UstarHeader),
    /// Less than a full record remains, or the name starts with NUL.
    EndOfArchive,
}

/// One POSIX ustar header record.
///
/// All numeric fields are octal ASCII; all string fields are
/// NUL-terminated when shorter than the field.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct UstarHeader {
    /// Entry path (NUL-terminated if shorter than 100 bytes).
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// Content length in octal ASCII.
    pub size: [u8; 12],
    /// Modification time (Unix epoch) in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type tag (see [`EntryType`]).
    pub typeflag: u8,
    /// Link target for hard and symbolic links.
    pub linkname: [u8; 100],
    /// Format marker, `"ustar\0"`.
    pub magic: [u8; 6],
    /// Format version, `"00"`.
    pub version: [u8; 2],
    /// Owner user name.
    pub uname: [u8; 32],
    /// Owner group name.
    pub gname: [u8; 32],
    /// Device major number in octal ASCII.
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII.
    pub devminor: [u8; 8],
    /// Path prefix for names longer than 100 bytes.
    pub prefix: [u8; 155],
    /// Padding up to the 512-byte record boundary.
    pub pad: [u8; 12],
}

impl UstarHeader {
    /// Classify the record at the start of `bytes`.
    ///
    /// Checks run in the order magic, version, checksum; the first failure
    /// wins.
    pub fn decode(bytes: &[u8]) -> Result<Block<'_>, FormatError> {
        let Some(raw) = bytes.get(..BLOCK_SIZE) else {
            return Ok(Block::EndOfArchive);
        };
        let header = UstarHeader::ref_from_bytes(raw).expect("size is correct");
        if header.name[0] == 0 {
            return Ok(Block::EndOfArchive);
        }
        if header.magic != *USTAR_MAGIC {
            return Err(FormatError::MagicMismatch);
        }
        if header.version != *USTAR_VERSION {
            return Err(FormatError::VersionMismatch);
        }
        let stored = header.stored_checksum();
        let computed = header.compute_checksum();
        if stored != computed {
            return Err(FormatError::ChecksumMismatch { stored, computed });
        }
        Ok(Block::Entry(header))
    }

    /// The entry path with the NUL terminator trimmed.
    pub fn name_bytes(&self) -> &[u8] {
        truncate_nul(&self.name)
    }

    /// The link target with the NUL terminator trimmed.
    pub fn link_target_bytes(&self) -> &[u8] {
        truncate_nul(&self.linkname)
    }

    /// The entry type tag.
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.typeflag)
    }

    /// Declared content length in bytes.
    pub fn entry_size(&self) -> u64 {
        parse_octal(&self.size)
    }

    /// File mode bits.
    pub fn entry_mode(&self) -> u64 {
        parse_octal(&self.mode)
    }

    /// Owner user ID.
    pub fn entry_uid(&self) -> u64 {
        parse_octal(&self.uid)
    }

    /// Owner group ID.
    pub fn entry_gid(&self) -> u64 {
        parse_octal(&self.gid)
    }

    /// Modification time as seconds since the Unix epoch.
    pub fn entry_mtime(&self) -> u64 {
        parse_octal(&self.mtime)
    }

    /// The checksum recorded by the archive's author.
    pub fn stored_checksum(&self) -> u64 {
        parse_octal(&self.checksum)
    }

    /// Unsigned byte-sum of the record with the checksum field read as
    /// eight ASCII spaces.
    pub fn compute_checksum(&self) -> u64 {
        let mut sum = 8 * u64::from(b' ');
        for (at, &byte) in self.as_bytes().iter().enumerate() {
            if !(148..156).contains(&at) {
                sum += u64::from(byte);
            }
        }
        sum
    }
}

impl fmt::Debug for UstarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarHeader")
            .field("name", &String::from_utf8_lossy(self.name_bytes()))
            .field("entry_type", &self.entry_type())
            .field("size", &self.entry_size())
            .finish_non_exhaustive()
    }
}

/// Recognized entry type tags.
///
/// The pre-POSIX `'\0'` encoding of a regular file folds into
/// [`EntryType::Regular`]; everything outside the recognized set lands in
/// [`EntryType::Other`] and never matches a type query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file (`'0'`, or `'\0'` in ancient archives).
    Regular,
    /// Hard link (`'1'`).
    Link,
    /// Symbolic link (`'2'`).
    Symlink,
    /// Directory (`'5'`).
    Directory,
    /// Any unrecognized tag.
    Other(u8),
}

impl EntryType {
    /// Map a raw typeflag byte to its entry type.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'1' => EntryType::Link,
            b'2' => EntryType::Symlink,
            b'5' => EntryType::Directory,
            other => EntryType::Other(other),
        }
    }

    /// True for regular files (both encodings).
    pub fn is_file(self) -> bool {
        self == EntryType::Regular
    }

    /// True for directories.
    pub fn is_dir(self) -> bool {
        self == EntryType::Directory
    }

    /// True for both symbolic and hard links.
    pub fn is_link(self) -> bool {
        matches!(self, EntryType::Symlink | EntryType::Link)
    }

    /// Whether content blocks follow this entry's header.
    ///
    /// Directories and links carry no content; everything else is assumed
    /// to, so that data-bearing entries with unrecognized tags still walk
    /// correctly.
    pub(crate) fn has_content(self) -> bool {
        !matches!(
            self,
            EntryType::Directory | EntryType::Link | EntryType::Symlink
        )
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            EntryType::Regular => "file",
            EntryType::Link => "hardlink",
            EntryType::Symlink => "symlink",
            EntryType::Directory => "directory",
            EntryType::Other(_) => "unknown",
        })
    }
}

/// Parse an octal ASCII field, trimming surrounding spaces and NULs.
///
/// Anything unparseable is value zero, matching the tolerance of legacy
/// tar implementations.
pub fn parse_octal(bytes: &[u8]) -> u64 {
    let mut field = bytes;
    while let [b' ' | b'\0', rest @ ..] = field {
        field = rest;
    }
    while let [rest @ .., b' ' | b'\0'] = field {
        field = rest;
    }

    let mut value: u64 = 0;
    for &byte in field {
        if !(b'0'..=b'7').contains(&byte) {
            return 0;
        }
        value = match value.checked_mul(8) {
            Some(shifted) => shifted + u64::from(byte - b'0'),
            None => return 0,
        };
    }
    value
}

/// Truncate a byte slice at the first NUL, or not at all.
pub fn truncate_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(at) => &bytes[..at],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a valid raw record by hand, checksum included.
    fn raw_record(name: &str, typeflag: u8, size: u64) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[124..136].copy_from_slice(format!("{size:011o}\0").as_bytes());
        block[156] = typeflag;
        block[257..263].copy_from_slice(USTAR_MAGIC);
        block[263..265].copy_from_slice(USTAR_VERSION);

        let mut sum = 8 * u64::from(b' ');
        for (at, &byte) in block.iter().enumerate() {
            if !(148..156).contains(&at) {
                sum += u64::from(byte);
            }
        }
        block[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
        block
    }

    #[test]
    fn test_header_is_one_block() {
        assert_eq!(size_of::<UstarHeader>(), BLOCK_SIZE);
    }

    #[test]
    fn test_decode_valid_record() {
        let block = raw_record("hello.txt", b'0', 42);
        match UstarHeader::decode(&block).unwrap() {
            Block::Entry(header) => {
                assert_eq!(header.name_bytes(), b"hello.txt");
                assert_eq!(header.entry_type(), EntryType::Regular);
                assert_eq!(header.entry_size(), 42);
            }
            Block::EndOfArchive => panic!("expected an entry"),
        }
    }

    #[test]
    fn test_decode_short_buffer_is_end() {
        assert!(matches!(
            UstarHeader::decode(&[0u8; 100]).unwrap(),
            Block::EndOfArchive
        ));
        assert!(matches!(
            UstarHeader::decode(b"").unwrap(),
            Block::EndOfArchive
        ));
    }

    #[test]
    fn test_decode_nul_name_is_end() {
        // A zeroed record is the end-of-archive marker.
        assert!(matches!(
            UstarHeader::decode(&[0u8; BLOCK_SIZE]).unwrap(),
            Block::EndOfArchive
        ));
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut block = raw_record("x", b'0', 0);
        block[257] = b'X';
        assert_eq!(
            UstarHeader::decode(&block).unwrap_err(),
            FormatError::MagicMismatch
        );
    }

    #[test]
    fn test_decode_bad_version() {
        let mut block = raw_record("x", b'0', 0);
        block[263] = b'9';
        assert_eq!(
            UstarHeader::decode(&block).unwrap_err(),
            FormatError::VersionMismatch
        );
    }

    #[test]
    fn test_decode_bad_checksum() {
        let mut block = raw_record("x", b'0', 0);
        // Flip a name byte without touching the stored checksum.
        block[0] = b'y';
        assert!(matches!(
            UstarHeader::decode(&block).unwrap_err(),
            FormatError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_version_checked_before_checksum() {
        let mut block = raw_record("x", b'0', 0);
        block[263] = b'9';
        block[0] = b'y';
        assert_eq!(
            UstarHeader::decode(&block).unwrap_err(),
            FormatError::VersionMismatch
        );
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal(b"0000644\0"), 0o644);
        assert_eq!(parse_octal(b"     123 "), 0o123);
        assert_eq!(parse_octal(b"77777777777"), 0o77777777777);
        assert_eq!(parse_octal(b"0"), 0);
        assert_eq!(parse_octal(b""), 0);
        assert_eq!(parse_octal(b"   \0\0\0"), 0);
    }

    #[test]
    fn test_parse_octal_garbage_is_zero() {
        assert_eq!(parse_octal(b"abc"), 0);
        assert_eq!(parse_octal(b"128"), 0); // 8 is not an octal digit
        assert_eq!(parse_octal(b"\xff\xff\xff"), 0);
    }

    #[test]
    fn test_truncate_nul() {
        assert_eq!(truncate_nul(b"hello\0world"), b"hello");
        assert_eq!(truncate_nul(b"no nul"), b"no nul");
        assert_eq!(truncate_nul(b"\0start"), b"");
        assert_eq!(truncate_nul(b""), b"");
    }

    #[test]
    fn test_entry_type_mapping() {
        assert_eq!(EntryType::from_byte(b'0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'\0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'1'), EntryType::Link);
        assert_eq!(EntryType::from_byte(b'2'), EntryType::Symlink);
        assert_eq!(EntryType::from_byte(b'5'), EntryType::Directory);
        assert_eq!(EntryType::from_byte(b'x'), EntryType::Other(b'x'));
    }

    #[test]
    fn test_entry_type_predicates() {
        assert!(EntryType::Regular.is_file());
        assert!(!EntryType::Directory.is_file());
        assert!(EntryType::Directory.is_dir());
        assert!(EntryType::Symlink.is_link());
        assert!(EntryType::Link.is_link());
        assert!(!EntryType::Other(b'x').is_file());
    }

    #[test]
    fn test_content_block_rule() {
        assert!(EntryType::Regular.has_content());
        assert!(EntryType::Other(b'x').has_content());
        assert!(!EntryType::Directory.has_content());
        assert!(!EntryType::Symlink.has_content());
        assert!(!EntryType::Link.has_content());
    }
}
