//! Plain-text dump of an archive's header chain.
//!
//! One line per entry in `ls -l` spirit: type, mode, ownership, size,
//! name, and the link target where one exists. The walk stops where
//! validation would stop, and a trailing line reports the outcome.

use std::io::Write;

use anyhow::Result;

use crate::archive::Archive;
use crate::format::EntryType;

/// Print escaped path bytes, hex-escaping anything non-printable.
fn write_escaped(out: &mut impl Write, bytes: &[u8]) -> std::io::Result<()> {
    for &c in bytes {
        match c {
            b'\\' => write!(out, "\\\\")?,
            b'\n' => write!(out, "\\n")?,
            b'\r' => write!(out, "\\r")?,
            b'\t' => write!(out, "\\t")?,
            c if !c.is_ascii_graphic() && c != b' ' => write!(out, "\\x{c:02x}")?,
            c => out.write_all(&[c])?,
        }
    }
    Ok(())
}

/// Walk `data` and write one line per entry, then the validation outcome.
pub fn dump_archive(out: &mut impl Write, data: &[u8]) -> Result<()> {
    let archive = Archive::new(data);

    let mut outcome = Ok(());
    let mut count = 0u64;
    for entry in archive.entries() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                outcome = Err(err);
                break;
            }
        };
        count += 1;

        let header = entry.header;
        write!(
            out,
            "{:9} {:04o} {:>5}:{:<5} {:>9} ",
            entry.entry_type(),
            header.entry_mode(),
            header.entry_uid(),
            header.entry_gid(),
            header.entry_size(),
        )?;
        write_escaped(out, entry.name())?;
        if entry.entry_type().is_link() {
            let arrow = match entry.entry_type() {
                EntryType::Link => "link to",
                _ => "->",
            };
            write!(out, " {arrow} ")?;
            write_escaped(out, header.link_target_bytes())?;
        }
        writeln!(out)?;
    }

    match outcome {
        Ok(()) => writeln!(out, "{count} entries, archive is valid")?,
        Err(err) => writeln!(out, "{count} valid entries, then: {err}")?,
    }
    Ok(())
}
