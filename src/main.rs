//! tar-probe - Query information from ustar archives.
//!
//! Commands to validate an archive, stat individual entries, list
//! directories, and print file contents, all without unpacking.

use std::io::Write;
use std::{fs::File, io::Read, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use tar_probe::{dump::dump_archive, Archive, QueryError, ReadStatus};

/// Query information from ustar archives.
#[derive(Parser, Debug)]
#[command(name = "tar-probe", version, about)]
struct Cli {
    /// The archive file to inspect.
    archive: PathBuf,

    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the archive's header chain.
    Check,

    /// Show one entry's header fields.
    Stat {
        /// Entry path, exactly as stored in the archive.
        path: String,
    },

    /// List the immediate children of a directory.
    Ls {
        /// Directory path, or a link to one.
        path: String,

        /// Stop after this many children.
        #[arg(long, default_value_t = 256)]
        limit: usize,
    },

    /// Print a file's content to stdout.
    Cat {
        /// File path, or a link to one.
        path: String,

        /// Start reading at this content offset.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// One line per entry in the archive.
    Dump,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut data = Vec::new();
    File::open(&cli.archive)
        .and_then(|mut file| file.read_to_end(&mut data))
        .with_context(|| format!("cannot read {:?}", cli.archive))?;
    let archive = Archive::new(&data);

    match &cli.command {
        Command::Check => cmd_check(&archive),
        Command::Stat { path } => cmd_stat(&archive, path),
        Command::Ls { path, limit } => cmd_ls(&archive, path, *limit),
        Command::Cat { path, offset } => cmd_cat(&archive, path, *offset),
        Command::Dump => dump_archive(&mut std::io::stdout().lock(), &data),
    }
}

fn cmd_check(archive: &Archive) -> Result<()> {
    let count = archive.validate().context("archive is not valid")?;
    println!("ok: {count} entries");
    Ok(())
}

fn cmd_stat(archive: &Archive, path: &str) -> Result<()> {
    for entry in archive.entries() {
        let entry = entry.context("archive is damaged")?;
        if entry.name() != path.as_bytes() {
            continue;
        }
        let header = entry.header;
        println!("name:  {}", String::from_utf8_lossy(entry.name()));
        println!("type:  {}", entry.entry_type());
        println!("mode:  {:04o}", header.entry_mode());
        println!("owner: {}:{}", header.entry_uid(), header.entry_gid());
        println!("size:  {}", header.entry_size());
        println!("mtime: {}", header.entry_mtime());
        if entry.entry_type().is_link() {
            println!(
                "target: {}",
                String::from_utf8_lossy(header.link_target_bytes())
            );
        }
        return Ok(());
    }
    bail!("no entry named {path:?}");
}

fn cmd_ls(archive: &Archive, path: &str, limit: usize) -> Result<()> {
    let listing = archive
        .list(path.as_bytes(), limit)
        .with_context(|| format!("cannot list {path:?}"))?;
    let mut stdout = std::io::stdout().lock();
    for name in &listing.entries {
        stdout.write_all(name)?;
        writeln!(stdout)?;
    }
    if listing.truncated {
        writeln!(stdout, "... (more than {limit} children)")?;
    }
    Ok(())
}

fn cmd_cat(archive: &Archive, path: &str, offset: i64) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    let mut buf = [0u8; 65536];
    let mut offset = offset;
    let mut first = true;
    loop {
        let status = match archive.read_file(path.as_bytes(), offset, &mut buf) {
            // An empty file has no readable offset at all.
            Err(QueryError::OffsetOutOfRange) if first && offset == 0 => return Ok(()),
            other => other.with_context(|| format!("cannot read {path:?}"))?,
        };
        first = false;
        match status {
            ReadStatus::Complete { bytes_written } => {
                stdout.write_all(&buf[..bytes_written])?;
                return Ok(());
            }
            ReadStatus::Partial { bytes_written, .. } => {
                stdout.write_all(&buf[..bytes_written])?;
                offset += bytes_written as i64;
            }
        }
    }
}
