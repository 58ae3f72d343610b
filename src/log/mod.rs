#![forbid(unsafe_code)]
//! On-disk index command log.
//!
//! The file starts with a fixed header followed by command records in the
//! wire format of [`crate::command`], appended in commit order. Records carry
//! no framing of their own; a crash mid-append leaves a partial record at the
//! tail, which recovery discards.

mod recovery;

pub use recovery::{recover, RecoveryReport};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{encode, Command};
use crate::types::{IndexLogError, Result};

/// Magic bytes opening every index command log.
pub const LOG_MAGIC: [u8; 4] = *b"SIXL";
/// Current log format version.
pub const LOG_FORMAT_VERSION: u16 = 1;
/// Size in bytes of the file header.
pub const LOG_HEADER_LEN: usize = 16;

const HEADER_CRC_OFFSET: usize = 12;

fn header_crc(header: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[..HEADER_CRC_OFFSET]);
    hasher.finalize()
}

pub(crate) fn encode_header() -> [u8; LOG_HEADER_LEN] {
    let mut buf = [0u8; LOG_HEADER_LEN];
    buf[0..4].copy_from_slice(&LOG_MAGIC);
    buf[4..6].copy_from_slice(&LOG_FORMAT_VERSION.to_be_bytes());
    let crc = header_crc(&buf);
    buf[HEADER_CRC_OFFSET..].copy_from_slice(&crc.to_be_bytes());
    buf
}

pub(crate) fn validate_header(src: &[u8]) -> Result<()> {
    if src.len() < LOG_HEADER_LEN {
        return Err(IndexLogError::Corruption("index log header truncated"));
    }
    if src[0..4] != LOG_MAGIC {
        return Err(IndexLogError::Corruption("index log magic mismatch"));
    }
    let version = u16::from_be_bytes([src[4], src[5]]);
    if version != LOG_FORMAT_VERSION {
        return Err(IndexLogError::Corruption("index log format version mismatch"));
    }
    if src[6..HEADER_CRC_OFFSET].iter().any(|&b| b != 0) {
        return Err(IndexLogError::Corruption(
            "index log reserved header bytes non-zero",
        ));
    }
    let mut stored = [0u8; 4];
    stored.copy_from_slice(&src[HEADER_CRC_OFFSET..LOG_HEADER_LEN]);
    if header_crc(src) != u32::from_be_bytes(stored) {
        return Err(IndexLogError::Corruption("index log header crc mismatch"));
    }
    Ok(())
}

/// Options for [`CommandLogWriter`].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogWriterOptions {
    /// Fsync after every append instead of only on [`CommandLogWriter::sync`].
    pub sync_on_append: bool,
}

/// Counters for one writer instance.
#[derive(Clone, Debug, Default, Serialize)]
pub struct WriterStats {
    /// Commands appended.
    pub commands_appended: u64,
    /// Record bytes appended.
    pub bytes_appended: u64,
    /// Appends that wrote more than zero commands.
    pub batches: u64,
    /// Fsyncs performed.
    pub syncs: u64,
}

/// Exclusive appender for an index command log.
///
/// Open it only after [`recover`] has run with tail truncation, so that new
/// records follow the last complete one. After a failed write the writer
/// refuses further appends; recover and reopen instead.
pub struct CommandLogWriter {
    file: File,
    path: PathBuf,
    buf: BytesMut,
    append_offset: u64,
    options: LogWriterOptions,
    stats: WriterStats,
    failed: bool,
}

impl CommandLogWriter {
    /// Opens or creates the log at `path`.
    ///
    /// A file too short to hold a header gets a fresh one; otherwise the
    /// existing header must validate.
    pub fn open(path: impl AsRef<Path>, options: LogWriterOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let len = file.metadata()?.len();
        if len < LOG_HEADER_LEN as u64 {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&encode_header())?;
            file.set_len(LOG_HEADER_LEN as u64)?;
            file.sync_all()?;
            debug!(path = %path.display(), "created index log header");
        } else {
            let mut header = [0u8; LOG_HEADER_LEN];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut header)?;
            validate_header(&header)?;
        }
        let append_offset = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            path,
            buf: BytesMut::with_capacity(4096),
            append_offset,
            options,
            stats: WriterStats::default(),
            failed: false,
        })
    }

    /// Appends one command, returning the offset of its record.
    pub fn append(&mut self, command: &Command) -> Result<u64> {
        self.append_batch(std::slice::from_ref(command))
    }

    /// Appends the commands of one transaction with a single write.
    ///
    /// Nothing is written if any command fails to encode. Returns the offset
    /// of the first record.
    pub fn append_batch(&mut self, commands: &[Command]) -> Result<u64> {
        if self.failed {
            return Err(IndexLogError::Invalid(
                "index log writer failed earlier; recover and reopen",
            ));
        }
        let offset = self.append_offset;
        if commands.is_empty() {
            return Ok(offset);
        }
        self.buf.clear();
        for command in commands {
            encode(command, &mut self.buf)?;
        }
        if let Err(err) = self.file.write_all(&self.buf) {
            self.failed = true;
            return Err(err.into());
        }
        let written = self.buf.len() as u64;
        self.append_offset += written;
        self.stats.commands_appended += commands.len() as u64;
        self.stats.bytes_appended += written;
        self.stats.batches += 1;
        debug!(
            commands = commands.len(),
            bytes = written,
            offset,
            "appended index commands"
        );
        if self.options.sync_on_append {
            self.sync()?;
        }
        Ok(offset)
    }

    /// Flushes appended records to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        if let Err(err) = self.file.sync_data() {
            self.failed = true;
            return Err(err.into());
        }
        self.stats.syncs += 1;
        Ok(())
    }

    /// Offset the next record will be written at.
    pub fn len(&self) -> u64 {
        self.append_offset
    }

    /// Returns true when the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.append_offset <= LOG_HEADER_LEN as u64
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counters since open.
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}
