use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::{validate_header, LOG_HEADER_LEN};
use crate::command::StopReason;
use crate::index::IndexStore;
use crate::replay::{replay, CommandApplier, RecoveryOptions, ReplayStats};
use crate::types::Result;

/// Outcome of recovering one log file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RecoveryReport {
    /// Commands decoded and applied.
    pub replay: ReplayStats,
    /// File length before recovery.
    pub file_len: u64,
    /// Offset just past the last complete record.
    pub valid_up_to: u64,
    /// Bytes after `valid_up_to` that were not replayed.
    pub discarded_tail_bytes: u64,
    /// Whether the file was cut back to `valid_up_to`.
    pub truncated: bool,
}

/// Replays the index command log at `path` into `applier`.
///
/// A file shorter than its header holds no commands and recovers as empty.
/// A damaged header or a corrupt record aborts with an error; a partial
/// trailing record ends recovery and, with `truncate_tail`, is cut off.
/// Stopping at an unknown entity kind never truncates: the bytes after it
/// stay on disk and [`ReplayStats::stop`] names the offending byte.
pub fn recover<A>(
    path: impl AsRef<Path>,
    store: &dyn IndexStore,
    options: &RecoveryOptions,
    applier: &mut A,
) -> Result<RecoveryReport>
where
    A: CommandApplier + ?Sized,
{
    let path = path.as_ref();
    let file: File = OpenOptions::new()
        .read(true)
        .write(options.truncate_tail)
        .open(path)?;
    let file_len = file.metadata()?.len();
    if file_len < LOG_HEADER_LEN as u64 {
        if file_len > 0 {
            warn!(
                path = %path.display(),
                file_len,
                "index log shorter than its header; recovering as empty"
            );
        }
        let replay = ReplayStats {
            stop: if file_len > 0 {
                StopReason::Truncated
            } else {
                StopReason::EndOfChannel
            },
            ..ReplayStats::default()
        };
        return Ok(RecoveryReport {
            replay,
            file_len,
            discarded_tail_bytes: file_len,
            ..RecoveryReport::default()
        });
    }

    let mut reader = BufReader::new(&file);
    let mut header = [0u8; LOG_HEADER_LEN];
    reader.read_exact(&mut header)?;
    validate_header(&header)?;

    let stats = replay(&mut reader, store, options, applier)?;
    let valid_up_to = LOG_HEADER_LEN as u64 + stats.bytes_consumed;
    let discarded_tail_bytes = file_len - valid_up_to;
    drop(reader);

    let mut truncated = false;
    match stats.stop {
        StopReason::Truncated => {
            warn!(
                path = %path.display(),
                valid_up_to,
                discarded_tail_bytes,
                "index log ends in a partial record"
            );
            if options.truncate_tail {
                file.set_len(valid_up_to)?;
                file.sync_all()?;
                truncated = true;
            }
        }
        StopReason::UnknownEntityKind(entity_kind) => {
            warn!(
                path = %path.display(),
                entity_kind,
                valid_up_to,
                unreplayed_bytes = discarded_tail_bytes,
                "index log replay stopped at an unknown entity kind; leaving the remainder in place"
            );
        }
        StopReason::EndOfChannel => {}
    }
    info!(
        path = %path.display(),
        commands = stats.commands,
        valid_up_to,
        truncated,
        "index log recovered"
    );
    Ok(RecoveryReport {
        replay: stats,
        file_len,
        valid_up_to,
        discarded_tail_bytes,
        truncated,
    })
}
