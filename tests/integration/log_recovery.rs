#![allow(missing_docs)]

use std::fs;

use sombra_indexlog::command::{encode, encoded_len, EntityKindPolicy, StopReason};
use sombra_indexlog::log::LOG_HEADER_LEN;
use sombra_indexlog::types::{IndexLogError, Result};
use sombra_indexlog::{
    recover, Command, CommandLogWriter, EntityKind, IndexConfig, IndexIdentifier,
    LogWriterOptions, MemoryIndex, MemoryIndexStore, RecoveryOptions,
};
use tempfile::tempdir;

fn people() -> IndexIdentifier {
    IndexIdentifier::new(EntityKind::Node, "people", None)
}

fn knows() -> IndexIdentifier {
    IndexIdentifier::new(EntityKind::Relationship, "knows", None)
}

#[test]
fn crash_mid_append_recovers_and_resumes() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("index.log");

    let first_tx = vec![
        Command::add(people(), 1, "name", "Alice")?,
        Command::add(people(), 2, "name", "Bob")?,
        Command::add_relationship(knows(), 10, "since", "2001", 1, 2)?,
    ];
    let second_tx = vec![Command::remove(people(), 2, "name", "Bob")];
    {
        let mut writer = CommandLogWriter::open(&path, LogWriterOptions::default())?;
        writer.append_batch(&first_tx)?;
        writer.append_batch(&second_tx)?;
        writer.sync()?;
    }

    // Tear the last record as an interrupted append would.
    let full_len = fs::metadata(&path)?.len();
    let torn_len = full_len - 5;
    fs::OpenOptions::new().write(true).open(&path)?.set_len(torn_len)?;

    let store = MemoryIndexStore::new();
    let mut index = MemoryIndex::new();
    let report = recover(&path, &store, &RecoveryOptions::default(), &mut index)?;
    let first_len: usize = first_tx.iter().map(encoded_len).sum();
    assert_eq!(report.replay.commands, 3);
    assert_eq!(report.file_len, torn_len);
    assert_eq!(report.valid_up_to, (LOG_HEADER_LEN + first_len) as u64);
    assert_eq!(report.discarded_tail_bytes, torn_len - report.valid_up_to);
    assert!(report.truncated);
    assert_eq!(fs::metadata(&path)?.len(), report.valid_up_to);

    let entries = index.get(&people()).expect("people index");
    assert!(entries.contains("name", "Bob", 2));
    assert_eq!(index.get(&knows()).expect("knows index").endpoints(10), Some((1, 2)));

    {
        let mut writer = CommandLogWriter::open(&path, LogWriterOptions::default())?;
        assert_eq!(writer.len(), report.valid_up_to);
        writer.append_batch(&second_tx)?;
        writer.append(&Command::clear(knows()))?;
        writer.sync()?;
    }

    let mut index = MemoryIndex::new();
    let report = recover(&path, &store, &RecoveryOptions::default(), &mut index)?;
    assert_eq!(report.replay.commands, 5);
    assert_eq!(report.discarded_tail_bytes, 0);
    assert!(!report.truncated);
    let entries = index.get(&people()).expect("people index");
    assert!(entries.contains("name", "Alice", 1));
    assert!(!entries.contains("name", "Bob", 2));
    assert!(index.get(&knows()).expect("knows index").is_empty());
    Ok(())
}

fn log_with_bad_kind(path: &std::path::Path) -> Result<u64> {
    {
        let mut writer = CommandLogWriter::open(path, LogWriterOptions::default())?;
        writer.append(&Command::add(people(), 1, "name", "Alice")?)?;
    }
    let mut record = Vec::new();
    encode(&Command::add(people(), 2, "name", "Bob")?, &mut record)?;
    record[1] = 9;
    let mut bytes = fs::read(path)?;
    bytes.extend_from_slice(&record);
    for id in 10..110 {
        encode(&Command::add(people(), id, "name", "Carol")?, &mut bytes)?;
    }
    fs::write(path, &bytes)?;
    Ok(bytes.len() as u64)
}

#[test]
fn unknown_entity_kind_follows_policy() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("index.log");
    let file_len = log_with_bad_kind(&path)?;
    let store = MemoryIndexStore::new();

    let mut index = MemoryIndex::new();
    let options = RecoveryOptions::default().read_only();
    let report = recover(&path, &store, &options, &mut index)?;
    assert_eq!(report.replay.commands, 1);
    assert_eq!(report.replay.stop, StopReason::UnknownEntityKind(9));
    assert!(report.discarded_tail_bytes > 0);
    assert_eq!(fs::metadata(&path)?.len(), file_len);

    let strict = RecoveryOptions {
        entity_kind_policy: EntityKindPolicy::Corruption,
        ..RecoveryOptions::default()
    };
    let mut index = MemoryIndex::new();
    let err = recover(&path, &store, &strict, &mut index).unwrap_err();
    assert!(matches!(err, IndexLogError::UnknownEntityKind(9)));
    assert_eq!(fs::metadata(&path)?.len(), file_len);
    Ok(())
}

#[test]
fn default_recovery_keeps_records_after_unknown_entity_kind() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("index.log");
    let file_len = log_with_bad_kind(&path)?;
    let store = MemoryIndexStore::new();

    let mut index = MemoryIndex::new();
    let report = recover(&path, &store, &RecoveryOptions::default(), &mut index)?;
    assert_eq!(report.replay.commands, 1);
    assert_eq!(report.replay.stop, StopReason::UnknownEntityKind(9));
    assert!(!report.truncated);
    assert_eq!(report.file_len, file_len);
    assert_eq!(report.discarded_tail_bytes, file_len - report.valid_up_to);
    assert_eq!(fs::metadata(&path)?.len(), file_len);

    // Nothing past the bad byte was cut off.
    let bytes = fs::read(&path)?;
    assert_eq!(bytes.len() as u64, file_len);
    let tail_start = report.valid_up_to as usize;
    assert_eq!(bytes[tail_start + 1], 9);
    Ok(())
}

#[test]
fn unknown_command_type_mid_log_is_fatal_and_leaves_file_alone() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("index.log");
    {
        let mut writer = CommandLogWriter::open(&path, LogWriterOptions::default())?;
        writer.append(&Command::add(people(), 1, "name", "Alice")?)?;
    }
    let mut bad = Vec::new();
    encode(&Command::remove(people(), 1, "name", "Alice"), &mut bad)?;
    bad[0] = 4;
    let mut bytes = fs::read(&path)?;
    bytes.extend_from_slice(&bad);
    let mut good = Vec::new();
    encode(&Command::clear(people()), &mut good)?;
    bytes.extend_from_slice(&good);
    fs::write(&path, &bytes)?;

    let store = MemoryIndexStore::new();
    let mut applied = 0;
    let mut count = |_: Command| -> Result<()> {
        applied += 1;
        Ok(())
    };
    let err = recover(&path, &store, &RecoveryOptions::default(), &mut count).unwrap_err();
    assert!(matches!(err, IndexLogError::UnknownCommandType(4)));
    assert!(err.is_corruption());
    assert_eq!(applied, 1);
    assert_eq!(fs::metadata(&path)?.len(), bytes.len() as u64);
    Ok(())
}

#[test]
fn recovered_identifiers_carry_store_config() -> Result<()> {
    let dir = tempdir().expect("tmpdir");
    let path = dir.path().join("index.log");
    {
        let mut writer = CommandLogWriter::open(&path, LogWriterOptions::default())?;
        writer.append_batch(&[
            Command::add(people(), 1, "name", "Alice")?,
            Command::clear(IndexIdentifier::new(EntityKind::Node, "unconfigured", None)),
        ])?;
    }

    let store = MemoryIndexStore::new();
    store.register("people", IndexConfig::from_pairs([("type", "exact")]));
    let mut seen = Vec::new();
    let mut collect = |command: Command| -> Result<()> {
        seen.push(command);
        Ok(())
    };
    recover(&path, &store, &RecoveryOptions::default(), &mut collect)?;
    assert_eq!(seen.len(), 2);
    let config = seen[0].index().config().expect("people config");
    assert_eq!(config.get("type"), Some("exact"));
    assert!(seen[1].index().config().is_none());
    assert_eq!(seen[0].index(), &people());
    Ok(())
}
