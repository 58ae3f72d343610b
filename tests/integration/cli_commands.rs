#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use sombra_indexlog::{
    Command, CommandLogWriter, EntityKind, IndexIdentifier, LogWriterOptions,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    log: PathBuf,
    config: PathBuf,
}

fn setup_log(name: &str) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join(format!("{name}.log"));
    let config = dir.path().join("indexlog.toml");
    fs::write(&config, "[indexes.people]\ntype = \"exact\"\n").expect("write config");
    seed_log(&log);
    Fixture {
        _dir: dir,
        log,
        config,
    }
}

fn seed_log(path: &Path) {
    let people = IndexIdentifier::new(EntityKind::Node, "people", None);
    let knows = IndexIdentifier::new(EntityKind::Relationship, "knows", None);
    let mut writer = CommandLogWriter::open(path, LogWriterOptions::default()).expect("open log");
    writer
        .append_batch(&[
            Command::add(people.clone(), 1, "name", "Alice").expect("add"),
            Command::add(people.clone(), 2, "name", "Bob").expect("add"),
            Command::add_relationship(knows, 10, "since", "2001", 1, 2).expect("add rel"),
            Command::remove(people, 2, "name", "Bob"),
        ])
        .expect("append");
    writer.sync().expect("sync");
}

fn run_json(fixture: &Fixture, subcommand: &str) -> Value {
    let output = cargo_bin_cmd!("indexlog")
        .args(["--format", "json", "--config"])
        .arg(&fixture.config)
        .arg(subcommand)
        .arg(&fixture.log)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json output")
}

#[test]
fn inspect_lists_commands_with_offsets() {
    let fixture = setup_log("inspect");
    let json = run_json(&fixture, "inspect");
    let commands = json["commands"].as_array().expect("commands array");
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[0]["offset"].as_u64(), Some(16));
    assert_eq!(commands[0]["command"]["kind"], "add");
    assert_eq!(commands[0]["command"]["index"]["name"], "people");
    assert_eq!(commands[0]["command"]["index"]["config"]["type"], "exact");
    assert_eq!(commands[2]["command"]["kind"], "add_relationship");
    assert_eq!(commands[2]["command"]["start_node_id"].as_i64(), Some(1));
    assert!(commands[2]["command"]["index"]["config"].is_null());
    assert_eq!(commands[3]["command"]["kind"], "remove");
    let last = commands[3]["offset"].as_u64().expect("offset");
    assert!(last > commands[2]["offset"].as_u64().expect("offset"));
    assert_eq!(json["recovery"]["replay"]["commands"].as_u64(), Some(4));
}

#[test]
fn inspect_does_not_truncate_partial_tail() {
    let fixture = setup_log("inspect_tail");
    let mut bytes = fs::read(&fixture.log).expect("read log");
    bytes.extend_from_slice(&[1, 1, 0, 0]);
    fs::write(&fixture.log, &bytes).expect("write log");

    let json = run_json(&fixture, "inspect");
    assert_eq!(json["recovery"]["discarded_tail_bytes"].as_u64(), Some(4));
    assert_eq!(json["recovery"]["truncated"], false);
    assert_eq!(
        fs::metadata(&fixture.log).expect("metadata").len(),
        bytes.len() as u64
    );
}

#[test]
fn verify_passes_clean_log_and_fails_corrupt_one() {
    let fixture = setup_log("verify");
    let json = run_json(&fixture, "verify");
    assert_eq!(json["success"], true);
    assert!(json["error"].is_null());

    let mut bytes = fs::read(&fixture.log).expect("read log");
    // Command type byte of the first record.
    bytes[16] = 7;
    fs::write(&fixture.log, &bytes).expect("write log");
    let output = cargo_bin_cmd!("indexlog")
        .args(["--format", "json", "--config"])
        .arg(&fixture.config)
        .arg("verify")
        .arg(&fixture.log)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(json["success"], false);
    assert!(json["error"]
        .as_str()
        .expect("error message")
        .contains("unknown command type[7]"));
}

#[test]
fn recover_truncates_tail_and_reports_indexes() {
    let fixture = setup_log("recover");
    let clean_len = fs::metadata(&fixture.log).expect("metadata").len();
    let mut bytes = fs::read(&fixture.log).expect("read log");
    bytes.extend_from_slice(&[2, 1, 0]);
    fs::write(&fixture.log, &bytes).expect("write log");

    let json = run_json(&fixture, "recover");
    assert_eq!(json["recovery"]["truncated"], true);
    assert_eq!(json["recovery"]["valid_up_to"].as_u64(), Some(clean_len));
    assert_eq!(fs::metadata(&fixture.log).expect("metadata").len(), clean_len);

    let indexes = json["indexes"].as_array().expect("indexes array");
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[0]["name"], "people");
    assert_eq!(indexes[0]["entity_kind"], "node");
    assert_eq!(indexes[0]["entries"].as_u64(), Some(1));
    assert_eq!(indexes[1]["name"], "knows");
    assert_eq!(indexes[1]["entity_kind"], "relationship");
}

#[test]
fn text_output_and_missing_file_error() {
    let fixture = setup_log("text");
    let output = cargo_bin_cmd!("indexlog")
        .arg("--config")
        .arg(&fixture.config)
        .arg("recover")
        .arg(&fixture.log)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("node:people entries=1"));

    cargo_bin_cmd!("indexlog")
        .arg("--config")
        .arg(&fixture.config)
        .arg("verify")
        .arg(fixture.log.with_extension("missing"))
        .assert()
        .code(1);
}

#[test]
fn unknown_entity_kind_fails_verify_and_survives_recover() {
    let fixture = setup_log("bad_kind");
    let mut bytes = fs::read(&fixture.log).expect("read log");
    // Entity kind byte of the first record.
    bytes[17] = 9;
    fs::write(&fixture.log, &bytes).expect("write log");

    let output = cargo_bin_cmd!("indexlog")
        .args(["--format", "json", "--config"])
        .arg(&fixture.config)
        .arg("verify")
        .arg(&fixture.log)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(json["success"], false);
    assert_eq!(json["recovery"]["replay"]["stop"]["unknown_entity_kind"].as_u64(), Some(9));
    assert!(json["error"]
        .as_str()
        .expect("error message")
        .contains("unknown entity kind[9]"));

    let json = run_json(&fixture, "recover");
    assert_eq!(json["recovery"]["truncated"], false);
    assert_eq!(json["recovery"]["replay"]["commands"].as_u64(), Some(0));
    assert_eq!(
        fs::metadata(&fixture.log).expect("metadata").len(),
        bytes.len() as u64
    );
}
