//! Binary entry point for the index command log tool.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sombra_indexlog::{
    command::{encoded_len, StopReason},
    log::LOG_HEADER_LEN,
    logging::init_logging,
    recover,
    replay::IndexSummary,
    Command, IndexLogConfig, MemoryIndex, RecoveryReport,
};

#[derive(Parser, Debug)]
#[command(
    name = "indexlog",
    version,
    about = "Inspect, verify and recover Sombra index command logs",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "SOMBRA_INDEXLOG_CONFIG",
        help = "Configuration file (defaults to the per-user config location)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        default_value = "warn",
        env = "SOMBRA_INDEXLOG_LOG",
        help = "Log filter directive, e.g. info or sombra_indexlog=debug"
    )]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List every complete command in a log without modifying it
    Inspect {
        #[arg(value_name = "LOG")]
        log_path: PathBuf,
    },
    /// Check that a log decodes cleanly; exits with 2 on corruption
    Verify {
        #[arg(value_name = "LOG")]
        log_path: PathBuf,
    },
    /// Replay a log, cutting off a partial tail, and report index entry counts
    Recover {
        #[arg(value_name = "LOG")]
        log_path: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct InspectEntry {
    offset: u64,
    command: Command,
}

#[derive(Serialize)]
struct InspectReport {
    path: String,
    commands: Vec<InspectEntry>,
    recovery: RecoveryReport,
}

#[derive(Serialize)]
struct VerifyReport {
    path: String,
    success: bool,
    error: Option<String>,
    recovery: Option<RecoveryReport>,
}

#[derive(Serialize)]
struct RecoverOutput {
    path: String,
    recovery: RecoveryReport,
    indexes: Vec<IndexSummary>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    let config = IndexLogConfig::load(cli.config.as_deref())?;
    let store = config.index_store();

    match cli.command {
        CliCommand::Inspect { log_path } => {
            let options = config.recovery.read_only();
            let mut commands = Vec::new();
            let mut offset = LOG_HEADER_LEN as u64;
            let mut collect = |command: Command| -> sombra_indexlog::Result<()> {
                let len = encoded_len(&command) as u64;
                commands.push(InspectEntry { offset, command });
                offset += len;
                Ok(())
            };
            let recovery = recover(&log_path, &store, &options, &mut collect)?;
            let report = InspectReport {
                path: display(&log_path),
                commands,
                recovery,
            };
            emit(&cli.format, &report, |fmt| print_inspect_text(fmt, &report))?;
        }
        CliCommand::Verify { log_path } => {
            let options = config.recovery.read_only();
            let mut ignore = |_: Command| -> sombra_indexlog::Result<()> { Ok(()) };
            let report = match recover(&log_path, &store, &options, &mut ignore) {
                Ok(recovery) => {
                    let error = match recovery.replay.stop {
                        StopReason::UnknownEntityKind(byte) => Some(format!(
                            "unknown entity kind[{byte}] at offset {}; {} bytes not replayed",
                            recovery.valid_up_to, recovery.discarded_tail_bytes
                        )),
                        StopReason::EndOfChannel | StopReason::Truncated => None,
                    };
                    VerifyReport {
                        path: display(&log_path),
                        success: error.is_none(),
                        error,
                        recovery: Some(recovery),
                    }
                }
                Err(err) if err.is_corruption() => VerifyReport {
                    path: display(&log_path),
                    success: false,
                    error: Some(err.to_string()),
                    recovery: None,
                },
                Err(err) => return Err(err.into()),
            };
            emit(&cli.format, &report, |fmt| print_verify_text(fmt, &report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
        CliCommand::Recover { log_path } => {
            let mut index = MemoryIndex::new();
            let recovery = recover(&log_path, &store, &config.recovery, &mut index)?;
            let output = RecoverOutput {
                path: display(&log_path),
                recovery,
                indexes: index.summary(),
            };
            emit(&cli.format, &output, |fmt| print_recover_text(fmt, &output))?;
        }
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn stop_text(stop: StopReason) -> String {
    match stop {
        StopReason::EndOfChannel => "end_of_log".to_owned(),
        StopReason::Truncated => "partial_record".to_owned(),
        StopReason::UnknownEntityKind(byte) => format!("unknown_entity_kind[{byte}]"),
    }
}

fn print_recovery_text(report: &RecoveryReport) {
    println!("  stop={}", stop_text(report.replay.stop));
    println!(
        "  file_len={} valid_up_to={} discarded_tail_bytes={} truncated={}",
        report.file_len, report.valid_up_to, report.discarded_tail_bytes, report.truncated
    );
    println!(
        "  commands={} adds={} relationship_adds={} removes={} clears={}",
        report.replay.commands,
        report.replay.adds,
        report.replay.relationship_adds,
        report.replay.removes,
        report.replay.clears
    );
}

fn print_inspect_text(_: OutputFormat, report: &InspectReport) {
    println!("Log: {}", report.path);
    print_recovery_text(&report.recovery);
    println!();
    for entry in &report.commands {
        let command = &entry.command;
        let index = command.index();
        match command {
            Command::Clear { .. } => {
                println!("{:>10}  {:<16} {}", entry.offset, command.kind().as_str(), index)
            }
            _ => {
                print!(
                    "{:>10}  {:<16} {} entity={} {}={:?}",
                    entry.offset,
                    command.kind().as_str(),
                    index,
                    command.entity_id(),
                    command.key(),
                    command.value()
                );
                match command.endpoints() {
                    Some((start, end)) => println!(" start={start} end={end}"),
                    None => println!(),
                }
            }
        }
    }
}

fn print_verify_text(_: OutputFormat, report: &VerifyReport) {
    if report.success {
        println!("Verify passed for {}", report.path);
    } else {
        println!("Verify FAILED for {}", report.path);
    }
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
    if let Some(recovery) = &report.recovery {
        print_recovery_text(recovery);
    }
}

fn print_recover_text(_: OutputFormat, output: &RecoverOutput) {
    println!("Recovered {}", output.path);
    print_recovery_text(&output.recovery);
    if output.indexes.is_empty() {
        return;
    }
    println!();
    println!("Indexes:");
    for summary in &output.indexes {
        println!(
            "  {}:{} entries={}",
            summary.entity_kind, summary.name, summary.entries
        );
    }
}
