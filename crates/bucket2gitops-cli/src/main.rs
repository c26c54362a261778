use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use bucket2gitops::pipeline::{LogProgress, Severity};
use bucket2gitops::{init_tracing, load_config, Generator, LogFormat, RunReport, RunStatus};

#[derive(Parser)]
#[command(name = "bucket2gitops")]
#[command(about = "Turn object-store manifest backups into an Argo CD GitOps tree", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (YAML).
    #[arg(short, long, env = "BUCKET2GITOPS_CONFIG", default_value = "bucket2gitops.yaml")]
    config: PathBuf,

    /// Log output format: text or json.
    #[arg(long, default_value = "text", value_parser = parse_log_format)]
    log_format: LogFormat,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch backups and write the GitOps tree (default).
    Generate {
        /// Output directory; overrides `output.directory`.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the run report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_format, &cli.log_level) {
        eprintln!("Error: {}", e);
        return ExitCode::from(1);
    }
    log::info!("bucket2gitops v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let (output, report_path) = match cli.command.unwrap_or(Command::Generate {
        output: None,
        report: None,
    }) {
        Command::CheckConfig => {
            println!(
                "Configuration OK: {} environments, output '{}'",
                config.environments.len(),
                config.output.directory
            );
            return ExitCode::SUCCESS;
        }
        Command::Generate { output, report } => (output, report),
    };

    let generator = match Generator::from_config(&config) {
        Ok(generator) => generator.with_progress(Arc::new(LogProgress)),
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_code(e.exit_code());
        }
    };
    let generator = match output {
        Some(dir) => generator.with_output_directory(dir),
        None => generator,
    };

    match generator.run().await {
        Ok(report) => {
            print_summary(&report, &generator.output_directory().display().to_string());
            if let Some(path) = report_path {
                if let Err(e) = write_report(&report, &path) {
                    eprintln!("Error: failed to write report '{}': {}", path.display(), e);
                    return ExitCode::from(1);
                }
            }
            if report.status() == RunStatus::Failed {
                return ExitCode::from(5);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Run aborted: {}", e);
            eprintln!("Error: {}", e);
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn print_summary(report: &RunReport, output: &str) {
    match report.status() {
        RunStatus::NothingToDo => {
            println!("Nothing to generate: no resources found under the configured prefix.");
            return;
        }
        RunStatus::Success => println!("GitOps tree written to {}", output),
        RunStatus::SuccessWithWarnings => {
            println!("GitOps tree written to {} (with warnings)", output)
        }
        RunStatus::Failed => eprintln!("No namespace generated: every object failed"),
    }
    println!("{}", report.summary());

    if !report.diagnostics.is_empty() {
        let mut by_kind: BTreeMap<(Severity, String), usize> = BTreeMap::new();
        for diagnostic in &report.diagnostics {
            *by_kind
                .entry((diagnostic.severity, format!("{:?}", diagnostic.kind)))
                .or_default() += 1;
        }
        println!("Diagnostics:");
        for ((severity, kind), count) in by_kind {
            println!("  {:?} {}: {}", severity, kind, count);
        }
    }
    if !report.backups.is_empty() {
        println!("{} replaced files backed up", report.backups.len());
    }
}

fn write_report(report: &RunReport, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
