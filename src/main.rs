//! CLI entry point for mailtriage.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use mailtriage::config::{self, Config};
use mailtriage::model::record::{
    Analytics, ExtractionSummary, FailedReport, MessageReport, RawMessage,
};
use mailtriage::pipeline::{self, PipelineOptions};

#[derive(Parser)]
#[command(name = "mailtriage", version, about = "Normalize email messages and triage them for phishing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze messages and classify the batch
    Analyze {
        /// Message files (.eml) to analyze
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Override the classifier endpoint
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,

        /// Compute feature vectors and send them in place of message bodies
        #[arg(long)]
        features: bool,

        /// Read Authentication-Results headers into the analytics
        #[arg(long)]
        auth: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Normalize messages without calling the classifier
    Extract {
        /// Message files (.eml) to normalize
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Include feature vectors in the records
        #[arg(long)]
        features: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the heuristic feature vector of one message
    Features {
        /// Message file (.eml)
        file: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level);

    match cli.command {
        Commands::Analyze {
            files,
            endpoint,
            features,
            auth,
            pretty,
        } => cmd_analyze(&files, endpoint, features, auth, pretty, config),
        Commands::Extract {
            files,
            features,
            pretty,
        } => cmd_extract(&files, features, pretty, &config),
        Commands::Features { file } => cmd_features(&file),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

/// Analyze a batch of message files and print the report list as JSON.
fn cmd_analyze(
    files: &[PathBuf],
    endpoint: Option<String>,
    features: bool,
    auth: bool,
    pretty: bool,
    mut config: Config,
) -> anyhow::Result<()> {
    if let Some(endpoint) = endpoint {
        config.classifier.endpoint = endpoint;
    }
    if features {
        config.pipeline.extract_features = true;
    }
    if auth {
        config.pipeline.authentication = true;
    }

    let (messages, read_failures) = read_messages(files);

    let pb = progress_bar("Analyzing", messages.len());
    let on_progress = |processed: usize, _total: usize| pb.set_position(processed as u64);
    let mut reports = pipeline::analyze_batch(&messages, &config, Some(&on_progress));
    pb.finish_and_clear();

    // Splice unreadable files back into their original positions.
    for (position, failure) in read_failures {
        let at = position.min(reports.len());
        reports.insert(at, MessageReport::Failed(failure));
    }

    print_json(&reports, pretty)
}

/// Normalize messages and print the records, without classification.
fn cmd_extract(
    files: &[PathBuf],
    features: bool,
    pretty: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let (messages, _) = read_messages(files);

    let options = PipelineOptions {
        extract_features: features || config.pipeline.extract_features,
        authentication: config.pipeline.authentication,
    };

    let pb = progress_bar("Extracting", messages.len());
    let on_progress = |processed: usize, _total: usize| pb.set_position(processed as u64);
    let outcome = pipeline::normalize_batch(
        &messages,
        &options,
        config.performance.worker_threads,
        Some(&on_progress),
    );
    pb.finish_and_clear();

    let summary = ExtractionSummary {
        generated_at: Utc::now(),
        records: outcome.records,
    };
    print_json(&summary, pretty)
}

/// Print one message's feature vector.
fn cmd_features(file: &Path) -> anyhow::Result<()> {
    let message = RawMessage::from_path(file)?;
    let options = PipelineOptions {
        extract_features: true,
        authentication: false,
    };
    let normalized = pipeline::normalize_message(&message, &options)?;
    let features = normalized
        .record
        .features
        .expect("feature stage was enabled");
    print_json(&features, true)
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailtriage", &mut std::io::stdout());
    Ok(())
}

/// Read message files; unreadable files become error-tagged reports to be
/// spliced back at their original positions.
fn read_messages(files: &[PathBuf]) -> (Vec<RawMessage>, Vec<(usize, FailedReport)>) {
    let mut messages = Vec::with_capacity(files.len());
    let mut failures = Vec::new();

    for (position, path) in files.iter().enumerate() {
        match RawMessage::from_path(path) {
            Ok(message) => messages.push(message),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read message file");
                failures.push((
                    position,
                    FailedReport {
                        filename: display_name(path),
                        error: format!("Read error: {e}"),
                        analytics: Analytics::default(),
                    },
                ));
            }
        }
    }

    (messages, failures)
}

/// Filename portion of a path, for report identifiers.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn progress_bar(label: &str, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
