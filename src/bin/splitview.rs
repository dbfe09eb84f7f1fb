use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use futures::StreamExt;
use serde::Serialize;
use splitview::{CompetitorView, EventExport, Snapshot, Splitview};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Orienteering route and split reconstruction",
    long_about = None
)]
struct Cli {
    /// Event configuration (YAML)
    #[arg(short, long, default_value = "splitview.yaml", value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Pretty-print JSON output
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pretty: bool,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Groups with competitor counts and parse statistics
    Summary,
    /// Loaded control points with pixel positions and roles
    Points,
    /// Route, splits and course coverage for one competitor
    Competitor(CompetitorArgs),
    /// Full event export
    Export(ExportArgs),
    /// Print a summary whenever a source changes
    Watch(WatchArgs),
}

#[derive(Parser, Debug)]
struct CompetitorArgs {
    /// Group name as defined in the group source
    #[arg(short, long)]
    group: String,

    /// Competitor name or ranked display name (e.g. "1. Иванов")
    #[arg(short, long)]
    name: String,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Write JSON here instead of stdout
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct WatchArgs {
    /// Poll interval in seconds
    #[arg(long, default_value_t = 5)]
    interval: u64,
}

#[derive(Serialize)]
struct GroupSummary<'a> {
    name: &'a str,
    start: &'a str,
    required: usize,
    competitors: usize,
}

#[derive(Serialize)]
struct Summary<'a> {
    generation: u64,
    points: usize,
    skipped_coordinate_lines: usize,
    groups: Vec<GroupSummary<'a>>,
    stats: splitview::results::ParseStats,
}

fn summarize(snapshot: &Snapshot) -> Summary<'_> {
    Summary {
        generation: snapshot.generation,
        points: snapshot.registry.len(),
        skipped_coordinate_lines: snapshot.registry.skipped(),
        groups: snapshot
            .results
            .iter()
            .map(|g| GroupSummary {
                name: &g.group.name,
                start: &g.group.start,
                required: g.group.required.len(),
                competitors: g.competitors.len(),
            })
            .collect(),
        stats: snapshot.results.stats(),
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json =
        if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    json.context("failed to serialize output")
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", to_json(value, pretty)?)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "splitview=debug" } else { "splitview=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();

    if let Command::Watch(args) = &cli.command {
        return handle_watch(&cli, args).await;
    }

    let cache = match Splitview::open(&cli.config) {
        Ok(cache) => cache,
        Err(e) => {
            for suggestion in e.recovery_suggestions() {
                warn!("{}", suggestion);
            }
            return Err(e)
                .with_context(|| format!("failed to load event from {}", cli.config.display()));
        }
    };
    let snapshot = cache.current();

    match &cli.command {
        Command::Summary => print_json(&summarize(&snapshot), cli.pretty),
        Command::Points => print_json(&snapshot.registry.iter().collect::<Vec<_>>(), cli.pretty),
        Command::Competitor(args) => {
            let view = CompetitorView::find(&snapshot, &args.group, &args.name)?;
            print_json(&view, cli.pretty)
        }
        Command::Export(args) => {
            let export = EventExport::from_snapshot(&snapshot);
            match &args.output {
                Some(path) => {
                    std::fs::write(path, to_json(&export, cli.pretty)?)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Wrote event export");
                    Ok(())
                }
                None => print_json(&export, cli.pretty),
            }
        }
        Command::Watch(_) => Ok(()),
    }
}

async fn handle_watch(cli: &Cli, args: &WatchArgs) -> Result<()> {
    let interval = Duration::from_secs(args.interval.max(1));
    let channels = Splitview::watch(&cli.config, interval)
        .await
        .with_context(|| format!("failed to load event from {}", cli.config.display()))?;

    let mut updates = Box::pin(channels.snapshot_updates());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watcher");
                channels.shutdown();
                break;
            }
            next = updates.next() => match next {
                Some(snapshot) => print_json(&summarize(&snapshot), cli.pretty)?,
                None => break,
            },
        }
    }
    Ok(())
}
