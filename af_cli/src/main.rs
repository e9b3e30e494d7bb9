//! artifetch CLI - resolve and download artifacts from a binary repository.

use clap::{ArgAction, Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use af_core::config::DEFAULT_CONCURRENCY;
use af_core::{Error, ResolverConfig};

mod commands;
mod display;

use commands::PatternArgs;

#[derive(Parser)]
#[command(name = "af")]
#[command(about = "artifetch - resolve and download artifacts from a binary repository")]
#[command(version)]
struct Cli {
    /// Base URL of the repository service
    #[arg(long, env = "AF_URL", global = true)]
    url: Option<String>,

    /// Directory downloads are placed under
    #[arg(long, default_value = ".", global = true)]
    working_dir: PathBuf,

    /// Number of parallel downloads
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, global = true)]
    threads: usize,

    /// Log more (-v for progress messages, -vv for queries)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the artifacts matching a pattern or a spec file
    Download {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Target directory (ending with '/') or file name; supports {n} placeholders
        target: Option<String>,

        /// Read a JSON download spec instead of a pattern
        #[arg(long, conflicts_with = "pattern")]
        spec: Option<PathBuf>,

        /// Place files directly under the target, without their repository path
        #[arg(long)]
        flat: bool,

        /// Extract downloaded zip/tar/tar.gz archives
        #[arg(long)]
        explode: bool,

        /// Delete local files next to the downloads that were not resolved
        #[arg(long)]
        sync_deletes: bool,
    },

    /// Search for artifacts without downloading them
    Search {
        #[command(flatten)]
        pattern: PatternArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the search query a pattern compiles to
    Query {
        #[command(flatten)]
        pattern: PatternArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,af_core={level},af_io={level},af={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config(cli: &Cli) -> Result<ResolverConfig, Error> {
    let url = cli.url.as_deref().ok_or_else(|| Error::InvalidSpec {
        message: "no repository URL; pass --url or set AF_URL".to_string(),
    })?;
    Ok(ResolverConfig::new(url, cli.working_dir.clone()).with_concurrency(cli.threads))
}

async fn run(cli: Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Query { pattern } => commands::query::run_query(&pattern.to_file_spec()?),
        Commands::Search { pattern, json } => {
            let config = config(&cli)?;
            commands::search::run_search(config, &pattern.to_file_spec()?, *json).await
        }
        Commands::Download {
            pattern,
            target,
            spec,
            flat,
            explode,
            sync_deletes,
        } => {
            let config = config(&cli)?;
            let spec = match spec {
                Some(path) => commands::download::read_spec(path)?,
                None => commands::download::pattern_spec(
                    pattern,
                    target.as_deref(),
                    *flat,
                    *explode,
                    *sync_deletes,
                )?,
            };
            commands::download::run_download(config, &spec, cli.verbose == 0).await
        }
    }
}
