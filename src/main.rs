use clap::{Parser, Subcommand};
use izugen::{config, render, scan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that render pages.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the render cache — force re-rendering of all entries
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "izugen")]
#[command(about = "Static photoblog generator for Izu markup")]
#[command(long_about = "\
Static photoblog generator for Izu markup

Your filesystem is the data source. Dated directories become entries, their
.izu file is the content, and sibling images travel with the entry.

Source structure:

  source/
  ├── izugen.toml                  # Site config (optional)
  ├── theme/                       # Templates: entry.html, index.html
  ├── 2006-05-28-low-tide/         # Entry (date prefix names the day)
  │   ├── index.izu                # Content: Izu markup
  │   ├── rocks.jpg                # Images copied as-is
  │   └── pools.jpg
  ├── 20060612_dunes/              # Compact date form also accepted
  └── 2006-07-02.izu               # Standalone entry file

Metadata resolution (first available wins):
  Date:     [izu:date:...] tag → entry name
  Title:    [izu:title:...] tag → entry name → date

Run 'izugen gen-config' to generate a documented izugen.toml.")]
#[command(version)]
struct Cli {
    /// Source directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "site", global = true)]
    output: PathBuf,

    /// Theme directory (overrides config)
    #[arg(long, global = true)]
    theme: Option<String>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the source directory and print the entry manifest
    Scan,
    /// Run the full pipeline: scan → render → write the site
    Build(CacheArgs),
    /// Parse every entry and template without writing anything
    Check,
    /// Print a stock izugen.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan => {
            let manifest = scan::scan(&cli.source)?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Command::Build(cache_args) => {
            println!(
                "==> Building {} → {}",
                cli.source.display(),
                cli.output.display()
            );
            init_thread_pool(&config::load_config(&cli.source)?.processing);
            let options = render::BuildOptions {
                no_cache: cache_args.no_cache,
                theme: cli.theme.clone(),
            };
            let report = render::build(&cli.source, &cli.output, &options)?;
            println!(
                "==> {} entries, {} pages written",
                report.entries, report.pages
            );
            println!("Cache: {}", report.stats);
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let checked = render::check(&cli.source, cli.theme.as_deref())?;
            println!("==> {checked} entries parse cleanly");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Route diagnostics to stderr; `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
