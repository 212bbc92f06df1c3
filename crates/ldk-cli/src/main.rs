use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod strategies;

use commands::backtest::{BacktestArgs, StrategyKind};

#[derive(Parser)]
#[command(name = "ldk")]
#[command(about = "Leveraged event-driven backtester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV of bars through a demo strategy and write the equity curve
    Backtest {
        /// Bars CSV (symbol,timestamp,open,high,low,close[,volume][,extra...])
        #[arg(long)]
        bars: String,

        /// Symbol for files without a `symbol` column
        #[arg(long)]
        symbol: Option<String>,

        /// Layered config paths in merge order (defaults apply when omitted)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Artifacts root; each run writes into <out-dir>/<run_id>/
        #[arg(long, default_value = "exports")]
        out_dir: String,

        #[arg(long, value_enum, default_value_t = StrategyKind::Turtle)]
        strategy: StrategyKind,

        /// Donchian breakout window for entries
        #[arg(long, default_value_t = 20)]
        entry_window: usize,

        /// Donchian window for exits
        #[arg(long, default_value_t = 10)]
        exit_window: usize,

        /// First bar date to replay (YYYY-MM-DD, inclusive)
        #[arg(long)]
        start: Option<String>,

        /// Last bar date to replay (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: Option<String>,

        /// Fail instead of warn when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience, e.g. RUST_LOG).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Backtest {
            bars,
            symbol,
            config_paths,
            out_dir,
            strategy,
            entry_window,
            exit_window,
            start,
            end,
            strict_config,
        } => commands::backtest::run_backtest(BacktestArgs {
            bars,
            symbol,
            config_paths,
            out_dir,
            strategy,
            entry_window,
            exit_window,
            start,
            end,
            strict_config,
        }),

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ldk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries the key=value result lines.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
