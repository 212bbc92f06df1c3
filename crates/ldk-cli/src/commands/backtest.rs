//! `ldk backtest`: CSV bars in, equity curve + report artifacts out.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use ldk_backtest::{BacktestEngine, BacktestReport};
use ldk_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, BacktestSettings,
    LoadedConfig, UnusedKeyPolicy,
};
use ldk_md::{load_csv_file, BarFeed};
use ldk_portfolio::LedgerSnapshot;
use ldk_strategy::Strategy;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{backtest_config, instrument_table, parse_date_bound};
use crate::strategies::{BuyAndHold, TurtleBreakout, TurtleParams};

/// Fraction of equity the buy-and-hold demo puts to work.
const BUY_AND_HOLD_ALLOCATION: f64 = 0.9;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Turtle,
    Hold,
}

pub struct BacktestArgs {
    pub bars: String,
    pub symbol: Option<String>,
    pub config_paths: Vec<String>,
    pub out_dir: String,
    pub strategy: StrategyKind,
    pub entry_window: usize,
    pub exit_window: usize,
    pub start: Option<String>,
    pub end: Option<String>,
    pub strict_config: bool,
}

/// One row of `equity_curve.csv`.
#[derive(Serialize)]
struct CurveRow {
    timestamp: String,
    cash: f64,
    commission: f64,
    interest: f64,
    holdings: f64,
    total: f64,
}

impl From<&LedgerSnapshot> for CurveRow {
    fn from(s: &LedgerSnapshot) -> Self {
        Self {
            timestamp: s.timestamp.to_rfc3339(),
            cash: s.cash,
            commission: s.commission,
            interest: s.interest,
            holdings: s.total - s.cash,
            total: s.total,
        }
    }
}

/// Contents of `report.json`.
#[derive(Serialize)]
struct RunArtifact<'a> {
    run_id: String,
    config_hash: &'a str,
    strategy: &'a str,
    bars_path: &'a str,
    settings: &'a BacktestSettings,
    report: &'a BacktestReport,
}

pub fn run_backtest(args: BacktestArgs) -> Result<()> {
    if args.entry_window == 0 || args.exit_window == 0 {
        bail!("--entry-window and --exit-window must be >= 1");
    }

    let loaded = load_config(&args.config_paths)?;
    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by backtest");
    }
    let settings = loaded.settings()?;

    let store = load_csv_file(Path::new(&args.bars), args.symbol.as_deref())
        .with_context(|| format!("failed to load bars: {}", args.bars))?;
    let start = parse_date_bound(args.start.as_deref(), "--start", false)?;
    let end = parse_date_bound(args.end.as_deref(), "--end", true)?;
    let store = if start.is_some() || end.is_some() {
        store.restrict(start, end)
    } else {
        store
    };
    if store.is_empty() {
        bail!("no bars to replay in {}", args.bars);
    }

    let strategy: Box<dyn Strategy> = match args.strategy {
        StrategyKind::Turtle => Box::new(TurtleBreakout::new(TurtleParams {
            entry_window: args.entry_window,
            exit_window: args.exit_window,
            volatility_attr: settings.sizing.volatility_attr.clone(),
            ..TurtleParams::default()
        })),
        StrategyKind::Hold => Box::new(BuyAndHold::new(
            settings.sizing.volatility_attr.clone(),
            settings.sizing.risk_fraction,
            BUY_AND_HOLD_ALLOCATION,
        )),
    };
    let strategy_name = strategy.spec().name;

    let run_id = Uuid::new_v4();
    info!(%run_id, bars = store.len(), symbols = store.symbols().len(), "loaded bars");

    let mut engine = BacktestEngine::new(
        backtest_config(&settings),
        Box::new(BarFeed::new(store)),
        Box::new(instrument_table(&settings)),
    )?;
    engine.add_strategy(strategy)?;
    let report = engine.run()?;

    let run_dir = PathBuf::from(&args.out_dir).join(run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create {}", run_dir.display()))?;

    let curve_path = run_dir.join("equity_curve.csv");
    write_equity_curve(&curve_path, &report.equity_curve)?;

    let report_path = run_dir.join("report.json");
    let artifact = RunArtifact {
        run_id: run_id.to_string(),
        config_hash: &loaded.config_hash,
        strategy: &strategy_name,
        bars_path: &args.bars,
        settings: &settings,
        report: &report,
    };
    let json = serde_json::to_string_pretty(&artifact).context("serialize report json failed")?;
    fs::write(&report_path, json)
        .with_context(|| format!("write report failed: {}", report_path.display()))?;

    let final_total = report
        .final_snapshot()
        .map(|s| s.total)
        .unwrap_or(settings.ledger.initial_capital);
    println!("run_id={}", run_id);
    println!("config_hash={}", loaded.config_hash);
    println!("strategy={}", strategy_name);
    println!("cancelled={}", report.cancelled);
    println!("ticks={}", report.stats.ticks);
    println!("signals={}", report.stats.signals);
    println!("orders={}", report.stats.orders);
    println!("fills={}", report.stats.fills);
    println!("vetoes={}", report.stats.vetoes);
    println!("fill_failures={}", report.stats.fill_failures);
    println!("ledger_rejections={}", report.stats.ledger_rejections);
    println!("final_total={:.2}", final_total);
    println!("total_return={:.6}", report.metrics.total_return);
    println!("sharpe_ratio={:.4}", report.metrics.sharpe_ratio);
    println!("max_drawdown={:.6}", report.metrics.max_drawdown);
    println!("drawdown_duration={}", report.metrics.drawdown_duration);
    println!("equity_curve={}", curve_path.display());
    println!("report={}", report_path.display());

    Ok(())
}

/// Layered config from files, or built-in defaults when none are given.
fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return load_layered_yaml_from_strings(&["{}"]);
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    load_layered_yaml(&path_refs)
}

fn write_equity_curve(path: &Path, curve: &[LedgerSnapshot]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for snap in curve {
        w.serialize(CurveRow::from(snap))
            .context("write equity curve row failed")?;
    }
    w.flush().context("flush equity curve failed")?;
    Ok(())
}
