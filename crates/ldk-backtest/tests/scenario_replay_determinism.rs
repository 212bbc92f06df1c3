use ldk_backtest::{BacktestConfig, BacktestEngine, BacktestReport};
use ldk_md::InstrumentTable;
use ldk_strategy::Signal;
use ldk_testkit::{bars_with_atr, feed, ScriptedStrategy};

/// Opens SPY on tick 1, pyramids on tick 2, closes on tick 4.
fn strategy() -> ScriptedStrategy {
    ScriptedStrategy::new()
        .at(1, vec![Signal::open_long("SPY").with_attr("atr", 2.0)])
        .at(2, vec![Signal::extend("SPY")])
        .at(4, vec![Signal::close("SPY")])
}

fn run_once() -> BacktestReport {
    let mut cfg = BacktestConfig::test_defaults();
    cfg.ledger.margin_ratio = 0.5;
    cfg.ledger.interest_rate = 0.0001;

    let bars = bars_with_atr("SPY", &[50.0, 51.0, 49.5, 53.0, 52.0], 2.0);
    let mut engine = BacktestEngine::new(
        cfg,
        Box::new(feed(bars)),
        Box::new(InstrumentTable::new(10)),
    )
    .unwrap();
    engine.add_strategy(Box::new(strategy())).unwrap();
    engine.run().unwrap()
}

#[test]
fn replay_determinism_identical_results() {
    let report1 = run_once();
    let report2 = run_once();

    assert_eq!(report1.fills, report2.fills);
    assert_eq!(report1.equity_curve, report2.equity_curve);
    assert_eq!(report1.stats, report2.stats);
    assert_eq!(report1.metrics, report2.metrics);

    // Sanity: open + extend + close
    assert_eq!(
        report1.fills.len(),
        3,
        "expected 3 fills, got {}",
        report1.fills.len()
    );
}
