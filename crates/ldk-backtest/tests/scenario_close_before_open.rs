use ldk_backtest::{BacktestConfig, BacktestEngine};
use ldk_md::InstrumentTable;
use ldk_strategy::Signal;
use ldk_testkit::{bars_with_atr, feed, ScriptedStrategy};

#[test]
fn close_is_filled_before_same_tick_open() {
    let mut bars = bars_with_atr("A", &[10.0, 10.5, 11.0], 1.0);
    bars.extend(bars_with_atr("B", &[20.0, 20.0, 20.0], 1.0));

    // Open listed first on tick 2; the close must still reach the ledger first.
    let strategy = ScriptedStrategy::new()
        .at(1, vec![Signal::open_long("A").with_attr("atr", 1.0)])
        .at(
            2,
            vec![
                Signal::open_long("B").with_attr("atr", 1.0),
                Signal::close("A"),
            ],
        );

    let mut engine = BacktestEngine::new(
        BacktestConfig::test_defaults(),
        Box::new(feed(bars)),
        Box::new(InstrumentTable::default()),
    )
    .unwrap();
    engine.add_strategy(Box::new(strategy)).unwrap();
    let report = engine.run().unwrap();

    let seq: Vec<(&str, i64)> = report
        .fills
        .iter()
        .map(|f| (f.symbol.as_str(), f.quantity))
        .collect();
    // 100k * 1% / 1.0 = 1000 budget: 100 A @ 10, 50 B @ 20
    assert_eq!(seq, vec![("A", 100), ("A", -100), ("B", 50)]);
    assert!(engine.rejections().is_empty());
    assert!(engine.ledger().position("A").is_none());
    assert_eq!(engine.ledger().position("B").map(|p| p.quantity), Some(50));
}

#[test]
fn strategy_sees_ledger_after_previous_tick_settled() {
    let strategy = ScriptedStrategy::new()
        .at(1, vec![Signal::open_long("A").with_attr("atr", 1.0)])
        .at(2, vec![Signal::close("A")]);
    let log = strategy.log();

    let mut engine = BacktestEngine::new(
        BacktestConfig::test_defaults(),
        Box::new(feed(bars_with_atr("A", &[10.0, 10.0, 10.0], 1.0))),
        Box::new(InstrumentTable::default()),
    )
    .unwrap();
    engine.add_strategy(Box::new(strategy)).unwrap();
    engine.run().unwrap();

    let seen = log.lock().unwrap();
    let open: Vec<Vec<String>> = seen.iter().map(|r| r.open_symbols.clone()).collect();
    assert_eq!(open, vec![vec![], vec!["A".to_string()], vec![]]);
    assert_eq!(seen.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![1, 2, 3]);
}
