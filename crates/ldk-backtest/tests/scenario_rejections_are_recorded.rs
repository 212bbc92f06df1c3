use ldk_backtest::{BacktestConfig, BacktestEngine, Rejection};
use ldk_execution::ExecutionError;
use ldk_md::{Bar, BarField, InstrumentTable};
use ldk_portfolio::{LedgerConfig, LedgerError};
use ldk_risk::VetoReason;
use ldk_strategy::Signal;
use ldk_testkit::{bars_with_atr, day, feed, flat_bars, ScriptedStrategy};

#[test]
fn second_open_in_batch_is_vetoed_for_capital() {
    // 100k * 1% / 0.015 = 66_666 budget -> 6_666 shares @ 10 each.
    // Each open alone fits; the first one's reserved margin leaves too little
    // for the second.
    let mut bars = bars_with_atr("A", &[10.0, 10.0], 0.015);
    bars.extend(bars_with_atr("B", &[10.0, 10.0], 0.015));
    let strategy = ScriptedStrategy::new().at(
        1,
        vec![
            Signal::open_long("A").with_attr("atr", 0.015),
            Signal::open_long("B").with_attr("atr", 0.015),
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

    assert_eq!(report.stats.orders, 1);
    assert_eq!(report.stats.fills, 1);
    assert_eq!(report.stats.vetoes, 1);
    assert_eq!(report.stats.ledger_rejections, 0);
    assert_eq!(report.fills[0].symbol, "A");
    assert_eq!(report.fills[0].quantity, 6_666);

    match &engine.rejections()[0] {
        Rejection::Vetoed { veto, .. } => {
            assert_eq!(veto.symbol, "B");
            assert!(matches!(veto.reason, VetoReason::InsufficientCapital { .. }));
        }
        other => panic!("unexpected rejection {other:?}"),
    }
    assert!(engine.ledger().position("B").is_none());
}

#[test]
fn open_passing_precheck_can_still_be_refused_by_ledger() {
    // 91 * 1% / 0.0096 -> 94.79 budget -> 9 shares @ 10.
    // Gate reserve 90 + 0.9 fits in 91; the 1.3 minimum commission does not.
    let bars = bars_with_atr("A", &[10.0, 10.0], 0.0096);
    let strategy =
        ScriptedStrategy::new().at(1, vec![Signal::open_long("A").with_attr("atr", 0.0096)]);

    let mut config = BacktestConfig::test_defaults();
    config.ledger = LedgerConfig::new(91.0, 1.0, 0.0);
    let mut engine = BacktestEngine::new(
        config,
        Box::new(feed(bars)),
        Box::new(InstrumentTable::default()),
    )
    .unwrap();
    engine.add_strategy(Box::new(strategy)).unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.stats.orders, 1);
    assert_eq!(report.stats.fills, 0);
    assert_eq!(report.stats.ledger_rejections, 1);
    match &engine.rejections()[0] {
        Rejection::LedgerRejected { fill, error, .. } => {
            assert_eq!(fill.symbol, "A");
            assert_eq!(fill.quantity, 9);
            assert!(matches!(error, LedgerError::InsufficientCash { .. }));
        }
        other => panic!("unexpected rejection {other:?}"),
    }
    // The refused fill left no trace.
    assert!(engine.ledger().position("A").is_none());
    assert_eq!(engine.ledger().cash(), 91.0);
    assert!(engine.ledger().verify_integrity().is_ok());
}

#[test]
fn close_without_price_fails_in_simulator_and_run_continues() {
    // C has no bar on day 1; X keeps the timeline going.
    let mut bars = flat_bars("X", &[1.0, 1.0, 1.0]);
    bars.extend(bars_with_atr("C", &[10.0], 1.0));
    bars.push(Bar::new("C", day(2), 12.0, 12.0, 12.0, 12.0, 1.0).with_extra("atr", 1.0));
    let strategy = ScriptedStrategy::new()
        .at(1, vec![Signal::open_long("C").with_attr("atr", 1.0)])
        .at(2, vec![Signal::close("C")])
        .at(3, vec![Signal::close("C")]);

    let mut engine = BacktestEngine::new(
        BacktestConfig::test_defaults(),
        Box::new(feed(bars)),
        Box::new(InstrumentTable::default()),
    )
    .unwrap();
    engine.add_strategy(Box::new(strategy)).unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.stats.fill_failures, 1);
    match &engine.rejections()[0] {
        Rejection::FillFailed { error, .. } => assert_eq!(
            error,
            &ExecutionError::DataUnavailable {
                symbol: "C".into(),
                field: BarField::Close
            }
        ),
        other => panic!("unexpected rejection {other:?}"),
    }
    // Retried on the next tick, where the bar exists.
    assert_eq!(report.fills.len(), 2);
    assert!(engine.ledger().is_flat());
    // Day 1 snapshot keeps valuing C at its last mark.
    assert_eq!(report.equity_curve[1].holding("C"), report.equity_curve[0].holding("C"));
}

#[test]
fn vetoes_are_recorded_with_reason() {
    let strategy = ScriptedStrategy::new().at(
        1,
        vec![
            Signal::extend("A"),
            Signal::open_long("A"),
            Signal::open_long("ZZZ").with_attr("atr", 1.0),
        ],
    );
    let mut engine = BacktestEngine::new(
        BacktestConfig::test_defaults(),
        Box::new(feed(bars_with_atr("A", &[10.0], 1.0))),
        Box::new(InstrumentTable::default()),
    )
    .unwrap();
    engine.add_strategy(Box::new(strategy)).unwrap();
    let report = engine.run().unwrap();

    assert_eq!(report.stats.vetoes, 3);
    let reasons: Vec<VetoReason> = engine
        .rejections()
        .iter()
        .filter_map(|r| match r {
            Rejection::Vetoed { veto, .. } => Some(veto.reason.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            VetoReason::NoOpenPosition,
            VetoReason::MissingVolatility { attr: "atr".into() },
            VetoReason::DataUnavailable,
        ]
    );
}
