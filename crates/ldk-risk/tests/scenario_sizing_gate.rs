use ldk_execution::Side;
use ldk_md::{BarFeed, InstrumentTable};
use ldk_portfolio::{Fill, Ledger, LedgerConfig};
use ldk_risk::{SizingConfig, SizingGate, VetoReason};
use ldk_strategy::{Signal, SignalBatch};
use ldk_testkit::{bars_with_atr, day, feed_at};

fn two_symbol_feed() -> BarFeed {
    let mut bars = bars_with_atr("A", &[10.0, 10.0], 0.5);
    bars.extend(bars_with_atr("B", &[20.0, 20.0], 1.0));
    feed_at(bars, 1)
}

fn ledger(capital: f64) -> Ledger {
    Ledger::new(LedgerConfig::new(capital, 1.0, 0.0)).unwrap()
}

fn gate() -> SizingGate {
    SizingGate::new(SizingConfig::test_defaults())
}

#[test]
fn scenario_close_orders_precede_opens() {
    let mut ledger = ledger(100_000.0);
    ledger.apply(Fill::new(day(0), "A", 100, 10.0)).unwrap();

    let batch = SignalBatch::new(
        day(0),
        vec![
            Signal::open_long("B").with_attr("atr", 1.0),
            Signal::close("A"),
        ],
    );
    let d = gate().size(&batch, &ledger, &two_symbol_feed(), &InstrumentTable::default());

    assert!(d.vetoes.is_empty(), "{:?}", d.vetoes);
    assert_eq!(d.orders.len(), 2);
    assert_eq!(d.orders[0].symbol, "A");
    assert_eq!(d.orders[0].side, Side::Sell);
    assert_eq!(d.orders[0].quantity, 100);
    assert_eq!(d.orders[1].symbol, "B");
    assert_eq!(d.orders[1].side, Side::Buy);
}

#[test]
fn scenario_open_quantity_follows_equity_and_volatility() {
    let batch = SignalBatch::new(day(0), vec![Signal::open_short("B").with_attr("atr", 1.0)]);
    let feed = two_symbol_feed();
    let lots = InstrumentTable::default();

    // 100k * 1% / 1.0 = 1000 budget; / 20 = 50 shares
    let full = gate().size(&batch, &ledger(100_000.0), &feed, &lots);
    assert_eq!(full.orders[0].quantity, 50);
    assert_eq!(full.orders[0].side, Side::Sell);
    assert_eq!(full.equity, 100_000.0);

    let half = gate().size(&batch, &ledger(50_000.0), &feed, &lots);
    assert_eq!(half.orders[0].quantity, 25);

    // lot size 20 rounds 50 down to 40
    let lotted = gate().size(
        &batch,
        &ledger(100_000.0),
        &feed,
        &InstrumentTable::new(1).with_lot("B", 20),
    );
    assert_eq!(lotted.orders[0].quantity, 40);
}

#[test]
fn scenario_extend_uses_first_fill_unit() {
    let mut ledger = ledger(100_000.0);
    ledger.apply(Fill::new(day(0), "A", -70, 10.0)).unwrap();
    ledger.apply(Fill::new(day(0), "A", -30, 10.0)).unwrap();

    let batch = SignalBatch::new(day(0), vec![Signal::extend("A")]);
    let d = gate().size(&batch, &ledger, &two_symbol_feed(), &InstrumentTable::default());
    assert_eq!(d.orders.len(), 1);
    assert_eq!(d.orders[0].quantity, 70);
    assert_eq!(d.orders[0].side, Side::Sell);
}

#[test]
fn scenario_vetoes_are_reported_and_others_proceed() {
    let mut ledger = ledger(100_000.0);
    ledger.apply(Fill::new(day(0), "A", 10, 10.0)).unwrap();

    let batch = SignalBatch::new(
        day(0),
        vec![
            Signal::open_long("B"),                          // no atr attr
            Signal::open_long("ZZZ").with_attr("atr", 1.0), // no price
            Signal::extend("B"),                             // nothing open
            Signal::open_long("A").with_attr("atr", 1.0),   // re-open after close
            Signal::open_long("B").with_attr("atr", 1e9),   // rounds to zero
            Signal::close("A"),
        ],
    );
    let d = gate().size(&batch, &ledger, &two_symbol_feed(), &InstrumentTable::default());

    // A is closed and re-opened in the same batch: close first.
    assert_eq!(d.orders.len(), 2);
    assert_eq!((d.orders[0].symbol.as_str(), d.orders[0].side), ("A", Side::Sell));
    assert_eq!((d.orders[1].symbol.as_str(), d.orders[1].side), ("A", Side::Buy));

    let reasons: Vec<_> = d.vetoes.iter().map(|v| (v.symbol.as_str(), v.reason.clone())).collect();
    assert_eq!(reasons.len(), 4);
    assert!(reasons.contains(&("B", VetoReason::NoOpenPosition)));
    assert!(reasons.contains(&("B", VetoReason::MissingVolatility { attr: "atr".into() })));
    assert!(reasons.contains(&("ZZZ", VetoReason::DataUnavailable)));
    assert!(reasons.contains(&("B", VetoReason::NonPositiveQuantity)));
}

#[test]
fn scenario_open_on_held_symbol_is_vetoed() {
    let mut ledger = ledger(100_000.0);
    ledger.apply(Fill::new(day(0), "A", 10, 10.0)).unwrap();
    let batch = SignalBatch::new(day(0), vec![Signal::open_short("A").with_attr("atr", 1.0)]);
    let d = gate().size(&batch, &ledger, &two_symbol_feed(), &InstrumentTable::default());
    assert!(d.orders.is_empty());
    assert_eq!(d.vetoes[0].reason, VetoReason::PositionAlreadyOpen);
}

#[test]
fn scenario_close_is_never_vetoed_for_capital() {
    let mut ledger = ledger(10_000.0);
    ledger.apply(Fill::new(day(0), "A", 990, 10.0)).unwrap();
    assert!(ledger.cash() < 100.0);

    let batch = SignalBatch::new(
        day(0),
        vec![Signal::close("A"), Signal::extend("A"), Signal::open_long("B").with_attr("atr", 0.01)],
    );
    let d = gate().size(&batch, &ledger, &two_symbol_feed(), &InstrumentTable::default());

    assert_eq!(d.orders.len(), 1);
    assert_eq!(d.orders[0].quantity, 990);
    // extend after a same-batch close has nothing to extend
    assert!(d
        .vetoes
        .iter()
        .any(|v| v.symbol == "A" && v.reason == VetoReason::NoOpenPosition));
    assert!(d
        .vetoes
        .iter()
        .any(|v| v.symbol == "B" && matches!(v.reason, VetoReason::InsufficientCapital { .. })));
}

#[test]
fn scenario_pre_tick_equity_policy_is_switchable() {
    let mut ledger = ledger(10_000.0);
    ledger.apply(Fill::new(day(0), "A", 900, 10.0)).unwrap();
    let batch = SignalBatch::new(
        day(0),
        vec![Signal::close("A"), Signal::open_long("B").with_attr("atr", 0.05)],
    );
    let feed = two_symbol_feed();
    let lots = InstrumentTable::default();

    // Pre-tick: the close does not free cash for the same-batch open.
    let pre = gate().size(&batch, &ledger, &feed, &lots);
    assert_eq!(pre.orders.len(), 1);
    assert!(matches!(
        pre.vetoes[0].reason,
        VetoReason::InsufficientCapital { .. }
    ));

    // Post-close projection: the open goes through.
    let mut cfg = SizingConfig::test_defaults();
    cfg.use_pre_tick_equity = false;
    let post = SizingGate::new(cfg).size(&batch, &ledger, &feed, &lots);
    assert!(post.vetoes.is_empty(), "{:?}", post.vetoes);
    assert_eq!(post.orders.len(), 2);
    assert_eq!(post.orders[1].symbol, "B");
    assert_eq!(post.orders[1].quantity, 99);
}

#[test]
fn scenario_confidence_orders_within_kind() {
    let batch = SignalBatch::new(
        day(0),
        vec![
            Signal::open_long("A").with_attr("atr", 1.0).with_confidence(0.2),
            Signal::open_long("B").with_attr("atr", 1.0).with_confidence(0.9),
        ],
    );
    let d = gate().size(&batch, &ledger(100_000.0), &two_symbol_feed(), &InstrumentTable::default());
    let syms: Vec<_> = d.orders.iter().map(|o| o.symbol.as_str()).collect();
    assert_eq!(syms, vec!["B", "A"]);
}

#[test]
fn scenario_batch_opens_share_one_cash_pool() {
    // 1% / 0.015 of 1000 -> 666 budget -> 66 shares @ 10, 666.6 reserved each.
    let mut bars = bars_with_atr("A", &[10.0, 10.0], 0.015);
    bars.extend(bars_with_atr("C", &[10.0, 10.0], 0.015));
    let feed = feed_at(bars, 1);
    let batch = SignalBatch::new(
        day(0),
        vec![
            Signal::open_long("A").with_attr("atr", 0.015),
            Signal::open_long("C").with_attr("atr", 0.015),
        ],
    );
    let ledger = ledger(1_000.0);

    let d = gate().size(&batch, &ledger, &feed, &InstrumentTable::default());

    assert_eq!(d.orders.len(), 1);
    assert_eq!(d.orders[0].symbol, "A");
    assert_eq!(d.orders[0].quantity, 66);
    assert_eq!(d.vetoes.len(), 1);
    assert_eq!(d.vetoes[0].symbol, "C");
    match &d.vetoes[0].reason {
        VetoReason::InsufficientCapital { required, available } => {
            assert!((required - 666.6).abs() < 1e-9);
            assert!((available - (1_000.0 - 666.6)).abs() < 1e-9);
        }
        other => panic!("unexpected veto {other:?}"),
    }
    let committed: f64 = d
        .orders
        .iter()
        .map(|o| ledger.required_capital(o.quantity, 10.0))
        .sum();
    assert!(committed <= ledger.cash());
}
