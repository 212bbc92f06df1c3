//! Cash conservation across mixed long/short, levered, interest-bearing fill
//! sequences: at every snapshot
//! total == initial + realized pnl - commission - interest + open unrealized pnl,
//! which collapses to the realized identity whenever the book is flat.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ldk_portfolio::{Fill, Ledger, LedgerConfig, LedgerError, MarkMap};

const INITIAL: f64 = 250_000.0;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 2, 21, 0, 0).unwrap()
}

/// Unrealized pnl of every open position at its own marks.
fn unrealized(ledger: &Ledger, marks: &MarkMap) -> f64 {
    ledger
        .positions()
        .values()
        .map(|p| {
            let mark = marks[&p.symbol];
            p.fills.iter().map(|f| f.quantity as f64 * (mark - f.price)).sum::<f64>()
        })
        .sum()
}

fn assert_conserved(ledger: &mut Ledger, at: DateTime<Utc>, marks: &MarkMap) {
    let snap = ledger.snapshot(at, marks);
    let expected = INITIAL + ledger.realized_pnl() - ledger.commission() - ledger.interest()
        + unrealized(ledger, marks);
    assert!(
        (snap.total - expected).abs() < 1e-6,
        "total={} expected={}",
        snap.total,
        expected
    );
    assert!((snap.total - ledger.total(marks)).abs() < 1e-9);
}

#[test]
fn scenario_cash_conserved_over_mixed_sequence() {
    let mut ledger = Ledger::new(LedgerConfig::new(INITIAL, 0.4, 0.0002)).unwrap();

    // (day offset, symbol, qty, price)
    let script: &[(i64, &str, i64, f64)] = &[
        (0, "AAA", 200, 50.0),
        (0, "BBB", -300, 20.0),
        (2, "AAA", 200, 53.0),
        (3, "AAA", -100, 54.0), // lighten: rejected
        (5, "BBB", 300, 18.5),
        (6, "CCC", -50, 400.0),
        (9, "AAA", -400, 49.0),
        (11, "CCC", -50, 390.0),
        (20, "CCC", 100, 420.0),
        (21, "AAA", 700, 47.25),
    ];

    let mut marks = MarkMap::new();
    for &(day, sym, qty, px) in script {
        let at = t0() + Duration::days(day);
        marks.insert(sym.to_string(), px);
        match ledger.apply(Fill::new(at, sym, qty, px)) {
            Ok(()) => {}
            Err(LedgerError::LightenNotAllowed { .. }) => assert_eq!(day, 3),
            Err(other) => panic!("unexpected rejection: {other}"),
        }
        assert_conserved(&mut ledger, at, &marks);

        // re-mark everything up 1% and check again
        let bumped: MarkMap = marks.iter().map(|(s, p)| (s.clone(), p * 1.01)).collect();
        assert_conserved(&mut ledger, at, &bumped);
    }

    assert!(ledger.interest() > 0.0);
    assert_eq!(ledger.position("AAA").map(|p| p.quantity), Some(700));
    ledger.verify_integrity().unwrap();
}

#[test]
fn scenario_flat_book_total_is_realized_identity() {
    let mut ledger = Ledger::new(LedgerConfig::new(INITIAL, 0.25, 0.001)).unwrap();
    let open = t0();
    let close = t0() + Duration::days(10);
    ledger.apply(Fill::new(open, "AAA", 1000, 30.0)).unwrap();
    ledger.apply(Fill::new(open, "BBB", -1000, 30.0)).unwrap();
    ledger.apply(Fill::new(close, "AAA", -1000, 33.0)).unwrap();
    ledger.apply(Fill::new(close, "BBB", 1000, 33.0)).unwrap();
    assert!(ledger.is_flat());

    let snap = ledger.snapshot(close, &MarkMap::new());
    let expected = INITIAL + ledger.realized_pnl() - ledger.commission() - ledger.interest();
    assert!((snap.total - expected).abs() < 1e-6);
    assert!(ledger.realized_pnl().abs() < 1e-9);
    // 2 legs * 30000 * 0.75 * 0.001 * 10 days
    assert!((ledger.interest() - 450.0).abs() < 1e-6);
}
