use chrono::{DateTime, TimeZone, Utc};
use ldk_portfolio::{marks, Fill, Ledger, LedgerConfig};

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 20, 0, 0).unwrap()
}

#[test]
fn scenario_levered_short_profits_when_price_falls() {
    let mut ledger = Ledger::new(LedgerConfig::new(50_000.0, 0.5, 0.0)).unwrap();

    // Sell short 1000 @ 10
    ledger
        .apply(Fill::new(ts(3), "SHRT", -1000, 10.0).with_commission(0.0))
        .unwrap();

    let pos = ledger.position("SHRT").unwrap();
    assert!(pos.is_short());
    assert_eq!(pos.deposit, 5_000.0);
    assert_eq!(pos.finance, -5_000.0);
    // deposit + 2 * |finance|
    assert_eq!(pos.dummy_cash, 15_000.0);
    assert_eq!(ledger.cash(), 45_000.0);

    // Valued at entry, the account is unchanged
    let at_entry = ledger.snapshot(ts(3), &marks([("SHRT", 10.0)]));
    assert_eq!(at_entry.total, 50_000.0);

    // Price falls: short gains 1000 * 2
    let marked = ledger.snapshot(ts(4), &marks([("SHRT", 8.0)]));
    assert_eq!(marked.total, 52_000.0);

    // Buy back 1000 @ 8
    ledger
        .apply(Fill::new(ts(4), "SHRT", 1000, 8.0).with_commission(0.0))
        .unwrap();
    assert!(ledger.is_flat());
    assert_eq!(ledger.cash(), 52_000.0);
    assert_eq!(ledger.realized_pnl(), 2_000.0);
}

#[test]
fn scenario_short_loses_when_price_rises() {
    let mut ledger = Ledger::new(LedgerConfig::new(50_000.0, 1.0, 0.0)).unwrap();
    ledger
        .apply(Fill::new(ts(3), "SHRT", -100, 50.0).with_commission(1.3))
        .unwrap();
    ledger
        .apply(Fill::new(ts(5), "SHRT", 100, 55.0).with_commission(1.3))
        .unwrap();
    assert!((ledger.cash() - (50_000.0 - 500.0 - 2.6)).abs() < 1e-9);
    assert!((ledger.realized_pnl() + 500.0).abs() < 1e-9);
}
