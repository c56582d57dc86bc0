use asx_tax::accounting::reports::{self, FinancialYear};
use asx_tax::accounting::ParcelState;
use asx_tax::config::TaxConfig;
use asx_tax::{rebuild_from_ledger, Action, MatchingPolicy, Status, TaxError, Transaction};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn buy(id: u64, date: NaiveDate, symbol: &str, quantity: u64, price: Decimal, fee: Decimal) -> Transaction {
    Transaction::new(id, date, symbol, Action::Buy, quantity, price, fee)
}

fn sell(id: u64, date: NaiveDate, symbol: &str, quantity: u64, price: Decimal, fee: Decimal) -> Transaction {
    Transaction::new(id, date, symbol, Action::Sell, quantity, price, fee)
}

fn two_lots_then_sale() -> Vec<Transaction> {
    let day1 = day(2023, 1, 2);
    vec![
        buy(1, day1, "CBA", 100, dec!(10), dec!(0)),
        buy(2, day1 + Duration::days(99), "CBA", 100, dec!(12), dec!(0)),
        sell(3, day1 + Duration::days(199), "CBA", 50, dec!(15), dec!(0)),
    ]
}

#[test]
fn remaining_quantity_is_bought_minus_sold() {
    let ledger = vec![
        buy(1, day(2023, 7, 3), "BHP", 300, dec!(44.10), dec!(19.95)),
        buy(2, day(2023, 7, 3), "WES", 40, dec!(52.00), dec!(19.95)),
        sell(3, day(2023, 9, 14), "BHP", 120, dec!(46.00), dec!(19.95)),
        buy(4, day(2023, 11, 1), "BHP", 50, dec!(43.00), dec!(19.95)),
        sell(5, day(2024, 2, 20), "WES", 40, dec!(58.25), dec!(19.95)),
        sell(6, day(2024, 5, 2), "BHP", 200, dec!(45.50), dec!(19.95)),
        buy(7, day(2024, 6, 1), "BHP", 1000, dec!(40.00), dec!(19.95)).with_status(Status::Cancelled),
    ];
    let tax = TaxConfig::default();

    for method in [MatchingPolicy::Fifo, MatchingPolicy::Lifo] {
        let book = rebuild_from_ledger(&ledger, method, &tax).unwrap();
        assert_eq!(book.held_quantity("BHP"), 300 + 50 - 120 - 200);
        assert_eq!(book.held_quantity("WES"), 0);

        let sold: u64 = book.events_for("BHP").map(|e| e.quantity).sum();
        assert_eq!(sold, 320);
    }
}

#[test]
fn oversell_fails_without_a_partial_book() {
    let mut ledger = two_lots_then_sale();
    ledger.push(sell(4, day(2023, 9, 1), "CBA", 151, dec!(15), dec!(0)));
    let tax = TaxConfig::default();

    let err = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap_err();
    assert_eq!(
        err,
        TaxError::InsufficientParcels {
            symbol: "CBA".to_string(),
            date: day(2023, 9, 1),
            requested: 151,
            available: 150,
        }
    );
}

#[test]
fn sell_of_unheld_symbol_is_rejected() {
    let ledger = vec![sell(1, day(2024, 1, 5), "NAB", 10, dec!(30), dec!(0))];
    let tax = TaxConfig::default();
    match rebuild_from_ledger(&ledger, MatchingPolicy::Lifo, &tax) {
        Err(TaxError::InsufficientParcels { available, .. }) => assert_eq!(available, 0),
        other => panic!("expected insufficient parcels, got {:?}", other),
    }
}

#[test]
fn fifo_consumes_the_oldest_lot() {
    let tax = TaxConfig::default();
    let book = rebuild_from_ledger(&two_lots_then_sale(), MatchingPolicy::Fifo, &tax).unwrap();

    assert_eq!(book.events.len(), 1);
    let event = &book.events[0];
    assert_eq!(event.acquired, day(2023, 1, 2));
    assert_eq!(event.cost_base, dec!(500));
    assert_eq!(event.proceeds, dec!(750));
    assert_eq!(event.gross_gain, dec!(250));

    let parcels = &book.parcels["CBA"];
    assert_eq!(parcels[0].state(), ParcelState::PartiallyConsumed);
    assert_eq!(parcels[1].state(), ParcelState::Open);
}

#[test]
fn lifo_consumes_the_newest_lot() {
    let tax = TaxConfig::default();
    let book = rebuild_from_ledger(&two_lots_then_sale(), MatchingPolicy::Lifo, &tax).unwrap();

    let event = &book.events[0];
    assert_eq!(event.acquired, day(2023, 1, 2) + Duration::days(99));
    assert_eq!(event.cost_base, dec!(600));
    assert_eq!(event.method, MatchingPolicy::Lifo);

    let parcels = &book.parcels["CBA"];
    assert_eq!(parcels[0].remaining_quantity, 100);
    assert_eq!(parcels[1].remaining_quantity, 50);
}

#[test]
fn discount_starts_at_365_days() {
    let acquired = day(2023, 3, 1);
    let tax = TaxConfig::default();

    let held = |days: i64| {
        let ledger = vec![
            buy(1, acquired, "CSL", 10, dec!(280), dec!(0)),
            sell(2, acquired + Duration::days(days), "CSL", 10, dec!(300), dec!(0)),
        ];
        rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap().events[0].clone()
    };

    let eligible = held(365);
    assert_eq!(eligible.holding_days, 365);
    assert!(eligible.discount_eligible);
    assert_eq!(eligible.discounted_gain, dec!(100));

    let short = held(364);
    assert!(!short.discount_eligible);
    assert_eq!(short.discounted_gain, dec!(200));
}

#[test]
fn replay_is_deterministic() {
    let mut ledger = two_lots_then_sale();
    ledger.push(buy(4, day(2023, 1, 2), "TLS", 1000, dec!(4.37), dec!(19.95)));
    ledger.push(sell(5, day(2024, 3, 3), "TLS", 333, dec!(3.91), dec!(19.95)));
    ledger.reverse();
    let tax = TaxConfig::default();

    let first = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();
    let second = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn split_parcel_cost_adds_back_to_total() {
    let ledger = vec![
        buy(1, day(2024, 1, 10), "ANZ", 100, dec!(10.37), dec!(19.95)),
        sell(2, day(2024, 2, 10), "ANZ", 30, dec!(11), dec!(0)),
        sell(3, day(2024, 3, 10), "ANZ", 45, dec!(11.5), dec!(0)),
    ];
    let tax = TaxConfig::default();
    let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();

    let parcel = &book.parcels["ANZ"][0];
    assert_eq!(parcel.total_cost, dec!(1056.95));
    assert_eq!(parcel.remaining_quantity, 25);

    let consumed: Decimal = book.events.iter().map(|e| e.cost_base).sum();
    assert_eq!(consumed + parcel.remaining_cost, parcel.total_cost);
}

#[test]
fn one_sale_across_parcels_yields_an_event_each() {
    let ledger = vec![
        buy(1, day(2024, 1, 10), "MQG", 10, dec!(190), dec!(10)),
        buy(2, day(2024, 1, 11), "MQG", 10, dec!(195), dec!(10)),
        sell(3, day(2024, 4, 2), "MQG", 15, dec!(200), dec!(30)),
    ];
    let tax = TaxConfig::default();
    let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();

    assert_eq!(book.events.len(), 2);
    assert_eq!(book.events[0].quantity, 10);
    assert_eq!(book.events[0].cost_base, dec!(1910));
    assert_eq!(book.events[1].quantity, 5);
    assert_eq!(book.events[1].cost_base, dec!(980));

    let proceeds: Decimal = book.events.iter().map(|e| e.proceeds).sum();
    assert_eq!(proceeds, dec!(3000) - dec!(30));
    assert!(book.parcels["MQG"][0].is_closed());
}

#[test]
fn losses_keep_their_full_amount() {
    let ledger = vec![
        buy(1, day(2022, 5, 2), "QBE", 100, dec!(20), dec!(0)),
        sell(2, day(2023, 6, 5), "QBE", 100, dec!(15), dec!(0)),
    ];
    let tax = TaxConfig::default();
    let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();

    let event = &book.events[0];
    assert!(event.discount_eligible);
    assert_eq!(event.gross_gain, dec!(-500));
    assert_eq!(event.discounted_gain, dec!(-500));
}

#[test]
fn loss_carries_into_the_next_year() {
    let ledger = vec![
        buy(1, day(2022, 8, 1), "QBE", 100, dec!(15), dec!(0)),
        sell(2, day(2022, 9, 1), "QBE", 100, dec!(12), dec!(0)),
        buy(3, day(2022, 8, 1), "WOW", 100, dec!(10), dec!(0)),
        sell(4, day(2023, 9, 1), "WOW", 100, dec!(20), dec!(0)),
    ];
    let tax = TaxConfig::default();
    let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();

    let series = reports::report_series(
        &book.events,
        FinancialYear::new(2022).unwrap(),
        FinancialYear::new(2023).unwrap(),
        Decimal::ZERO,
        &tax,
    );
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].net_taxable_gain, dec!(0));
    assert_eq!(series[0].carried_forward_loss, dec!(300));

    assert_eq!(series[1].discounted_gains, dec!(500));
    assert_eq!(series[1].prior_loss_applied, dec!(300));
    assert_eq!(series[1].net_taxable_gain, dec!(200));
    assert_eq!(series[1].carried_forward_loss, dec!(0));
}
