//! What-if views over the ledger: the CGT outcome of a sale before it is
//! recorded, open parcels ranked for realising a target gain, and the
//! portfolio-wide cash and value summary.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::accounting::calculation::rebuild_from_ledger;
use crate::accounting::positions::Position;
use crate::accounting::{CgtEvent, MatchingPolicy, ParcelBook};
use crate::config::TaxConfig;
use crate::error::TaxError;
use crate::ledger::{self, Action, Status, Transaction};

/// CGT events a sale would produce if it were added to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalePreview {
    pub symbol: String,
    pub date: NaiveDate,
    pub quantity: u64,
    pub sale_price: Decimal,
    pub fee: Decimal,
    pub method: MatchingPolicy,
    pub events: Vec<CgtEvent>,
    pub proceeds: Decimal,
    pub cost_base: Decimal,
    pub gross_gain: Decimal,
    pub discounted_gain: Decimal,
}

/// Replays `transactions` with `sale` appended and keeps only the events the
/// sale generated. The ledger itself is not modified. Any status on `sale`
/// is treated as executed.
pub fn preview_sale(
    transactions: &[Transaction],
    sale: &Transaction,
    method: MatchingPolicy,
    tax: &TaxConfig,
) -> Result<SalePreview, TaxError> {
    if sale.action != Action::Sell {
        return Err(TaxError::InvalidInput(format!(
            "only a sale can be previewed, got a {}",
            sale.action
        )));
    }
    let id = transactions
        .iter()
        .map(|t| t.id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| TaxError::InvalidInput("ledger ids exhausted".to_string()))?;

    let mut hypothetical = sale.clone().with_status(Status::Executed);
    hypothetical.id = id;
    let mut combined = transactions.to_vec();
    combined.push(hypothetical);

    let book = rebuild_from_ledger(&combined, method, tax)?;
    let events: Vec<CgtEvent> = book.events.into_iter().filter(|e| e.sale_tx == id).collect();

    let sum = |f: fn(&CgtEvent) -> Decimal| events.iter().map(f).sum::<Decimal>();
    Ok(SalePreview {
        symbol: sale.symbol.clone(),
        date: sale.date,
        quantity: sale.quantity,
        sale_price: sale.price,
        fee: sale.fee,
        method,
        proceeds: sum(|e| e.proceeds),
        cost_base: sum(|e| e.cost_base),
        gross_gain: sum(|e| e.gross_gain),
        discounted_gain: sum(|e| e.discounted_gain),
        events,
    })
}

/// One open parcel scored for a sale at a given price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcelSuggestion {
    pub parcel_id: usize,
    pub acquired: NaiveDate,
    pub available_quantity: u64,
    pub unit_cost: Decimal,
    pub gain_per_share: Decimal,
    pub holding_days: i64,
    pub discount_eligible: bool,
    /// Gain per share after the CGT discount, losses undiscounted.
    pub effective_gain_per_share: Decimal,
    /// Shares of this parcel whose discounted gain stays within the target.
    /// Capped at the parcel's holding; 0 when the parcel carries no gain.
    pub shares_for_target: Option<u64>,
}

/// Ranks the open parcels of `symbol` by taxable gain per share at `price`,
/// smallest first, so the cheapest parcels to sell come out on top.
pub fn suggest_sale(
    book: &ParcelBook,
    symbol: &str,
    price: Decimal,
    as_of: NaiveDate,
    target_gain: Option<Decimal>,
    tax: &TaxConfig,
) -> Vec<ParcelSuggestion> {
    let parcels = match book.parcels.get(symbol) {
        Some(parcels) => parcels,
        None => return Vec::new(),
    };

    let mut suggestions: Vec<ParcelSuggestion> = parcels
        .iter()
        .filter(|p| !p.is_closed())
        .map(|parcel| {
            let gain_per_share = price - parcel.unit_cost;
            let holding_days = parcel.holding_days(as_of);
            let discount_eligible = tax.is_discount_eligible(holding_days);
            let effective = tax.discounted(gain_per_share, discount_eligible);
            ParcelSuggestion {
                parcel_id: parcel.id,
                acquired: parcel.acquired,
                available_quantity: parcel.remaining_quantity,
                unit_cost: parcel.unit_cost,
                gain_per_share,
                holding_days,
                discount_eligible,
                effective_gain_per_share: effective,
                shares_for_target: target_gain
                    .map(|target| shares_within(target, effective, parcel.remaining_quantity)),
            }
        })
        .collect();

    suggestions.sort_by(|a, b| {
        a.effective_gain_per_share
            .cmp(&b.effective_gain_per_share)
            .then(a.parcel_id.cmp(&b.parcel_id))
    });
    suggestions
}

fn shares_within(target: Decimal, gain_per_share: Decimal, available: u64) -> u64 {
    if gain_per_share <= Decimal::ZERO || target <= Decimal::ZERO {
        return 0;
    }
    target
        .checked_div(gain_per_share)
        .and_then(|shares| shares.floor().to_u64())
        .unwrap_or(available)
        .min(available)
}

/// Cash, holdings and return across the whole portfolio.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub starting_cash: Decimal,
    pub cash_balance: Decimal,
    pub total_fees: Decimal,
    /// Cost base of every open parcel, priced or not.
    pub cost_base: Decimal,
    pub market_value: Decimal,
    pub unrealized_gain: Decimal,
    pub total_value: Decimal,
    /// Unrealized gain over the cost base of the priced holdings, in percent.
    pub return_pct: Decimal,
    pub unpriced_symbols: Vec<String>,
}

/// Buys draw `value + fee` from the cash balance and sells return
/// `value - fee`. Only executed transactions move cash.
pub fn portfolio_summary(
    transactions: &[Transaction],
    positions: &[Position],
    starting_cash: Decimal,
) -> Result<PortfolioSummary, TaxError> {
    let out_of_range = || TaxError::InvalidInput("cash balance out of range".to_string());

    let mut cash = starting_cash;
    let mut fees = Decimal::ZERO;
    for tx in transactions.iter().filter(|tx| tx.is_executed()) {
        tx.validate()?;
        let value = ledger::trade_value(tx.price, tx.quantity).ok_or_else(out_of_range)?;
        cash = match tx.action {
            Action::Buy => value.checked_add(tx.fee).and_then(|spent| cash.checked_sub(spent)),
            Action::Sell => value.checked_sub(tx.fee).and_then(|received| cash.checked_add(received)),
        }
        .ok_or_else(out_of_range)?;
        fees = fees.checked_add(tx.fee).ok_or_else(out_of_range)?;
    }

    let mut summary = PortfolioSummary {
        starting_cash,
        cash_balance: cash,
        total_fees: fees,
        ..PortfolioSummary::default()
    };
    let mut priced_cost = Decimal::ZERO;
    for position in positions {
        summary.cost_base += position.cost_base;
        match (position.market_value, position.unrealized_gain) {
            (Some(value), Some(gain)) => {
                summary.market_value += value;
                summary.unrealized_gain += gain;
                priced_cost += position.cost_base;
            }
            _ => summary.unpriced_symbols.push(position.symbol.clone()),
        }
    }

    summary.total_value = summary.market_value + summary.cash_balance;
    if priced_cost > Decimal::ZERO {
        summary.return_pct = (summary.unrealized_gain / priced_cost * Decimal::ONE_HUNDRED).round_dp(2);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::positions::positions;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn two_lots() -> Vec<Transaction> {
        vec![
            Transaction::new(1, day(2023, 1, 2), "CBA", Action::Buy, 100, dec!(10), dec!(0)),
            Transaction::new(2, day(2023, 4, 11), "CBA", Action::Buy, 100, dec!(12), dec!(0)),
        ]
    }

    #[test]
    fn preview_follows_the_matching_policy() {
        let ledger = two_lots();
        let sale = Transaction::new(0, day(2023, 7, 20), "CBA", Action::Sell, 50, dec!(15), dec!(0));
        let tax = TaxConfig::default();

        let fifo = preview_sale(&ledger, &sale, MatchingPolicy::Fifo, &tax).unwrap();
        assert_eq!(fifo.events.len(), 1);
        assert_eq!(fifo.cost_base, dec!(500));
        assert_eq!(fifo.proceeds, dec!(750));
        assert_eq!(fifo.gross_gain, dec!(250));

        let lifo = preview_sale(&ledger, &sale, MatchingPolicy::Lifo, &tax).unwrap();
        assert_eq!(lifo.cost_base, dec!(600));
        assert_eq!(lifo.gross_gain, dec!(150));
        assert_eq!(lifo.method, MatchingPolicy::Lifo);

        // the ledger still has only the two buys
        assert_eq!(ledger, two_lots());
    }

    #[test]
    fn preview_spans_parcels_and_splits_the_fee() {
        let ledger = two_lots();
        let sale = Transaction::new(0, day(2024, 2, 1), "CBA", Action::Sell, 150, dec!(14), dec!(30))
            .with_status(Status::Pending);
        let preview = preview_sale(&ledger, &sale, MatchingPolicy::Fifo, &TaxConfig::default()).unwrap();

        assert_eq!(preview.events.len(), 2);
        assert!(preview.events[0].discount_eligible);
        assert!(!preview.events[1].discount_eligible);
        assert_eq!(preview.proceeds, dec!(2100) - dec!(30));
        assert_eq!(preview.cost_base, dec!(1600));
        assert_eq!(preview.events[0].sale_tx, 3);
    }

    #[test]
    fn preview_ignores_earlier_sales_events() {
        let mut ledger = two_lots();
        ledger.push(Transaction::new(3, day(2023, 5, 1), "CBA", Action::Sell, 100, dec!(11), dec!(0)));
        let sale = Transaction::new(0, day(2023, 6, 1), "CBA", Action::Sell, 20, dec!(13), dec!(0));
        let preview = preview_sale(&ledger, &sale, MatchingPolicy::Fifo, &TaxConfig::default()).unwrap();

        assert_eq!(preview.events.len(), 1);
        assert_eq!(preview.cost_base, dec!(240));
        assert_eq!(preview.gross_gain, dec!(20));
    }

    #[test]
    fn preview_rejects_oversell_and_buys() {
        let ledger = two_lots();
        let tax = TaxConfig::default();

        let too_many = Transaction::new(0, day(2023, 7, 20), "CBA", Action::Sell, 201, dec!(15), dec!(0));
        assert!(matches!(
            preview_sale(&ledger, &too_many, MatchingPolicy::Fifo, &tax),
            Err(TaxError::InsufficientParcels { requested: 201, available: 200, .. })
        ));

        let buy = Transaction::new(0, day(2023, 7, 20), "CBA", Action::Buy, 1, dec!(15), dec!(0));
        assert!(matches!(
            preview_sale(&ledger, &buy, MatchingPolicy::Fifo, &tax),
            Err(TaxError::InvalidInput(_))
        ));
    }

    #[test]
    fn suggestions_rank_by_discounted_gain() {
        let acquired = day(2023, 1, 2);
        let ledger = vec![
            Transaction::new(1, acquired, "CSL", Action::Buy, 10, dec!(200), dec!(0)),
            Transaction::new(2, acquired + Duration::days(300), "CSL", Action::Buy, 10, dec!(250), dec!(0)),
            Transaction::new(3, acquired + Duration::days(310), "CSL", Action::Buy, 10, dec!(300), dec!(0)),
        ];
        let tax = TaxConfig::default();
        let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();
        let as_of = acquired + Duration::days(400);

        let ranked = suggest_sale(&book, "CSL", dec!(280), as_of, Some(dec!(100)), &tax);
        assert_eq!(ranked.len(), 3);

        // bought at 300: a loss, so nothing towards the target
        assert_eq!(ranked[0].parcel_id, 3);
        assert_eq!(ranked[0].effective_gain_per_share, dec!(-20));
        assert_eq!(ranked[0].shares_for_target, Some(0));

        // bought at 250, held under a year: full 30 a share
        assert_eq!(ranked[1].parcel_id, 2);
        assert!(!ranked[1].discount_eligible);
        assert_eq!(ranked[1].effective_gain_per_share, dec!(30));
        assert_eq!(ranked[1].shares_for_target, Some(3));

        // bought at 200, held over a year: 80 halved to 40
        assert_eq!(ranked[2].parcel_id, 1);
        assert!(ranked[2].discount_eligible);
        assert_eq!(ranked[2].effective_gain_per_share, dec!(40.0));
        assert_eq!(ranked[2].shares_for_target, Some(2));
    }

    #[test]
    fn target_is_capped_at_the_parcel() {
        let ledger = vec![Transaction::new(1, day(2024, 1, 2), "TLS", Action::Buy, 100, dec!(4), dec!(0))];
        let tax = TaxConfig::default();
        let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();

        let ranked = suggest_sale(&book, "TLS", dec!(4.5), day(2024, 6, 1), Some(dec!(1000)), &tax);
        assert_eq!(ranked[0].shares_for_target, Some(100));

        let untargeted = suggest_sale(&book, "TLS", dec!(4.5), day(2024, 6, 1), None, &tax);
        assert_eq!(untargeted[0].shares_for_target, None);
        assert!(suggest_sale(&book, "NAB", dec!(30), day(2024, 6, 1), None, &tax).is_empty());
    }

    #[test]
    fn summary_tracks_cash_through_trades() {
        let ledger = vec![
            Transaction::new(1, day(2024, 1, 2), "CBA", Action::Buy, 100, dec!(100), dec!(19.95)),
            Transaction::new(2, day(2024, 1, 3), "TLS", Action::Buy, 1000, dec!(4), dec!(19.95)),
            Transaction::new(3, day(2024, 3, 1), "CBA", Action::Sell, 50, dec!(110), dec!(19.95)),
            Transaction::new(4, day(2024, 3, 2), "NAB", Action::Buy, 10, dec!(30), dec!(19.95))
                .with_status(Status::Cancelled),
        ];
        let tax = TaxConfig::default();
        let book = rebuild_from_ledger(&ledger, MatchingPolicy::Fifo, &tax).unwrap();
        let mut prices = HashMap::new();
        prices.insert("CBA".to_string(), dec!(120));
        let held = positions(&book, &prices);

        let summary = portfolio_summary(&ledger, &held, dec!(25000)).unwrap();
        assert_eq!(summary.cash_balance, dec!(25000) - dec!(10019.95) - dec!(4019.95) + dec!(5480.05));
        assert_eq!(summary.total_fees, dec!(59.85));
        assert_eq!(summary.market_value, dec!(6000));
        assert_eq!(summary.unrealized_gain, dec!(6000) - dec!(5009.975));
        assert_eq!(summary.total_value, summary.market_value + summary.cash_balance);
        assert_eq!(summary.return_pct, dec!(19.76));
        assert_eq!(summary.unpriced_symbols, vec!["TLS".to_string()]);
        assert_eq!(summary.cost_base, dec!(5009.975) + dec!(4019.95));
    }

    #[test]
    fn summary_of_empty_ledger_is_all_cash() {
        let summary = portfolio_summary(&[], &[], dec!(25000)).unwrap();
        assert_eq!(summary.cash_balance, dec!(25000));
        assert_eq!(summary.total_value, dec!(25000));
        assert_eq!(summary.return_pct, Decimal::ZERO);
    }
}
