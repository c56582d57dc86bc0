//! Paper gains on the parcels still held.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::accounting::Parcel;
use crate::config::TaxConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnrealizedParcel {
    pub symbol: String,
    pub parcel_id: usize,
    pub acquired: NaiveDate,
    pub quantity: u64,
    pub unit_cost: Decimal,
    pub cost_base: Decimal,
    pub price: Decimal,
    pub market_value: Decimal,
    pub gain: Decimal,
    pub holding_days: i64,
    pub discount_eligible: bool,
    /// What the gain would count for if sold on the as-of date.
    pub after_discount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnrealizedSummary {
    pub parcels: Vec<UnrealizedParcel>,
    pub skipped_symbols: Vec<String>,
    pub market_value: Decimal,
    pub cost_base: Decimal,
    pub total_gain: Decimal,
    pub eligible_gain: Decimal,
    pub ineligible_gain: Decimal,
    pub projected_discounted_gain: Decimal,
}

/// Values each open parcel at `prices`. A symbol without a price is listed in
/// `skipped_symbols` and left out of every total.
pub fn unrealized_gains<'a, I>(
    parcels: I,
    prices: &HashMap<String, Decimal>,
    as_of: NaiveDate,
    tax: &TaxConfig,
) -> UnrealizedSummary
where
    I: IntoIterator<Item = &'a Parcel>,
{
    let mut summary = UnrealizedSummary::default();
    let mut skipped = BTreeSet::new();

    for parcel in parcels.into_iter().filter(|p| !p.is_closed()) {
        let price = match prices.get(&parcel.symbol) {
            Some(price) => *price,
            None => {
                skipped.insert(parcel.symbol.clone());
                continue;
            }
        };

        let market_value = price * Decimal::from(parcel.remaining_quantity);
        let gain = market_value - parcel.remaining_cost;
        let holding_days = parcel.holding_days(as_of);
        let discount_eligible = tax.is_discount_eligible(holding_days);
        let after_discount = tax.discounted(gain, discount_eligible);

        summary.market_value += market_value;
        summary.cost_base += parcel.remaining_cost;
        summary.total_gain += gain;
        if discount_eligible {
            summary.eligible_gain += gain;
        } else {
            summary.ineligible_gain += gain;
        }
        summary.projected_discounted_gain += after_discount;

        summary.parcels.push(UnrealizedParcel {
            symbol: parcel.symbol.clone(),
            parcel_id: parcel.id,
            acquired: parcel.acquired,
            quantity: parcel.remaining_quantity,
            unit_cost: parcel.unit_cost,
            cost_base: parcel.remaining_cost,
            price,
            market_value,
            gain,
            holding_days,
            discount_eligible,
            after_discount,
        });
    }

    summary.skipped_symbols = skipped.into_iter().collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parcel(id: usize, symbol: &str, acquired: NaiveDate, qty: u64, unit: Decimal) -> Parcel {
        let total = unit * Decimal::from(qty);
        Parcel {
            id,
            symbol: symbol.to_string(),
            source_tx: id as u64,
            acquired,
            original_quantity: qty,
            remaining_quantity: qty,
            unit_cost: unit,
            total_cost: total,
            remaining_cost: total,
        }
    }

    #[test]
    fn splits_gains_into_discount_buckets() {
        let as_of = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let parcels = vec![
            parcel(1, "CBA", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), 10, dec!(100)),
            parcel(2, "CBA", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 10, dec!(120)),
            parcel(3, "XRO", NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), 5, dec!(150)),
        ];
        let mut prices = HashMap::new();
        prices.insert("CBA".to_string(), dec!(130));
        prices.insert("XRO".to_string(), dec!(110));

        let summary = unrealized_gains(&parcels, &prices, as_of, &TaxConfig::default());

        assert_eq!(summary.parcels.len(), 3);
        // 300 eligible gain, 100 ineligible gain, -200 eligible loss
        assert_eq!(summary.eligible_gain, dec!(100));
        assert_eq!(summary.ineligible_gain, dec!(100));
        assert_eq!(summary.total_gain, dec!(200));
        // 150 + 100 - 200, the loss is not halved
        assert_eq!(summary.projected_discounted_gain, dec!(50));
        assert!(summary.skipped_symbols.is_empty());
    }

    #[test]
    fn missing_price_skips_symbol_only() {
        let as_of = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let parcels = vec![
            parcel(1, "CBA", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 10, dec!(100)),
            parcel(2, "NAB", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 10, dec!(30)),
        ];
        let mut prices = HashMap::new();
        prices.insert("CBA".to_string(), dec!(101));

        let summary = unrealized_gains(&parcels, &prices, as_of, &TaxConfig::default());
        assert_eq!(summary.parcels.len(), 1);
        assert_eq!(summary.total_gain, dec!(10));
        assert_eq!(summary.skipped_symbols, vec!["NAB".to_string()]);
    }
}
