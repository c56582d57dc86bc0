use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::accounting::ParcelBook;

/// Current holding in one symbol, summed over its open parcels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub cost_base: Decimal,
    pub avg_cost: Decimal,
    pub price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_gain: Option<Decimal>,
}

pub fn positions(book: &ParcelBook, prices: &HashMap<String, Decimal>) -> Vec<Position> {
    book.parcels
        .iter()
        .filter_map(|(symbol, parcels)| {
            let open = parcels.iter().filter(|p| !p.is_closed());
            let (quantity, cost_base) = open.fold((0u64, Decimal::ZERO), |(q, c), p| {
                (q + p.remaining_quantity, c + p.remaining_cost)
            });
            if quantity == 0 {
                return None;
            }

            let price = prices.get(symbol).copied();
            let market_value = price.map(|p| p * Decimal::from(quantity));
            Some(Position {
                symbol: symbol.clone(),
                quantity,
                cost_base,
                avg_cost: (cost_base / Decimal::from(quantity)).round_dp(4),
                price,
                market_value,
                unrealized_gain: market_value.map(|v| v - cost_base),
            })
        })
        .collect()
}
