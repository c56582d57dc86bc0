pub mod accountant;
pub mod calculation;
pub mod planning;
pub mod positions;
pub mod reports;
pub mod unrealized;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TaxError;

/// Which open parcel a disposal draws down first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchingPolicy {
    #[serde(rename = "FIFO", alias = "fifo")]
    Fifo,
    #[serde(rename = "LIFO", alias = "lifo")]
    Lifo,
}

impl FromStr for MatchingPolicy {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(MatchingPolicy::Fifo),
            "LIFO" => Ok(MatchingPolicy::Lifo),
            _ => Err(TaxError::InvalidInput(format!("unknown matching policy '{}'", s))),
        }
    }
}

impl fmt::Display for MatchingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchingPolicy::Fifo => write!(f, "FIFO"),
            MatchingPolicy::Lifo => write!(f, "LIFO"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ParcelState {
    Open,
    PartiallyConsumed,
    Closed,
}

/// A lot of shares acquired by one buy. Only `remaining_quantity` and
/// `remaining_cost` change after creation, and both only decrease.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parcel {
    pub id: usize,
    pub symbol: String,
    pub source_tx: u64,
    pub acquired: NaiveDate,
    pub original_quantity: u64,
    pub remaining_quantity: u64,
    /// (price * quantity + fee) / quantity
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub remaining_cost: Decimal,
}

impl Parcel {
    pub fn state(&self) -> ParcelState {
        if self.remaining_quantity == 0 {
            ParcelState::Closed
        } else if self.remaining_quantity < self.original_quantity {
            ParcelState::PartiallyConsumed
        } else {
            ParcelState::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.remaining_quantity == 0
    }

    pub fn holding_days(&self, on: NaiveDate) -> i64 {
        on.signed_duration_since(self.acquired).num_days()
    }
}

/// One disposal of shares out of one parcel. A sell spanning several
/// parcels produces one event per parcel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CgtEvent {
    pub symbol: String,
    pub parcel_id: usize,
    pub sale_tx: u64,
    pub quantity: u64,
    pub acquired: NaiveDate,
    pub disposed: NaiveDate,
    pub sale_price: Decimal,
    pub proceeds: Decimal,
    pub cost_base: Decimal,
    pub holding_days: i64,
    pub discount_eligible: bool,
    pub gross_gain: Decimal,
    pub discounted_gain: Decimal,
    pub method: MatchingPolicy,
}

/// Derived state of a full ledger replay: every parcel ever created, grouped
/// by symbol in acquisition order, and the CGT events in disposal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParcelBook {
    pub parcels: BTreeMap<String, Vec<Parcel>>,
    pub events: Vec<CgtEvent>,
}

impl ParcelBook {
    pub fn open_parcels(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.values().flatten().filter(|p| !p.is_closed())
    }

    pub fn held_quantity(&self, symbol: &str) -> u64 {
        self.parcels
            .get(symbol)
            .map(|ps| ps.iter().map(|p| p.remaining_quantity).sum())
            .unwrap_or(0)
    }

    pub fn events_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a CgtEvent> + 'a {
        self.events.iter().filter(move |e| e.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.parcels.keys().map(String::as_str)
    }
}

/// `amount * part / whole` for `part <= whole`. Multiplies first to keep
/// exact cents, and scales by the ratio instead when the product would not
/// fit in a `Decimal`.
pub(crate) fn pro_rata(amount: Decimal, part: u64, whole: u64) -> Decimal {
    let (part, whole) = (Decimal::from(part), Decimal::from(whole));
    match amount.checked_mul(part) {
        Some(scaled) => scaled / whole,
        None => amount * (part / whole),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pro_rata_survives_huge_quantities() {
        assert_eq!(pro_rata(dec!(100), 1, 4), dec!(25));
        assert_eq!(pro_rata(dec!(1020), 30, 100), dec!(306));

        let share = pro_rata(Decimal::MAX, u64::MAX - 1, u64::MAX);
        assert!(share > Decimal::ZERO);
        assert!(share <= Decimal::MAX);
    }

    fn parcel(original: u64, remaining: u64) -> Parcel {
        Parcel {
            id: 0,
            symbol: "BHP".to_string(),
            source_tx: 1,
            acquired: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            original_quantity: original,
            remaining_quantity: remaining,
            unit_cost: dec!(40),
            total_cost: dec!(4000),
            remaining_cost: dec!(40) * Decimal::from(remaining),
        }
    }

    #[test]
    fn parcel_state_follows_remaining_quantity() {
        assert_eq!(parcel(100, 100).state(), ParcelState::Open);
        assert_eq!(parcel(100, 1).state(), ParcelState::PartiallyConsumed);
        assert_eq!(parcel(100, 0).state(), ParcelState::Closed);
    }

    #[test]
    fn matching_policy_parses_case_insensitively() {
        assert_eq!("fifo".parse::<MatchingPolicy>().unwrap(), MatchingPolicy::Fifo);
        assert_eq!("LIFO".parse::<MatchingPolicy>().unwrap(), MatchingPolicy::Lifo);
        assert!(matches!(
            "HIFO".parse::<MatchingPolicy>(),
            Err(TaxError::InvalidInput(_))
        ));
    }
}
