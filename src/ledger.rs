//! Buy/sell records as they come out of the ledger store.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TaxError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl FromStr for Action {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Action::Buy),
            "sell" | "s" => Ok(Action::Sell),
            _ => Err(TaxError::InvalidInput(format!("'{}' is not a valid action", s))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Executed,
    Pending,
    Cancelled,
}

impl FromStr for Status {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "executed" | "" => Ok(Status::Executed),
            "pending" => Ok(Status::Pending),
            "cancelled" | "canceled" => Ok(Status::Cancelled),
            _ => Err(TaxError::InvalidInput(format!("'{}' is not a valid status", s))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Executed => write!(f, "executed"),
            Status::Pending => write!(f, "pending"),
            Status::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A recorded trade. Immutable once stored; `id` is the insertion sequence
/// and breaks ties between trades on the same date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub date: NaiveDate,
    pub symbol: String,
    pub action: Action,
    pub quantity: u64,
    pub price: Decimal,
    pub fee: Decimal,
    pub status: Status,
}

impl Transaction {
    pub fn new(
        id: u64,
        date: NaiveDate,
        symbol: &str,
        action: Action,
        quantity: u64,
        price: Decimal,
        fee: Decimal,
    ) -> Transaction {
        Transaction {
            id,
            date,
            symbol: symbol.trim().to_ascii_uppercase(),
            action,
            quantity,
            price,
            fee,
            status: Status::Executed,
        }
    }

    pub fn with_status(mut self, status: Status) -> Transaction {
        self.status = status;
        self
    }

    pub fn is_executed(&self) -> bool {
        self.status == Status::Executed
    }

    /// Gross trade value before brokerage. Only safe on a transaction that
    /// passed `validate`.
    pub fn value(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub fn validate(&self) -> Result<(), TaxError> {
        let reject = |reason: &str| {
            Err(TaxError::InvalidInput(format!(
                "transaction #{} ({} {} on {}): {}",
                self.id, self.action, self.symbol, self.date, reason
            )))
        };
        if self.symbol.is_empty() {
            return reject("missing symbol");
        }
        if self.quantity == 0 {
            return reject("quantity must be positive");
        }
        if self.price <= Decimal::ZERO {
            return reject("price must be positive");
        }
        if self.fee < Decimal::ZERO {
            return reject("fee cannot be negative");
        }
        let total = trade_value(self.price, self.quantity).and_then(|v| v.checked_add(self.fee));
        if total.is_none() {
            return reject("trade value is too large");
        }
        Ok(())
    }
}

/// `price * quantity`, or `None` when it does not fit in a `Decimal`.
pub fn trade_value(price: Decimal, quantity: u64) -> Option<Decimal> {
    price.checked_mul(Decimal::from(quantity))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, TaxError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| TaxError::InvalidInput(format!("'{}' is not a YYYY-MM-DD date", s)))
}
