use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use csv::Writer;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use tracing::info;

use crate::accounting::CgtEvent;
use crate::config::TaxConfig;
use crate::error::{ParseError, TaxError};

/// Australian financial year, 1 July `start_year` to 30 June the year after.
/// Only years whose bounds are representable dates can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FinancialYear {
    start_year: i32,
    start: NaiveDate,
    end: NaiveDate,
}

impl FinancialYear {
    pub fn new(start_year: i32) -> Result<FinancialYear, TaxError> {
        let out_of_range =
            || TaxError::InvalidInput(format!("financial year starting {} is out of range", start_year));
        let start = NaiveDate::from_ymd_opt(start_year, 7, 1).ok_or_else(out_of_range)?;
        let end_year = start_year.checked_add(1).ok_or_else(out_of_range)?;
        let end = NaiveDate::from_ymd_opt(end_year, 7, 1).ok_or_else(out_of_range)?;
        Ok(FinancialYear { start_year, start, end })
    }

    pub fn containing(date: NaiveDate) -> Result<FinancialYear, TaxError> {
        if date.month() >= 7 {
            FinancialYear::new(date.year())
        } else {
            FinancialYear::new(date.year() - 1)
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// First day of the year (inclusive).
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day of the following year (exclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn next(&self) -> Result<FinancialYear, TaxError> {
        FinancialYear::new(self.end.year())
    }

    pub fn previous(&self) -> Result<FinancialYear, TaxError> {
        let year = self
            .start_year
            .checked_sub(1)
            .ok_or_else(|| TaxError::InvalidInput("no financial year before this one".to_string()))?;
        FinancialYear::new(year)
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end.year())
    }
}

impl Serialize for FinancialYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for FinancialYear {
    type Err = TaxError;

    /// Accepts `2025-2026`, `2025-26` and `FY2026`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TaxError::InvalidInput(format!("'{}' is not a financial year", s));
        let s = s.trim();

        if let Some(end) = s.strip_prefix("FY").or_else(|| s.strip_prefix("fy")) {
            let end: i32 = end.parse().map_err(|_| invalid())?;
            let start = end.checked_sub(1).ok_or_else(invalid)?;
            return FinancialYear::new(start).map_err(|_| invalid());
        }

        let (first, second) = s.split_once('-').ok_or_else(invalid)?;
        let start: i32 = first.parse().map_err(|_| invalid())?;
        let end: i32 = second.parse().map_err(|_| invalid())?;
        let next = start.checked_add(1).ok_or_else(invalid)?;
        let expected = match second.len() {
            2 => next.rem_euclid(100),
            4 => next,
            _ => return Err(invalid()),
        };
        if end != expected {
            return Err(invalid());
        }
        FinancialYear::new(start).map_err(|_| invalid())
    }
}

/// Aggregated CGT position for one financial year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualReport {
    pub financial_year: FinancialYear,
    pub event_count: usize,
    pub gross_gains: Decimal,
    /// Sum of losses, as a positive amount.
    pub gross_losses: Decimal,
    pub discount_eligible_gains: Decimal,
    pub discount_amount: Decimal,
    pub discounted_gains: Decimal,
    pub prior_loss_available: Decimal,
    pub prior_loss_applied: Decimal,
    pub net_taxable_gain: Decimal,
    /// Loss available to offset gains in the following year.
    pub carried_forward_loss: Decimal,
}

/// Summarises the events disposed within `fy`.
///
/// `prior_carried_loss` is the `carried_forward_loss` of the previous year's
/// report; pass zero for the first year on record.
pub fn annual_report(
    events: &[CgtEvent],
    fy: FinancialYear,
    prior_carried_loss: Decimal,
    tax: &TaxConfig,
) -> AnnualReport {
    let mut event_count = 0;
    let mut gross_gains = Decimal::ZERO;
    let mut gross_losses = Decimal::ZERO;
    let mut discount_eligible_gains = Decimal::ZERO;
    let mut discounted_gains = Decimal::ZERO;

    for event in events.iter().filter(|e| fy.contains(e.disposed)) {
        event_count += 1;
        if event.gross_gain > Decimal::ZERO {
            gross_gains += event.gross_gain;
            if event.discount_eligible {
                discount_eligible_gains += event.gross_gain;
            }
            discounted_gains += tax.discounted(event.gross_gain, event.discount_eligible);
        } else {
            gross_losses += event.gross_gain.abs();
        }
    }

    let prior = prior_carried_loss.max(Decimal::ZERO);
    let current_year_net = discounted_gains - gross_losses;
    let net = current_year_net - prior;
    let prior_loss_applied = if current_year_net > Decimal::ZERO {
        prior.min(current_year_net)
    } else {
        Decimal::ZERO
    };

    AnnualReport {
        financial_year: fy,
        event_count,
        gross_gains,
        gross_losses,
        discount_eligible_gains,
        discount_amount: gross_gains - discounted_gains,
        discounted_gains,
        prior_loss_available: prior,
        prior_loss_applied,
        net_taxable_gain: net.max(Decimal::ZERO),
        carried_forward_loss: (-net).max(Decimal::ZERO),
    }
}

/// Reports every year from `first` to `last` inclusive, threading the
/// carried-forward loss from each year into the next.
pub fn report_series(
    events: &[CgtEvent],
    first: FinancialYear,
    last: FinancialYear,
    opening_loss: Decimal,
    tax: &TaxConfig,
) -> Vec<AnnualReport> {
    let mut reports = Vec::new();
    let mut carried = opening_loss;
    let mut fy = first;
    while fy <= last {
        let report = annual_report(events, fy, carried, tax);
        carried = report.carried_forward_loss;
        reports.push(report);
        fy = match fy.next() {
            Ok(next) => next,
            Err(_) => break,
        };
    }
    reports
}

#[derive(Debug, Serialize)]
struct CgtEventRecord<'a> {
    financial_year: String,
    symbol: &'a str,
    acquired: NaiveDate,
    disposed: NaiveDate,
    quantity: u64,
    sale_price: Decimal,
    proceeds: Decimal,
    cost_base: Decimal,
    holding_days: i64,
    discount_eligible: bool,
    gross_gain: Decimal,
    discounted_gain: Decimal,
    method: String,
}

pub struct CapitalGainsReport<'a> {
    records: &'a [CgtEvent],
}

impl<'a> CapitalGainsReport<'a> {
    pub fn new(records: &'a [CgtEvent]) -> CapitalGainsReport<'a> {
        CapitalGainsReport { records }
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ParseError> {
        let writer = Writer::from_path(path.as_ref())?;
        self.write(writer)?;
        info!("wrote {} CGT events to {}", self.records.len(), path.as_ref().display());
        Ok(())
    }

    pub fn write<W: std::io::Write>(&self, mut writer: Writer<W>) -> Result<(), ParseError> {
        for (i, event) in self.records.iter().enumerate() {
            let financial_year = FinancialYear::containing(event.disposed).map_err(|e| ParseError::Row {
                row: i + 1,
                reason: e.to_string(),
            })?;
            writer.serialize(CgtEventRecord {
                financial_year: financial_year.to_string(),
                symbol: &event.symbol,
                acquired: event.acquired,
                disposed: event.disposed,
                quantity: event.quantity,
                sale_price: event.sale_price,
                proceeds: event.proceeds.round_dp(2),
                cost_base: event.cost_base.round_dp(2),
                holding_days: event.holding_days,
                discount_eligible: event.discount_eligible,
                gross_gain: event.gross_gain.round_dp(2),
                discounted_gain: event.discounted_gain.round_dp(2),
                method: event.method.to_string(),
            })?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
