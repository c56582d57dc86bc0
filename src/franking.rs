//! Franking credits on Australian dividends and the resident income tax
//! scale they offset.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::config::TaxConfig;

/// Franking percentage assumed for a ticker with no better information.
pub const DEFAULT_FRANKED_PCT: Decimal = dec!(50);

/// Typical franking level for well-known ASX tickers, as a percentage.
pub fn typical_franking_pct(symbol: &str) -> Decimal {
    match symbol {
        "CBA" | "WBC" | "ANZ" | "NAB" | "MQG" | "IAG" | "SUN" | "QBE" | "HLI" => dec!(100),
        "BHP" | "RIO" | "FMG" | "NCM" => dec!(100),
        "WOW" | "COL" | "WES" | "JBH" | "HVN" | "SUL" => dec!(100),
        "TLS" | "TPG" | "AGL" | "ORG" | "APA" => dec!(100),
        "COH" | "RHC" | "SHL" | "PME" | "TCL" | "ALL" | "BXB" => dec!(100),
        "WPL" | "STO" | "OSH" | "REA" | "CAR" | "SEK" => dec!(100),
        "AFI" | "ARG" | "MLT" | "WAM" | "WAX" => dec!(100),
        "VAS" | "IOZ" | "YMAX" => dec!(70),
        "SCG" | "GMG" | "VCX" | "BWP" | "CHC" => dec!(0),
        "CSL" | "XRO" | "APT" | "WTC" | "NXT" | "LNW" | "DTR" | "SDR" | "VTS" | "VEU" => dec!(0),
        _ => DEFAULT_FRANKED_PCT,
    }
}

/// Credit attached to `cash` dividends franked at `franked_pct` percent.
pub fn franking_credit(cash: Decimal, franked_pct: Decimal, company_tax_rate: Decimal) -> Decimal {
    if company_tax_rate >= Decimal::ONE {
        return Decimal::ZERO;
    }
    cash * (franked_pct / dec!(100)) * company_tax_rate / (Decimal::ONE - company_tax_rate)
}

pub fn marginal_rate(taxable_income: Decimal, tax: &TaxConfig) -> Decimal {
    tax.brackets
        .iter()
        .find(|b| b.threshold.map_or(true, |t| taxable_income <= t))
        .map(|b| b.rate)
        .unwrap_or(Decimal::ZERO)
}

/// Income tax on `taxable_income`, Medicare levy included once income passes
/// the levy threshold.
pub fn income_tax(taxable_income: Decimal, tax: &TaxConfig) -> Decimal {
    if taxable_income <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut total = Decimal::ZERO;
    let mut floor = Decimal::ZERO;
    for bracket in tax.brackets.iter() {
        match bracket.threshold {
            Some(threshold) if taxable_income > threshold => {
                total += (threshold - floor) * bracket.rate;
                floor = threshold;
            }
            _ => {
                total += (taxable_income - floor) * bracket.rate;
                break;
            }
        }
    }

    if taxable_income > tax.medicare_threshold {
        total += taxable_income * tax.medicare_levy_rate;
    }
    total
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendReceipt {
    pub symbol: String,
    pub paid_on: NaiveDate,
    pub cash_amount: Decimal,
    pub franked_pct: Decimal,
}

impl DividendReceipt {
    pub fn franking_credit(&self, tax: &TaxConfig) -> Decimal {
        franking_credit(self.cash_amount, self.franked_pct, tax.company_tax_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrankingSummary {
    pub cash_dividends: Decimal,
    pub franking_credits: Decimal,
    pub grossed_up_dividends: Decimal,
    pub marginal_rate: Decimal,
    /// Extra tax the dividends attract before the credit offset.
    pub tax_on_dividends: Decimal,
    /// Tax payable on the dividends after offsetting the credits; negative
    /// when the credits exceed it.
    pub net_tax_on_dividends: Decimal,
    /// Credits left over after the whole tax bill, paid out as a refund.
    pub refundable_credits: Decimal,
}

/// Works out what a year's dividends cost or return at tax time, on top of
/// `other_income`.
pub fn franking_summary(
    receipts: &[DividendReceipt],
    other_income: Decimal,
    tax: &TaxConfig,
) -> FrankingSummary {
    let cash_dividends: Decimal = receipts.iter().map(|r| r.cash_amount).sum();
    let franking_credits: Decimal = receipts.iter().map(|r| r.franking_credit(tax)).sum();
    let grossed_up = cash_dividends + franking_credits;

    let assessable = other_income + grossed_up;
    let tax_with_dividends = income_tax(assessable, tax);
    let tax_on_dividends = tax_with_dividends - income_tax(other_income, tax);

    FrankingSummary {
        cash_dividends,
        franking_credits,
        grossed_up_dividends: grossed_up,
        marginal_rate: marginal_rate(assessable, tax),
        tax_on_dividends,
        net_tax_on_dividends: tax_on_dividends - franking_credits,
        refundable_credits: (franking_credits - tax_with_dividends).max(Decimal::ZERO),
    }
}
