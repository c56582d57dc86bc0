use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use crate::accounting::calculation;
use crate::accounting::planning::{self, ParcelSuggestion, PortfolioSummary, SalePreview};
use crate::accounting::positions::{self, Position};
use crate::accounting::reports::{self, AnnualReport, FinancialYear};
use crate::accounting::unrealized::{self, UnrealizedSummary};
use crate::accounting::{MatchingPolicy, ParcelBook};
use crate::config::TaxConfig;
use crate::error::TaxError;
use crate::ledger::Transaction;

/// Entry point bundling a matching policy with one tax-year configuration.
pub struct Accountant<'a> {
    accounting_method: MatchingPolicy,
    tax: &'a TaxConfig,
}

impl<'a> Accountant<'a> {
    pub fn new(tax: &'a TaxConfig) -> Accountant<'a> {
        Accountant {
            accounting_method: MatchingPolicy::Fifo,
            tax,
        }
    }

    pub fn method(&mut self, method: MatchingPolicy) -> &mut Accountant<'a> {
        self.accounting_method = method;
        self
    }

    pub fn accounting_method(&self) -> MatchingPolicy {
        self.accounting_method
    }

    pub fn rebuild(&self, transactions: &[Transaction]) -> Result<ParcelBook, TaxError> {
        let book = calculation::rebuild_from_ledger(transactions, self.accounting_method, self.tax)?;
        info!(
            "replayed {} transactions ({}): {} symbols, {} CGT events",
            transactions.len(),
            self.accounting_method,
            book.parcels.len(),
            book.events.len()
        );
        Ok(book)
    }

    pub fn unrealized(
        &self,
        book: &ParcelBook,
        prices: &HashMap<String, Decimal>,
        as_of: NaiveDate,
    ) -> UnrealizedSummary {
        unrealized::unrealized_gains(book.open_parcels(), prices, as_of, self.tax)
    }

    pub fn positions(&self, book: &ParcelBook, prices: &HashMap<String, Decimal>) -> Vec<Position> {
        positions::positions(book, prices)
    }

    pub fn preview_sale(&self, transactions: &[Transaction], sale: &Transaction) -> Result<SalePreview, TaxError> {
        planning::preview_sale(transactions, sale, self.accounting_method, self.tax)
    }

    pub fn suggest_sale(
        &self,
        book: &ParcelBook,
        symbol: &str,
        price: Decimal,
        as_of: NaiveDate,
        target_gain: Option<Decimal>,
    ) -> Vec<ParcelSuggestion> {
        planning::suggest_sale(book, symbol, price, as_of, target_gain, self.tax)
    }

    pub fn portfolio_summary(
        &self,
        transactions: &[Transaction],
        book: &ParcelBook,
        prices: &HashMap<String, Decimal>,
        starting_cash: Decimal,
    ) -> Result<PortfolioSummary, TaxError> {
        planning::portfolio_summary(transactions, &self.positions(book, prices), starting_cash)
    }

    /// Report for `fy`. Without an explicit prior loss, the carried-forward
    /// loss is derived by replaying every earlier year in the book.
    pub fn annual_report(
        &self,
        book: &ParcelBook,
        fy: FinancialYear,
        prior_carried_loss: Option<Decimal>,
    ) -> AnnualReport {
        let prior = match prior_carried_loss {
            Some(loss) => loss,
            None => {
                let first = book
                    .events
                    .iter()
                    .filter_map(|e| FinancialYear::containing(e.disposed).ok())
                    .min();
                match (first, fy.previous()) {
                    (Some(first), Ok(last)) if first <= last => {
                        reports::report_series(&book.events, first, last, Decimal::ZERO, self.tax)
                            .last()
                            .map(|r| r.carried_forward_loss)
                            .unwrap_or(Decimal::ZERO)
                    }
                    _ => Decimal::ZERO,
                }
            }
        };
        reports::annual_report(&book.events, fy, prior, self.tax)
    }
}
