use std::io::Read;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::BrokerageSchedule;
use crate::error::ParseError;
use crate::ledger::{self, Action, Status, Transaction};

/// Reads broker statements shaped `Date,Stock,Action,Quantity,Price[,Fees][,Status]`.
pub struct Parser<'a> {
    brokerage: &'a BrokerageSchedule,
}

impl<'a> Parser<'a> {
    pub fn new(brokerage: &'a BrokerageSchedule) -> Parser<'a> {
        Parser { brokerage }
    }

    pub fn parse_sheet(&self, path: impl AsRef<Path>) -> Result<Vec<Transaction>, ParseError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        let transactions = self.parse_records(reader)?;
        info!("read {} transactions from {}", transactions.len(), path.as_ref().display());
        Ok(transactions)
    }

    pub fn parse_reader<R: Read>(&self, input: R) -> Result<Vec<Transaction>, ParseError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(input);
        self.parse_records(reader)
    }

    fn parse_records<R: Read>(&self, mut reader: csv::Reader<R>) -> Result<Vec<Transaction>, ParseError> {
        let mut transactions = Vec::new();
        for (i, result) in reader.deserialize::<TransactionRecord>().enumerate() {
            let row = i + 1;
            let record = result.map_err(|e| ParseError::Row {
                row,
                reason: e.to_string(),
            })?;
            transactions.push(self.parse_row(row, record)?);
        }
        Ok(transactions)
    }

    fn parse_row(&self, row: usize, record: TransactionRecord) -> Result<Transaction, ParseError> {
        let invalid = |e: crate::error::TaxError| ParseError::Row {
            row,
            reason: e.to_string(),
        };

        let date = ledger::parse_date(&record.date).map_err(invalid)?;
        let action: Action = record.action.parse().map_err(invalid)?;
        let status = match record.status.as_deref() {
            Some(s) => s.parse().map_err(invalid)?,
            None => Status::Executed,
        };

        let trade_value = ledger::trade_value(record.price, record.quantity).ok_or_else(|| ParseError::Row {
            row,
            reason: format!("{} x {} is too large", record.quantity, record.price),
        })?;
        let fee = match record.fees {
            Some(fee) => fee,
            None => {
                let fee = self.brokerage.fee_for(trade_value);
                debug!("row {}: no fee given, charging {}", row, fee);
                fee
            }
        };

        let tx = Transaction::new(row as u64, date, &record.stock, action, record.quantity, record.price, fee)
            .with_status(status);
        tx.validate().map_err(invalid)?;
        Ok(tx)
    }
}

#[derive(Debug, Deserialize)]
struct TransactionRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Stock")]
    stock: String,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Quantity")]
    quantity: u64,
    #[serde(rename = "Price")]
    price: Decimal,
    #[serde(rename = "Fees", default)]
    fees: Option<Decimal>,
    #[serde(rename = "Status", default)]
    status: Option<String>,
}
