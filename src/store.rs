//! SQLite storage for the transaction ledger, quote history and dividends.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::franking::DividendReceipt;
use crate::ledger::{Action, Status, Transaction, DATE_FORMAT};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    symbol TEXT NOT NULL,
    action TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    price TEXT NOT NULL,
    fee TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    price TEXT NOT NULL,
    source TEXT NOT NULL,
    UNIQUE(symbol, date)
);
CREATE TABLE IF NOT EXISTS dividends (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    paid_on TEXT NOT NULL,
    cash_amount TEXT NOT NULL,
    franked_pct TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS api_usage (
    date TEXT PRIMARY KEY,
    calls INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date, id);
";

/// A quote as kept in `price_history`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrice {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub source: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        let store = Store { conn };
        store.init()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Appends a trade and returns its ledger id. The id on `tx` is ignored.
    pub fn insert_transaction(&self, tx: &Transaction) -> Result<u64, StoreError> {
        let quantity = stored_quantity(tx)?;
        self.conn.execute(
            "INSERT INTO transactions (date, symbol, action, quantity, price, fee, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tx.date.format(DATE_FORMAT).to_string(),
                tx.symbol,
                tx.action.to_string(),
                quantity,
                tx.price.to_string(),
                tx.fee.to_string(),
                tx.status.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid() as u64)
    }

    /// Inserts a batch inside one SQLite transaction.
    pub fn insert_transactions(&mut self, txs: &[Transaction]) -> Result<Vec<u64>, StoreError> {
        let db_tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(txs.len());
        {
            let mut stmt = db_tx.prepare(
                "INSERT INTO transactions (date, symbol, action, quantity, price, fee, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for tx in txs {
                let quantity = stored_quantity(tx)?;
                stmt.execute(params![
                    tx.date.format(DATE_FORMAT).to_string(),
                    tx.symbol,
                    tx.action.to_string(),
                    quantity,
                    tx.price.to_string(),
                    tx.fee.to_string(),
                    tx.status.to_string(),
                ])?;
                ids.push(db_tx.last_insert_rowid() as u64);
            }
        }
        db_tx.commit()?;
        Ok(ids)
    }

    /// The full ledger in `(date, id)` order.
    pub fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, symbol, action, quantity, price, fee, status
             FROM transactions ORDER BY date ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, date, symbol, action, quantity, price, fee, status) = row?;
            let corrupt = |reason: String| StoreError::Corrupt {
                table: "transactions",
                reason: format!("row {}: {}", id, reason),
            };
            out.push(Transaction {
                id: id as u64,
                date: parse_stored_date(&date).map_err(corrupt)?,
                symbol,
                action: Action::from_str(&action).map_err(|e| corrupt(e.to_string()))?,
                quantity: u64::try_from(quantity).map_err(|e| corrupt(e.to_string()))?,
                price: parse_stored_decimal(&price).map_err(corrupt)?,
                fee: parse_stored_decimal(&fee).map_err(corrupt)?,
                status: Status::from_str(&status).map_err(|e| corrupt(e.to_string()))?,
            });
        }
        Ok(out)
    }

    /// Records a quote, replacing any earlier quote for the same day.
    pub fn store_price(
        &self,
        symbol: &str,
        date: NaiveDate,
        price: Decimal,
        source: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO price_history (symbol, date, price, source)
             VALUES (?1, ?2, ?3, ?4)",
            params![symbol, date.format(DATE_FORMAT).to_string(), price.to_string(), source],
        )?;
        Ok(())
    }

    pub fn price_on(&self, symbol: &str, date: NaiveDate) -> Result<Option<StoredPrice>, StoreError> {
        self.conn
            .query_row(
                "SELECT symbol, date, price, source FROM price_history
                 WHERE symbol = ?1 AND date = ?2",
                params![symbol, date.format(DATE_FORMAT).to_string()],
                stored_price_columns,
            )
            .optional()?
            .map(into_stored_price)
            .transpose()
    }

    pub fn latest_price(&self, symbol: &str) -> Result<Option<StoredPrice>, StoreError> {
        self.conn
            .query_row(
                "SELECT symbol, date, price, source FROM price_history
                 WHERE symbol = ?1 ORDER BY date DESC LIMIT 1",
                params![symbol],
                stored_price_columns,
            )
            .optional()?
            .map(into_stored_price)
            .transpose()
    }

    pub fn api_calls_on(&self, date: NaiveDate) -> Result<u32, StoreError> {
        let calls: Option<u32> = self
            .conn
            .query_row(
                "SELECT calls FROM api_usage WHERE date = ?1",
                params![date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(calls.unwrap_or(0))
    }

    /// Counts one quote request against `date` and returns the day's total.
    pub fn record_api_call(&self, date: NaiveDate) -> Result<u32, StoreError> {
        let key = date.format(DATE_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO api_usage (date, calls) VALUES (?1, 1)
             ON CONFLICT(date) DO UPDATE SET calls = calls + 1",
            params![key],
        )?;
        self.api_calls_on(date)
    }

    pub fn insert_dividend(&self, receipt: &DividendReceipt) -> Result<u64, StoreError> {
        self.conn.execute(
            "INSERT INTO dividends (symbol, paid_on, cash_amount, franked_pct)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                receipt.symbol,
                receipt.paid_on.format(DATE_FORMAT).to_string(),
                receipt.cash_amount.to_string(),
                receipt.franked_pct.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid() as u64)
    }

    /// Dividends paid in `[from, to)`.
    pub fn dividends_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DividendReceipt>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, paid_on, cash_amount, franked_pct FROM dividends
             WHERE paid_on >= ?1 AND paid_on < ?2 ORDER BY paid_on ASC, id ASC",
        )?;
        let rows = stmt.query_map(
            params![from.format(DATE_FORMAT).to_string(), to.format(DATE_FORMAT).to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (symbol, paid_on, cash, pct) = row?;
            let corrupt = |reason: String| StoreError::Corrupt {
                table: "dividends",
                reason,
            };
            out.push(DividendReceipt {
                symbol,
                paid_on: parse_stored_date(&paid_on).map_err(corrupt)?,
                cash_amount: parse_stored_decimal(&cash).map_err(corrupt)?,
                franked_pct: parse_stored_decimal(&pct).map_err(corrupt)?,
            });
        }
        Ok(out)
    }
}

fn stored_price_columns(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_stored_price(
    (symbol, date, price, source): (String, String, String, String),
) -> Result<StoredPrice, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        table: "price_history",
        reason,
    };
    Ok(StoredPrice {
        symbol,
        date: parse_stored_date(&date).map_err(corrupt)?,
        price: parse_stored_decimal(&price).map_err(corrupt)?,
        source,
    })
}

// SQLite integers are signed 64-bit
fn stored_quantity(tx: &Transaction) -> Result<i64, StoreError> {
    i64::try_from(tx.quantity).map_err(|_| StoreError::OutOfRange {
        field: "quantity",
        value: tx.quantity.to_string(),
    })
}

fn parse_stored_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| format!("bad date '{}': {}", s, e))
}

fn parse_stored_decimal(s: &str) -> Result<Decimal, String> {
    Decimal::from_str(s).map_err(|e| format!("bad amount '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ledger_round_trips_in_date_order() {
        let mut store = Store::open_in_memory().unwrap();
        let later = Transaction::new(0, day(2024, 5, 1), "NAB", Action::Sell, 5, dec!(35.10), dec!(19.95));
        let earlier = Transaction::new(0, day(2024, 1, 1), "NAB", Action::Buy, 10, dec!(30.005), dec!(19.95))
            .with_status(Status::Pending);

        let first = store.insert_transaction(&later).unwrap();
        let ids = store.insert_transactions(&[earlier]).unwrap();
        assert!(ids[0] > first);

        let ledger = store.transactions().unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].date, day(2024, 1, 1));
        assert_eq!(ledger[0].price, dec!(30.005));
        assert_eq!(ledger[0].status, Status::Pending);
        assert_eq!(ledger[1].id, first);
        assert_eq!(ledger[1].action, Action::Sell);
    }

    #[test]
    fn quantity_beyond_i64_is_refused() {
        let mut store = Store::open_in_memory().unwrap();
        let huge = Transaction::new(0, day(2024, 1, 1), "NAB", Action::Buy, u64::MAX, dec!(1), dec!(0));
        let fine = Transaction::new(0, day(2024, 1, 2), "NAB", Action::Buy, 10, dec!(1), dec!(0));

        assert!(matches!(
            store.insert_transaction(&huge),
            Err(StoreError::OutOfRange { field: "quantity", .. })
        ));
        assert!(matches!(
            store.insert_transactions(&[fine, huge]),
            Err(StoreError::OutOfRange { .. })
        ));
        assert!(store.transactions().unwrap().is_empty());

        let max = Transaction::new(0, day(2024, 1, 3), "NAB", Action::Buy, i64::MAX as u64, dec!(1), dec!(0));
        store.insert_transaction(&max).unwrap();
        assert_eq!(store.transactions().unwrap()[0].quantity, i64::MAX as u64);
    }

    #[test]
    fn price_history_keeps_one_quote_per_day() {
        let store = Store::open_in_memory().unwrap();
        store.store_price("BHP", day(2025, 1, 2), dec!(38.1), "eodhd_eod").unwrap();
        store.store_price("BHP", day(2025, 1, 3), dec!(38.5), "eodhd_eod").unwrap();
        store.store_price("BHP", day(2025, 1, 3), dec!(38.7), "eodhd_realtime").unwrap();

        let latest = store.latest_price("BHP").unwrap().unwrap();
        assert_eq!(latest.price, dec!(38.7));
        assert_eq!(latest.source, "eodhd_realtime");
        assert_eq!(store.price_on("BHP", day(2025, 1, 2)).unwrap().unwrap().price, dec!(38.1));
        assert!(store.price_on("BHP", day(2025, 1, 4)).unwrap().is_none());
        assert!(store.latest_price("RIO").unwrap().is_none());
    }

    #[test]
    fn api_usage_counted_per_day() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.api_calls_on(day(2025, 2, 3)).unwrap(), 0);
        store.record_api_call(day(2025, 2, 3)).unwrap();
        assert_eq!(store.record_api_call(day(2025, 2, 3)).unwrap(), 2);
        assert_eq!(store.api_calls_on(day(2025, 2, 4)).unwrap(), 0);
    }

    #[test]
    fn dividends_filtered_by_half_open_range() {
        let store = Store::open_in_memory().unwrap();
        for (paid_on, cash) in [(day(2024, 6, 30), dec!(10)), (day(2024, 7, 1), dec!(20)), (day(2025, 7, 1), dec!(30))] {
            store
                .insert_dividend(&DividendReceipt {
                    symbol: "WBC".to_string(),
                    paid_on,
                    cash_amount: cash,
                    franked_pct: dec!(100),
                })
                .unwrap();
        }

        let found = store.dividends_between(day(2024, 7, 1), day(2025, 7, 1)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cash_amount, dec!(20));
    }
}
