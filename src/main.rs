mod app;
mod output;

use std::collections::BTreeSet;
use std::process;

use asx_tax::accounting::reports::CapitalGainsReport;
use asx_tax::config::Config;
use asx_tax::error::{ConfigError, ParseError, PriceError, StoreError};
use asx_tax::franking::{self, DividendReceipt};
use asx_tax::parser::Parser;
use asx_tax::prices::{self, EodhdClient, PriceInformation};
use asx_tax::store::Store;
use asx_tax::{Accountant, Action, ParcelBook, TaxError, Transaction};
use chrono::Local;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app::{App, Command};

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Tax(#[from] TaxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Price(#[from] PriceError),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("asx_tax=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let app = App::new().unwrap_or_else(|e| {
        eprintln!("{}", e);
        process::exit(2);
    });

    if let Err(e) = run(&app) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(app: &App) -> Result<(), AppError> {
    let mut config = Config::load_or_default(app.get_config_path())?;
    if let Some(method) = app.get_method() {
        config.method = method;
    }
    let db_path = app.get_db_path().unwrap_or(config.database.as_str()).to_string();
    let mut store = Store::open(&db_path)?;

    let mut accountant = Accountant::new(&config.tax);
    accountant.method(config.method);
    let today = Local::now().date_naive();

    match app.get_command() {
        Command::Import { path } => {
            let imported = Parser::new(&config.brokerage).parse_sheet(path)?;
            let ledger = store.transactions()?;
            let staged = stage(&ledger, imported);
            check_ledger(&accountant, &ledger, &staged)?;
            let ids = store.insert_transactions(&staged)?;
            info!("imported {} transactions into {}", ids.len(), db_path);
        }
        Command::Add { action, symbol, quantity, price, fee, date } => {
            let value = asx_tax::ledger::trade_value(*price, *quantity).ok_or_else(|| {
                TaxError::InvalidInput(format!("{} x {} is too large", quantity, price))
            })?;
            let fee = fee.unwrap_or_else(|| config.brokerage.fee_for(value));
            let tx = Transaction::new(0, date.unwrap_or(today), symbol, *action, *quantity, *price, fee);
            tx.validate()?;
            let ledger = store.transactions()?;
            let staged = stage(&ledger, vec![tx]);
            check_ledger(&accountant, &ledger, &staged)?;
            let id = store.insert_transaction(&staged[0])?;
            info!("recorded {} {} {} @ {} (fee {}) as #{}", staged[0].action, staged[0].quantity, staged[0].symbol, staged[0].price, fee, id);
        }
        Command::Parcels { all } => {
            let book = accountant.rebuild(&store.transactions()?)?;
            if *all {
                output::print_parcels(book.parcels.values().flatten());
            } else {
                output::print_parcels(book.open_parcels());
            }
        }
        Command::Cgt { year, carried_loss } => {
            let book = accountant.rebuild(&store.transactions()?)?;
            output::print_events(book.events.iter().filter(|e| year.contains(e.disposed)));
            let report = accountant.annual_report(&book, *year, *carried_loss);
            output::print_report(&report);
        }
        Command::CgtPreview { symbol, quantity, price, fee, date } => {
            let value = asx_tax::ledger::trade_value(*price, *quantity).ok_or_else(|| {
                TaxError::InvalidInput(format!("{} x {} is too large", quantity, price))
            })?;
            let fee = fee.unwrap_or_else(|| config.brokerage.fee_for(value));
            let sale = Transaction::new(0, date.unwrap_or(today), symbol, Action::Sell, *quantity, *price, fee);
            let preview = accountant.preview_sale(&store.transactions()?, &sale)?;
            output::print_events(preview.events.iter());
            output::print_preview(&preview);
        }
        Command::CgtSuggest { symbol, price, target, as_of } => {
            let book = accountant.rebuild(&store.transactions()?)?;
            let suggestions = accountant.suggest_sale(&book, symbol, *price, as_of.unwrap_or(today), *target);
            if suggestions.is_empty() {
                info!("no open parcels in {}", symbol);
            }
            output::print_suggestions(&suggestions);
        }
        Command::Unrealized { as_of } => {
            let book = accountant.rebuild(&store.transactions()?)?;
            let prices = prices::stored_prices(&store, held_symbols(&book).iter().map(String::as_str))?;
            let summary = accountant.unrealized(&book, &prices, as_of.unwrap_or(today));
            output::print_unrealized(&summary);
        }
        Command::Positions => {
            let book = accountant.rebuild(&store.transactions()?)?;
            let prices = prices::stored_prices(&store, held_symbols(&book).iter().map(String::as_str))?;
            output::print_positions(&accountant.positions(&book, &prices));
        }
        Command::Summary => {
            let ledger = store.transactions()?;
            let book = accountant.rebuild(&ledger)?;
            let prices = prices::stored_prices(&store, held_symbols(&book).iter().map(String::as_str))?;
            let summary = accountant.portfolio_summary(&ledger, &book, &prices, config.starting_cash)?;
            output::print_summary(&summary);
        }
        Command::Prices { api, force } => {
            let book = accountant.rebuild(&store.transactions()?)?;
            let symbols = held_symbols(&book);
            let found = if *api {
                let client = EodhdClient::from_config(&config)?;
                let mut gateway = PriceInformation::new(&store, client, config.prices.daily_call_limit, today)?;
                gateway.update_all(symbols.iter().map(String::as_str), today, *force)?
            } else {
                prices::stored_prices(&store, symbols.iter().map(String::as_str))?
            };
            let rows: Vec<_> = symbols
                .iter()
                .map(|s| (s.clone(), found.get(s).copied()))
                .collect();
            output::print_prices(&rows);
        }
        Command::Dividend { symbol, paid_on, amount, franked_pct } => {
            let receipt = DividendReceipt {
                symbol: symbol.clone(),
                paid_on: *paid_on,
                cash_amount: *amount,
                franked_pct: franked_pct.unwrap_or_else(|| franking::typical_franking_pct(symbol)),
            };
            if receipt.cash_amount <= Decimal::ZERO {
                return Err(TaxError::InvalidInput(format!("dividend amount must be positive, got {}", amount)).into());
            }
            let id = store.insert_dividend(&receipt)?;
            info!(
                "recorded {} dividend of {} ({}% franked, credit {}) as #{}",
                receipt.symbol,
                receipt.cash_amount,
                receipt.franked_pct,
                receipt.franking_credit(&config.tax).round_dp(2),
                id
            );
        }
        Command::Franking { year, income } => {
            let receipts = store.dividends_between(year.start(), year.end())?;
            println!("Dividends for {} ({} payments)", year, receipts.len());
            output::print_franking(&franking::franking_summary(&receipts, *income, &config.tax));
        }
        Command::Export { output: path, year } => {
            let book = accountant.rebuild(&store.transactions()?)?;
            let events: Vec<_> = book
                .events
                .iter()
                .filter(|e| year.map_or(true, |fy| fy.contains(e.disposed)))
                .cloned()
                .collect();
            CapitalGainsReport::new(&events).write_to_file(path)?;
        }
    }

    Ok(())
}

/// Gives new trades ids after the existing ledger so same-day ordering
/// follows entry order.
fn stage(ledger: &[Transaction], new: Vec<Transaction>) -> Vec<Transaction> {
    let base = ledger.iter().map(|t| t.id).max().unwrap_or(0);
    new.into_iter()
        .enumerate()
        .map(|(i, mut tx)| {
            tx.id = base + i as u64 + 1;
            tx
        })
        .collect()
}

/// Replays the ledger with `staged` appended, so a trade that would oversell
/// is refused before it reaches the store.
fn check_ledger(accountant: &Accountant, ledger: &[Transaction], staged: &[Transaction]) -> Result<ParcelBook, TaxError> {
    let combined: Vec<Transaction> = ledger.iter().chain(staged.iter()).cloned().collect();
    accountant.rebuild(&combined)
}

fn held_symbols(book: &ParcelBook) -> Vec<String> {
    book.open_parcels()
        .map(|p| p.symbol.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
