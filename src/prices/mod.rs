mod eodhd;

pub use eodhd::{parse_close, EodhdClient};

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::{PriceError, StoreError};
use crate::store::Store;

/// A provider of share prices.
pub trait QuoteSource {
    fn name(&self) -> &str;

    /// Latest traded price, `None` when the provider has no quote.
    fn realtime(&self, symbol: &str) -> Result<Option<Decimal>, PriceError>;

    /// Closing price on `date`.
    fn end_of_day(&self, symbol: &str, date: NaiveDate) -> Result<Option<Decimal>, PriceError>;
}

/// Price lookups backed by `price_history`, topped up from a rate-limited
/// quote source.
///
/// Lookup order: today's stored quote, the source's realtime quote, the
/// source's close for the previous day, then the most recent stored quote.
/// A quote taken from the source is stored under `today` whichever endpoint
/// supplied it.
/// Every source request counts against a daily budget kept in the store.
/// `force` skips the stored quote for today and ignores the budget.
pub struct PriceInformation<'a, S: QuoteSource> {
    store: &'a Store,
    source: S,
    daily_call_limit: u32,
    budget_date: NaiveDate,
    calls_today: u32,
}

impl<'a, S: QuoteSource> PriceInformation<'a, S> {
    pub fn new(
        store: &'a Store,
        source: S,
        daily_call_limit: u32,
        today: NaiveDate,
    ) -> Result<PriceInformation<'a, S>, StoreError> {
        let calls_today = store.api_calls_on(today)?;
        Ok(PriceInformation {
            store,
            source,
            daily_call_limit,
            budget_date: today,
            calls_today,
        })
    }

    pub fn calls_used(&self) -> u32 {
        self.calls_today
    }

    pub fn calls_remaining(&self) -> u32 {
        self.daily_call_limit.saturating_sub(self.calls_today)
    }

    pub fn get(&mut self, symbol: &str, today: NaiveDate, force: bool) -> Result<Option<Decimal>, PriceError> {
        if !force {
            if let Some(cached) = self.store.price_on(symbol, today)? {
                debug!("{}: using stored quote {} from {}", symbol, cached.price, cached.source);
                return Ok(Some(cached.price));
            }
        }

        match self.spend_call(today, force) {
            Ok(()) => match self.source.realtime(symbol) {
                Ok(Some(price)) => {
                    let tag = format!("{}_realtime", self.source.name());
                    self.store.store_price(symbol, today, price, &tag)?;
                    return Ok(Some(price));
                }
                Ok(None) => warn!("{}: no realtime quote from {}", symbol, self.source.name()),
                Err(e) => warn!("{}: realtime request failed: {}", symbol, e),
            },
            Err(e) => warn!("{}: {}", symbol, e),
        }

        let previous_day = today.pred_opt().unwrap_or(today);
        match self.spend_call(today, force) {
            Ok(()) => match self.source.end_of_day(symbol, previous_day) {
                Ok(Some(price)) => {
                    // dated today so the next lookup is served from the store
                    let tag = format!("{}_eod", self.source.name());
                    self.store.store_price(symbol, today, price, &tag)?;
                    return Ok(Some(price));
                }
                Ok(None) => warn!("{}: no close for {} from {}", symbol, previous_day, self.source.name()),
                Err(e) => warn!("{}: end of day request failed: {}", symbol, e),
            },
            Err(e) => debug!("{}: {}", symbol, e),
        }

        match self.store.latest_price(symbol)? {
            Some(stale) => {
                warn!("{}: falling back to stored quote from {}", symbol, stale.date);
                Ok(Some(stale.price))
            }
            None => {
                warn!("{}: no price available", symbol);
                Ok(None)
            }
        }
    }

    /// Prices every symbol it can. Symbols without any quote are left out.
    pub fn update_all<'s, I>(&mut self, symbols: I, today: NaiveDate, force: bool) -> Result<HashMap<String, Decimal>, PriceError>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut prices = HashMap::new();
        let mut missing = 0;
        for symbol in symbols {
            match self.get(symbol, today, force)? {
                Some(price) => {
                    prices.insert(symbol.to_string(), price);
                }
                None => missing += 1,
            }
        }
        info!(
            "priced {} symbols ({} missing), {}/{} api calls used today",
            prices.len(),
            missing,
            self.calls_today,
            self.daily_call_limit
        );
        Ok(prices)
    }

    fn spend_call(&mut self, today: NaiveDate, force: bool) -> Result<(), PriceError> {
        if today != self.budget_date {
            self.budget_date = today;
            self.calls_today = self.store.api_calls_on(today)?;
        }
        if !force && self.calls_today >= self.daily_call_limit {
            return Err(PriceError::BudgetExhausted(self.daily_call_limit));
        }
        self.calls_today = self.store.record_api_call(today)?;
        Ok(())
    }
}

/// Most recent stored quote for each symbol, without touching any source.
pub fn stored_prices<'s, I>(store: &Store, symbols: I) -> Result<HashMap<String, Decimal>, StoreError>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut prices = HashMap::new();
    for symbol in symbols {
        if let Some(quote) = store.latest_price(symbol)? {
            prices.insert(symbol.to_string(), quote.price);
        }
    }
    Ok(prices)
}
