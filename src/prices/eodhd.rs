//! EODHD REST client for ASX quotes.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use super::QuoteSource;
use crate::config::Config;
use crate::error::PriceError;
use crate::ledger::DATE_FORMAT;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchange suffix EODHD uses for ASX listings.
const EXCHANGE: &str = "AU";

pub struct EodhdClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl EodhdClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, PriceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(EodhdClient {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, PriceError> {
        let api_key = config
            .api_key
            .get("eodhd")
            .cloned()
            .ok_or(PriceError::MissingApiKey("eodhd"))?;
        EodhdClient::new(api_key, &config.prices.base_url)
    }

    fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<Value>, PriceError> {
        let response = self
            .client
            .get(url)
            .query(&[("api_token", self.api_key.as_str()), ("fmt", "json")])
            .query(query)
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PriceError::ParseFailed(format!("HTTP {} from {}", status, url)));
        }

        let body: Value = response.json()?;
        Ok(Some(body))
    }
}

impl QuoteSource for EodhdClient {
    fn name(&self) -> &str {
        "eodhd"
    }

    fn realtime(&self, symbol: &str) -> Result<Option<Decimal>, PriceError> {
        let url = format!("{}/real-time/{}.{}", self.base_url, symbol, EXCHANGE);
        Ok(self.fetch(&url, &[])?.as_ref().and_then(parse_close))
    }

    fn end_of_day(&self, symbol: &str, date: NaiveDate) -> Result<Option<Decimal>, PriceError> {
        let url = format!("{}/eod/{}.{}", self.base_url, symbol, EXCHANGE);
        let day = date.format(DATE_FORMAT).to_string();
        let body = self.fetch(&url, &[("from", day.as_str()), ("to", day.as_str())])?;
        Ok(body.as_ref().and_then(parse_close))
    }
}

/// Pulls the `close` field out of a quote object, or out of the last bar of an
/// EOD array. `"NA"`, null and non-positive closes count as no quote.
pub fn parse_close(body: &Value) -> Option<Decimal> {
    let quote = match body {
        Value::Array(bars) => bars.last()?,
        other => other,
    };
    let close = match quote.get("close")? {
        Value::Number(n) => decimal_from_text(&n.to_string()),
        Value::String(s) if s != "NA" => decimal_from_text(s),
        _ => None,
    }?;
    if close > Decimal::ZERO {
        Some(close)
    } else {
        None
    }
}

fn decimal_from_text(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn realtime_close() {
        let body = json!({"code": "CBA.AU", "timestamp": 1718000000, "close": 120.55});
        assert_eq!(parse_close(&body), Some(dec!(120.55)));
    }

    #[test]
    fn eod_takes_last_bar() {
        let body = json!([
            {"date": "2025-01-02", "close": 38.1},
            {"date": "2025-01-03", "close": "38.4"}
        ]);
        assert_eq!(parse_close(&body), Some(dec!(38.4)));
    }

    #[test]
    fn missing_quotes() {
        assert_eq!(parse_close(&json!({"close": "NA"})), None);
        assert_eq!(parse_close(&json!({"close": null})), None);
        assert_eq!(parse_close(&json!({"close": 0})), None);
        assert_eq!(parse_close(&json!([])), None);
        assert_eq!(parse_close(&json!({"code": "XYZ.AU"})), None);
    }

    #[test]
    fn config_without_key_is_rejected() {
        match EodhdClient::from_config(&Config::default()) {
            Err(PriceError::MissingApiKey(name)) => assert_eq!(name, "eodhd"),
            _ => panic!("expected a missing key error"),
        }
    }
}
