use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::accounting::MatchingPolicy;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub method: MatchingPolicy,
    pub database: String,
    /// Cash on hand before the first trade.
    pub starting_cash: Decimal,
    pub api_key: HashMap<String, String>,
    pub prices: PriceConfig,
    pub brokerage: BrokerageSchedule,
    pub tax: TaxConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            method: MatchingPolicy::Fifo,
            database: "portfolio.db".to_string(),
            starting_cash: dec!(25000),
            api_key: HashMap::new(),
            prices: PriceConfig::default(),
            brokerage: BrokerageSchedule::default(),
            tax: TaxConfig::default(),
        }
    }
}

impl Config {
    pub fn new(config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let file = std::fs::File::open(config_path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// Reads the config file when it exists, otherwise falls back to defaults.
    pub fn load_or_default(config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = config_path.as_ref();
        if path.exists() {
            Config::new(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    pub base_url: String,
    pub daily_call_limit: u32,
}

impl Default for PriceConfig {
    fn default() -> Self {
        PriceConfig {
            base_url: "https://eodhd.com/api".to_string(),
            daily_call_limit: 20,
        }
    }
}

/// Broker fee charged on a trade: the larger of a flat minimum and a
/// percentage of trade value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerageSchedule {
    pub min_fee: Decimal,
    pub rate: Decimal,
}

impl Default for BrokerageSchedule {
    fn default() -> Self {
        BrokerageSchedule {
            min_fee: dec!(19.95),
            rate: dec!(0.001),
        }
    }
}

impl BrokerageSchedule {
    pub fn fee_for(&self, trade_value: Decimal) -> Decimal {
        match trade_value.checked_mul(self.rate) {
            Some(fee) => fee.round_dp(2).max(self.min_fee),
            None => Decimal::MAX,
        }
    }
}

/// One step of the progressive income tax scale. `threshold: None` is the
/// open-ended top bracket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub threshold: Option<Decimal>,
    pub rate: Decimal,
}

/// Tax-year parameters handed to every engine entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    pub discount_rate: Decimal,
    pub discount_holding_days: i64,
    pub company_tax_rate: Decimal,
    pub medicare_levy_rate: Decimal,
    pub medicare_threshold: Decimal,
    pub brackets: Vec<TaxBracket>,
}

impl Default for TaxConfig {
    // 2024-25 resident rates
    fn default() -> Self {
        TaxConfig {
            discount_rate: dec!(0.5),
            discount_holding_days: 365,
            company_tax_rate: dec!(0.30),
            medicare_levy_rate: dec!(0.02),
            medicare_threshold: dec!(23226),
            brackets: vec![
                TaxBracket { threshold: Some(dec!(18200)), rate: dec!(0) },
                TaxBracket { threshold: Some(dec!(45000)), rate: dec!(0.19) },
                TaxBracket { threshold: Some(dec!(120000)), rate: dec!(0.325) },
                TaxBracket { threshold: Some(dec!(180000)), rate: dec!(0.37) },
                TaxBracket { threshold: None, rate: dec!(0.45) },
            ],
        }
    }
}

impl TaxConfig {
    /// Applies the CGT discount to a gain; losses pass through untouched.
    pub fn discounted(&self, gain: Decimal, eligible: bool) -> Decimal {
        if eligible && gain > Decimal::ZERO {
            gain * (Decimal::ONE - self.discount_rate)
        } else {
            gain
        }
    }

    pub fn is_discount_eligible(&self, holding_days: i64) -> bool {
        holding_days >= self.discount_holding_days
    }
}
