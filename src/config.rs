//! Environment-driven configuration.
//!
//! Everything is optional except `STRATEGIES`. A missing private key
//! forces dry-run: without credentials no real order can ever leave the
//! process.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::discovery::DiscoveryConfig;
use crate::domain::{RiskLimits, TokenId};
use crate::error::{Error, Result};

/// The strategies the engine knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    MarketMaker,
    Momentum,
    MeanReversion,
    BregmanArb,
}

impl StrategyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarketMaker => "market-maker",
            Self::Momentum => "momentum",
            Self::MeanReversion => "mean-reversion",
            Self::BregmanArb => "bregman-arb",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "market-maker" => Ok(Self::MarketMaker),
            "momentum" => Ok(Self::Momentum),
            "mean-reversion" => Ok(Self::MeanReversion),
            "bregman-arb" => Ok(Self::BregmanArb),
            other => Err(Error::Config(format!("unknown strategy {other:?}"))),
        }
    }
}

/// CLOB API credential triple.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub chain_id: u64,
    pub private_key: Option<String>,
    pub api_credentials: Option<ApiCredentials>,
    pub dry_run: bool,
    pub strategies: Vec<StrategyKind>,
    pub token_ids: Vec<TokenId>,
    pub risk_limits: RiskLimits,
    pub discovery: DiscoveryConfig,
    pub poll_interval: Duration,
    pub database_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load from the process environment. `.env` loading is the caller's
    /// concern.
    pub fn from_env() -> Result<Self> {
        let strategies = parse_strategies(&var("STRATEGIES").unwrap_or_default())?;

        let private_key = var("PRIVATE_KEY");
        let requested_dry_run = match var("DRY_RUN") {
            Some(raw) => parse_bool("DRY_RUN", &raw)?,
            None => true,
        };
        // No key, no live trading.
        let dry_run = requested_dry_run || private_key.is_none();

        let api_credentials = match (var("API_KEY"), var("API_SECRET"), var("API_PASSPHRASE")) {
            (Some(key), Some(secret), Some(passphrase)) => Some(ApiCredentials {
                key,
                secret,
                passphrase,
            }),
            _ => None,
        };

        let mut risk_limits = RiskLimits::default();
        if let Some(value) = var("MAX_POSITION_SIZE") {
            risk_limits.max_position_size = parse_decimal("MAX_POSITION_SIZE", &value)?;
        }
        if let Some(value) = var("MAX_TOTAL_EXPOSURE") {
            risk_limits.max_total_exposure = parse_decimal("MAX_TOTAL_EXPOSURE", &value)?;
        }
        if let Some(value) = var("MAX_LOSS_PER_TRADE") {
            risk_limits.max_loss_per_trade = parse_decimal("MAX_LOSS_PER_TRADE", &value)?;
        }
        if let Some(value) = var("MAX_DAILY_LOSS") {
            risk_limits.max_daily_loss = parse_decimal("MAX_DAILY_LOSS", &value)?;
        }
        if let Some(value) = var("MAX_OPEN_ORDERS") {
            risk_limits.max_open_orders = parse_number("MAX_OPEN_ORDERS", &value)?;
        }

        let mut discovery = DiscoveryConfig::default();
        if let Some(value) = var("GAMMA_BASE_URL") {
            discovery.base_url = Url::parse(&value)
                .map_err(|e| Error::Config(format!("GAMMA_BASE_URL is not a URL: {e}")))?;
        }
        if let Some(value) = var("GAMMA_TAGS") {
            discovery.tags = split_csv(&value);
        }
        if let Some(value) = var("GAMMA_LIMIT") {
            discovery.limit = parse_number("GAMMA_LIMIT", &value)?;
        }
        if let Some(value) = var("GAMMA_REFRESH_INTERVAL") {
            let seconds: u64 = parse_number("GAMMA_REFRESH_INTERVAL", &value)?;
            discovery.refresh_interval = Duration::from_secs(seconds);
        }

        let poll_interval = match var("POLL_INTERVAL_MS") {
            Some(value) => Duration::from_millis(parse_number("POLL_INTERVAL_MS", &value)?),
            None => Duration::from_secs(1),
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(Error::Config(format!("unknown LOG_FORMAT {other:?}")));
            }
        };

        Ok(Self {
            host: var("CLOB_HOST").unwrap_or_else(|| "https://clob.polymarket.com".to_string()),
            chain_id: match var("CHAIN_ID") {
                Some(value) => parse_number("CHAIN_ID", &value)?,
                None => 137,
            },
            private_key,
            api_credentials,
            dry_run,
            strategies,
            token_ids: split_csv(&var("TOKEN_IDS").unwrap_or_default())
                .into_iter()
                .map(TokenId::from)
                .collect(),
            risk_limits,
            discovery,
            poll_interval,
            database_url: var("DATABASE_URL").unwrap_or_else(|| "underround.db".to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
        })
    }

    /// Whether the discovery service should run at all.
    #[must_use]
    pub fn wants_discovery(&self) -> bool {
        self.strategies.contains(&StrategyKind::BregmanArb)
    }

    /// Install the global tracing subscriber.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.clone()));
        match self.log_format {
            LogFormat::Json => {
                tracing_subscriber::fmt().with_env_filter(filter).json().init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the `STRATEGIES` list. At least one strategy is required.
pub fn parse_strategies(value: &str) -> Result<Vec<StrategyKind>> {
    let mut strategies = Vec::new();
    for entry in split_csv(value) {
        let kind = entry.parse::<StrategyKind>()?;
        if !strategies.contains(&kind) {
            strategies.push(kind);
        }
    }
    if strategies.is_empty() {
        return Err(Error::Config(
            "STRATEGIES must name at least one of market-maker, momentum, mean-reversion, bregman-arb".to_string(),
        ));
    }
    Ok(strategies)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::Config(format!("{name} is not a boolean: {value:?}"))),
    }
}

fn parse_decimal(name: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| Error::Config(format!("{name} is not a number: {e}")))
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::Config(format!("{name} is invalid: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn strategies_parse_and_dedupe() {
        let strategies = parse_strategies("bregman-arb, momentum,bregman-arb").unwrap();
        assert_eq!(
            strategies,
            vec![StrategyKind::BregmanArb, StrategyKind::Momentum]
        );
    }

    #[test]
    fn empty_strategy_list_is_a_config_error() {
        assert!(parse_strategies("").is_err());
        assert!(parse_strategies(" , ").is_err());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = parse_strategies("martingale").unwrap_err();
        assert!(err.to_string().contains("martingale"));
    }

    #[test]
    fn bool_and_decimal_parsing() {
        assert!(parse_bool("DRY_RUN", "TRUE").unwrap());
        assert!(!parse_bool("DRY_RUN", "0").unwrap());
        assert!(parse_bool("DRY_RUN", "maybe").is_err());
        assert_eq!(parse_decimal("X", "12.5").unwrap(), dec!(12.5));
        assert!(parse_decimal("X", "twelve").is_err());
    }

    #[test]
    fn csv_splitting_skips_blanks() {
        assert_eq!(split_csv("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_csv("").is_empty());
    }
}
