//! Service configuration, read from the environment.
//!
//! Every variable is optional; unset variables fall back to the defaults in
//! `dealdesk_types::constants`. Parsing goes through a lookup function so
//! tests can supply a map instead of touching the process environment.

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use dealdesk_types::{DeskConfig, UserId, constants};
use rust_decimal::Decimal;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => bail!("unknown ENVIRONMENT '{other}'"),
        }
    }
}

/// A reference price seeded into the desk's price table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePrice {
    pub asset: String,
    pub fiat: String,
    pub price: Decimal,
}

impl ReferencePrice {
    /// Parse `ASSET/FIAT=PRICE`, e.g. `USDT/RUB=95.50`.
    fn parse(raw: &str) -> Result<Self> {
        let (pair, price) = raw
            .split_once('=')
            .with_context(|| format!("reference price '{raw}' must look like ASSET/FIAT=PRICE"))?;
        let (asset, fiat) = pair
            .split_once('/')
            .with_context(|| format!("reference price '{raw}' must look like ASSET/FIAT=PRICE"))?;
        let price: Decimal = price
            .trim()
            .parse()
            .with_context(|| format!("reference price '{raw}' has an invalid amount"))?;
        if price <= Decimal::ZERO {
            bail!("reference price '{raw}' must be positive");
        }
        Ok(Self {
            asset: asset.trim().to_ascii_uppercase(),
            fiat: fiat.trim().to_ascii_uppercase(),
            price,
        })
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port (default 3001).
    pub port: u16,
    pub environment: Environment,
    /// Lifecycle policy handed to the desk.
    pub desk: DeskConfig,
    /// Users allowed to resolve appeals and confirm deposits.
    pub admin_user_ids: HashSet<UserId>,
    /// Assets the wallet accepts, uppercase.
    pub supported_assets: Vec<String>,
    /// CORS origins used in production.
    pub allowed_origins: Vec<String>,
    /// Reference prices for market-relative listings.
    pub reference_prices: Vec<ReferencePrice>,
    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_API_PORT,
            environment: Environment::Development,
            desk: DeskConfig::default(),
            admin_user_ids: HashSet::new(),
            supported_assets: constants::DEFAULT_SUPPORTED_ASSETS
                .iter()
                .map(|a| (*a).to_string())
                .collect(),
            allowed_origins: Vec::new(),
            reference_prices: Vec::new(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Optional Environment Variables
    ///
    /// - `PORT`: listen port (default: 3001)
    /// - `ENVIRONMENT`: development | staging | production
    /// - `DEFAULT_PAYMENT_TIME_MINUTES`, `POST_CLAIM_CANCEL_MINUTES`, `SWEEP_INTERVAL_SECS`
    /// - `ADMIN_USER_IDS`: comma-separated UUIDs
    /// - `SUPPORTED_ASSETS`: comma-separated tickers
    /// - `ALLOWED_ORIGINS`: comma-separated origins
    /// - `REFERENCE_PRICES`: comma-separated `ASSET/FIAT=PRICE`
    /// - `LOG_FORMAT`: `json` for JSON lines
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = port.trim().parse().context("PORT must be a valid port number")?;
        }
        if let Some(env) = lookup("ENVIRONMENT") {
            config.environment = Environment::parse(&env)?;
        }
        if let Some(minutes) = lookup("DEFAULT_PAYMENT_TIME_MINUTES") {
            config.desk.default_payment_time_minutes = minutes
                .trim()
                .parse()
                .context("DEFAULT_PAYMENT_TIME_MINUTES must be an integer")?;
        }
        if let Some(minutes) = lookup("POST_CLAIM_CANCEL_MINUTES") {
            config.desk.post_claim_cancel_minutes = minutes
                .trim()
                .parse()
                .context("POST_CLAIM_CANCEL_MINUTES must be an integer")?;
        }
        if let Some(secs) = lookup("SWEEP_INTERVAL_SECS") {
            config.desk.sweep_interval_secs = secs
                .trim()
                .parse()
                .context("SWEEP_INTERVAL_SECS must be an integer")?;
        }
        if let Some(ids) = lookup("ADMIN_USER_IDS") {
            config.admin_user_ids = split_list(&ids)
                .map(|raw| {
                    UserId::parse(raw).with_context(|| format!("invalid admin user id '{raw}'"))
                })
                .collect::<Result<_>>()?;
        }
        if let Some(assets) = lookup("SUPPORTED_ASSETS") {
            config.supported_assets = split_list(&assets)
                .map(str::to_ascii_uppercase)
                .collect();
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = split_list(&origins).map(str::to_string).collect();
        }
        if let Some(prices) = lookup("REFERENCE_PRICES") {
            config.reference_prices = split_list(&prices)
                .map(ReferencePrice::parse)
                .collect::<Result<_>>()?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.json_logs = format.trim().eq_ignore_ascii_case("json");
        }

        config
            .desk
            .validate()
            .context("invalid desk configuration")?;
        if config.supported_assets.is_empty() {
            bail!("SUPPORTED_ASSETS must name at least one asset");
        }
        Ok(config)
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    #[must_use]
    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_user_ids.contains(&user)
    }

    #[must_use]
    pub fn supports_asset(&self, asset: &str) -> bool {
        self.supported_assets
            .iter()
            .any(|a| a.eq_ignore_ascii_case(asset.trim()))
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
