//! Runtime configuration from the environment (and `.env`).

use anyhow::{anyhow, Context};
use chrono::{FixedOffset, Offset, Utc};
use std::path::PathBuf;

use crate::domain::value_objects::{PricingField, DEFAULT_CURRENCY};
use crate::ingest::MalformedPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub catalog_path: PathBuf,
    /// JSON cart files live here; carts are kept in memory when unset.
    pub cart_store_dir: Option<PathBuf>,
    pub pricing: PricingField,
    pub malformed_policy: MalformedPolicy,
    pub report_offset: FixedOffset,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            catalog_path: PathBuf::from("products.json"),
            cart_store_dir: None,
            pricing: PricingField::default(),
            malformed_policy: MalformedPolicy::default(),
            report_offset: Utc.fix(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("invalid PORT `{v}`"))?,
            None => defaults.port,
        };
        let pricing = match get("PRICING_FIELD") {
            Some(v) => v.parse::<PricingField>().map_err(|e| anyhow!(e)).context("invalid PRICING_FIELD")?,
            None => defaults.pricing,
        };
        let malformed_policy = match get("MALFORMED_RECORDS") {
            Some(v) => v.parse::<MalformedPolicy>().map_err(|e| anyhow!(e)).context("invalid MALFORMED_RECORDS")?,
            None => defaults.malformed_policy,
        };
        let report_offset = match get("REPORT_UTC_OFFSET") {
            Some(v) => parse_offset(&v).with_context(|| format!("invalid REPORT_UTC_OFFSET `{v}`"))?,
            None => defaults.report_offset,
        };
        Ok(Self {
            port,
            catalog_path: get("CATALOG_PATH").map(PathBuf::from).unwrap_or(defaults.catalog_path),
            cart_store_dir: get("CART_STORE_DIR").filter(|v| !v.trim().is_empty()).map(PathBuf::from),
            pricing,
            malformed_policy,
            report_offset,
            currency: get("CURRENCY").map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty()).unwrap_or(defaults.currency),
        })
    }
}

/// `+03:00`, `-0530`, `+3` or `Z`.
fn parse_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(anyhow!("offset must start with + or -"));
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours = i32::from(hours.parse::<u8>()?);
    let minutes = i32::from(minutes.parse::<u8>()?);
    if hours > 14 || minutes > 59 { return Err(anyhow!("offset out of range")); }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| anyhow!("offset out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.pricing, PricingField::ActualPrice);
        assert_eq!(cfg.malformed_policy, MalformedPolicy::FailFast);
        assert_eq!(cfg.report_offset.local_minus_utc(), 0);
        assert_eq!(cfg.currency, "KES");
        assert!(cfg.cart_store_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = from(&[
            ("PORT", "9000"), ("PRICING_FIELD", "price"), ("MALFORMED_RECORDS", "skip"),
            ("REPORT_UTC_OFFSET", "+03:00"), ("CART_STORE_DIR", "/tmp/carts"), ("CURRENCY", "usd"),
        ]).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.pricing, PricingField::Price);
        assert_eq!(cfg.malformed_policy, MalformedPolicy::Skip);
        assert_eq!(cfg.report_offset.local_minus_utc(), 3 * 3600);
        assert_eq!(cfg.cart_store_dir, Some(PathBuf::from("/tmp/carts")));
        assert_eq!(cfg.currency, "USD");
    }

    #[test]
    fn test_offset_forms() {
        assert_eq!(parse_offset("-0530").unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("+3").unwrap().local_minus_utc(), 3 * 3600);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("03:00").is_err());
        assert!(parse_offset("+25:00").is_err());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(from(&[("PORT", "eighty")]).is_err());
        assert!(from(&[("PRICING_FIELD", "msrp")]).is_err());
        assert!(from(&[("MALFORMED_RECORDS", "ignore")]).is_err());
    }
}
