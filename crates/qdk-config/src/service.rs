//! Typed view over the merged config JSON.
//!
//! Every field has a default, so an empty config yields a working service.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use qdk_numbering::QuoteScope;
use qdk_pricing::{Percent, Quantity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub quote_prefix: String,
    pub request_prefix: String,
    pub article_prefix: String,
    pub quote_scope: QuoteScope,
    /// Attempts at the atomic increment before CounterUnavailable.
    pub counter_retries: u32,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            quote_prefix: "DV".to_string(),
            request_prefix: "DDV".to_string(),
            article_prefix: "ART-".to_string(),
            quote_scope: QuoteScope::Yearly,
            counter_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    #[serde(deserialize_with = "percent_from_any")]
    pub default_tax_pct: Percent,
    #[serde(deserialize_with = "percent_from_any")]
    pub default_discount_pct: Percent,
    #[serde(deserialize_with = "quantity_from_any")]
    pub default_quantity: Quantity,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_tax_pct: Percent::from_whole(19),
            default_discount_pct: Percent::ZERO,
            default_quantity: Quantity::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_limit: 500,
            max_limit: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub enabled: bool,
    pub mail_from: String,
    /// Public base URL used to build document links.
    pub public_origin: String,
    /// NAME of the env var holding the mail relay URL.
    pub relay_url_env: String,
    /// NAME of the env var holding the relay bearer token.
    pub relay_token_env: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mail_from: "devis@mtr.tn".to_string(),
            public_origin: "http://localhost:4000".to_string(),
            relay_url_env: "QDK_MAIL_RELAY_URL".to_string(),
            relay_token_env: "QDK_MAIL_RELAY_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub numbering: NumberingConfig,
    pub pricing: PricingConfig,
    pub conversion: ConversionConfig,
    pub delivery: DeliveryConfig,
}

impl ServiceConfig {
    pub fn from_json(config_json: &Value) -> Result<ServiceConfig> {
        let cfg: ServiceConfig =
            serde_json::from_value(config_json.clone()).context("invalid service config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let n = &self.numbering;
        for (name, prefix) in [
            ("quote_prefix", &n.quote_prefix),
            ("request_prefix", &n.request_prefix),
            ("article_prefix", &n.article_prefix),
        ] {
            if prefix.trim().is_empty() {
                bail!("CONFIG_INVALID numbering.{name} must not be empty");
            }
        }
        if n.counter_retries == 0 {
            bail!("CONFIG_INVALID numbering.counter_retries must be >= 1");
        }

        let p = &self.pricing;
        if p.default_tax_pct < Percent::ZERO {
            bail!("CONFIG_INVALID pricing.default_tax_pct must be >= 0");
        }
        if p.default_discount_pct < Percent::ZERO || p.default_discount_pct >= Percent::HUNDRED {
            bail!("CONFIG_INVALID pricing.default_discount_pct must be in [0, 100)");
        }
        if p.default_quantity.is_negative() || p.default_quantity.is_zero() {
            bail!("CONFIG_INVALID pricing.default_quantity must be > 0");
        }

        let c = &self.conversion;
        if c.max_limit == 0 || c.default_limit == 0 || c.default_limit > c.max_limit {
            bail!(
                "CONFIG_INVALID conversion limits: default_limit={} max_limit={}",
                c.default_limit,
                c.max_limit
            );
        }
        Ok(())
    }
}

/// YAML writes `19` and `"19"` interchangeably; accept both.
fn decimal_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a decimal, got {other}"
        ))),
    }
}

fn percent_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Percent, D::Error> {
    let raw = decimal_text(deserializer)?;
    Percent::parse(&raw).map_err(serde::de::Error::custom)
}

fn quantity_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Quantity, D::Error> {
    let raw = decimal_text(deserializer)?;
    Quantity::parse(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = ServiceConfig::from_json(&serde_json::json!({})).unwrap();
        assert_eq!(cfg, ServiceConfig::default());
        assert_eq!(cfg.numbering.quote_prefix, "DV");
        assert_eq!(cfg.pricing.default_tax_pct, Percent::from_whole(19));
        assert_eq!(cfg.conversion.max_limit, 5000);
    }

    #[test]
    fn pricing_accepts_numbers_and_strings() {
        let cfg = ServiceConfig::from_json(&serde_json::json!({
            "pricing": {"default_tax_pct": 7, "default_discount_pct": "2,5"}
        }))
        .unwrap();
        assert_eq!(cfg.pricing.default_tax_pct, Percent::from_whole(7));
        assert_eq!(cfg.pricing.default_discount_pct, Percent::new(2_500_000));
        assert_eq!(cfg.pricing.default_quantity, Quantity::ONE);
    }

    #[test]
    fn rejects_inverted_limits() {
        let err = ServiceConfig::from_json(&serde_json::json!({
            "conversion": {"default_limit": 10, "max_limit": 5}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"));
    }

    #[test]
    fn global_scope_parses() {
        let cfg = ServiceConfig::from_json(&serde_json::json!({
            "numbering": {"quote_scope": "global"}
        }))
        .unwrap();
        assert_eq!(cfg.numbering.quote_scope, QuoteScope::Global);
    }
}
