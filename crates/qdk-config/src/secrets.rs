//! Runtime secret resolution for outbound delivery.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (`delivery.relay_url_env`,
//!   `delivery.relay_token_env`).
//! - Callers invoke [`resolve_delivery_secrets`] once at startup and pass the
//!   result into constructors.
//! - `Debug` redacts values; errors name the variable, never its value.

use anyhow::{bail, Result};

use crate::DeliveryConfig;

/// Mail relay credentials. **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct DeliverySecrets {
    /// Relay endpoint. `None` means no transport is configured.
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
}

impl DeliverySecrets {
    pub fn has_relay(&self) -> bool {
        self.relay_url.is_some()
    }
}

impl std::fmt::Debug for DeliverySecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliverySecrets")
            .field("relay_url", &self.relay_url.as_ref().map(|_| "<REDACTED>"))
            .field("relay_token", &self.relay_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve relay credentials from the environment.
///
/// Both are optional: with no relay URL delivery falls back to logging.
/// A token without a URL is a configuration mistake and is rejected.
pub fn resolve_delivery_secrets(cfg: &DeliveryConfig) -> Result<DeliverySecrets> {
    let relay_url = resolve_env(&cfg.relay_url_env);
    let relay_token = resolve_env(&cfg.relay_token_env);

    if relay_url.is_none() && relay_token.is_some() {
        bail!(
            "SECRETS_INCONSISTENT: env var '{}' is set but relay url env var '{}' is not",
            cfg.relay_token_env,
            cfg.relay_url_env,
        );
    }
    if let Some(url) = &relay_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!(
                "SECRETS_INVALID: env var '{}' must hold an http(s) URL",
                cfg.relay_url_env
            );
        }
    }

    Ok(DeliverySecrets {
        relay_url,
        relay_token,
    })
}
