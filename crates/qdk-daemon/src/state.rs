//! Shared runtime state for qdk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; this module owns
//! nothing async itself.

use anyhow::{bail, Result};
use qdk_core::QuoteDesk;
use qdk_db::DbStatus;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub desk: QuoteDesk,
    /// Hash of the effective layered config, reported by /v1/health.
    pub config_hash: String,
}

impl AppState {
    pub fn new(desk: QuoteDesk, config_hash: String) -> Self {
        Self {
            build: BuildInfo {
                service: "qdk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            desk,
            config_hash,
        }
    }
}

/// Boot gate: refuse to serve until the schema has been migrated.
pub fn ensure_schema(status: &DbStatus) -> Result<()> {
    if !status.has_quotes_table {
        bail!("database schema missing; run `qdk db migrate` first");
    }
    Ok(())
}
