//! Reference number issuance on top of a [`SequenceStore`].
//!
//! Issuance is not transactional with the record that uses the number: a
//! failure after `next` leaves a gap, never a duplicate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use qdk_config::NumberingConfig;
use qdk_numbering::{format_plain, format_yearly, SequenceKey};

use crate::error::QuoteError;
use crate::store::SequenceStore;

const RETRY_BACKOFF_MS: u64 = 25;

#[derive(Clone)]
pub struct SequenceGenerator {
    store: Arc<dyn SequenceStore>,
    cfg: NumberingConfig,
}

impl SequenceGenerator {
    pub fn new(store: Arc<dyn SequenceStore>, cfg: NumberingConfig) -> Self {
        Self { store, cfg }
    }

    /// Atomically increment `key` and return the new value (first call: 1).
    ///
    /// Storage errors are retried up to `counter_retries` times, then surface
    /// as [`QuoteError::CounterUnavailable`].
    pub async fn next(&self, key: &SequenceKey) -> Result<u64, QuoteError> {
        let attempts = self.cfg.counter_retries.max(1);
        let mut last_err = String::new();

        for attempt in 1..=attempts {
            match self.store.increment(key).await {
                Ok(seq) => {
                    return u64::try_from(seq)
                        .ok()
                        .filter(|s| *s >= 1)
                        .ok_or_else(|| QuoteError::CounterUnavailable {
                            key: key.to_string(),
                            attempts: attempt,
                            reason: format!("counter returned non-positive value {seq}"),
                        });
                }
                Err(e) => {
                    warn!(key = %key, attempt, error = %e, "counter increment failed");
                    last_err = format!("{e:#}");
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(
                            RETRY_BACKOFF_MS * u64::from(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        Err(QuoteError::CounterUnavailable {
            key: key.to_string(),
            attempts,
            reason: last_err,
        })
    }

    pub fn quote_key(&self, now: DateTime<Utc>) -> SequenceKey {
        SequenceKey::quote(self.cfg.quote_scope, now.year())
    }

    pub async fn next_quote_number(&self, now: DateTime<Utc>) -> Result<String, QuoteError> {
        let seq = self.next(&self.quote_key(now)).await?;
        Ok(format_yearly(&self.cfg.quote_prefix, now.year(), seq))
    }

    /// The number the next quote would get. Advisory: does not reserve it.
    pub async fn preview_next_quote_number(
        &self,
        now: DateTime<Utc>,
    ) -> Result<String, QuoteError> {
        let current = self.store.current(&self.quote_key(now)).await?;
        let next = current.unwrap_or(0).max(0) as u64 + 1;
        Ok(format_yearly(&self.cfg.quote_prefix, now.year(), next))
    }

    pub async fn next_request_number(&self, now: DateTime<Utc>) -> Result<String, QuoteError> {
        let seq = self.next(&SequenceKey::request(now.year())).await?;
        Ok(format_yearly(&self.cfg.request_prefix, now.year(), seq))
    }

    pub async fn next_article_reference(&self) -> Result<String, QuoteError> {
        let seq = self.next(&SequenceKey::article()).await?;
        Ok(format_plain(&self.cfg.article_prefix, seq))
    }
}
