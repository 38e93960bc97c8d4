//! Which requests have no quote yet.
//!
//! A request counts as converted when a quote claims it by id OR by number.
//! Legacy quotes populate only one of the two, so both paths are always
//! checked and their results unioned.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use qdk_config::ConversionConfig;
use qdk_numbering::locale_compare;
use qdk_schemas::{RequestKind, RequestSummary, UnconvertedRequest};

use crate::error::QuoteError;
use crate::store::{QuoteStore, RequestStore};

#[derive(Clone)]
pub struct ConversionIndex {
    requests: Arc<dyn RequestStore>,
    quotes: Arc<dyn QuoteStore>,
    cfg: ConversionConfig,
}

impl ConversionIndex {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        quotes: Arc<dyn QuoteStore>,
        cfg: ConversionConfig,
    ) -> Self {
        Self {
            requests,
            quotes,
            cfg,
        }
    }

    /// Effective limit: `requested` or the default, capped at the maximum.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.cfg.default_limit)
            .min(self.cfg.max_limit)
    }

    /// Unconverted requests, optionally filtered by a case-insensitive
    /// substring of their number, deduplicated by number (first wins),
    /// sorted by number, truncated to the effective limit.
    pub async fn unconverted(
        &self,
        filter: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<UnconvertedRequest>, QuoteError> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());

        let mut universe: Vec<RequestSummary> = Vec::new();
        for kind in RequestKind::ALL {
            universe.extend(self.requests.list_summaries(kind, filter).await?);
        }

        let ids: Vec<Uuid> = universe.iter().map(|r| r.id).collect();
        let numeros: Vec<String> = universe
            .iter()
            .map(|r| r.numero.clone())
            .filter(|n| !n.is_empty())
            .collect();

        let mut done_ids: HashSet<Uuid> = HashSet::new();
        let mut done_numeros: HashSet<String> = HashSet::new();
        if !ids.is_empty() || !numeros.is_empty() {
            for mark in self.quotes.find_conversion_marks(&ids, &numeros).await? {
                done_ids.extend(mark.request_ids);
                done_numeros.extend(mark.request_numeros.into_iter().filter(|n| !n.is_empty()));
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut data: Vec<UnconvertedRequest> = universe
            .into_iter()
            .filter(|r| !done_ids.contains(&r.id) && !done_numeros.contains(&r.numero))
            .filter(|r| !r.numero.is_empty() && seen.insert(r.numero.clone()))
            .map(|r| UnconvertedRequest {
                numero: r.numero,
                kind: r.kind,
            })
            .collect();

        data.sort_by(|a, b| locale_compare(&a.numero, &b.numero));
        data.truncate(self.effective_limit(limit));

        info!(count = data.len(), filter = filter.unwrap_or(""), "unconverted requests listed");
        Ok(data)
    }
}
