//! In-memory document store implementing every qdk-core store trait.
//!
//! One `Mutex` guards all collections, so the counter increment is atomic
//! exactly like the single-statement upsert in `qdk-db`. Fault switches let
//! scenarios exercise the failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use qdk_core::store::{
    ArticleCatalog, ConversionMark, QuoteStore, RequestStore, SequenceStore,
};
use qdk_numbering::SequenceKey;
use qdk_schemas::{
    Article, DocumentInfo, NewQuote, Quote, RenderedDocument, Request, RequestKind,
    RequestSummary,
};

#[derive(Default)]
struct Inner {
    requests: HashMap<RequestKind, Vec<Request>>,
    articles: HashMap<Uuid, Article>,
    quotes: Vec<Quote>,
    documents: HashMap<Uuid, RenderedDocument>,
    counters: HashMap<String, i64>,
    /// Logical clock for quote `created_at`, so "most recent" is deterministic.
    tick: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_increments: AtomicU32,
    fail_inserts: AtomicU32,
    fail_attach: AtomicU32,
    increment_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("memory store poisoned"))
    }

    pub fn add_request(&self, request: Request) {
        if let Ok(mut g) = self.lock() {
            g.requests.entry(request.kind).or_default().push(request);
        }
    }

    pub fn add_article(&self, article: Article) {
        if let Ok(mut g) = self.lock() {
            g.articles.insert(article.id, article);
        }
    }

    /// Insert a quote row as an older intake flow would have written it.
    pub fn add_legacy_quote(&self, quote: Quote) {
        if let Ok(mut g) = self.lock() {
            g.quotes.push(quote);
        }
    }

    pub fn set_counter(&self, key: &SequenceKey, value: i64) {
        if let Ok(mut g) = self.lock() {
            g.counters.insert(key.as_str().to_string(), value);
        }
    }

    pub fn counter(&self, key: &SequenceKey) -> Option<i64> {
        self.lock().ok()?.counters.get(key.as_str()).copied()
    }

    pub fn quote_count(&self) -> usize {
        self.lock().map(|g| g.quotes.len()).unwrap_or(0)
    }

    pub fn has_document(&self, quote_id: Uuid) -> bool {
        self.lock()
            .map(|g| g.documents.contains_key(&quote_id))
            .unwrap_or(false)
    }

    /// Number of `increment` calls, failed ones included.
    pub fn increment_calls(&self) -> u32 {
        self.increment_calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` counter increments fail.
    pub fn fail_next_increments(&self, n: u32) {
        self.fail_increments.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_inserts(&self, n: u32) {
        self.fail_inserts.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_attaches(&self, n: u32) {
        self.fail_attach.store(n, Ordering::SeqCst);
    }
}

/// Decrement a fault counter; `true` if a fault should fire.
fn take_fault(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn claims_id(q: &Quote, id: Uuid) -> bool {
    q.primary.id == Some(id) || q.meta.requests.iter().any(|r| r.id == id)
}

fn claims_numero(q: &Quote, numero: &str) -> bool {
    q.primary.numero.as_deref() == Some(numero)
        || q.meta.legacy_request_numero.as_deref() == Some(numero)
        || q.meta.requests.iter().any(|r| r.numero == numero)
}

#[async_trait::async_trait]
impl RequestStore for MemoryStore {
    async fn find(&self, kind: RequestKind, id: Uuid) -> Result<Option<Request>> {
        let g = self.lock()?;
        Ok(g.requests
            .get(&kind)
            .and_then(|v| v.iter().find(|r| r.id == id))
            .cloned())
    }

    async fn list_summaries(
        &self,
        kind: RequestKind,
        numero_filter: Option<&str>,
    ) -> Result<Vec<RequestSummary>> {
        let needle = numero_filter.map(str::to_lowercase);
        let g = self.lock()?;
        Ok(g.requests
            .get(&kind)
            .map(|v| {
                v.iter()
                    .filter(|r| match &needle {
                        Some(n) => r.numero.to_lowercase().contains(n.as_str()),
                        None => true,
                    })
                    .map(|r| RequestSummary {
                        id: r.id,
                        numero: r.numero.clone(),
                        kind: r.kind,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ArticleCatalog for MemoryStore {
    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.lock()?.articles.get(&id).cloned())
    }
}

#[async_trait::async_trait]
impl QuoteStore for MemoryStore {
    async fn insert_quote(&self, quote: NewQuote) -> Result<Quote> {
        if take_fault(&self.fail_inserts) {
            bail!("injected insert failure");
        }
        let mut g = self.lock()?;
        if g.quotes.iter().any(|q| q.numero == quote.numero) {
            bail!("duplicate quote numero {}", quote.numero);
        }
        g.tick += 1;
        let created_at = Utc
            .timestamp_opt(1_735_689_600, 0)
            .single()
            .ok_or_else(|| anyhow!("bad epoch"))?
            + Duration::seconds(g.tick);
        let stored = Quote {
            id: Uuid::new_v4(),
            numero: quote.numero,
            primary: quote.primary,
            client: quote.client,
            lines: quote.lines,
            totals: quote.totals,
            meta: quote.meta,
            created_at,
            document: None,
        };
        g.quotes.push(stored.clone());
        Ok(stored)
    }

    async fn find_conversion_marks(
        &self,
        ids: &[Uuid],
        numeros: &[String],
    ) -> Result<Vec<ConversionMark>> {
        let g = self.lock()?;
        Ok(g.quotes
            .iter()
            .filter(|q| {
                ids.iter().any(|id| claims_id(q, *id))
                    || numeros.iter().any(|n| claims_numero(q, n))
            })
            .map(|q| ConversionMark {
                request_ids: q.request_ids(),
                request_numeros: q.request_numeros(),
            })
            .collect())
    }

    async fn find_latest_by_request(
        &self,
        id: Option<Uuid>,
        numero: Option<&str>,
    ) -> Result<Option<Quote>> {
        let g = self.lock()?;
        Ok(g.quotes
            .iter()
            .filter(|q| {
                id.map(|id| claims_id(q, id)).unwrap_or(false)
                    || numero.map(|n| claims_numero(q, n)).unwrap_or(false)
            })
            .max_by_key(|q| q.created_at)
            .cloned())
    }

    async fn find_by_numero(&self, numero: &str) -> Result<Option<Quote>> {
        Ok(self
            .lock()?
            .quotes
            .iter()
            .find(|q| q.numero == numero)
            .cloned())
    }

    async fn attach_document(&self, quote_id: Uuid, document: &RenderedDocument) -> Result<()> {
        if take_fault(&self.fail_attach) {
            bail!("injected attach failure");
        }
        let mut g = self.lock()?;
        let quote = g
            .quotes
            .iter_mut()
            .find(|q| q.id == quote_id)
            .ok_or_else(|| anyhow!("quote {quote_id} not found"))?;
        quote.document = Some(DocumentInfo {
            content_type: document.content_type.clone(),
            size_bytes: document.bytes.len() as i64,
            rendered_at: Utc::now(),
        });
        g.documents.insert(quote_id, document.clone());
        Ok(())
    }

    async fn fetch_document(&self, numero: &str) -> Result<Option<RenderedDocument>> {
        let g = self.lock()?;
        Ok(g.quotes
            .iter()
            .find(|q| q.numero == numero)
            .and_then(|q| g.documents.get(&q.id))
            .cloned())
    }
}

#[async_trait::async_trait]
impl SequenceStore for MemoryStore {
    async fn increment(&self, key: &SequenceKey) -> Result<i64> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        if take_fault(&self.fail_increments) {
            bail!("injected counter failure");
        }
        let mut g = self.lock()?;
        let seq = g.counters.entry(key.as_str().to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn current(&self, key: &SequenceKey) -> Result<Option<i64>> {
        Ok(self.lock()?.counters.get(key.as_str()).copied())
    }
}
