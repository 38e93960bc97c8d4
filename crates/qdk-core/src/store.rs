//! Collaborator interfaces consumed by the quote engine.
//!
//! Storage, rendering and mail transport are pluggable: `qdk-db` implements
//! the stores over Postgres, `qdk-testkit` keeps them in memory.

use anyhow::Result;
use uuid::Uuid;

use qdk_numbering::SequenceKey;
use qdk_schemas::{
    Article, NewQuote, Quote, RenderedDocument, Request, RequestKind, RequestSummary,
};

/// One store per request kind, addressed by tag.
#[async_trait::async_trait]
pub trait RequestStore: Send + Sync {
    /// Load a request of `kind` with its owner. `Ok(None)` when absent.
    async fn find(&self, kind: RequestKind, id: Uuid) -> Result<Option<Request>>;

    /// Id/numero/kind of every request of `kind`, optionally restricted to
    /// numbers containing `numero_filter` (case-insensitive).
    async fn list_summaries(
        &self,
        kind: RequestKind,
        numero_filter: Option<&str>,
    ) -> Result<Vec<RequestSummary>>;
}

#[async_trait::async_trait]
pub trait ArticleCatalog: Send + Sync {
    async fn find_article(&self, id: Uuid) -> Result<Option<Article>>;
}

/// Request identities claimed by one existing quote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionMark {
    pub request_ids: Vec<Uuid>,
    pub request_numeros: Vec<String>,
}

#[async_trait::async_trait]
pub trait QuoteStore: Send + Sync {
    /// Persist quote, lines and request links atomically.
    async fn insert_quote(&self, quote: NewQuote) -> Result<Quote>;

    /// Marks of every quote whose primary id or metadata ids intersect `ids`,
    /// or whose primary, legacy or metadata numbers intersect `numeros`.
    async fn find_conversion_marks(
        &self,
        ids: &[Uuid],
        numeros: &[String],
    ) -> Result<Vec<ConversionMark>>;

    /// Most recent quote linked to the request by id (primary or metadata)
    /// or by number (primary, legacy or metadata).
    async fn find_latest_by_request(
        &self,
        id: Option<Uuid>,
        numero: Option<&str>,
    ) -> Result<Option<Quote>>;

    async fn find_by_numero(&self, numero: &str) -> Result<Option<Quote>>;

    async fn attach_document(&self, quote_id: Uuid, document: &RenderedDocument) -> Result<()>;

    async fn fetch_document(&self, numero: &str) -> Result<Option<RenderedDocument>>;
}

/// Atomic counters. `increment` must be a single find-and-increment
/// (insert-if-absent starting at 1), never a read followed by a write.
#[async_trait::async_trait]
pub trait SequenceStore: Send + Sync {
    async fn increment(&self, key: &SequenceKey) -> Result<i64>;

    /// Last issued value, without incrementing.
    async fn current(&self, key: &SequenceKey) -> Result<Option<i64>>;
}

#[async_trait::async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Pure function of the persisted quote.
    async fn render(&self, quote: &Quote) -> Result<RenderedDocument>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn transport_name(&self) -> &'static str;

    async fn send(&self, mail: &MailMessage) -> Result<()>;
}
