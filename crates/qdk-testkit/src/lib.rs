//! Test doubles and fixtures for the quote engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use qdk_config::ServiceConfig;
use qdk_core::store::{DocumentRenderer, MailMessage, Notifier};
use qdk_core::{Collaborators, QuoteDesk, TextRenderer};
use qdk_pricing::Micros;
use qdk_schemas::{
    Article, Caller, Client, CreateQuoteInput, DecimalInput, LineInput, Quote, RenderedDocument,
    Request, RequestKind, Role,
};

mod memory;

pub use memory::MemoryStore;

/// Captures every mail instead of sending it. Can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let n = Self::default();
        n.failing.store(true, Ordering::SeqCst);
        n
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn transport_name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, mail: &MailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("injected smtp failure");
        }
        self.sent
            .lock()
            .map_err(|_| anyhow!("recording notifier poisoned"))?
            .push(mail.clone());
        Ok(())
    }
}

/// Renderer that always fails.
#[derive(Debug, Default)]
pub struct FailingRenderer;

#[async_trait::async_trait]
impl DocumentRenderer for FailingRenderer {
    async fn render(&self, _quote: &Quote) -> Result<RenderedDocument> {
        bail!("injected render failure")
    }
}

/// A wired desk over one shared [`MemoryStore`].
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub desk: QuoteDesk,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ServiceConfig::default(), Arc::new(TextRenderer), RecordingNotifier::default())
    }

    pub fn with(
        cfg: ServiceConfig,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: RecordingNotifier,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let desk = QuoteDesk::new(
            Collaborators {
                requests: store.clone(),
                articles: store.clone(),
                quotes: store.clone(),
                counters: store.clone(),
                renderer,
                notifier: notifier.clone(),
            },
            &cfg,
        );
        Self {
            store,
            notifier,
            desk,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn admin() -> Caller {
    Caller {
        id: Uuid::new_v4(),
        role: Role::Admin,
    }
}

pub fn client_caller(client: &Client) -> Caller {
    Caller {
        id: client.id,
        role: Role::Client,
    }
}

pub fn client(first_name: &str, email: Option<&str>) -> Client {
    Client {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: "Test".to_string(),
        email: email.map(str::to_string),
        address: Some("Zone industrielle, Sfax".to_string()),
        phone: Some("+216 74 000 000".to_string()),
        tax_id: Some("0000000/A/M/000".to_string()),
    }
}

pub fn request(kind: RequestKind, numero: &str, owner: &Client) -> Request {
    Request {
        id: Uuid::new_v4(),
        kind,
        numero: numero.to_string(),
        owner: owner.clone(),
        created_at: fixed_now(),
        spec: serde_json::json!({}),
    }
}

pub fn article(reference: &str, unit_price_ht: &str) -> Result<Article> {
    Ok(Article {
        id: Uuid::new_v4(),
        reference: reference.to_string(),
        designation: format!("Article {reference}"),
        unit: None,
        unit_price_ht: Micros::parse(unit_price_ht)?,
    })
}

pub fn line(request: &Request, article: &Article) -> LineInput {
    LineInput {
        request_id: request.id.to_string(),
        article_id: article.id.to_string(),
        qty: None,
        discount_pct: None,
        tax_pct: None,
    }
}

/// Line with whole-number quantity and percentages sent as JSON numbers.
pub fn line_with(
    request: &Request,
    article: &Article,
    qty: i64,
    discount_pct: i64,
    tax_pct: i64,
) -> LineInput {
    LineInput {
        qty: Some(DecimalInput::from(qty)),
        discount_pct: Some(DecimalInput::from(discount_pct)),
        tax_pct: Some(DecimalInput::from(tax_pct)),
        ..line(request, article)
    }
}

pub fn create_input(requests: &[&Request], lines: Vec<LineInput>) -> CreateQuoteInput {
    CreateQuoteInput {
        request_ids: requests.iter().map(|r| r.id.to_string()).collect(),
        lines,
        send_email: None,
    }
}

/// 2025-03-14T10:00:00Z
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
