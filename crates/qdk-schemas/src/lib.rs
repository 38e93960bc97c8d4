use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use qdk_pricing::{Micros, Percent, Quantity, QuoteTotals};

/// The six product families a request can belong to. Each family lives in
/// its own store; the wire token is the historical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "compression")]
    Compression,
    #[serde(rename = "traction")]
    Traction,
    #[serde(rename = "torsion")]
    Torsion,
    #[serde(rename = "fil")]
    Wire,
    #[serde(rename = "grille")]
    Grid,
    #[serde(rename = "autre")]
    Other,
}

impl RequestKind {
    pub const ALL: [RequestKind; 6] = [
        RequestKind::Compression,
        RequestKind::Traction,
        RequestKind::Torsion,
        RequestKind::Wire,
        RequestKind::Grid,
        RequestKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Compression => "compression",
            RequestKind::Traction => "traction",
            RequestKind::Torsion => "torsion",
            RequestKind::Wire => "fil",
            RequestKind::Grid => "grille",
            RequestKind::Other => "autre",
        }
    }

    pub fn parse(s: &str) -> Option<RequestKind> {
        RequestKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

/// Identity resolved by upstream middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

impl Client {
    /// "First Last", falling back to the email, then to an empty string.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.email.clone().unwrap_or_default()
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            client_id: self.id,
            name: self.display_name(),
            email: self.email.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            tax_id: self.tax_id.clone(),
        }
    }
}

/// Client details frozen onto a quote at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub client_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

/// A submitted request with its owner loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub kind: RequestKind,
    pub numero: String,
    pub owner: Client,
    pub created_at: DateTime<Utc>,
    /// Family-specific technical fields, opaque to the quote engine.
    pub spec: serde_json::Value,
}

impl Request {
    pub fn link(&self) -> RequestLink {
        RequestLink {
            id: self.id,
            numero: self.numero.clone(),
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: Uuid,
    pub numero: String,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub reference: String,
    pub designation: String,
    pub unit: Option<String>,
    pub unit_price_ht: Micros,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub reference: String,
    pub designation: String,
    pub unit: String,
    pub quantity: Quantity,
    pub unit_price_ht: Micros,
    pub discount_pct: Percent,
    pub tax_pct: Percent,
    pub total_ht: Micros,
}

/// Link to the originating request. Legacy rows may carry only the id or
/// only the numero, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryLink {
    pub id: Option<Uuid>,
    pub kind: Option<RequestKind>,
    pub numero: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLink {
    pub id: Uuid,
    pub numero: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteMeta {
    /// Every merged request, primary first. Empty on single-request legacy rows.
    pub requests: Vec<RequestLink>,
    /// Denormalized request number written by older intake flows.
    pub legacy_request_numero: Option<String>,
}

/// A quote ready to be persisted: everything except the storage-assigned
/// id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    pub numero: String,
    pub primary: PrimaryLink,
    pub client: ClientSnapshot,
    pub lines: Vec<QuoteLine>,
    pub totals: QuoteTotals,
    pub meta: QuoteMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub content_type: String,
    pub size_bytes: i64,
    pub rendered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub numero: String,
    pub primary: PrimaryLink,
    pub client: ClientSnapshot,
    pub lines: Vec<QuoteLine>,
    pub totals: QuoteTotals,
    pub meta: QuoteMeta,
    pub created_at: DateTime<Utc>,
    pub document: Option<DocumentInfo>,
}

impl PrimaryLink {
    /// Every request number claimed through this link and `meta`, primary
    /// first, deduplicated.
    pub fn claimed_numeros(&self, meta: &QuoteMeta) -> Vec<String> {
        let candidates = self
            .numero
            .iter()
            .chain(meta.legacy_request_numero.iter())
            .chain(meta.requests.iter().map(|r| &r.numero));
        let mut out: Vec<String> = Vec::new();
        for n in candidates {
            if !n.is_empty() && !out.iter().any(|seen| seen == n) {
                out.push(n.clone());
            }
        }
        out
    }

    /// Every request id claimed through this link and `meta`, primary first,
    /// deduplicated.
    pub fn claimed_ids(&self, meta: &QuoteMeta) -> Vec<Uuid> {
        let mut out: Vec<Uuid> = Vec::new();
        for id in self.id.iter().chain(meta.requests.iter().map(|r| &r.id)) {
            if !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }
}

impl Quote {
    pub fn request_numeros(&self) -> Vec<String> {
        self.primary.claimed_numeros(&self.meta)
    }

    pub fn request_ids(&self) -> Vec<Uuid> {
        self.primary.claimed_ids(&self.meta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Quote found through one of its requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub id: Uuid,
    pub numero: String,
    pub request_numeros: Vec<String>,
    pub pdf: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnconvertedRequest {
    pub numero: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
}

/// A decimal as sent by clients: either a JSON number or a string
/// (`"2"`, `"2.5"`, `"2,5"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecimalInput {
    Number(serde_json::Number),
    Text(String),
}

impl DecimalInput {
    pub fn as_text(&self) -> String {
        match self {
            DecimalInput::Number(n) => n.to_string(),
            DecimalInput::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for DecimalInput {
    fn from(s: &str) -> Self {
        DecimalInput::Text(s.to_string())
    }
}

impl From<i64> for DecimalInput {
    fn from(n: i64) -> Self {
        DecimalInput::Number(n.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub request_id: String,
    pub article_id: String,
    #[serde(default)]
    pub qty: Option<DecimalInput>,
    #[serde(default)]
    pub discount_pct: Option<DecimalInput>,
    #[serde(default)]
    pub tax_pct: Option<DecimalInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateQuoteInput {
    pub request_ids: Vec<String>,
    pub lines: Vec<LineInput>,
    #[serde(default)]
    pub send_email: Option<bool>,
}
