//! Request and response types for all qdk-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qdk_schemas::{QuoteSummary, UnconvertedRequest};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/from-requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRef {
    pub id: Uuid,
    pub numero: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuoteResponse {
    pub success: bool,
    pub quote: QuoteRef,
    /// Where the rendered document will be served once delivery has run.
    pub pdf: String,
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/requests/unconverted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnconvertedQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnconvertedResponse {
    pub success: bool,
    pub data: Vec<UnconvertedRequest>,
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/next-number/preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub numero: String,
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/{admin,client}/by-request/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ByRequestQuery {
    pub numero: Option<String>,
}

/// `exists: false` covers "no quote", "unknown request" and "not yours".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByRequestResponse {
    pub success: bool,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<QuoteSummary>,
}
