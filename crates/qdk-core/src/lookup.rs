//! Read paths: find a quote through its request, fetch its document.
//!
//! Non-owners get the same answer as "no quote" so that record existence is
//! never confirmed to them.

use std::sync::Arc;

use uuid::Uuid;

use qdk_schemas::{Caller, Quote, QuoteSummary, RenderedDocument};

use crate::error::QuoteError;
use crate::resolver::RequestResolver;
use crate::store::QuoteStore;

/// Public URL of a quote's rendered document.
pub fn document_url(public_origin: &str, numero: &str) -> String {
    format!(
        "{}/v1/quotes/{}/document",
        public_origin.trim_end_matches('/'),
        numero
    )
}

#[derive(Clone)]
pub struct QuoteLookup {
    resolver: RequestResolver,
    quotes: Arc<dyn QuoteStore>,
    public_origin: String,
}

impl QuoteLookup {
    pub fn new(resolver: RequestResolver, quotes: Arc<dyn QuoteStore>, public_origin: String) -> Self {
        Self {
            resolver,
            quotes,
            public_origin,
        }
    }

    pub fn public_origin(&self) -> &str {
        &self.public_origin
    }

    fn summarize(&self, quote: Quote) -> QuoteSummary {
        QuoteSummary {
            pdf: document_url(&self.public_origin, &quote.numero),
            request_numeros: quote.request_numeros(),
            id: quote.id,
            numero: quote.numero,
            created_at: quote.created_at,
        }
    }

    /// Admin lookup by request id and/or request number. The id need not
    /// belong to a live request; legacy quotes may only match by number.
    pub async fn find_by_request_admin(
        &self,
        caller: &Caller,
        request_id: &str,
        numero: Option<&str>,
    ) -> Result<Option<QuoteSummary>, QuoteError> {
        if !caller.is_admin() {
            return Err(QuoteError::Unauthorized);
        }
        let id = Uuid::parse_str(request_id.trim()).ok();
        let numero = numero.map(str::trim).filter(|n| !n.is_empty());
        if id.is_none() && numero.is_none() {
            return Err(QuoteError::ValidationFailed(
                "a valid request id or numero is required".to_string(),
            ));
        }

        let found = self.quotes.find_latest_by_request(id, numero).await?;
        Ok(found.map(|q| self.summarize(q)))
    }

    /// Lookup for the request's owner (or an admin). Any other caller, an
    /// unknown request, and "no quote yet" all produce `Ok(None)`.
    pub async fn find_by_request_for_caller(
        &self,
        caller: &Caller,
        request_id: &str,
        numero: Option<&str>,
    ) -> Result<Option<QuoteSummary>, QuoteError> {
        let Some(request) = self.resolver.resolve_str(request_id).await? else {
            return Ok(None);
        };
        if !caller.is_admin() && request.owner.id != caller.id {
            return Ok(None);
        }

        let numero = numero
            .map(|n| n.trim().to_uppercase())
            .filter(|n| !n.is_empty());
        let found = self
            .quotes
            .find_latest_by_request(Some(request.id), numero.as_deref())
            .await?;
        Ok(found.map(|q| self.summarize(q)))
    }

    /// Stored document of quote `numero`, visible to admins and to the
    /// quote's client. Anything else is reported as not found.
    pub async fn document(
        &self,
        caller: &Caller,
        numero: &str,
    ) -> Result<RenderedDocument, QuoteError> {
        let numero = numero.trim();
        let not_found = || QuoteError::QuoteNotFound(numero.to_string());

        let quote = self
            .quotes
            .find_by_numero(numero)
            .await?
            .ok_or_else(not_found)?;
        if !caller.is_admin() && quote.client.client_id != caller.id {
            return Err(not_found());
        }
        self.quotes
            .fetch_document(numero)
            .await?
            .ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_url_trims_trailing_slash() {
        assert_eq!(
            document_url("https://api.mtr.tn/", "DV2500001"),
            "https://api.mtr.tn/v1/quotes/DV2500001/document"
        );
    }
}
