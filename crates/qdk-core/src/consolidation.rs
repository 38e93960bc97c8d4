//! Merge one or more requests of the same client into a single numbered quote.
//!
//! Order of operations matters for the invariants:
//! 1. every check (resolution, ownership, lines, totals) runs before the
//!    counter is touched, so a rejected call never consumes a number;
//! 2. the number is issued, then quote + lines + links are written in one
//!    storage call, so a quote is never partially persisted;
//! 3. delivery is spawned after the write and not awaited.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use qdk_config::PricingConfig;
use qdk_pricing::{compute_totals, line_total_ht, DecimalError, Percent, Quantity, TaxedAmount};
use qdk_schemas::{
    Caller, CreateQuoteInput, DecimalInput, NewQuote, PrimaryLink, Quote, QuoteLine, QuoteMeta,
    Request,
};

use crate::delivery::{DeliveryReport, DeliveryTrigger};
use crate::error::QuoteError;
use crate::resolver::RequestResolver;
use crate::sequence::SequenceGenerator;
use crate::store::{ArticleCatalog, QuoteStore};

const DEFAULT_UNIT: &str = "U";

/// Result of [`ConsolidationEngine::create`]. The quote is durable when this
/// is returned; `delivery` may still be running.
#[derive(Debug)]
pub struct CreatedQuote {
    pub quote: Quote,
    pub delivery: Option<JoinHandle<DeliveryReport>>,
}

#[derive(Clone)]
pub struct ConsolidationEngine {
    resolver: RequestResolver,
    articles: Arc<dyn ArticleCatalog>,
    quotes: Arc<dyn QuoteStore>,
    sequences: SequenceGenerator,
    delivery: DeliveryTrigger,
    pricing: PricingConfig,
}

impl ConsolidationEngine {
    pub fn new(
        resolver: RequestResolver,
        articles: Arc<dyn ArticleCatalog>,
        quotes: Arc<dyn QuoteStore>,
        sequences: SequenceGenerator,
        delivery: DeliveryTrigger,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            resolver,
            articles,
            quotes,
            sequences,
            delivery,
            pricing,
        }
    }

    /// Create a quote from `input` on behalf of an admin caller.
    ///
    /// Returns before document delivery completes.
    pub async fn create(
        &self,
        caller: &Caller,
        input: CreateQuoteInput,
        now: DateTime<Utc>,
    ) -> Result<CreatedQuote, QuoteError> {
        if !caller.is_admin() {
            return Err(QuoteError::Unauthorized);
        }
        if input.request_ids.iter().all(|s| s.trim().is_empty()) {
            return Err(QuoteError::ValidationFailed(
                "request_ids must not be empty".to_string(),
            ));
        }
        if input.lines.is_empty() {
            return Err(QuoteError::ValidationFailed(
                "lines must not be empty".to_string(),
            ));
        }

        let requests = self.load_requests(&input.request_ids).await?;
        check_same_owner(&requests)?;

        let lines = self.build_lines(&input, &requests).await?;
        if lines.is_empty() {
            return Err(QuoteError::NoValidLines);
        }

        let taxed: Vec<TaxedAmount> = lines
            .iter()
            .map(|l| TaxedAmount {
                total_ht: l.total_ht,
                tax_pct: l.tax_pct,
            })
            .collect();
        let totals =
            compute_totals(&taxed).map_err(|e| QuoteError::ValidationFailed(e.to_string()))?;

        let numero = self.sequences.next_quote_number(now).await?;

        let primary = &requests[0];
        let new_quote = NewQuote {
            numero: numero.clone(),
            primary: PrimaryLink {
                id: Some(primary.id),
                kind: Some(primary.kind),
                numero: Some(primary.numero.clone()),
            },
            client: primary.owner.snapshot(),
            lines,
            totals,
            meta: QuoteMeta {
                requests: requests.iter().map(Request::link).collect(),
                legacy_request_numero: None,
            },
        };

        let quote = match self.quotes.insert_quote(new_quote).await {
            Ok(q) => q,
            Err(e) => {
                // The number stays consumed; gaps are accepted.
                warn!(quote_numero = %numero, error = %format!("{e:#}"), "quote insert failed after number issuance");
                return Err(QuoteError::Storage(e));
            }
        };

        info!(
            quote_numero = %quote.numero,
            request_count = requests.len(),
            line_count = quote.lines.len(),
            gross_ttc = %quote.totals.gross_ttc,
            "quote created"
        );

        let delivery = self
            .delivery
            .schedule(quote.clone(), input.send_email.unwrap_or(true));

        Ok(CreatedQuote { quote, delivery })
    }

    /// Resolve every id in order, skipping repeats of an already loaded request.
    async fn load_requests(&self, raw_ids: &[String]) -> Result<Vec<Request>, QuoteError> {
        let mut out: Vec<Request> = Vec::with_capacity(raw_ids.len());
        for raw in raw_ids {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let req = self
                .resolver
                .resolve_str(raw)
                .await?
                .ok_or_else(|| QuoteError::RequestNotFound(raw.to_string()))?;
            if out.iter().any(|r| r.id == req.id) {
                continue;
            }
            out.push(req);
        }
        Ok(out)
    }

    async fn build_lines(
        &self,
        input: &CreateQuoteInput,
        requests: &[Request],
    ) -> Result<Vec<QuoteLine>, QuoteError> {
        let mut lines = Vec::with_capacity(input.lines.len());

        for (idx, li) in input.lines.iter().enumerate() {
            let line_no = idx + 1;

            let request_id = Uuid::parse_str(li.request_id.trim())
                .ok()
                .filter(|id| requests.iter().any(|r| r.id == *id))
                .ok_or_else(|| {
                    QuoteError::ValidationFailed(format!(
                        "line {line_no}: request {:?} is not one of request_ids",
                        li.request_id
                    ))
                })?;

            let qty = decimal_field(
                li.qty.as_ref(),
                self.pricing.default_quantity,
                Quantity::parse,
                "qty",
                line_no,
            )?;
            if qty.is_negative() {
                return Err(QuoteError::ValidationFailed(format!(
                    "line {line_no}: qty must be >= 0, got {qty}"
                )));
            }
            let discount_pct = decimal_field(
                li.discount_pct.as_ref(),
                self.pricing.default_discount_pct,
                Percent::parse,
                "discount_pct",
                line_no,
            )?;
            if discount_pct < Percent::ZERO || discount_pct >= Percent::HUNDRED {
                return Err(QuoteError::ValidationFailed(format!(
                    "line {line_no}: discount_pct must be in [0, 100), got {discount_pct}"
                )));
            }
            let tax_pct = decimal_field(
                li.tax_pct.as_ref(),
                self.pricing.default_tax_pct,
                Percent::parse,
                "tax_pct",
                line_no,
            )?;
            if tax_pct < Percent::ZERO {
                return Err(QuoteError::ValidationFailed(format!(
                    "line {line_no}: tax_pct must be >= 0, got {tax_pct}"
                )));
            }

            let not_found = || QuoteError::ArticleNotFound {
                article_id: li.article_id.clone(),
                request_id: request_id.to_string(),
            };
            let article_id = Uuid::parse_str(li.article_id.trim()).map_err(|_| not_found())?;
            let article = self
                .articles
                .find_article(article_id)
                .await?
                .ok_or_else(not_found)?;

            if qty.is_zero() {
                debug!(line_no, article = %article.reference, "zero quantity line dropped");
                continue;
            }

            let total_ht = line_total_ht(qty, article.unit_price_ht, discount_pct).map_err(|e| {
                QuoteError::ValidationFailed(format!("line {line_no}: {e}"))
            })?;

            lines.push(QuoteLine {
                reference: article.reference,
                designation: article.designation,
                unit: article
                    .unit
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
                quantity: qty,
                unit_price_ht: article.unit_price_ht,
                discount_pct,
                tax_pct,
                total_ht,
            });
        }

        Ok(lines)
    }
}

fn check_same_owner(requests: &[Request]) -> Result<(), QuoteError> {
    let Some(first) = requests.first() else {
        return Err(QuoteError::ValidationFailed(
            "request_ids must not be empty".to_string(),
        ));
    };
    let expected = first.owner.id;
    match requests.iter().find(|r| r.owner.id != expected) {
        Some(other) => Err(QuoteError::OwnerMismatch {
            expected,
            found: other.owner.id,
            request_id: other.id,
        }),
        None => Ok(()),
    }
}

/// Absent or blank input takes the default.
fn decimal_field<T>(
    input: Option<&DecimalInput>,
    default: T,
    parse: fn(&str) -> Result<T, DecimalError>,
    field: &str,
    line_no: usize,
) -> Result<T, QuoteError> {
    let text = match input {
        None => return Ok(default),
        Some(v) => v.as_text(),
    };
    if text.trim().is_empty() {
        return Ok(default);
    }
    parse(&text)
        .map_err(|e| QuoteError::ValidationFailed(format!("line {line_no}: {field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_decimal_takes_default() {
        let v = decimal_field(
            Some(&DecimalInput::Text("  ".into())),
            Quantity::ONE,
            Quantity::parse,
            "qty",
            1,
        )
        .unwrap();
        assert_eq!(v, Quantity::ONE);
        let v = decimal_field(None, Percent::from_whole(19), Percent::parse, "tax_pct", 1).unwrap();
        assert_eq!(v, Percent::from_whole(19));
    }

    #[test]
    fn bad_decimal_names_line_and_field() {
        let err = decimal_field(
            Some(&DecimalInput::Text("abc".into())),
            Quantity::ONE,
            Quantity::parse,
            "qty",
            3,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3") && msg.contains("qty"), "{msg}");
    }
}
