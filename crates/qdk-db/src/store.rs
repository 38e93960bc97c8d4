use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use qdk_core::store::{
    ArticleCatalog, ConversionMark, DocumentRenderer, Notifier, QuoteStore, RequestStore,
    SequenceStore,
};
use qdk_core::Collaborators;
use qdk_numbering::SequenceKey;
use qdk_pricing::{Micros, Percent, Quantity, QuoteTotals};
use qdk_schemas::{
    Article, Client, ClientSnapshot, DocumentInfo, NewQuote, PrimaryLink, Quote, QuoteLine,
    QuoteMeta, RenderedDocument, Request, RequestKind, RequestLink, RequestSummary,
};

use crate::is_unique_constraint_violation;

/// Table holding requests of `kind`.
pub fn request_table(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Compression => "requests_compression",
        RequestKind::Traction => "requests_traction",
        RequestKind::Torsion => "requests_torsion",
        RequestKind::Wire => "requests_wire",
        RequestKind::Grid => "requests_grid",
        RequestKind::Other => "requests_other",
    }
}

const QUOTE_COLUMNS: &str = r#"
  q.id, q.numero,
  q.primary_request_id, q.primary_request_kind, q.primary_request_numero,
  q.legacy_request_numero,
  q.client_id, q.client_name, q.client_email, q.client_address, q.client_phone, q.client_tax_id,
  q.total_ht_micros, q.net_ht_micros, q.vat_micros, q.surcharge_pct_raw,
  q.surcharge_micros, q.stamp_duty_micros, q.gross_ttc_micros,
  q.document_content_type, q.document_size_bytes, q.document_rendered_at,
  q.created_at
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wire this store as every storage collaborator of the engine.
    pub fn collaborators(
        self: &Arc<Self>,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Collaborators {
        Collaborators {
            requests: self.clone(),
            articles: self.clone(),
            quotes: self.clone(),
            counters: self.clone(),
            renderer,
            notifier,
        }
    }

    /// Attach lines and links to a quote row.
    async fn hydrate(&self, row: PgRow) -> Result<Quote> {
        let id: Uuid = row.try_get("id")?;

        let lines = sqlx::query(
            r#"
            select reference, designation, unit, quantity_millis, unit_price_micros,
                   discount_pct_raw, tax_pct_raw, total_ht_micros
            from quote_lines
            where quote_id = $1
            order by position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("fetch quote_lines failed")?
        .iter()
        .map(line_from_row)
        .collect::<Result<Vec<_>>>()?;

        let links = self.fetch_links(&[id]).await?.remove(&id).unwrap_or_default();

        quote_from_row(&row, lines, links)
    }

    async fn fetch_links(&self, quote_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<RequestLink>>> {
        let rows = sqlx::query(
            r#"
            select quote_id, request_id, numero, kind
            from quote_requests
            where quote_id = any($1)
            order by quote_id, position
            "#,
        )
        .bind(quote_ids)
        .fetch_all(&self.pool)
        .await
        .context("fetch quote_requests failed")?;

        let mut out: HashMap<Uuid, Vec<RequestLink>> = HashMap::new();
        for row in rows {
            let quote_id: Uuid = row.try_get("quote_id")?;
            out.entry(quote_id).or_default().push(RequestLink {
                id: row.try_get("request_id")?,
                numero: row.try_get("numero")?,
                kind: parse_kind(&row.try_get::<String, _>("kind")?)?,
            });
        }
        Ok(out)
    }
}

fn parse_kind(raw: &str) -> Result<RequestKind> {
    RequestKind::parse(raw).ok_or_else(|| anyhow!("invalid request kind in db: {raw}"))
}

fn line_from_row(row: &PgRow) -> Result<QuoteLine> {
    Ok(QuoteLine {
        reference: row.try_get("reference")?,
        designation: row.try_get("designation")?,
        unit: row.try_get("unit")?,
        quantity: Quantity::new(row.try_get("quantity_millis")?),
        unit_price_ht: Micros::new(row.try_get("unit_price_micros")?),
        discount_pct: Percent::new(row.try_get("discount_pct_raw")?),
        tax_pct: Percent::new(row.try_get("tax_pct_raw")?),
        total_ht: Micros::new(row.try_get("total_ht_micros")?),
    })
}

fn quote_from_row(row: &PgRow, lines: Vec<QuoteLine>, links: Vec<RequestLink>) -> Result<Quote> {
    let primary_kind: Option<String> = row.try_get("primary_request_kind")?;
    let document = match (
        row.try_get::<Option<String>, _>("document_content_type")?,
        row.try_get::<Option<i64>, _>("document_size_bytes")?,
        row.try_get::<Option<DateTime<Utc>>, _>("document_rendered_at")?,
    ) {
        (Some(content_type), Some(size_bytes), Some(rendered_at)) => Some(DocumentInfo {
            content_type,
            size_bytes,
            rendered_at,
        }),
        _ => None,
    };

    Ok(Quote {
        id: row.try_get("id")?,
        numero: row.try_get("numero")?,
        primary: PrimaryLink {
            id: row.try_get("primary_request_id")?,
            kind: primary_kind.as_deref().map(parse_kind).transpose()?,
            numero: row.try_get("primary_request_numero")?,
        },
        client: ClientSnapshot {
            client_id: row.try_get("client_id")?,
            name: row.try_get("client_name")?,
            email: row.try_get("client_email")?,
            address: row.try_get("client_address")?,
            phone: row.try_get("client_phone")?,
            tax_id: row.try_get("client_tax_id")?,
        },
        lines,
        totals: QuoteTotals {
            total_ht: Micros::new(row.try_get("total_ht_micros")?),
            net_ht: Micros::new(row.try_get("net_ht_micros")?),
            vat: Micros::new(row.try_get("vat_micros")?),
            surcharge_pct: Percent::new(row.try_get("surcharge_pct_raw")?),
            surcharge: Micros::new(row.try_get("surcharge_micros")?),
            stamp_duty: Micros::new(row.try_get("stamp_duty_micros")?),
            gross_ttc: Micros::new(row.try_get("gross_ttc_micros")?),
        },
        meta: QuoteMeta {
            requests: links,
            legacy_request_numero: row.try_get("legacy_request_numero")?,
        },
        created_at: row.try_get("created_at")?,
        document,
    })
}

#[async_trait::async_trait]
impl RequestStore for PgStore {
    async fn find(&self, kind: RequestKind, id: Uuid) -> Result<Option<Request>> {
        let sql = format!(
            r#"
            select r.id, r.numero, r.spec, r.created_at,
                   c.id as client_id, c.first_name, c.last_name, c.email,
                   c.address, c.phone, c.tax_id
            from {} r
            join clients c on c.id = r.client_id
            where r.id = $1
            "#,
            request_table(kind)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("find request failed ({kind})"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Request {
            id: row.try_get("id")?,
            kind,
            numero: row.try_get("numero")?,
            owner: Client {
                id: row.try_get("client_id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                email: row.try_get("email")?,
                address: row.try_get("address")?,
                phone: row.try_get("phone")?,
                tax_id: row.try_get("tax_id")?,
            },
            created_at: row.try_get("created_at")?,
            spec: row.try_get("spec")?,
        }))
    }

    async fn list_summaries(
        &self,
        kind: RequestKind,
        numero_filter: Option<&str>,
    ) -> Result<Vec<RequestSummary>> {
        // strpos instead of ilike so `%` and `_` in the filter match literally.
        let sql = format!(
            r#"
            select id, numero
            from {}
            where $1::text is null or strpos(lower(numero), lower($1)) > 0
            "#,
            request_table(kind)
        );
        let rows = sqlx::query(&sql)
            .bind(numero_filter)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("list request summaries failed ({kind})"))?;

        rows.iter()
            .map(|row| {
                Ok(RequestSummary {
                    id: row.try_get("id")?,
                    numero: row.try_get("numero")?,
                    kind,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ArticleCatalog for PgStore {
    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query(
            r#"
            select id, reference, designation, unit, unit_price_micros
            from articles
            where id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find_article failed")?;

        row.map(|row| {
            Ok(Article {
                id: row.try_get("id")?,
                reference: row.try_get("reference")?,
                designation: row.try_get("designation")?,
                unit: row.try_get("unit")?,
                unit_price_ht: Micros::new(row.try_get("unit_price_micros")?),
            })
        })
        .transpose()
    }
}

#[async_trait::async_trait]
impl QuoteStore for PgStore {
    async fn insert_quote(&self, quote: NewQuote) -> Result<Quote> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.context("begin insert_quote failed")?;

        let res = sqlx::query(
            r#"
            insert into quotes (
              id, numero,
              primary_request_id, primary_request_kind, primary_request_numero,
              legacy_request_numero,
              client_id, client_name, client_email, client_address, client_phone, client_tax_id,
              total_ht_micros, net_ht_micros, vat_micros, surcharge_pct_raw,
              surcharge_micros, stamp_duty_micros, gross_ttc_micros
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
              $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(id)
        .bind(&quote.numero)
        .bind(quote.primary.id)
        .bind(quote.primary.kind.map(RequestKind::as_str))
        .bind(&quote.primary.numero)
        .bind(&quote.meta.legacy_request_numero)
        .bind(quote.client.client_id)
        .bind(&quote.client.name)
        .bind(&quote.client.email)
        .bind(&quote.client.address)
        .bind(&quote.client.phone)
        .bind(&quote.client.tax_id)
        .bind(quote.totals.total_ht.raw())
        .bind(quote.totals.net_ht.raw())
        .bind(quote.totals.vat.raw())
        .bind(quote.totals.surcharge_pct.raw())
        .bind(quote.totals.surcharge.raw())
        .bind(quote.totals.stamp_duty.raw())
        .bind(quote.totals.gross_ttc.raw())
        .execute(&mut *tx)
        .await;

        if let Err(e) = res {
            if is_unique_constraint_violation(&e, "quotes_numero_key") {
                warn!(quote_numero = %quote.numero, "quote numero already stored");
                bail!("duplicate quote numero {}", quote.numero);
            }
            return Err(anyhow::Error::new(e).context("insert quote failed"));
        }

        for (position, line) in quote.lines.iter().enumerate() {
            sqlx::query(
                r#"
                insert into quote_lines (
                  quote_id, position, reference, designation, unit, quantity_millis,
                  unit_price_micros, discount_pct_raw, tax_pct_raw, total_ht_micros
                ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(&line.reference)
            .bind(&line.designation)
            .bind(&line.unit)
            .bind(line.quantity.raw())
            .bind(line.unit_price_ht.raw())
            .bind(line.discount_pct.raw())
            .bind(line.tax_pct.raw())
            .bind(line.total_ht.raw())
            .execute(&mut *tx)
            .await
            .context("insert quote_line failed")?;
        }

        for (position, link) in quote.meta.requests.iter().enumerate() {
            sqlx::query(
                r#"
                insert into quote_requests (quote_id, position, request_id, numero, kind)
                values ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(link.id)
            .bind(&link.numero)
            .bind(link.kind.as_str())
            .execute(&mut *tx)
            .await
            .context("insert quote_request failed")?;
        }

        let (created_at,): (DateTime<Utc>,) =
            sqlx::query_as("select created_at from quotes where id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .context("read quote created_at failed")?;

        tx.commit().await.context("commit insert_quote failed")?;

        Ok(Quote {
            id,
            numero: quote.numero,
            primary: quote.primary,
            client: quote.client,
            lines: quote.lines,
            totals: quote.totals,
            meta: quote.meta,
            created_at,
            document: None,
        })
    }

    async fn find_conversion_marks(
        &self,
        ids: &[Uuid],
        numeros: &[String],
    ) -> Result<Vec<ConversionMark>> {
        let rows = sqlx::query(
            r#"
            select q.id, q.primary_request_id, q.primary_request_numero, q.legacy_request_numero
            from quotes q
            where q.primary_request_id = any($1)
               or q.primary_request_numero = any($2)
               or q.legacy_request_numero = any($2)
               or exists (
                 select 1 from quote_requests qr
                 where qr.quote_id = q.id
                   and (qr.request_id = any($1) or qr.numero = any($2))
               )
            "#,
        )
        .bind(ids)
        .bind(numeros)
        .fetch_all(&self.pool)
        .await
        .context("find_conversion_marks failed")?;

        let quote_ids = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut links = self.fetch_links(&quote_ids).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                let primary = PrimaryLink {
                    id: row.try_get("primary_request_id")?,
                    kind: None,
                    numero: row.try_get("primary_request_numero")?,
                };
                let meta = QuoteMeta {
                    requests: links.remove(&id).unwrap_or_default(),
                    legacy_request_numero: row.try_get("legacy_request_numero")?,
                };
                Ok(ConversionMark {
                    request_ids: primary.claimed_ids(&meta),
                    request_numeros: primary.claimed_numeros(&meta),
                })
            })
            .collect()
    }

    async fn find_latest_by_request(
        &self,
        id: Option<Uuid>,
        numero: Option<&str>,
    ) -> Result<Option<Quote>> {
        let sql = format!(
            r#"
            select {QUOTE_COLUMNS}
            from quotes q
            where ($1::uuid is not null and (
                    q.primary_request_id = $1
                    or exists (select 1 from quote_requests qr
                               where qr.quote_id = q.id and qr.request_id = $1)))
               or ($2::text is not null and (
                    q.primary_request_numero = $2
                    or q.legacy_request_numero = $2
                    or exists (select 1 from quote_requests qr
                               where qr.quote_id = q.id and qr.numero = $2)))
            order by q.created_at desc
            limit 1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(numero)
            .fetch_optional(&self.pool)
            .await
            .context("find_latest_by_request failed")?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_numero(&self, numero: &str) -> Result<Option<Quote>> {
        let sql = format!("select {QUOTE_COLUMNS} from quotes q where q.numero = $1");
        let row = sqlx::query(&sql)
            .bind(numero)
            .fetch_optional(&self.pool)
            .await
            .context("find_by_numero failed")?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn attach_document(&self, quote_id: Uuid, document: &RenderedDocument) -> Result<()> {
        let res = sqlx::query(
            r#"
            update quotes
            set document = $2,
                document_content_type = $3,
                document_size_bytes = $4,
                document_rendered_at = now()
            where id = $1
            "#,
        )
        .bind(quote_id)
        .bind(&document.bytes)
        .bind(&document.content_type)
        .bind(document.bytes.len() as i64)
        .execute(&self.pool)
        .await
        .context("attach_document failed")?;

        if res.rows_affected() == 0 {
            bail!("attach_document: quote {quote_id} not found");
        }
        Ok(())
    }

    async fn fetch_document(&self, numero: &str) -> Result<Option<RenderedDocument>> {
        let row: Option<(Option<Vec<u8>>, Option<String>)> = sqlx::query_as(
            "select document, document_content_type from quotes where numero = $1",
        )
        .bind(numero)
        .fetch_optional(&self.pool)
        .await
        .context("fetch_document failed")?;

        Ok(match row {
            Some((Some(bytes), Some(content_type))) => Some(RenderedDocument {
                content_type,
                bytes,
            }),
            _ => None,
        })
    }
}

#[async_trait::async_trait]
impl SequenceStore for PgStore {
    async fn increment(&self, key: &SequenceKey) -> Result<i64> {
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            insert into counters (key, seq) values ($1, 1)
            on conflict (key) do update set seq = counters.seq + 1
            returning seq
            "#,
        )
        .bind(key.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("counter increment failed ({key})"))?;
        Ok(seq)
    }

    async fn current(&self, key: &SequenceKey) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("select seq from counters where key = $1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("counter read failed ({key})"))?;
        Ok(row.map(|(seq,)| seq))
    }
}
