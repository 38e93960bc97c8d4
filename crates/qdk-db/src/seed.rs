//! Insert helpers for the records the quote engine reads but never writes:
//! clients, requests and catalog articles. Used by the CLI and DB tests.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use qdk_core::SequenceGenerator;
use qdk_pricing::Micros;
use qdk_schemas::{Article, RequestKind, RequestSummary};

use crate::store::request_table;

#[derive(Debug, Clone)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub kind: RequestKind,
    pub client_id: Uuid,
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub designation: String,
    pub unit: Option<String>,
    pub unit_price_ht: Micros,
}

pub async fn insert_client(pool: &PgPool, client: &NewClient) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        insert into clients (id, first_name, last_name, email, address, phone, tax_id)
        values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(&client.first_name)
    .bind(&client.last_name)
    .bind(&client.email)
    .bind(&client.address)
    .bind(&client.phone)
    .bind(&client.tax_id)
    .execute(pool)
    .await
    .context("insert_client failed")?;
    Ok(id)
}

/// Insert a request, numbering it from the `request:YYYY` counter.
pub async fn insert_request(
    pool: &PgPool,
    sequences: &SequenceGenerator,
    request: &NewRequest,
    now: DateTime<Utc>,
) -> Result<RequestSummary> {
    let id = Uuid::new_v4();
    let numero = sequences.next_request_number(now).await?;

    let sql = format!(
        "insert into {} (id, numero, client_id, spec, created_at) values ($1, $2, $3, $4, $5)",
        request_table(request.kind)
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(&numero)
        .bind(request.client_id)
        .bind(&request.spec)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("insert_request failed ({})", request.kind))?;

    Ok(RequestSummary {
        id,
        numero,
        kind: request.kind,
    })
}

/// Insert a catalog article, referencing it from the `article` counter.
pub async fn insert_article(
    pool: &PgPool,
    sequences: &SequenceGenerator,
    article: &NewArticle,
) -> Result<Article> {
    let id = Uuid::new_v4();
    let reference = sequences.next_article_reference().await?;

    sqlx::query(
        r#"
        insert into articles (id, reference, designation, unit, unit_price_micros)
        values ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(&reference)
    .bind(&article.designation)
    .bind(&article.unit)
    .bind(article.unit_price_ht.raw())
    .execute(pool)
    .await
    .context("insert_article failed")?;

    Ok(Article {
        id,
        reference,
        designation: article.designation.clone(),
        unit: article.unit.clone(),
        unit_price_ht: article.unit_price_ht,
    })
}
