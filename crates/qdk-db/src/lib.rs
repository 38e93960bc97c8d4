//! Postgres persistence for QuoteDesk.
//!
//! `PgStore` implements every qdk-core store trait over one connection
//! pool. Schema lives in `./migrations` and is embedded at compile time.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod seed;
mod store;

pub use seed::{insert_article, insert_client, insert_request, NewArticle, NewClient, NewRequest};
pub use store::{request_table, PgStore};

pub const ENV_DB_URL: &str = "QDK_DATABASE_URL";

/// Connect to Postgres using QDK_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='quotes'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let quote_count = if exists {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*)::bigint from quotes")
            .fetch_one(pool)
            .await
            .context("status quote count failed")?;
        n
    } else {
        0
    };

    Ok(DbStatus {
        ok,
        has_quotes_table: exists,
        quote_count,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_quotes_table: bool,
    pub quote_count: i64,
}

/// Detect a Postgres unique constraint violation by name.
pub(crate) fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
