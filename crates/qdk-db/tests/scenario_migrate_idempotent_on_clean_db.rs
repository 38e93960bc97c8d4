/// Migrating twice must be a no-op the second time.
///
/// DB-backed test, skipped if QDK_DATABASE_URL is not set.
#[tokio::test]
async fn migrate_idempotent_on_clean_db() -> anyhow::Result<()> {
    let url = match std::env::var(qdk_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: QDK_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await?;

    qdk_db::migrate(&pool).await?;
    qdk_db::migrate(&pool).await?;

    let st = qdk_db::status(&pool).await?;
    assert!(st.ok);
    assert!(st.has_quotes_table);

    Ok(())
}
