use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use qdk_config::{load_from_env, resolve_delivery_secrets, ServiceConfig};
use qdk_core::{notifier_from_secrets, QuoteDesk, TextRenderer};
use qdk_db::{NewArticle, NewClient, NewRequest, PgStore};
use qdk_pricing::Micros;
use qdk_schemas::{Caller, CreateQuoteInput, DecimalInput, LineInput, RequestKind, Role};

#[derive(Parser)]
#[command(name = "qdk")]
#[command(about = "QuoteDesk operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Insert clients, requests and catalog articles
    Seed {
        #[command(subcommand)]
        cmd: SeedCmd,
    },

    /// Quote commands
    Quote {
        #[command(subcommand)]
        cmd: QuoteCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum SeedCmd {
    Client {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// Numbered from the yearly request counter.
    Request {
        /// compression | traction | torsion | fil | grille | autre
        #[arg(long)]
        kind: String,
        #[arg(long)]
        client_id: String,
    },

    /// Referenced from the article counter.
    Article {
        #[arg(long)]
        designation: String,
        /// Unit price excluding tax, e.g. 12.5
        #[arg(long)]
        price: String,
        #[arg(long)]
        unit: Option<String>,
    },
}

#[derive(Subcommand)]
enum QuoteCmd {
    /// Print the number the next quote would get (does not reserve it)
    Preview,

    /// List requests that have no quote yet
    Unconverted {
        /// Case-insensitive substring of the request number
        #[arg(long)]
        q: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Consolidate requests into one quote
    Create {
        /// Request id; repeat for every request to merge
        #[arg(long = "request", required = true)]
        requests: Vec<String>,

        /// REQUEST_ID:ARTICLE_ID[:QTY[:DISCOUNT_PCT[:TAX_PCT]]]
        #[arg(long = "line", required = true)]
        lines: Vec<String>,

        /// Do not mail the document to the client
        #[arg(long, default_value_t = false)]
        no_email: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = qdk_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = qdk_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_quotes_table={} quotes={}",
                        s.ok, s.has_quotes_table, s.quote_count
                    );
                }
                DbCmd::Migrate => {
                    qdk_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = qdk_config::load_layered_yaml(&path_refs)?;
            // Validate the typed view too, so a bad value fails here and not at boot.
            loaded.service()?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Seed { cmd } => {
            let cfg = load_config()?;
            let (store, desk) = connect_desk(&cfg).await?;
            match cmd {
                SeedCmd::Client {
                    first_name,
                    last_name,
                    email,
                } => {
                    let id = qdk_db::insert_client(
                        store.pool(),
                        &NewClient {
                            first_name,
                            last_name,
                            email,
                            address: None,
                            phone: None,
                            tax_id: None,
                        },
                    )
                    .await?;
                    println!("client_id={id}");
                }
                SeedCmd::Request { kind, client_id } => {
                    let kind = RequestKind::parse(kind.trim())
                        .with_context(|| format!("unknown request kind: {kind}"))?;
                    let client_id = Uuid::parse_str(&client_id).context("invalid client_id uuid")?;
                    let r = qdk_db::insert_request(
                        store.pool(),
                        &desk.sequences,
                        &NewRequest {
                            kind,
                            client_id,
                            spec: serde_json::json!({}),
                        },
                        Utc::now(),
                    )
                    .await?;
                    println!("request_id={} numero={} kind={}", r.id, r.numero, r.kind);
                }
                SeedCmd::Article {
                    designation,
                    price,
                    unit,
                } => {
                    let unit_price_ht = Micros::parse(&price).context("invalid price")?;
                    let a = qdk_db::insert_article(
                        store.pool(),
                        &desk.sequences,
                        &NewArticle {
                            designation,
                            unit,
                            unit_price_ht,
                        },
                    )
                    .await?;
                    println!("article_id={} reference={}", a.id, a.reference);
                }
            }
        }

        Commands::Quote { cmd } => {
            let cfg = load_config()?;
            let (_store, desk) = connect_desk(&cfg).await?;
            match cmd {
                QuoteCmd::Preview => {
                    let numero = desk.sequences.preview_next_quote_number(Utc::now()).await?;
                    println!("next_quote_numero={numero}");
                }
                QuoteCmd::Unconverted { q, limit } => {
                    let rows = desk.conversion.unconverted(q.as_deref(), limit).await?;
                    for r in &rows {
                        println!("{}\t{}", r.numero, r.kind);
                    }
                    println!("count={}", rows.len());
                }
                QuoteCmd::Create {
                    requests,
                    lines,
                    no_email,
                } => {
                    let lines = lines
                        .iter()
                        .map(|s| parse_line_spec(s))
                        .collect::<Result<Vec<_>>>()?;
                    let input = CreateQuoteInput {
                        request_ids: requests,
                        lines,
                        send_email: Some(!no_email),
                    };
                    let created = desk.engine.create(&operator(), input, Utc::now()).await?;
                    println!("quote_id={}", created.quote.id);
                    println!("numero={}", created.quote.numero);
                    println!("gross_ttc={}", created.quote.totals.gross_ttc);
                    if let Some(handle) = created.delivery {
                        let report = handle.await.context("delivery task panicked")?;
                        println!(
                            "document_stored={} mailed={}",
                            report.stored, report.mailed
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Typed config from the `QDK_CONFIG` layers (defaults when unset).
fn load_config() -> Result<ServiceConfig> {
    load_from_env()?.service()
}

async fn connect_desk(cfg: &ServiceConfig) -> Result<(Arc<PgStore>, QuoteDesk)> {
    let secrets = resolve_delivery_secrets(&cfg.delivery)?;
    let notifier = notifier_from_secrets(&secrets)?;
    let pool = qdk_db::connect_from_env().await?;
    let store = Arc::new(PgStore::new(pool));
    let desk = QuoteDesk::new(store.collaborators(Arc::new(TextRenderer), notifier), cfg);
    Ok((store, desk))
}

/// The CLI operator acts with admin rights.
fn operator() -> Caller {
    Caller {
        id: Uuid::nil(),
        role: Role::Admin,
    }
}

/// Parse `REQUEST_ID:ARTICLE_ID[:QTY[:DISCOUNT_PCT[:TAX_PCT]]]`. Omitted or
/// empty trailing fields take the configured defaults.
fn parse_line_spec(spec: &str) -> Result<LineInput> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 5 {
        bail!("invalid --line {spec:?}: expected REQUEST_ID:ARTICLE_ID[:QTY[:DISCOUNT[:TAX]]]");
    }
    let field = |i: usize| -> Option<DecimalInput> {
        parts
            .get(i)
            .filter(|s| !s.is_empty())
            .map(|s| DecimalInput::from(*s))
    };
    Ok(LineInput {
        request_id: parts[0].to_string(),
        article_id: parts[1].to_string(),
        qty: field(2),
        discount_pct: field(3),
        tax_pct: field(4),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_spec_with_defaults() {
        let l = parse_line_spec("r1:a1").unwrap();
        assert_eq!(l.request_id, "r1");
        assert_eq!(l.article_id, "a1");
        assert!(l.qty.is_none() && l.discount_pct.is_none() && l.tax_pct.is_none());
    }

    #[test]
    fn line_spec_full_and_gaps() {
        let l = parse_line_spec("r1:a1:2,5::7").unwrap();
        assert_eq!(l.qty, Some(DecimalInput::from("2,5")));
        assert!(l.discount_pct.is_none());
        assert_eq!(l.tax_pct, Some(DecimalInput::from("7")));
    }

    #[test]
    fn line_spec_rejects_bad_arity() {
        assert!(parse_line_spec("only-one").is_err());
        assert!(parse_line_spec("a:b:1:2:3:4").is_err());
    }

    #[test]
    fn operator_is_admin() {
        assert!(operator().is_admin());
    }
}
