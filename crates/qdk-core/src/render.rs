use std::fmt::Write as _;

use anyhow::Result;

use qdk_schemas::{Quote, RenderedDocument};

use crate::store::DocumentRenderer;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Deterministic plain-text rendering of a quote. Output depends only on
/// persisted fields, so re-rendering yields identical bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn render_text(quote: &Quote) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "DEVIS {}", quote.numero);
        let _ = writeln!(out, "Date: {}", quote.created_at.format("%Y-%m-%d"));
        let _ = writeln!(out);
        let _ = writeln!(out, "Client: {}", quote.client.name);
        for (label, value) in [
            ("Email", &quote.client.email),
            ("Adresse", &quote.client.address),
            ("Tel", &quote.client.phone),
            ("Matricule fiscal", &quote.client.tax_id),
        ] {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{label}: {v}");
            }
        }

        let numeros = quote.request_numeros();
        if !numeros.is_empty() {
            let _ = writeln!(out, "Demandes: {}", numeros.join(", "));
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<12} {:<30} {:>4} {:>10} {:>12} {:>8} {:>6} {:>12}",
            "Ref", "Designation", "U", "Qte", "PU HT", "Remise", "TVA", "Total HT"
        );
        for line in &quote.lines {
            let _ = writeln!(
                out,
                "{:<12} {:<30} {:>4} {:>10} {:>12} {:>7}% {:>5}% {:>12}",
                line.reference,
                line.designation,
                line.unit,
                line.quantity.to_string(),
                line.unit_price_ht.to_string(),
                line.discount_pct.to_string(),
                line.tax_pct.to_string(),
                line.total_ht.to_string(),
            );
        }

        let t = &quote.totals;
        let _ = writeln!(out);
        let _ = writeln!(out, "Total HT:        {:>14}", t.total_ht.to_string());
        let _ = writeln!(out, "Net HT:          {:>14}", t.net_ht.to_string());
        let _ = writeln!(out, "TVA:             {:>14}", t.vat.to_string());
        let _ = writeln!(
            out,
            "FODEC ({}%):     {:>14}",
            t.surcharge_pct,
            t.surcharge.to_string()
        );
        let _ = writeln!(out, "Timbre:          {:>14}", t.stamp_duty.to_string());
        let _ = writeln!(out, "Total TTC:       {:>14}", t.gross_ttc.to_string());
        out
    }
}

#[async_trait::async_trait]
impl DocumentRenderer for TextRenderer {
    async fn render(&self, quote: &Quote) -> Result<RenderedDocument> {
        Ok(RenderedDocument {
            content_type: TEXT_CONTENT_TYPE.to_string(),
            bytes: Self::render_text(quote).into_bytes(),
        })
    }
}
