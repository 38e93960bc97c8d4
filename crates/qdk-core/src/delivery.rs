//! Post-commit document generation and mail delivery.
//!
//! Runs detached from the request that created the quote. Every failure is
//! logged and swallowed; nothing here can undo or delay a created quote.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use qdk_config::DeliveryConfig;
use qdk_schemas::{Quote, RenderedDocument};

use crate::store::{Attachment, DocumentRenderer, MailMessage, Notifier, QuoteStore};

/// What a delivery run achieved. Only used for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub rendered: bool,
    pub stored: bool,
    pub mailed: bool,
}

#[derive(Clone)]
pub struct DeliveryTrigger {
    quotes: Arc<dyn QuoteStore>,
    renderer: Arc<dyn DocumentRenderer>,
    notifier: Arc<dyn Notifier>,
    cfg: DeliveryConfig,
}

impl DeliveryTrigger {
    pub fn new(
        quotes: Arc<dyn QuoteStore>,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn Notifier>,
        cfg: DeliveryConfig,
    ) -> Self {
        Self {
            quotes,
            renderer,
            notifier,
            cfg,
        }
    }

    /// Spawn the delivery task. Returns immediately; `None` when delivery is
    /// disabled by config. Must be called from within a Tokio runtime.
    pub fn schedule(&self, quote: Quote, send_email: bool) -> Option<JoinHandle<DeliveryReport>> {
        if !self.cfg.enabled {
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move { this.run(&quote, send_email).await }))
    }

    /// Render, store, then mail. Never fails; see [`DeliveryReport`].
    pub async fn run(&self, quote: &Quote, send_email: bool) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let document = match self.renderer.render(quote).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(quote_numero = %quote.numero, error = %format!("{e:#}"), "document render failed");
                return report;
            }
        };
        report.rendered = true;

        match self.quotes.attach_document(quote.id, &document).await {
            Ok(()) => report.stored = true,
            Err(e) => {
                error!(quote_numero = %quote.numero, error = %format!("{e:#}"), "document store failed");
            }
        }

        if !send_email {
            return report;
        }
        let Some(to) = quote.client.email.as_deref().filter(|s| !s.trim().is_empty()) else {
            warn!(quote_numero = %quote.numero, "client has no email; mail skipped");
            return report;
        };

        let mail = quote_mail(&self.cfg.mail_from, to, &quote.numero, document);
        match self.notifier.send(&mail).await {
            Ok(()) => {
                report.mailed = true;
                info!(
                    quote_numero = %quote.numero,
                    transport = self.notifier.transport_name(),
                    "quote mailed"
                );
            }
            Err(e) => {
                error!(
                    quote_numero = %quote.numero,
                    transport = self.notifier.transport_name(),
                    error = %format!("{e:#}"),
                    "quote mail failed"
                );
            }
        }
        report
    }
}

fn quote_mail(from: &str, to: &str, numero: &str, document: RenderedDocument) -> MailMessage {
    MailMessage {
        from: from.to_string(),
        to: to.trim().to_string(),
        subject: format!("Votre devis {numero}"),
        body: format!(
            "Bonjour,\nVeuillez trouver ci-joint le devis {numero}.\nCordialement."
        ),
        attachments: vec![Attachment {
            filename: document_filename(numero, &document.content_type),
            content_type: document.content_type,
            bytes: document.bytes,
        }],
    }
}

/// `{numero}.pdf` for PDF output, `{numero}.txt` for text, `{numero}.bin` otherwise.
pub fn document_filename(numero: &str, content_type: &str) -> String {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let ext = match mime.as_str() {
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    };
    format!("{numero}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_follows_content_type() {
        assert_eq!(document_filename("DV2500001", "application/pdf"), "DV2500001.pdf");
        assert_eq!(
            document_filename("DV2500001", "text/plain; charset=utf-8"),
            "DV2500001.txt"
        );
        assert_eq!(document_filename("DV2500001", ""), "DV2500001.bin");
    }

    #[test]
    fn mail_subject_and_attachment() {
        let mail = quote_mail(
            "devis@mtr.tn",
            " client@example.tn ",
            "DV2500007",
            RenderedDocument {
                content_type: "application/pdf".into(),
                bytes: vec![1, 2, 3],
            },
        );
        assert_eq!(mail.subject, "Votre devis DV2500007");
        assert_eq!(mail.to, "client@example.tn");
        assert_eq!(mail.attachments[0].filename, "DV2500007.pdf");
        assert_eq!(mail.attachments[0].bytes, vec![1, 2, 3]);
    }
}
