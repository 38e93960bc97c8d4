use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::info;

use qdk_config::DeliverySecrets;

use crate::store::{MailMessage, Notifier};

/// Used when no relay is configured: the mail is logged, not sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn transport_name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, mail: &MailMessage) -> Result<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "mail relay not configured; message logged only"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content_base64: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

/// Posts mail as JSON to an HTTP relay. Token is never logged.
#[derive(Clone)]
pub struct RelayNotifier {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl std::fmt::Debug for RelayNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayNotifier")
            .field("url", &"<REDACTED>")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl RelayNotifier {
    pub fn new(url: String, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("mail relay http client build failed")?;
        Ok(Self { http, url, token })
    }

    fn payload<'a>(mail: &'a MailMessage) -> RelayMessage<'a> {
        RelayMessage {
            from: &mail.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.body,
            attachments: mail
                .attachments
                .iter()
                .map(|a| RelayAttachment {
                    filename: &a.filename,
                    content_type: &a.content_type,
                    content_base64: STANDARD.encode(&a.bytes),
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RelayNotifier {
    fn transport_name(&self) -> &'static str {
        "relay"
    }

    async fn send(&self, mail: &MailMessage) -> Result<()> {
        let mut req = self.http.post(&self.url).json(&Self::payload(mail));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.context("mail relay request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("mail relay http error status={}", status.as_u16()));
        }
        Ok(())
    }
}

/// Relay notifier when a relay URL is configured, log notifier otherwise.
pub fn notifier_from_secrets(secrets: &DeliverySecrets) -> Result<Arc<dyn Notifier>> {
    match &secrets.relay_url {
        Some(url) => Ok(Arc::new(RelayNotifier::new(
            url.clone(),
            secrets.relay_token.clone(),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Attachment;

    #[test]
    fn relay_payload_encodes_attachments() {
        let mail = MailMessage {
            from: "devis@mtr.tn".into(),
            to: "c@example.tn".into(),
            subject: "Votre devis DV2500001".into(),
            body: "Bonjour".into(),
            attachments: vec![Attachment {
                filename: "DV2500001.txt".into(),
                content_type: "text/plain".into(),
                bytes: b"hello".to_vec(),
            }],
        };
        let json = serde_json::to_value(RelayNotifier::payload(&mail)).unwrap();
        assert_eq!(json["attachments"][0]["content_base64"], "aGVsbG8=");
        assert_eq!(json["text"], "Bonjour");
    }

    #[test]
    fn no_relay_url_falls_back_to_log() {
        let n = notifier_from_secrets(&DeliverySecrets::default()).unwrap();
        assert_eq!(n.transport_name(), "log");
    }
}
