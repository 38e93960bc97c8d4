//! Scenario: post-commit delivery.
//!
//! # Invariants under test
//! - `create` returns the quote; delivery runs in a detached task.
//! - Render/store/mail failures never affect the created quote.
//! - Mail goes to the snapshot email with the rendered document attached.

use std::sync::Arc;

use qdk_config::ServiceConfig;
use qdk_core::{DeliveryReport, TextRenderer};
use qdk_schemas::{Quote, RequestKind};
use qdk_testkit::*;

async fn create_one(h: &Harness, email: Option<&str>, send_email: Option<bool>) -> (Quote, Option<DeliveryReport>) {
    let owner = client("Amel", email);
    let r1 = request(RequestKind::Traction, "DDV2500001", &owner);
    let a1 = article("ART-1", "100").unwrap();
    h.store.add_request(r1.clone());
    h.store.add_article(a1.clone());

    let mut input = create_input(&[&r1], vec![line_with(&r1, &a1, 2, 10, 19)]);
    input.send_email = send_email;
    let created = h.desk.engine.create(&admin(), input, fixed_now()).await.unwrap();
    let report = match created.delivery {
        Some(handle) => Some(handle.await.unwrap()),
        None => None,
    };
    (created.quote, report)
}

#[tokio::test]
async fn happy_path_renders_stores_and_mails() {
    let h = Harness::new();
    let (quote, report) = create_one(&h, Some("amel@example.tn"), None).await;

    assert_eq!(
        report,
        Some(DeliveryReport {
            rendered: true,
            stored: true,
            mailed: true
        })
    );
    assert!(h.store.has_document(quote.id));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "amel@example.tn");
    assert_eq!(sent[0].from, "devis@mtr.tn");
    assert_eq!(sent[0].subject, "Votre devis DV2500001");
    assert_eq!(sent[0].attachments.len(), 1);
    assert_eq!(sent[0].attachments[0].filename, "DV2500001.txt");
    let body = String::from_utf8(sent[0].attachments[0].bytes.clone()).unwrap();
    assert!(body.contains("DEVIS DV2500001"));
    assert!(body.contains("216.000"));
}

#[tokio::test]
async fn notifier_failure_is_swallowed() {
    let h = Harness::with(
        ServiceConfig::default(),
        Arc::new(TextRenderer),
        RecordingNotifier::failing(),
    );
    let (quote, report) = create_one(&h, Some("amel@example.tn"), None).await;

    let report = report.unwrap();
    assert!(report.rendered && report.stored);
    assert!(!report.mailed);
    assert_eq!(quote.numero, "DV2500001");
    assert_eq!(h.store.quote_count(), 1);
}

#[tokio::test]
async fn render_failure_is_swallowed() {
    let h = Harness::with(
        ServiceConfig::default(),
        Arc::new(FailingRenderer),
        RecordingNotifier::default(),
    );
    let (quote, report) = create_one(&h, Some("amel@example.tn"), None).await;

    assert_eq!(report, Some(DeliveryReport::default()));
    assert!(!h.store.has_document(quote.id));
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.store.quote_count(), 1);
}

#[tokio::test]
async fn store_failure_still_mails() {
    let h = Harness::new();
    h.store.fail_next_attaches(1);
    let (quote, report) = create_one(&h, Some("amel@example.tn"), None).await;

    let report = report.unwrap();
    assert!(report.rendered && !report.stored && report.mailed);
    assert!(!h.store.has_document(quote.id));
}

#[tokio::test]
async fn no_email_or_opt_out_skips_mail_but_stores_document() {
    let h = Harness::new();
    let (quote, report) = create_one(&h, None, None).await;
    let report = report.unwrap();
    assert!(report.stored && !report.mailed);
    assert!(h.store.has_document(quote.id));

    let h = Harness::new();
    let (_, report) = create_one(&h, Some("amel@example.tn"), Some(false)).await;
    assert!(!report.unwrap().mailed);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn disabled_delivery_schedules_nothing() {
    let mut cfg = ServiceConfig::default();
    cfg.delivery.enabled = false;
    let h = Harness::with(cfg, Arc::new(TextRenderer), RecordingNotifier::default());
    let (quote, report) = create_one(&h, Some("amel@example.tn"), None).await;

    assert!(report.is_none());
    assert!(!h.store.has_document(quote.id));
}
