//! Scenario: listing requests that have no quote yet.
//!
//! # Invariants under test
//! - With no quotes, every request is listed, sorted by number.
//! - A request is converted if any quote claims it by id OR by number;
//!   legacy quotes that carry only one of the two still count.
//! - Filter is a case-insensitive substring; limit defaults to 500 and is
//!   capped at 5000.

use chrono::Utc;
use uuid::Uuid;

use qdk_pricing::compute_totals;
use qdk_schemas::{PrimaryLink, Quote, QuoteMeta, RequestKind};
use qdk_testkit::*;

fn numeros(list: &[qdk_schemas::UnconvertedRequest]) -> Vec<&str> {
    list.iter().map(|r| r.numero.as_str()).collect()
}

fn legacy_quote(numero: &str, primary: PrimaryLink, legacy: Option<&str>) -> Quote {
    let owner = client("Legacy", None);
    Quote {
        id: Uuid::new_v4(),
        numero: numero.to_string(),
        primary,
        client: owner.snapshot(),
        lines: vec![],
        totals: compute_totals(&[]).unwrap(),
        meta: QuoteMeta {
            requests: vec![],
            legacy_request_numero: legacy.map(str::to_string),
        },
        created_at: Utc::now(),
        document: None,
    }
}

#[tokio::test]
async fn three_requests_no_quotes_all_listed_sorted() {
    let h = Harness::new();
    let owner = client("Amel", None);
    h.store.add_request(request(RequestKind::Torsion, "DDV2500003", &owner));
    h.store.add_request(request(RequestKind::Compression, "DDV2500001", &owner));
    h.store.add_request(request(RequestKind::Other, "DDV2500002", &owner));

    let list = h.desk.conversion.unconverted(None, None).await.unwrap();
    assert_eq!(numeros(&list), vec!["DDV2500001", "DDV2500002", "DDV2500003"]);
    assert_eq!(list[1].kind, RequestKind::Other);
}

#[tokio::test]
async fn created_quote_removes_every_merged_request() {
    let h = Harness::new();
    let owner = client("Amel", None);
    let r1 = request(RequestKind::Traction, "DDV2500001", &owner);
    let r2 = request(RequestKind::Grid, "DDV2500002", &owner);
    let r3 = request(RequestKind::Wire, "DDV2500003", &owner);
    let a1 = article("ART-1", "10").unwrap();
    for r in [&r1, &r2, &r3] {
        h.store.add_request((*r).clone());
    }
    h.store.add_article(a1.clone());

    h.desk
        .engine
        .create(&admin(), create_input(&[&r1, &r2], vec![line(&r1, &a1)]), fixed_now())
        .await
        .unwrap();

    let list = h.desk.conversion.unconverted(None, None).await.unwrap();
    assert_eq!(numeros(&list), vec!["DDV2500003"]);
}

#[tokio::test]
async fn legacy_quotes_match_by_id_only_or_by_number_only() {
    let h = Harness::new();
    let owner = client("Amel", None);
    let by_id = request(RequestKind::Compression, "DDV2400010", &owner);
    let by_numero = request(RequestKind::Traction, "DDV2400011", &owner);
    let by_legacy_meta = request(RequestKind::Torsion, "DDV2400012", &owner);
    let open = request(RequestKind::Other, "DDV2400013", &owner);
    for r in [&by_id, &by_numero, &by_legacy_meta, &open] {
        h.store.add_request((*r).clone());
    }

    h.store.add_legacy_quote(legacy_quote(
        "DV2400001",
        PrimaryLink {
            id: Some(by_id.id),
            kind: None,
            numero: None,
        },
        None,
    ));
    h.store.add_legacy_quote(legacy_quote(
        "DV2400002",
        PrimaryLink {
            id: None,
            kind: None,
            numero: Some("DDV2400011".to_string()),
        },
        None,
    ));
    h.store.add_legacy_quote(legacy_quote(
        "DV2400003",
        PrimaryLink::default(),
        Some("DDV2400012"),
    ));

    let list = h.desk.conversion.unconverted(None, None).await.unwrap();
    assert_eq!(numeros(&list), vec!["DDV2400013"]);
}

#[tokio::test]
async fn duplicate_numbers_keep_first_kind() {
    let h = Harness::new();
    let owner = client("Amel", None);
    // Same number in two kinds: kind order puts compression before autre.
    h.store.add_request(request(RequestKind::Other, "DDV2500007", &owner));
    h.store.add_request(request(RequestKind::Compression, "DDV2500007", &owner));

    let list = h.desk.conversion.unconverted(None, None).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].kind, RequestKind::Compression);
}

#[tokio::test]
async fn filter_is_case_insensitive_substring() {
    let h = Harness::new();
    let owner = client("Amel", None);
    h.store.add_request(request(RequestKind::Other, "DDV2400001", &owner));
    h.store.add_request(request(RequestKind::Other, "DDV2500001", &owner));
    h.store.add_request(request(RequestKind::Grid, "DDV2500002", &owner));

    let list = h.desk.conversion.unconverted(Some("ddv25"), None).await.unwrap();
    assert_eq!(numeros(&list), vec!["DDV2500001", "DDV2500002"]);

    let list = h.desk.conversion.unconverted(Some("   "), None).await.unwrap();
    assert_eq!(list.len(), 3, "blank filter means no filter");
}

#[tokio::test]
async fn limit_truncates_after_sorting_and_is_capped() {
    let h = Harness::new();
    let owner = client("Amel", None);
    for n in (1..=5).rev() {
        h.store
            .add_request(request(RequestKind::Other, &format!("DDV25{n:05}"), &owner));
    }

    let list = h.desk.conversion.unconverted(None, Some(2)).await.unwrap();
    assert_eq!(numeros(&list), vec!["DDV2500001", "DDV2500002"]);

    assert_eq!(h.desk.conversion.effective_limit(None), 500);
    assert_eq!(h.desk.conversion.effective_limit(Some(10_000)), 5000);
    assert_eq!(h.desk.conversion.effective_limit(Some(7)), 7);
}
