//! Scenario: finding a quote through its request.
//!
//! # Invariants under test
//! - Admin lookup matches by primary id, metadata id, or any claimed number.
//! - Client lookup answers only for the owner; anyone else gets "no quote".
//! - The most recent matching quote wins.
//! - Documents are visible to admins and the quote's client only.

use qdk_core::{ErrorKind, QuoteError};
use qdk_schemas::RequestKind;
use qdk_testkit::*;

#[tokio::test]
async fn admin_and_owner_lookups() {
    let h = Harness::new();
    let owner = client("Amel", None);
    let other = client("Bob", None);
    let r1 = request(RequestKind::Traction, "DDV2500001", &owner);
    let r2 = request(RequestKind::Other, "DDV2500002", &owner);
    let a1 = article("ART-1", "10").unwrap();
    h.store.add_request(r1.clone());
    h.store.add_request(r2.clone());
    h.store.add_article(a1.clone());

    let first = h
        .desk
        .engine
        .create(&admin(), create_input(&[&r1, &r2], vec![line(&r1, &a1)]), fixed_now())
        .await
        .unwrap()
        .quote;

    // admin: by metadata id
    let found = h
        .desk
        .lookup
        .find_by_request_admin(&admin(), &r2.id.to_string(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.numero, first.numero);
    assert_eq!(found.request_numeros, vec!["DDV2500001", "DDV2500002"]);
    assert_eq!(found.pdf, "http://localhost:4000/v1/quotes/DV2500001/document");

    // admin: by number only
    let found = h
        .desk
        .lookup
        .find_by_request_admin(&admin(), "legacy-id", Some(" DDV2500002 "))
        .await
        .unwrap();
    assert!(found.is_some());

    // admin endpoint refuses clients
    let err = h
        .desk
        .lookup
        .find_by_request_admin(&client_caller(&owner), &r1.id.to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, QuoteError::Unauthorized));

    // owner sees it, with a lower-case numero normalised
    let found = h
        .desk
        .lookup
        .find_by_request_for_caller(&client_caller(&owner), &r1.id.to_string(), Some("ddv2500001"))
        .await
        .unwrap();
    assert_eq!(found.map(|s| s.numero), Some(first.numero.clone()));

    // non-owner: indistinguishable from "no quote"
    let found = h
        .desk
        .lookup
        .find_by_request_for_caller(&client_caller(&other), &r1.id.to_string(), None)
        .await
        .unwrap();
    assert!(found.is_none());

    // unknown request
    let found = h
        .desk
        .lookup
        .find_by_request_for_caller(&admin(), "nope", None)
        .await
        .unwrap();
    assert!(found.is_none());

    // a newer quote for r1 wins
    let second = h
        .desk
        .engine
        .create(&admin(), create_input(&[&r1], vec![line(&r1, &a1)]), fixed_now())
        .await
        .unwrap()
        .quote;
    let found = h
        .desk
        .lookup
        .find_by_request_for_caller(&client_caller(&owner), &r1.id.to_string(), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.numero, second.numero);
}

#[tokio::test]
async fn admin_lookup_needs_an_id_or_numero() {
    let h = Harness::new();
    let err = h
        .desk
        .lookup
        .find_by_request_admin(&admin(), "garbage", Some("  "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn document_access_is_owner_or_admin() {
    let h = Harness::new();
    let owner = client("Amel", None);
    let other = client("Bob", None);
    let r1 = request(RequestKind::Grid, "DDV2500001", &owner);
    let a1 = article("ART-1", "10").unwrap();
    h.store.add_request(r1.clone());
    h.store.add_article(a1.clone());

    let created = h
        .desk
        .engine
        .create(&admin(), create_input(&[&r1], vec![line(&r1, &a1)]), fixed_now())
        .await
        .unwrap();
    if let Some(handle) = created.delivery {
        handle.await.unwrap();
    }
    let numero = created.quote.numero;

    let doc = h.desk.lookup.document(&client_caller(&owner), &numero).await.unwrap();
    assert!(doc.content_type.starts_with("text/plain"));
    assert!(h.desk.lookup.document(&admin(), &numero).await.is_ok());

    let err = h
        .desk
        .lookup
        .document(&client_caller(&other), &numero)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.desk.lookup.document(&admin(), "DV9999999").await.unwrap_err();
    assert!(matches!(err, QuoteError::QuoteNotFound(_)));
}
