//! Scenario: resolving a request id without knowing its kind.
//!
//! # Invariants under test
//! - Any kind resolves, with the owner attached.
//! - An unknown or malformed id is an explicit absence, not an error.
//! - If the same id exists under two kinds, the earlier kind in the probe
//!   order wins.

use std::sync::Arc;

use qdk_core::{RequestResolver, PROBE_ORDER};
use qdk_schemas::RequestKind;
use qdk_testkit::{client, request, MemoryStore};

#[tokio::test]
async fn every_kind_resolves_with_owner() {
    let store = Arc::new(MemoryStore::new());
    let owner = client("Amel", None);
    let mut ids = Vec::new();
    for (i, kind) in RequestKind::ALL.into_iter().enumerate() {
        let r = request(kind, &format!("DDV25{:05}", i + 1), &owner);
        ids.push((kind, r.id));
        store.add_request(r);
    }

    let resolver = RequestResolver::new(store);
    for (kind, id) in ids {
        let found = resolver.resolve(id).await.unwrap().expect("resolved");
        assert_eq!(found.kind, kind);
        assert_eq!(found.owner.id, owner.id);
    }
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_absent() {
    let store = Arc::new(MemoryStore::new());
    let resolver = RequestResolver::new(store);

    assert!(resolver.resolve(uuid::Uuid::new_v4()).await.unwrap().is_none());
    assert!(resolver.resolve_str("not-a-uuid").await.unwrap().is_none());
    assert!(resolver.resolve_str("").await.unwrap().is_none());
}

#[tokio::test]
async fn colliding_id_takes_first_kind_in_probe_order() {
    let store = Arc::new(MemoryStore::new());
    let owner = client("Amel", None);

    let grid = request(RequestKind::Grid, "DDV2500002", &owner);
    let mut other = request(RequestKind::Other, "DDV2500001", &owner);
    other.id = grid.id;
    store.add_request(grid.clone());
    store.add_request(other);

    let resolver = RequestResolver::new(store);
    let found = resolver.resolve_str(&format!(" {} ", grid.id)).await.unwrap().unwrap();
    assert_eq!(PROBE_ORDER[0], RequestKind::Other);
    assert_eq!(found.kind, RequestKind::Other);
    assert_eq!(found.numero, "DDV2500001");
}
