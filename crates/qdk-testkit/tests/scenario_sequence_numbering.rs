//! Scenario: reference number issuance.
//!
//! # Invariants under test
//! - Concurrent `next` calls on one key never return the same value.
//! - A single caller sees strictly increasing values.
//! - Storage failures are retried, then surface as CounterUnavailable.
//! - A failed quote insert after issuance leaves a gap, never a reuse.

use std::collections::HashSet;
use std::sync::Arc;

use qdk_config::NumberingConfig;
use qdk_core::{ErrorKind, QuoteError, SequenceGenerator};
use qdk_numbering::{parse_yearly, QuoteScope, SequenceKey};
use qdk_schemas::RequestKind;
use qdk_testkit::*;

fn generator(store: &Arc<MemoryStore>) -> SequenceGenerator {
    SequenceGenerator::new(store.clone(), NumberingConfig::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_next_values_are_pairwise_distinct() {
    let store = Arc::new(MemoryStore::new());
    let gen = generator(&store);
    let key = SequenceKey::quote(QuoteScope::Yearly, 2025);

    let mut handles = Vec::new();
    for _ in 0..64 {
        let gen = gen.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move { gen.next(&key).await }));
    }

    let mut seen = HashSet::new();
    for h in handles {
        let v = h.await.unwrap().unwrap();
        assert!(seen.insert(v), "duplicate sequence value {v}");
    }
    assert_eq!(seen.len(), 64);
    assert_eq!(store.counter(&key), Some(64));
}

#[tokio::test]
async fn single_caller_sees_strictly_increasing_values() {
    let store = Arc::new(MemoryStore::new());
    let gen = generator(&store);
    let key = SequenceKey::quote(QuoteScope::Yearly, 2025);

    let mut last = 0;
    for _ in 0..10 {
        let v = gen.next(&key).await.unwrap();
        assert!(v > last);
        last = v;
    }
    assert_eq!(last, 10);
}

#[tokio::test]
async fn formatted_numbers_follow_the_persisted_shapes() {
    let store = Arc::new(MemoryStore::new());
    let gen = generator(&store);

    assert_eq!(gen.next_quote_number(fixed_now()).await.unwrap(), "DV2500001");
    assert_eq!(gen.next_quote_number(fixed_now()).await.unwrap(), "DV2500002");
    assert_eq!(gen.next_request_number(fixed_now()).await.unwrap(), "DDV2500001");
    assert_eq!(gen.next_article_reference().await.unwrap(), "ART-1");
    assert_eq!(gen.next_article_reference().await.unwrap(), "ART-2");

    let n = gen.next_quote_number(fixed_now()).await.unwrap();
    assert_eq!(parse_yearly("DV", &n).unwrap(), (2025, 3));
}

#[tokio::test]
async fn preview_does_not_consume() {
    let store = Arc::new(MemoryStore::new());
    let gen = generator(&store);

    assert_eq!(gen.preview_next_quote_number(fixed_now()).await.unwrap(), "DV2500001");
    assert_eq!(gen.preview_next_quote_number(fixed_now()).await.unwrap(), "DV2500001");
    assert_eq!(gen.next_quote_number(fixed_now()).await.unwrap(), "DV2500001");
    assert_eq!(gen.preview_next_quote_number(fixed_now()).await.unwrap(), "DV2500002");
}

#[tokio::test]
async fn global_scope_uses_one_key_across_years() {
    let store = Arc::new(MemoryStore::new());
    let cfg = NumberingConfig {
        quote_scope: QuoteScope::Global,
        ..NumberingConfig::default()
    };
    let gen = SequenceGenerator::new(store.clone(), cfg);
    let next_year = fixed_now() + chrono::Duration::days(366);

    assert_eq!(gen.next_quote_number(fixed_now()).await.unwrap(), "DV2500001");
    assert_eq!(gen.next_quote_number(next_year).await.unwrap(), "DV2600002");
    assert_eq!(store.counter(&SequenceKey::quote(QuoteScope::Global, 0)), Some(2));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let store = Arc::new(MemoryStore::new());
    let gen = generator(&store);
    store.fail_next_increments(2);

    let v = gen.next(&SequenceKey::article()).await.unwrap();
    assert_eq!(v, 1);
    assert_eq!(store.increment_calls(), 3);
}

#[tokio::test]
async fn persistent_failure_is_counter_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let gen = generator(&store);
    store.fail_next_increments(10);

    let err = gen.next(&SequenceKey::article()).await.unwrap_err();
    match &err {
        QuoteError::CounterUnavailable { key, attempts, .. } => {
            assert_eq!(key, "article");
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected CounterUnavailable, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::CounterUnavailable);
    assert_eq!(err.public_message(), "internal server error");
}

#[tokio::test]
async fn failed_insert_leaves_a_gap() {
    let h = Harness::new();
    let owner = client("Amel", None);
    let r1 = request(RequestKind::Other, "DDV2500001", &owner);
    let a1 = article("ART-1", "10").unwrap();
    h.store.add_request(r1.clone());
    h.store.add_article(a1.clone());

    h.store.fail_next_inserts(1);
    let err = h
        .desk
        .engine
        .create(&admin(), create_input(&[&r1], vec![line(&r1, &a1)]), fixed_now())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(h.store.quote_count(), 0);

    let q = h
        .desk
        .engine
        .create(&admin(), create_input(&[&r1], vec![line(&r1, &a1)]), fixed_now())
        .await
        .unwrap()
        .quote;
    assert_eq!(q.numero, "DV2500002", "number 1 was consumed by the failed insert");
}
