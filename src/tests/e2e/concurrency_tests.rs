// Concurrent writers and readers against one shared event store.

use crate::modules::event_store::core::config::EventStoreConfig;
use crate::modules::event_store::errors::EventStoreError;
use crate::modules::event_store::store::EventStore;
use crate::shared::core::primitives::{AggregateIdentifier, DomainEventMessage};
use crate::shared::infrastructure::codec::JsonCodec;
use crate::shared::infrastructure::entry_store::in_memory::InMemoryEntryStore;
use crate::tests::fixtures::events::{StubPayload, make_events, make_events_from};
use rstest::{fixture, rstest};
use std::sync::Arc;

#[fixture]
fn store() -> Arc<EventStore<StubPayload>> {
    let entry_store = Arc::new(InMemoryEntryStore::new());
    entry_store.set_delay_persist_ms(20);
    Arc::new(EventStore::new(
        entry_store,
        JsonCodec::new(),
        EventStoreConfig::default(),
    ))
}

fn event_at(id: &AggregateIdentifier, sequence: u64, counter: u64) -> DomainEventMessage<StubPayload> {
    DomainEventMessage::new(id.clone(), sequence, StubPayload::StateChanged { counter })
}

#[rstest]
#[tokio::test]
async fn it_should_let_exactly_one_of_two_racing_writers_win(store: Arc<EventStore<StubPayload>>) {
    let id = AggregateIdentifier::random();
    store.append_events("order", &make_events(&id, 1)).await.unwrap();

    let first = [event_at(&id, 1, 100)];
    let second = [event_at(&id, 1, 200)];
    let (a, b) = tokio::join!(
        store.append_events("order", &first),
        store.append_events("order", &second),
    );

    let conflicts = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(EventStoreError::ConcurrencyConflict { .. })))
        .count();
    assert_eq!(conflicts, 1, "a: {a:?}, b: {b:?}");
    assert!(a.is_ok() || b.is_ok());

    let events = store.read_events("order", &id).await.unwrap().try_collect().await.unwrap();
    assert_eq!(events.len(), 2);
    let winner = if a.is_ok() { 100 } else { 200 };
    assert_eq!(events[1].payload, StubPayload::StateChanged { counter: winner });
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn it_should_reject_all_but_one_writer_of_the_same_sequence(
    store: Arc<EventStore<StubPayload>>,
) {
    let id = AggregateIdentifier::random();
    let mut handles = Vec::new();
    for writer in 0..8u64 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store.append_events("order", &[event_at(&id, 0, writer)]).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("writer task panicked") {
            Ok(()) => successes += 1,
            Err(error) if error.is_conflict() => conflicts += 1,
            Err(error) => panic!("unexpected failure: {error:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_keep_writers_of_different_aggregates_independent(
    store: Arc<EventStore<StubPayload>>,
) {
    let ids: Vec<AggregateIdentifier> = (0..4).map(|_| AggregateIdentifier::random()).collect();
    let mut handles = Vec::new();
    for id in &ids {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store.append_events("order", &make_events(&id, 5)).await
        }));
    }
    for handle in handles {
        handle.await.expect("writer task panicked").expect("append failed");
    }
    for id in &ids {
        let events = store.read_events("order", id).await.unwrap().try_collect().await.unwrap();
        assert_eq!(events.len(), 5);
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_read_a_gapless_prefix_while_a_writer_appends() {
    let store: Arc<EventStore<StubPayload>> = Arc::new(
        EventStore::<StubPayload>::in_memory()
            .with_config(EventStoreConfig::default().with_batch_size(3).unwrap()),
    );
    let id = AggregateIdentifier::random();
    store.append_events("order", &make_events(&id, 1)).await.unwrap();

    let writer = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move {
            for sequence in 1..50 {
                store
                    .append_events("order", &make_events_from(&id, sequence, 1))
                    .await
                    .expect("append failed");
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..10 {
        let events = store.read_events("order", &id).await.unwrap().try_collect().await.unwrap();
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequences, (0..sequences.len() as u64).collect::<Vec<_>>());
        tokio::task::yield_now().await;
    }
    writer.await.expect("writer task panicked");

    let events = store.read_events("order", &id).await.unwrap().try_collect().await.unwrap();
    assert_eq!(events.len(), 50);
}
