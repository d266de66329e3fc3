use aggregate_store::shell::settings::{DATA_DIR, Settings};
use aggregate_store::{DomainEventMessage, EventStore, JsonCodec, JsonlEntryStore};
use anyhow::Context;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

/// Replays every stored event, optionally of one aggregate type, and reports counts.
///
/// Usage: aggregate_store_replay [AGGREGATE_TYPE]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::from_env()?;
    let data_dir = settings
        .data_dir
        .clone()
        .with_context(|| format!("{DATA_DIR} must point at a store directory"))?;
    let aggregate_type = std::env::args().nth(1);

    let entry_store = Arc::new(JsonlEntryStore::open(&data_dir)?);
    let store: EventStore<serde_json::Value, JsonlEntryStore> = EventStore::new(
        entry_store,
        JsonCodec::new(),
        settings.event_store_config()?,
    );

    let mut per_aggregate: BTreeMap<String, u64> = BTreeMap::new();
    let mut visitor = |event: DomainEventMessage<serde_json::Value>| {
        *per_aggregate
            .entry(event.aggregate_identifier.to_string())
            .or_default() += 1;
    };
    store
        .visit_events(&mut visitor, aggregate_type.as_deref())
        .await?;

    for (aggregate_identifier, events) in &per_aggregate {
        tracing::info!(%aggregate_identifier, events, "replayed aggregate");
    }
    tracing::info!(
        path = %data_dir.display(),
        aggregate_type = aggregate_type.as_deref().unwrap_or("*"),
        aggregates = per_aggregate.len(),
        events = per_aggregate.values().sum::<u64>(),
        "replay finished"
    );
    Ok(())
}
