// Crate entry point. Declare modules and re-export the public surface of the event store.
//
// Responsibilities
// - Only declare and expose modules. No logic here.
//
// How it is used
// - Applications and tests import the facade and ports from this crate root.

pub mod shared {
    pub mod core {
        pub mod primitives;
    }
    pub mod infrastructure {
        pub mod codec;
        pub mod entry_store;
    }
}

pub mod modules {
    pub mod event_store {
        pub mod core {
            pub mod config;
            pub mod conflict;
            pub mod retention;
            pub mod stream;
        }
        pub mod errors;
        pub mod store;
        pub mod visitor;
    }
}

pub mod shell;

pub use modules::event_store::core::config::{ConfigError, EventStoreConfig};
pub use modules::event_store::core::conflict::{
    Classification, ConflictClassifier, UniqueKeyViolationClassifier,
};
pub use modules::event_store::core::retention::SnapshotRetentionPolicy;
pub use modules::event_store::core::stream::DomainEventStream;
pub use modules::event_store::errors::EventStoreError;
pub use modules::event_store::store::EventStore;
pub use modules::event_store::visitor::EventVisitor;
pub use shared::core::primitives::{AggregateIdentifier, AggregateKey, DomainEventMessage, MetaData};
pub use shared::infrastructure::codec::{CodecError, EventCodec, JsonCodec};
pub use shared::infrastructure::entry_store::in_memory::InMemoryEntryStore;
pub use shared::infrastructure::entry_store::jsonl::JsonlEntryStore;
pub use shared::infrastructure::entry_store::{BackendFailure, EntryStore, SerializedEntry};
