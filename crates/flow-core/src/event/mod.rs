//! Definiciones de eventos y trait EventStore.

mod store;
mod types;

pub use store::{AppendOutcome, EventStore, InMemoryEventStore, ScanScope};
pub use types::{AggregateKey, Event, EventError, NewEvent, Recency};
