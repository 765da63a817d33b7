//! flow-adapters: ingesta de eventos categorizados.
//!
//! Cada categoría tiene su propio canal de entrada y su propio worker; todos
//! escriben en el mismo `EventStore` compartido. La entrega es at-least-once
//! y sin orden entre categorías: los duplicados los absorbe el store y el
//! orden lo resuelve la proyección.
//!
//! - `message`: mensaje entrante (cabeceras + cuerpo).
//! - `mapping`: mensaje -> `NewEvent`, con las reglas por categoría.
//! - `source`: trait `InboundSource` (implementado para `mpsc::Receiver`).
//! - `hub`: `IngestionHub`, un worker tokio por categoría.

pub mod hub;
pub mod mapping;
pub mod message;
pub mod source;

pub use hub::{IngestConfig, IngestError, IngestReport, IngestionHub};
pub use mapping::{map_to_event, MappingError};
pub use message::{InboundHeaders, InboundMessage};
pub use source::{InboundSource, VecSource};
