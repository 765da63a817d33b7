//! Errores del core.
//!
//! - Validación (culpa del llamador): `FilterError`, `QueryError`,
//!   `ParseError`, variantes de validación de `CorrectionError`.
//! - Precondición de dominio: `CorrectionError::NoPriorStatusEvent` y
//!   `CorrectionError::LatestStatusNotError`.
//! - Infraestructura: `StoreError`, que el core propaga sin reintentar.
//!
//! "No encontrado" nunca es un error en las lecturas: se modela con `Option`
//! o con una página vacía.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::AggregateKey;
use crate::registry::EventCategory;

/// Valor textual que no corresponde a ningún elemento de una enumeración
/// cerrada (categoría, estado, tipo).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),
    #[error("latest status event changed (expected seq {expected}, found {found:?})")]
    Conflict { expected: u64, found: Option<u64> },
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FilterError {
    #[error("instance statuses and latest status event categories are mutually exclusive")]
    ConflictingStatusCriteria,
    #[error("time range start {from} is after end {to}")]
    InvertedTimeRange { from: DateTime<Utc>, to: DateTime<Utc> },
    #[error("category {0} does not belong to the status track")]
    NotStatusCategory(EventCategory),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("page size must be greater than zero")]
    EmptyPage,
    #[error("page size {requested} exceeds maximum {max}")]
    PageSizeExceeded { requested: usize, max: usize },
    #[error("cursor pagination is not supported by this query")]
    CursorNotSupported,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CorrectionError {
    #[error("no status event exists for {0}")]
    NoPriorStatusEvent(AggregateKey),
    #[error("latest status event of {key} is {category}, which is not an error")]
    LatestStatusNotError { key: AggregateKey, category: EventCategory },
    #[error("manual processing requires a destination id")]
    MissingDestinationId,
    #[error("correction {0} does not take a destination id")]
    DestinationIdNotAllowed(EventCategory),
    #[error("category {0} is not a manual correction")]
    NotACorrection(EventCategory),
    #[error("latest status of {0} changed concurrently; reload and retry")]
    ConcurrentModification(AggregateKey),
    #[error(transparent)]
    Store(StoreError),
}
