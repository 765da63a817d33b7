//! Paginación por offset o por cursor, con tamaño máximo de página.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sort::SortKey;
use crate::constants::DEFAULT_MAX_PAGE_SIZE;
use crate::errors::QueryError;
use crate::event::AggregateKey;
use crate::projection::InstanceFlowSummary;

/// Posición de la última fila entregada. Opaco para el llamador: sólo se
/// devuelve tal cual en la petición siguiente, con el mismo filtro y orden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub latest_update: DateTime<Utc>,
    pub integration_id: i64,
    pub key: AggregateKey,
}

impl SortKey for Cursor {
    fn latest_update(&self) -> DateTime<Utc> {
        self.latest_update
    }
    fn integration_id(&self) -> i64 {
        self.integration_id
    }
    fn aggregate_key(&self) -> &AggregateKey {
        &self.key
    }
}

impl From<&InstanceFlowSummary> for Cursor {
    fn from(s: &InstanceFlowSummary) -> Self {
        Self { latest_update: s.latest_update,
               integration_id: s.integration_id,
               key: s.key.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageRequest {
    Offset { offset: usize, limit: usize },
    After { cursor: Cursor, limit: usize },
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        PageRequest::Offset { offset: 0, limit }
    }

    pub fn offset(offset: usize, limit: usize) -> Self {
        PageRequest::Offset { offset, limit }
    }

    pub fn after(cursor: Cursor, limit: usize) -> Self {
        PageRequest::After { cursor, limit }
    }

    pub fn limit(&self) -> usize {
        match self {
            PageRequest::Offset { limit, .. } | PageRequest::After { limit, .. } => *limit,
        }
    }

    /// Offset de la petición; error si es una petición por cursor.
    pub(crate) fn require_offset(&self) -> Result<usize, QueryError> {
        match self {
            PageRequest::Offset { offset, .. } => Ok(*offset),
            PageRequest::After { .. } => Err(QueryError::CursorNotSupported),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Posición de `items[0]` dentro del resultado completo.
    pub offset: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Recorta `all` (ya ordenado) a `[start, start + limit)`.
    pub(crate) fn slice(all: Vec<T>, start: usize, limit: usize) -> Self {
        let total = all.len();
        let start = start.min(total);
        let end = start.saturating_add(limit).min(total);
        let items = all.into_iter().skip(start).take(end - start).collect();
        Self { items,
               offset: start,
               has_more: end < total }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Page<InstanceFlowSummary> {
    /// Cursor para pedir la página siguiente; `None` si no hay más filas.
    pub fn next_cursor(&self) -> Option<Cursor> {
        if !self.has_more {
            return None;
        }
        self.items.last().map(Cursor::from)
    }
}

/// Límites de consulta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_page_size: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self { max_page_size: DEFAULT_MAX_PAGE_SIZE }
    }
}

impl QueryLimits {
    pub fn new(max_page_size: usize) -> Self {
        Self { max_page_size }
    }

    /// Lee `FLOW_MAX_PAGE_SIZE`; ausente, inválido o cero usa el valor por
    /// defecto.
    pub fn from_env() -> Self {
        let max_page_size = std::env::var("FLOW_MAX_PAGE_SIZE").ok()
                                                               .and_then(|v| v.trim().parse().ok())
                                                               .filter(|n: &usize| *n > 0)
                                                               .unwrap_or(DEFAULT_MAX_PAGE_SIZE);
        Self { max_page_size }
    }

    pub fn check(&self, page: &PageRequest) -> Result<(), QueryError> {
        let requested = page.limit();
        if requested == 0 {
            return Err(QueryError::EmptyPage);
        }
        if requested > self.max_page_size {
            return Err(QueryError::PageSizeExceeded { requested,
                                                      max: self.max_page_size });
        }
        Ok(())
    }
}
