//! Tipos de petición de consulta: filtro, orden y paginación.

pub mod filter;
pub mod page;
pub mod sort;

pub use filter::{InstanceFlowFilter, InstanceFlowFilterBuilder, TimeRange};
pub use page::{Cursor, Page, PageRequest, QueryLimits};
pub use sort::{SortDirection, SortField, SortKey, SummarySort};
