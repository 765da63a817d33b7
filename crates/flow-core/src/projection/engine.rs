//! Motor de consultas de resúmenes.
//!
//! Cada consulta recalcula la proyección desde el store: no hay caché ni
//! estado entre llamadas.

use std::cmp::Ordering;
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use super::{group_events, project_group, InstanceFlowSummary};
use crate::errors::QueryError;
use crate::event::{AggregateKey, Event, EventStore};
use crate::query::{InstanceFlowFilter, Page, PageRequest, QueryLimits, SummarySort};

fn summarize(filter: &InstanceFlowFilter, key: &AggregateKey, events: &[Event]) -> Option<InstanceFlowSummary> {
    let group = project_group(key, events);
    let summary = InstanceFlowSummary::from_projection(&group)?;
    filter.accepts(&group, &summary).then_some(summary)
}

#[derive(Debug)]
pub struct SummaryQueryEngine<S: EventStore + ?Sized> {
    store: Arc<S>,
    limits: QueryLimits,
}

impl<S: EventStore + ?Sized> Clone for SummaryQueryEngine<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store),
               limits: self.limits }
    }
}

impl<S: EventStore + ?Sized> SummaryQueryEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_limits(store, QueryLimits::default())
    }

    pub fn with_limits(store: Arc<S>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    /// Página de resúmenes que cumplen `filter`, en el orden `sort`
    /// (sin orden explícito: `AggregateKey` ascendente).
    pub fn summaries(&self,
                     filter: &InstanceFlowFilter,
                     sort: Option<SummarySort>,
                     page: &PageRequest)
                     -> Result<Page<InstanceFlowSummary>, QueryError> {
        self.limits.check(page)?;
        let sort = sort.unwrap_or_default();

        let events = self.store.scan(&filter.scan_scope())?;
        let scanned = events.len();
        let groups = group_events(events);
        let mut rows: Vec<InstanceFlowSummary> =
            groups.par_iter().filter_map(|(key, evs)| summarize(filter, key, evs)).collect();
        rows.par_sort_by(|a, b| sort.compare(a, b));

        let start = match page {
            PageRequest::Offset { offset, .. } => *offset,
            PageRequest::After { cursor, .. } => rows.partition_point(|r| sort.compare(r, cursor) != Ordering::Greater),
        };
        let total = rows.len();
        let result = Page::slice(rows, start, page.limit());
        debug!("summaries:done scanned={scanned} groups={} matched={total} returned={} has_more={}",
               groups.len(),
               result.len(),
               result.has_more);
        Ok(result)
    }

    /// Número de filas que devolvería `summaries` con el mismo filtro y sin
    /// límite de página.
    pub fn total_count(&self, filter: &InstanceFlowFilter) -> Result<usize, QueryError> {
        let events = self.store.scan(&filter.scan_scope())?;
        let groups = group_events(events);
        let count = groups.par_iter().filter(|(key, evs)| summarize(filter, key, evs).is_some()).count();
        debug!("total_count:done groups={} matched={count}", groups.len());
        Ok(count)
    }
}
