//! Conteos por estado actual.
//!
//! Cada clave con al menos un evento de estado cae en exactamente un cubo
//! (el estado de su último evento de estado), así que `total` es siempre la
//! suma de los cubos. Las claves sin eventos de estado no cuentan.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::QueryError;
use crate::event::{EventStore, ScanScope};
use crate::projection::{group_events, latest_status_event};
use crate::query::{Page, PageRequest, QueryLimits, SortDirection};
use crate::registry::{registry, InstanceStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub total: u64,
    pub in_progress: u64,
    pub transferred: u64,
    pub aborted: u64,
    pub failed: u64,
}

impl InstanceStatistics {
    pub fn record(&mut self, status: InstanceStatus) {
        self.total += 1;
        match status {
            InstanceStatus::InProgress => self.in_progress += 1,
            InstanceStatus::Transferred => self.transferred += 1,
            InstanceStatus::Aborted => self.aborted += 1,
            InstanceStatus::Failed => self.failed += 1,
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.total += other.total;
        self.in_progress += other.in_progress;
        self.transferred += other.transferred;
        self.aborted += other.aborted;
        self.failed += other.failed;
        self
    }

    pub fn count(&self, status: InstanceStatus) -> u64 {
        match status {
            InstanceStatus::InProgress => self.in_progress,
            InstanceStatus::Transferred => self.transferred,
            InstanceStatus::Aborted => self.aborted,
            InstanceStatus::Failed => self.failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatistics {
    pub integration_id: i64,
    #[serde(flatten)]
    pub counts: InstanceStatistics,
}

/// Alcance de las estadísticas por integración. Conjuntos vacíos = sin
/// restricción.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatisticsFilter {
    pub source_application_ids: Option<BTreeSet<i64>>,
    pub integration_ids: Option<BTreeSet<i64>>,
}

impl IntegrationStatisticsFilter {
    fn scan_scope(&self) -> ScanScope {
        ScanScope { source_application_ids: self.source_application_ids.clone().filter(|s| !s.is_empty()),
                    integration_ids: self.integration_ids.clone().filter(|s| !s.is_empty()),
                    ..ScanScope::default() }
    }
}

#[derive(Debug)]
pub struct StatisticsAggregator<S: EventStore + ?Sized> {
    store: Arc<S>,
    limits: QueryLimits,
}

impl<S: EventStore + ?Sized> Clone for StatisticsAggregator<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store),
               limits: self.limits }
    }
}

impl<S: EventStore + ?Sized> StatisticsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_limits(store, QueryLimits::default())
    }

    pub fn with_limits(store: Arc<S>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    /// Estado actual de cada clave en `scope`, con el `integration_id` de su
    /// último evento de estado.
    fn current_statuses(&self, scope: &ScanScope) -> Result<Vec<(i64, InstanceStatus)>, QueryError> {
        // sólo importa la pista de estado
        let scope = scope.clone().with_categories(registry().all_status_track_categories().clone());
        let groups = group_events(self.store.scan(&scope)?);
        Ok(groups.par_iter()
                 .filter_map(|(_, evs)| {
                     let latest = latest_status_event(evs)?;
                     Some((latest.integration_id, latest.category.instance_status()?))
                 })
                 .collect())
    }

    /// Conteos globales, restringidos opcionalmente a un conjunto de
    /// `source_application_id`.
    pub fn total_statistics(&self, source_application_ids: Option<&BTreeSet<i64>>) -> Result<InstanceStatistics, QueryError> {
        let scope = match source_application_ids {
            Some(ids) if !ids.is_empty() => ScanScope::for_source_applications(ids.clone()),
            _ => ScanScope::all(),
        };
        let stats = self.current_statuses(&scope)?
                        .into_par_iter()
                        .fold(InstanceStatistics::default, |mut acc, (_, status)| {
                            acc.record(status);
                            acc
                        })
                        .reduce(InstanceStatistics::default, InstanceStatistics::merge);
        debug!("total_statistics:done total={} failed={}", stats.total, stats.failed);
        Ok(stats)
    }

    /// Conteos agrupados por `integration_id`, ordenados por `integration_id`
    /// en la dirección pedida. Sólo paginación por offset.
    pub fn per_integration_statistics(&self,
                                      filter: &IntegrationStatisticsFilter,
                                      page: &PageRequest,
                                      direction: SortDirection)
                                      -> Result<Page<IntegrationStatistics>, QueryError> {
        self.limits.check(page)?;
        let offset = page.require_offset()?;

        let mut by_integration: BTreeMap<i64, InstanceStatistics> = BTreeMap::new();
        for (integration_id, status) in self.current_statuses(&filter.scan_scope())? {
            by_integration.entry(integration_id).or_default().record(status);
        }
        let mut rows: Vec<IntegrationStatistics> =
            by_integration.into_iter()
                          .map(|(integration_id, counts)| IntegrationStatistics { integration_id, counts })
                          .collect();
        if direction == SortDirection::Desc {
            rows.reverse();
        }
        debug!("per_integration_statistics:done integrations={}", rows.len());
        Ok(Page::slice(rows, offset, page.limit()))
    }
}
