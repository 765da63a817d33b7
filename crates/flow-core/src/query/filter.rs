//! Filtro de resúmenes.
//!
//! Cada campo es opcional e independiente: ausente = sin restricción.
//! Dentro de un campo los valores se combinan con OR; entre campos, AND.
//! Un conjunto vacío se normaliza a "ausente".
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::FilterError;
use crate::event::ScanScope;
use crate::projection::{GroupProjection, InstanceFlowSummary};
use crate::registry::{registry, EventCategory, InstanceStatus, StorageStatus};

/// Rango cerrado sobre `latest_update`. Cualquiera de los extremos puede faltar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from: Some(from), to: Some(to) }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self { from: Some(from), to: None }
    }

    pub fn until(to: DateTime<Utc>) -> Self {
        Self { from: None, to: Some(to) }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |f| ts >= f) && self.to.map_or(true, |t| ts <= t)
    }

    fn validate(&self) -> Result<(), FilterError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(FilterError::InvertedTimeRange { from, to }),
            _ => Ok(()),
        }
    }
}

/// Filtro validado. Se construye con `InstanceFlowFilter::builder()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFlowFilter {
    source_application_ids: Option<BTreeSet<i64>>,
    source_application_integration_ids: Option<BTreeSet<String>>,
    source_application_instance_ids: Option<BTreeSet<String>>,
    integration_ids: Option<BTreeSet<i64>>,
    latest_update: Option<TimeRange>,
    statuses: Option<BTreeSet<InstanceStatus>>,
    latest_status_events: Option<BTreeSet<EventCategory>>,
    storage_statuses: Option<BTreeSet<StorageStatus>>,
    associated_events: Option<BTreeSet<EventCategory>>,
    destination_ids: Option<BTreeSet<String>>,
    // `statuses` o `latest_status_events` resueltos a categorías
    latest_status_categories: Option<BTreeSet<EventCategory>>,
}

impl InstanceFlowFilter {
    pub fn builder() -> InstanceFlowFilterBuilder {
        InstanceFlowFilterBuilder::default()
    }

    /// Filtro sin restricciones.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn source_application_ids(&self) -> Option<&BTreeSet<i64>> {
        self.source_application_ids.as_ref()
    }
    pub fn integration_ids(&self) -> Option<&BTreeSet<i64>> {
        self.integration_ids.as_ref()
    }
    pub fn latest_update(&self) -> Option<&TimeRange> {
        self.latest_update.as_ref()
    }
    pub fn statuses(&self) -> Option<&BTreeSet<InstanceStatus>> {
        self.statuses.as_ref()
    }
    pub fn latest_status_events(&self) -> Option<&BTreeSet<EventCategory>> {
        self.latest_status_events.as_ref()
    }
    pub fn storage_statuses(&self) -> Option<&BTreeSet<StorageStatus>> {
        self.storage_statuses.as_ref()
    }
    pub fn associated_events(&self) -> Option<&BTreeSet<EventCategory>> {
        self.associated_events.as_ref()
    }
    pub fn destination_ids(&self) -> Option<&BTreeSet<String>> {
        self.destination_ids.as_ref()
    }

    /// Predicados que se pueden empujar al store como filtro de filas.
    pub fn scan_scope(&self) -> ScanScope {
        ScanScope { source_application_ids: self.source_application_ids.clone(),
                    source_application_integration_ids: self.source_application_integration_ids.clone(),
                    source_application_instance_ids: self.source_application_instance_ids.clone(),
                    integration_ids: self.integration_ids.clone(),
                    categories: None }
    }

    /// Predicados evaluados tras agregar: se comparan contra el último evento
    /// de cada pista (estado, almacenamiento) o contra el historial completo
    /// de la clave (eventos asociados, destinos).
    pub(crate) fn accepts(&self, group: &GroupProjection<'_>, summary: &InstanceFlowSummary) -> bool {
        if let Some(range) = &self.latest_update {
            if !range.contains(summary.latest_update) {
                return false;
            }
        }
        if let Some(categories) = &self.latest_status_categories {
            if !categories.contains(&summary.latest_status_event) {
                return false;
            }
        }
        if let Some(storage) = &self.storage_statuses {
            let ok = match group.latest_storage {
                None => storage.contains(&StorageStatus::NeverStored),
                Some(ev) => registry().categories_with_storage_status(storage).contains(&ev.category),
            };
            if !ok {
                return false;
            }
        }
        if let Some(associated) = &self.associated_events {
            if group.categories.is_disjoint(associated) {
                return false;
            }
        }
        if let Some(destinations) = &self.destination_ids {
            if !summary.destination_ids.iter().any(|d| destinations.contains(d)) {
                return false;
            }
        }
        true
    }
}

/// Builder de `InstanceFlowFilter`. La validación ocurre en `build`.
#[derive(Debug, Clone, Default)]
pub struct InstanceFlowFilterBuilder {
    inner: InstanceFlowFilter,
}

fn non_empty<T: Ord, I: IntoIterator<Item = T>>(values: I) -> Option<BTreeSet<T>> {
    let set: BTreeSet<T> = values.into_iter().collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

impl InstanceFlowFilterBuilder {
    pub fn source_application_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.inner.source_application_ids = non_empty(ids);
        self
    }

    pub fn source_application_integration_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.inner.source_application_integration_ids = non_empty(ids.into_iter().map(Into::into));
        self
    }

    pub fn source_application_instance_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.inner.source_application_instance_ids = non_empty(ids.into_iter().map(Into::into));
        self
    }

    pub fn integration_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.inner.integration_ids = non_empty(ids);
        self
    }

    pub fn latest_update(mut self, range: TimeRange) -> Self {
        self.inner.latest_update = Some(range);
        self
    }

    /// Estados de instancia del último evento de estado. Excluyente con
    /// `latest_status_events`.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = InstanceStatus>) -> Self {
        self.inner.statuses = non_empty(statuses);
        self
    }

    /// Categorías admitidas para el último evento de estado. Excluyente con
    /// `statuses`.
    pub fn latest_status_events(mut self, categories: impl IntoIterator<Item = EventCategory>) -> Self {
        self.inner.latest_status_events = non_empty(categories);
        self
    }

    pub fn storage_statuses(mut self, statuses: impl IntoIterator<Item = StorageStatus>) -> Self {
        self.inner.storage_statuses = non_empty(statuses);
        self
    }

    /// Categorías de las que la clave debe tener al menos un evento, en
    /// cualquier punto de su historial.
    pub fn associated_events(mut self, categories: impl IntoIterator<Item = EventCategory>) -> Self {
        self.inner.associated_events = non_empty(categories);
        self
    }

    pub fn destination_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.inner.destination_ids = non_empty(ids.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<InstanceFlowFilter, FilterError> {
        let mut filter = self.inner;
        if let Some(range) = &filter.latest_update {
            range.validate()?;
        }
        filter.latest_status_categories = match (&filter.statuses, &filter.latest_status_events) {
            (Some(_), Some(_)) => return Err(FilterError::ConflictingStatusCriteria),
            (Some(statuses), None) => Some(registry().categories_with_instance_status(statuses)),
            (None, Some(categories)) => {
                if let Some(c) = categories.iter().find(|c| !c.is_status_track()) {
                    return Err(FilterError::NotStatusCategory(*c));
                }
                Some(categories.clone())
            }
            (None, None) => None,
        };
        Ok(filter)
    }
}
