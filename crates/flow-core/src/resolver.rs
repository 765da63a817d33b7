//! Consultas puntuales sobre una clave o un `instance_id`.
//!
//! La ausencia es un valor (`None` o página vacía), no un error.

use std::sync::Arc;

use log::debug;

use crate::errors::{QueryError, StoreError};
use crate::event::{AggregateKey, Event, EventStore, ScanScope};
use crate::projection::{latest_status_event, latest_where};
use crate::query::{Page, PageRequest, QueryLimits};
use crate::registry::{registry, EventCategory};

#[derive(Debug)]
pub struct PointResolver<S: EventStore + ?Sized> {
    store: Arc<S>,
    limits: QueryLimits,
}

impl<S: EventStore + ?Sized> Clone for PointResolver<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store),
               limits: self.limits }
    }
}

impl<S: EventStore + ?Sized> PointResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_limits(store, QueryLimits::default())
    }

    pub fn with_limits(store: Arc<S>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    /// Último evento de la pista de estado de `key`.
    pub fn latest_status_event(&self, key: &AggregateKey) -> Result<Option<Event>, StoreError> {
        let events = self.store.events_for_key(key)?;
        Ok(latest_status_event(&events).cloned())
    }

    /// Destino del evento de transferencia exitosa más reciente. Si ese
    /// evento no trae destino, `None`: nunca se recurre a uno anterior.
    pub fn latest_destination_id(&self, key: &AggregateKey) -> Result<Option<String>, StoreError> {
        let transfers = registry().successful_transfer_categories();
        let events = self.store.scan(&ScanScope::for_key(key).with_categories(transfers.clone()))?;
        let latest = latest_where(&events, |e| !e.is_error() && transfers.contains(&e.category));
        Ok(latest.and_then(|e| e.destination_id.clone()))
    }

    /// Registro más reciente asociado a `instance_id`.
    pub fn latest_registration_event(&self, instance_id: i64) -> Result<Option<Event>, StoreError> {
        let events = self.store.events_for_instance(instance_id)?;
        Ok(latest_where(&events, |e| e.category == EventCategory::InstanceRegistered).cloned())
    }

    /// Historial completo de `key`, del más reciente al más antiguo.
    /// Sólo admite paginación por offset.
    pub fn event_history(&self, key: &AggregateKey, page: &PageRequest) -> Result<Page<Event>, QueryError> {
        self.limits.check(page)?;
        let offset = page.require_offset()?;
        let mut events = self.store.events_for_key(key)?;
        events.sort_by(|a, b| b.recency().cmp(&a.recency()));
        debug!("event_history:done key={key} events={}", events.len());
        Ok(Page::slice(events, offset, page.limit()))
    }
}
