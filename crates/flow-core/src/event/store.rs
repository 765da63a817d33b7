use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{AggregateKey, Event, NewEvent};
use crate::errors::StoreError;
use crate::projection::latest_status_event;
use crate::registry::EventCategory;

/// Resultado de un `append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Evento nuevo almacenado con su `seq`.
    Appended(Event),
    /// Reentrega exacta de un evento ya almacenado (mismo fingerprint).
    Duplicate { fingerprint: String },
}

impl AppendOutcome {
    pub fn appended(&self) -> Option<&Event> {
        match self {
            AppendOutcome::Appended(ev) => Some(ev),
            AppendOutcome::Duplicate { .. } => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppendOutcome::Duplicate { .. })
    }
}

/// Predicados de fila que el store puede aplicar antes de agrupar.
///
/// Los componentes de la clave e `integration_id` son constantes dentro de
/// una clave, así que filtrar por ellos nunca parte un grupo. `categories` sí
/// lo parte: sólo lo usan consultas que leen una única pista.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanScope {
    pub source_application_ids: Option<BTreeSet<i64>>,
    pub source_application_integration_ids: Option<BTreeSet<String>>,
    pub source_application_instance_ids: Option<BTreeSet<String>>,
    pub integration_ids: Option<BTreeSet<i64>>,
    #[serde(default)]
    pub categories: Option<BTreeSet<EventCategory>>,
}

impl ScanScope {
    /// Sin restricciones.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_source_applications(ids: BTreeSet<i64>) -> Self {
        Self { source_application_ids: Some(ids),
               ..Self::default() }
    }

    /// Exactamente los eventos de `key`.
    pub fn for_key(key: &AggregateKey) -> Self {
        Self { source_application_ids: Some([key.source_application_id].into()),
               source_application_integration_ids: Some([key.source_application_integration_id.clone()].into()),
               source_application_instance_ids: Some([key.source_application_instance_id.clone()].into()),
               ..Self::default() }
    }

    /// La única clave que admite este alcance, si los tres componentes están
    /// fijados a un solo valor.
    pub fn single_key(&self) -> Option<AggregateKey> {
        fn one<T: Clone>(set: &Option<BTreeSet<T>>) -> Option<T> {
            set.as_ref().filter(|s| s.len() == 1).and_then(|s| s.iter().next().cloned())
        }
        Some(AggregateKey::new(one(&self.source_application_ids)?,
                               one(&self.source_application_integration_ids)?,
                               one(&self.source_application_instance_ids)?))
    }

    /// Restringe además a las categorías dadas.
    pub fn with_categories(mut self, categories: BTreeSet<EventCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        let key = &event.key;
        self.source_application_ids
            .as_ref()
            .map_or(true, |s| s.contains(&key.source_application_id))
        && self.source_application_integration_ids
               .as_ref()
               .map_or(true, |s| s.contains(&key.source_application_integration_id))
        && self.source_application_instance_ids
               .as_ref()
               .map_or(true, |s| s.contains(&key.source_application_instance_id))
        && self.integration_ids.as_ref().map_or(true, |s| s.contains(&event.integration_id))
        && self.categories.as_ref().map_or(true, |s| s.contains(&event.category))
    }
}

/// Almacenamiento de eventos append-only.
///
/// Contrato:
/// - `append` es seguro ante reentregas: un duplicado exacto no altera
///   ninguna proyección.
/// - Las lecturas devuelven una instantánea; no bloquean a los escritores más
///   allá de la copia.
/// - Los errores de infraestructura se propagan como `StoreError`.
pub trait EventStore: Send + Sync {
    /// Agrega un evento y devuelve el evento completo (con `seq`).
    fn append(&self, event: NewEvent) -> Result<AppendOutcome, StoreError>;

    /// Agrega `event` sólo si el último evento de estado de su clave sigue
    /// teniendo `seq == expected_seq`. Si cambió, `StoreError::Conflict`.
    fn append_if_latest_status(&self, event: NewEvent, expected_seq: u64) -> Result<AppendOutcome, StoreError>;

    /// Eventos que cumplen `scope` (sin orden garantizado).
    fn scan(&self, scope: &ScanScope) -> Result<Vec<Event>, StoreError>;

    /// Eventos de una clave, en orden ascendente de `seq`.
    fn events_for_key(&self, key: &AggregateKey) -> Result<Vec<Event>, StoreError>;

    /// Eventos con un `instance_id` dado, en orden ascendente de `seq`.
    fn events_for_instance(&self, instance_id: i64) -> Result<Vec<Event>, StoreError>;
}

impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    fn append(&self, event: NewEvent) -> Result<AppendOutcome, StoreError> {
        (**self).append(event)
    }
    fn append_if_latest_status(&self, event: NewEvent, expected_seq: u64) -> Result<AppendOutcome, StoreError> {
        (**self).append_if_latest_status(event, expected_seq)
    }
    fn scan(&self, scope: &ScanScope) -> Result<Vec<Event>, StoreError> {
        (**self).scan(scope)
    }
    fn events_for_key(&self, key: &AggregateKey) -> Result<Vec<Event>, StoreError> {
        (**self).events_for_key(key)
    }
    fn events_for_instance(&self, instance_id: i64) -> Result<Vec<Event>, StoreError> {
        (**self).events_for_instance(instance_id)
    }
}

/// Store en memoria, seguro para escrituras y lecturas concurrentes.
///
/// Los eventos se agrupan por clave en un `DashMap` (locks por shard). El
/// orden de locks es siempre clave -> fingerprint, tanto en `append` como en
/// `append_if_latest_status`.
#[derive(Debug)]
pub struct InMemoryEventStore {
    by_key: DashMap<AggregateKey, Vec<Event>>,
    fingerprints: DashMap<String, u64>,
    next_seq: AtomicU64,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self { by_key: DashMap::new(),
               fingerprints: DashMap::new(),
               next_seq: AtomicU64::new(1) }
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Número total de eventos almacenados.
    pub fn len(&self) -> usize {
        self.by_key.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_locked(&self, slot: &mut Vec<Event>, event: NewEvent) -> AppendOutcome {
        let fingerprint = event.fingerprint();
        match self.fingerprints.entry(fingerprint) {
            Entry::Occupied(o) => {
                debug!("append:duplicate key={} seq={}", event.key, o.get());
                AppendOutcome::Duplicate { fingerprint: o.key().clone() }
            }
            Entry::Vacant(v) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                v.insert(seq);
                let ev = Event::from_new(seq, event);
                debug!("append:done key={} seq={} category={}", ev.key, ev.seq, ev.category);
                slot.push(ev.clone());
                AppendOutcome::Appended(ev)
            }
        }
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: NewEvent) -> Result<AppendOutcome, StoreError> {
        let mut slot = self.by_key.entry(event.key.clone()).or_default();
        Ok(self.insert_locked(slot.value_mut(), event))
    }

    fn append_if_latest_status(&self, event: NewEvent, expected_seq: u64) -> Result<AppendOutcome, StoreError> {
        let mut slot = self.by_key.entry(event.key.clone()).or_default();
        let found = latest_status_event(slot.value()).map(|e| e.seq);
        if found != Some(expected_seq) {
            debug!("append_if_latest_status:conflict key={} expected={expected_seq} found={found:?}", event.key);
            return Err(StoreError::Conflict { expected: expected_seq, found });
        }
        Ok(self.insert_locked(slot.value_mut(), event))
    }

    fn scan(&self, scope: &ScanScope) -> Result<Vec<Event>, StoreError> {
        if let Some(key) = scope.single_key() {
            return Ok(self.by_key
                          .get(&key)
                          .map(|v| v.value().iter().filter(|e| scope.matches(e)).cloned().collect())
                          .unwrap_or_default());
        }
        let mut out = Vec::new();
        for entry in self.by_key.iter() {
            out.extend(entry.value().iter().filter(|e| scope.matches(e)).cloned());
        }
        Ok(out)
    }

    fn events_for_key(&self, key: &AggregateKey) -> Result<Vec<Event>, StoreError> {
        Ok(self.by_key.get(key).map(|v| v.value().clone()).unwrap_or_default())
    }

    fn events_for_instance(&self, instance_id: i64) -> Result<Vec<Event>, StoreError> {
        let mut out: Vec<Event> = Vec::new();
        for entry in self.by_key.iter() {
            out.extend(entry.value().iter().filter(|e| e.instance_id == Some(instance_id)).cloned());
        }
        out.sort_by_key(|e| e.seq);
        Ok(out)
    }
}
