//! Proyección "último evento por pista y por clave".
//!
//! Agregación en dos fases, independiente del motor de almacenamiento:
//! 1. `group_events`: agrupa eventos por `AggregateKey`.
//! 2. `project_group`: reduce cada grupo tomando, por separado, el evento más
//!    reciente de la pista de estado y el de la pista de almacenamiento
//!    (orden `Recency`).
//!
//! El resultado no depende del orden de llegada de los eventos, y un
//! duplicado exacto no cambia ningún máximo.

mod engine;
mod summary;

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexSet;

pub use engine::SummaryQueryEngine;
pub use summary::InstanceFlowSummary;

use crate::event::{AggregateKey, Event};
use crate::registry::EventCategory;

/// Evento más reciente de `events` que cumple `pred`.
pub fn latest_where<'a, P>(events: &'a [Event], pred: P) -> Option<&'a Event>
    where P: Fn(&Event) -> bool
{
    events.iter().filter(|e| pred(e)).max_by_key(|e| e.recency())
}

/// Último evento de la pista de estado.
pub fn latest_status_event(events: &[Event]) -> Option<&Event> {
    latest_where(events, |e| e.category.is_status_track())
}

/// Último evento de la pista de almacenamiento.
pub fn latest_storage_event(events: &[Event]) -> Option<&Event> {
    latest_where(events, |e| e.category.is_storage_track())
}

/// Agrupa eventos por clave.
pub fn group_events(events: Vec<Event>) -> HashMap<AggregateKey, Vec<Event>> {
    let mut groups: HashMap<AggregateKey, Vec<Event>> = HashMap::new();
    for ev in events {
        groups.entry(ev.key.clone()).or_default().push(ev);
    }
    groups
}

/// Estado reducido de un grupo (una clave).
#[derive(Debug, Clone)]
pub struct GroupProjection<'a> {
    pub key: &'a AggregateKey,
    pub latest_status: Option<&'a Event>,
    pub latest_storage: Option<&'a Event>,
    /// `instance_id` del evento más reciente que lo trae (cualquier pista).
    pub latest_instance_id: Option<i64>,
    /// Destinos distintos, del más reciente al más antiguo.
    pub destination_ids: Vec<String>,
    /// Categorías presentes en el historial completo.
    pub categories: BTreeSet<EventCategory>,
}

/// Reduce los eventos de una clave.
pub fn project_group<'a>(key: &'a AggregateKey, events: &'a [Event]) -> GroupProjection<'a> {
    let latest_instance_id = latest_where(events, |e| e.instance_id.is_some()).and_then(|e| e.instance_id);

    let mut with_destination: Vec<&Event> = events.iter().filter(|e| e.destination_id.is_some()).collect();
    with_destination.sort_by(|a, b| b.recency().cmp(&a.recency()));
    let destination_ids: IndexSet<String> = with_destination.into_iter()
                                                            .filter_map(|e| e.destination_id.clone())
                                                            .collect();

    GroupProjection { key,
                      latest_status: latest_status_event(events),
                      latest_storage: latest_storage_event(events),
                      latest_instance_id,
                      destination_ids: destination_ids.into_iter().collect(),
                      categories: events.iter().map(|e| e.category).collect() }
}
