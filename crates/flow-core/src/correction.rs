//! Corrección manual de instancias en error.
//!
//! Único camino de escritura del core. Precondición: el último evento de
//! estado de la clave existe y es de tipo ERROR. La escritura es condicional
//! (`append_if_latest_status`): si entre la lectura y la escritura llega otro
//! evento de estado, la corrección falla con `ConcurrentModification` y no se
//! agrega nada.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{CorrectionError, StoreError};
use crate::event::{AggregateKey, AppendOutcome, Event, EventStore, NewEvent};
use crate::projection::latest_status_event;
use crate::registry::EventCategory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionKind {
    ManuallyProcessed { destination_id: String },
    ManuallyRejected,
    StatusOverriddenAsTransferred,
}

impl CorrectionKind {
    pub fn category(&self) -> EventCategory {
        match self {
            CorrectionKind::ManuallyProcessed { .. } => EventCategory::InstanceManuallyProcessed,
            CorrectionKind::ManuallyRejected => EventCategory::InstanceManuallyRejected,
            CorrectionKind::StatusOverriddenAsTransferred => EventCategory::InstanceStatusOverriddenAsTransferred,
        }
    }

    pub fn destination_id(&self) -> Option<&str> {
        match self {
            CorrectionKind::ManuallyProcessed { destination_id } => Some(destination_id),
            _ => None,
        }
    }

    /// Valida la combinación categoría + destino recibida de un llamador.
    pub fn from_parts(category: EventCategory, destination_id: Option<String>) -> Result<Self, CorrectionError> {
        let destination_id = destination_id.filter(|d| !d.trim().is_empty());
        match (category, destination_id) {
            (EventCategory::InstanceManuallyProcessed, Some(destination_id)) => {
                Ok(CorrectionKind::ManuallyProcessed { destination_id })
            }
            (EventCategory::InstanceManuallyProcessed, None) => Err(CorrectionError::MissingDestinationId),
            (EventCategory::InstanceManuallyRejected, None) => Ok(CorrectionKind::ManuallyRejected),
            (EventCategory::InstanceStatusOverriddenAsTransferred, None) => {
                Ok(CorrectionKind::StatusOverriddenAsTransferred)
            }
            (c @ (EventCategory::InstanceManuallyRejected | EventCategory::InstanceStatusOverriddenAsTransferred),
             Some(_)) => Err(CorrectionError::DestinationIdNotAllowed(c)),
            (other, _) => Err(CorrectionError::NotACorrection(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub key: AggregateKey,
    pub kind: CorrectionKind,
    /// Operador que aplica la corrección; se guarda como `producer`.
    pub operator: Option<String>,
}

impl CorrectionRequest {
    pub fn new(key: AggregateKey, kind: CorrectionKind) -> Self {
        Self { key, kind, operator: None }
    }

    pub fn by(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

#[derive(Debug)]
pub struct ManualCorrectionService<S: EventStore + ?Sized> {
    store: Arc<S>,
}

impl<S: EventStore + ?Sized> Clone for ManualCorrectionService<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: EventStore + ?Sized> ManualCorrectionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn apply(&self, request: CorrectionRequest) -> Result<Event, CorrectionError> {
        self.apply_at(request, Utc::now())
    }

    /// Igual que `apply` con un reloj explícito. El timestamp del evento nuevo
    /// es `max(now, prior.timestamp)`; a igual timestamp gana por `seq`.
    pub fn apply_at(&self, request: CorrectionRequest, now: DateTime<Utc>) -> Result<Event, CorrectionError> {
        let CorrectionRequest { key, kind, operator } = request;
        let events = self.store.events_for_key(&key).map_err(CorrectionError::Store)?;
        let prior = latest_status_event(&events).ok_or_else(|| CorrectionError::NoPriorStatusEvent(key.clone()))?;
        if !prior.is_error() {
            warn!("correction:rejected key={key} latest={}", prior.category);
            return Err(CorrectionError::LatestStatusNotError { key,
                                                               category: prior.category });
        }

        let mut event = NewEvent::new(key.clone(), prior.integration_id, kind.category(), now.max(prior.timestamp));
        event.instance_id = prior.instance_id;
        event.destination_id = kind.destination_id().map(str::to_owned);
        event.producer = operator;

        match self.store.append_if_latest_status(event, prior.seq) {
            Ok(AppendOutcome::Appended(ev)) => {
                info!("correction:applied key={} seq={} category={}", ev.key, ev.seq, ev.category);
                Ok(ev)
            }
            // correlation_id nuevo: un duplicado sólo es posible si el store no
            // respeta el contrato
            Ok(AppendOutcome::Duplicate { fingerprint }) => {
                Err(CorrectionError::Store(StoreError::Internal(format!("correction reported as duplicate fingerprint={fingerprint}"))))
            }
            Err(StoreError::Conflict { expected, found }) => {
                warn!("correction:conflict key={key} expected={expected} found={found:?}");
                Err(CorrectionError::ConcurrentModification(key))
            }
            Err(e) => Err(CorrectionError::Store(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manually_processed_requires_destination() {
        assert_eq!(CorrectionKind::from_parts(EventCategory::InstanceManuallyProcessed, None),
                   Err(CorrectionError::MissingDestinationId));
        assert_eq!(CorrectionKind::from_parts(EventCategory::InstanceManuallyProcessed, Some("  ".into())),
                   Err(CorrectionError::MissingDestinationId));
        let kind = CorrectionKind::from_parts(EventCategory::InstanceManuallyProcessed, Some("D9".into())).unwrap();
        assert_eq!(kind.destination_id(), Some("D9"));
    }

    #[test]
    fn only_correction_categories_are_accepted() {
        assert_eq!(CorrectionKind::from_parts(EventCategory::InstanceDispatched, None),
                   Err(CorrectionError::NotACorrection(EventCategory::InstanceDispatched)));
        assert_eq!(CorrectionKind::from_parts(EventCategory::InstanceManuallyRejected, Some("D".into())),
                   Err(CorrectionError::DestinationIdNotAllowed(EventCategory::InstanceManuallyRejected)));
        assert_eq!(CorrectionKind::from_parts(EventCategory::InstanceStatusOverriddenAsTransferred, None)
                       .unwrap()
                       .category(),
                   EventCategory::InstanceStatusOverriddenAsTransferred);
    }
}
