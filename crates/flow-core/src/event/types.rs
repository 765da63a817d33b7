//! Tipos de evento: `AggregateKey`, `NewEvent` y `Event`.
//!
//! Rol en el flujo:
//! - La ingesta construye `NewEvent` a partir de mensajes entrantes.
//! - El `EventStore` asigna `seq` (orden de ingesta) y devuelve `Event`.
//! - Las proyecciones leen `Event` y nunca lo modifican.
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ParseError;
use crate::hashing::event_fingerprint;
use crate::registry::{EventCategory, EventType};

/// Identidad de una instancia de flujo durante todo su ciclo de vida.
///
/// Invariante: todos los eventos con la misma clave describen la misma
/// instancia lógica. Es independiente de `instance_id` (sólo existe tras el
/// registro) y de `correlation_id` (cambia en cada reintento).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey {
    pub source_application_id: i64,
    pub source_application_integration_id: String,
    pub source_application_instance_id: String,
}

impl AggregateKey {
    pub fn new(source_application_id: i64,
               source_application_integration_id: impl Into<String>,
               source_application_instance_id: impl Into<String>)
               -> Self {
        Self { source_application_id,
               source_application_integration_id: source_application_integration_id.into(),
               source_application_instance_id: source_application_instance_id.into() }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "{}/{}/{}",
               self.source_application_id, self.source_application_integration_id, self.source_application_instance_id)
    }
}

/// Inverso de `Display`: `"2/I3/S3"`. Se parte en las dos primeras `/`: el
/// componente de instancia puede contener `/`, el de integración no (una
/// clave con `/` en la integración no vuelve igual tras `Display`).
impl FromStr for AggregateKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::new("aggregate key", s);
        let mut parts = s.splitn(3, '/');
        let app = parts.next().and_then(|p| p.trim().parse::<i64>().ok()).ok_or_else(invalid)?;
        let integration = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let instance = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        Ok(Self::new(app, integration, instance))
    }
}

/// Error reportado por un paso del pipeline (sólo en eventos ERROR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError {
    pub code: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl EventError {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), args: BTreeMap::new() }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }
}

/// Evento aún no persistido (sin `seq`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub key: AggregateKey,
    pub integration_id: i64,
    pub instance_id: Option<i64>,
    pub category: EventCategory,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub destination_id: Option<String>,
    /// Identidad del productor que emitió el mensaje de origen.
    pub producer: Option<String>,
    #[serde(default)]
    pub errors: Vec<EventError>,
}

impl NewEvent {
    /// Crea un evento con `correlation_id` nuevo y sin campos opcionales.
    pub fn new(key: AggregateKey, integration_id: i64, category: EventCategory, timestamp: DateTime<Utc>) -> Self {
        Self { key,
               integration_id,
               instance_id: None,
               category,
               timestamp,
               correlation_id: Uuid::new_v4(),
               destination_id: None,
               producer: None,
               errors: Vec::new() }
    }

    pub fn with_instance_id(mut self, instance_id: i64) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    pub fn with_destination_id(mut self, destination_id: impl Into<String>) -> Self {
        self.destination_id = Some(destination_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<EventError>) -> Self {
        self.errors = errors;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.category.event_type()
    }

    pub fn fingerprint(&self) -> String {
        event_fingerprint(self)
    }
}

/// Evento persistido. Inmutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Secuencia de ingesta asignada por el store (monótona, global).
    pub seq: u64,
    pub key: AggregateKey,
    pub integration_id: i64,
    pub instance_id: Option<i64>,
    pub category: EventCategory,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub destination_id: Option<String>,
    pub producer: Option<String>,
    #[serde(default)]
    pub errors: Vec<EventError>,
}

impl Event {
    pub fn from_new(seq: u64, event: NewEvent) -> Self {
        let NewEvent { key,
                       integration_id,
                       instance_id,
                       category,
                       timestamp,
                       correlation_id,
                       destination_id,
                       producer,
                       errors } = event;
        Self { seq,
               key,
               integration_id,
               instance_id,
               category,
               timestamp,
               correlation_id,
               destination_id,
               producer,
               errors }
    }

    pub fn event_type(&self) -> EventType {
        self.category.event_type()
    }

    pub fn is_error(&self) -> bool {
        self.event_type() == EventType::Error
    }

    /// Posición del evento en el orden de recencia (ver `Recency`).
    pub fn recency(&self) -> Recency {
        Recency { timestamp: self.timestamp,
                  instance_id: self.instance_id,
                  seq: self.seq }
    }
}

/// Orden total de "más reciente" entre eventos de una misma clave.
///
/// Se compara por `timestamp`; a igual timestamp gana el `instance_id` mayor
/// (ausente < presente) y, si persiste el empate, el `seq` mayor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recency {
    pub timestamp: DateTime<Utc>,
    pub instance_id: Option<i64>,
    pub seq: u64,
}

impl Ord for Recency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.instance_id.cmp(&other.instance_id))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Recency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 11, min, 0).unwrap()
    }

    fn event(seq: u64, min: u32, instance_id: Option<i64>) -> Event {
        let mut ev = NewEvent::new(AggregateKey::new(1, "I", "S"), 1, EventCategory::InstanceMapped, at(min));
        ev.instance_id = instance_id;
        Event::from_new(seq, ev)
    }

    #[test]
    fn recency_orders_by_timestamp_first() {
        assert!(event(9, 0, Some(5)).recency() < event(1, 1, None).recency());
    }

    #[test]
    fn recency_ties_break_by_instance_id_then_seq() {
        assert!(event(9, 0, None).recency() < event(1, 0, Some(1)).recency());
        assert!(event(1, 0, Some(3)).recency() < event(2, 0, Some(3)).recency());
    }

    #[test]
    fn key_display_and_parse() {
        let key = AggregateKey::new(2, "I3", "S3");
        assert_eq!(key.to_string(), "2/I3/S3");
        assert_eq!("2/I3/S3".parse::<AggregateKey>().unwrap(), key);
        assert_eq!("2/I3/a/b".parse::<AggregateKey>().unwrap().source_application_instance_id, "a/b");
        let slashed = AggregateKey::new(1, "a/b", "c");
        assert_ne!(slashed.to_string().parse::<AggregateKey>().unwrap(), slashed);
        assert!("x/I3/S3".parse::<AggregateKey>().is_err());
        assert!("2/I3".parse::<AggregateKey>().is_err());
    }
}
