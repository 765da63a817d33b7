//! Taxonomía cerrada de categorías de evento.
//!
//! Cada categoría fija, en tiempo de compilación, su tipo (INFO/ERROR) y a
//! qué pista contribuye: la pista de estado (`InstanceStatus`) o la pista de
//! almacenamiento (`StorageStatus`). Ninguna categoría pertenece a ambas.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

/// Tipo de evento. Derivado siempre de la categoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Info,
    Error,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Info => "INFO",
            EventType::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(EventType::Info),
            "ERROR" => Ok(EventType::Error),
            other => Err(ParseError::new("event type", other)),
        }
    }
}

/// Estado de negocio de una instancia (pista de estado).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    InProgress,
    Transferred,
    Aborted,
    Failed,
}

impl InstanceStatus {
    pub const ALL: [InstanceStatus; 4] = [InstanceStatus::InProgress,
                                          InstanceStatus::Transferred,
                                          InstanceStatus::Aborted,
                                          InstanceStatus::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::InProgress => "IN_PROGRESS",
            InstanceStatus::Transferred => "TRANSFERRED",
            InstanceStatus::Aborted => "ABORTED",
            InstanceStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstanceStatus::ALL.into_iter()
                           .find(|st| st.as_str() == s)
                           .ok_or_else(|| ParseError::new("instance status", s))
    }
}

/// Estado de almacenamiento (pista de almacenamiento).
///
/// `NeverStored` no lo aporta ninguna categoría: es el valor de una clave que
/// no tiene eventos en esta pista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageStatus {
    Stored,
    StoredAndDeleted,
    NeverStored,
}

impl StorageStatus {
    pub const ALL: [StorageStatus; 3] = [StorageStatus::Stored, StorageStatus::StoredAndDeleted, StorageStatus::NeverStored];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageStatus::Stored => "STORED",
            StorageStatus::StoredAndDeleted => "STORED_AND_DELETED",
            StorageStatus::NeverStored => "NEVER_STORED",
        }
    }
}

impl fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageStatus::ALL.into_iter()
                          .find(|st| st.as_str() == s)
                          .ok_or_else(|| ParseError::new("storage status", s))
    }
}

/// Pista a la que contribuye una categoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Status,
    Storage,
}

/// Categorías de evento soportadas. Enumeración cerrada: agregar una
/// categoría implica actualizar `descriptor` y `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    InstanceReceived,
    InstanceRegistered,
    InstanceRequestedForRetry,
    InstanceMapped,
    InstanceReadyForDispatch,
    InstanceDispatched,
    InstanceManuallyProcessed,
    InstanceManuallyRejected,
    InstanceStatusOverriddenAsTransferred,
    InstanceReceivalError,
    InstanceRegistrationError,
    InstanceRetryRequestError,
    InstanceMappingError,
    InstanceDispatchingError,
    InstanceDeleted,
}

/// Atributos estáticos de una categoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDescriptor {
    pub name: &'static str,
    pub event_type: EventType,
    pub instance_status: Option<InstanceStatus>,
    pub storage_status: Option<StorageStatus>,
}

impl EventCategory {
    pub const ALL: [EventCategory; 15] = [EventCategory::InstanceReceived,
                                          EventCategory::InstanceRegistered,
                                          EventCategory::InstanceRequestedForRetry,
                                          EventCategory::InstanceMapped,
                                          EventCategory::InstanceReadyForDispatch,
                                          EventCategory::InstanceDispatched,
                                          EventCategory::InstanceManuallyProcessed,
                                          EventCategory::InstanceManuallyRejected,
                                          EventCategory::InstanceStatusOverriddenAsTransferred,
                                          EventCategory::InstanceReceivalError,
                                          EventCategory::InstanceRegistrationError,
                                          EventCategory::InstanceRetryRequestError,
                                          EventCategory::InstanceMappingError,
                                          EventCategory::InstanceDispatchingError,
                                          EventCategory::InstanceDeleted];

    /// Tabla de atributos (única fuente de verdad de la taxonomía).
    pub const fn descriptor(self) -> CategoryDescriptor {
        use EventCategory::*;
        use EventType::{Error, Info};
        use InstanceStatus::{Aborted, Failed, InProgress, Transferred};
        let (name, event_type, instance_status, storage_status) = match self {
            InstanceReceived => ("INSTANCE_RECEIVED", Info, Some(InProgress), None),
            InstanceRegistered => ("INSTANCE_REGISTERED", Info, None, Some(StorageStatus::Stored)),
            InstanceRequestedForRetry => ("INSTANCE_REQUESTED_FOR_RETRY", Info, Some(InProgress), None),
            InstanceMapped => ("INSTANCE_MAPPED", Info, Some(InProgress), None),
            InstanceReadyForDispatch => ("INSTANCE_READY_FOR_DISPATCH", Info, Some(InProgress), None),
            InstanceDispatched => ("INSTANCE_DISPATCHED", Info, Some(Transferred), None),
            InstanceManuallyProcessed => ("INSTANCE_MANUALLY_PROCESSED", Info, Some(Transferred), None),
            InstanceManuallyRejected => ("INSTANCE_MANUALLY_REJECTED", Info, Some(Aborted), None),
            InstanceStatusOverriddenAsTransferred => {
                ("INSTANCE_STATUS_OVERRIDDEN_AS_TRANSFERRED", Info, Some(Transferred), None)
            }
            InstanceReceivalError => ("INSTANCE_RECEIVAL_ERROR", Error, Some(Failed), None),
            InstanceRegistrationError => ("INSTANCE_REGISTRATION_ERROR", Error, Some(Failed), None),
            InstanceRetryRequestError => ("INSTANCE_RETRY_REQUEST_ERROR", Error, Some(Failed), None),
            InstanceMappingError => ("INSTANCE_MAPPING_ERROR", Error, Some(Failed), None),
            InstanceDispatchingError => ("INSTANCE_DISPATCHING_ERROR", Error, Some(Failed), None),
            InstanceDeleted => ("INSTANCE_DELETED", Info, None, Some(StorageStatus::StoredAndDeleted)),
        };
        CategoryDescriptor { name,
                             event_type,
                             instance_status,
                             storage_status }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn event_type(self) -> EventType {
        self.descriptor().event_type
    }

    pub fn instance_status(self) -> Option<InstanceStatus> {
        self.descriptor().instance_status
    }

    pub fn storage_status(self) -> Option<StorageStatus> {
        self.descriptor().storage_status
    }

    pub fn track(self) -> Option<Track> {
        let d = self.descriptor();
        match (d.instance_status, d.storage_status) {
            (Some(_), _) => Some(Track::Status),
            (None, Some(_)) => Some(Track::Storage),
            (None, None) => None,
        }
    }

    pub fn is_status_track(self) -> bool {
        matches!(self.track(), Some(Track::Status))
    }

    pub fn is_storage_track(self) -> bool {
        matches!(self.track(), Some(Track::Storage))
    }

    /// Nombre del canal de ingesta: `INSTANCE_DISPATCHED` -> `instance-dispatched`.
    pub fn topic(self) -> String {
        self.name().to_ascii_lowercase().replace('_', "-")
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventCategory {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::registry().category_of(s)
                         .ok_or_else(|| ParseError::new("event category", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_category_belongs_to_both_tracks() {
        for c in EventCategory::ALL {
            let d = c.descriptor();
            assert!(!(d.instance_status.is_some() && d.storage_status.is_some()), "{c} en ambas pistas");
            assert!(c.track().is_some(), "{c} sin pista");
        }
    }

    #[test]
    fn error_type_iff_failed_status() {
        for c in EventCategory::ALL {
            let failed = c.instance_status() == Some(InstanceStatus::Failed);
            assert_eq!(c.event_type() == EventType::Error, failed, "{c}");
        }
    }

    #[test]
    fn serde_uses_screaming_snake_names() {
        let json = serde_json::to_string(&EventCategory::InstanceStatusOverriddenAsTransferred).unwrap();
        assert_eq!(json, "\"INSTANCE_STATUS_OVERRIDDEN_AS_TRANSFERRED\"");
        for c in EventCategory::ALL {
            let v = serde_json::to_value(c).unwrap();
            assert_eq!(v.as_str(), Some(c.name()));
        }
    }

    #[test]
    fn parse_status_names() {
        assert_eq!("FAILED".parse::<InstanceStatus>().unwrap(), InstanceStatus::Failed);
        assert_eq!("NEVER_STORED".parse::<StorageStatus>().unwrap(), StorageStatus::NeverStored);
        assert!("failed".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn topic_is_kebab_case() {
        assert_eq!(EventCategory::InstanceReadyForDispatch.topic(), "instance-ready-for-dispatch");
    }
}
