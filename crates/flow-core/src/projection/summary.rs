use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GroupProjection;
use crate::event::AggregateKey;
use crate::query::SortKey;
use crate::registry::{EventCategory, InstanceStatus, StorageStatus};

/// Vista derivada del estado actual de una instancia. Nunca se cachea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFlowSummary {
    pub key: AggregateKey,
    /// `integration_id` del último evento de estado.
    pub integration_id: i64,
    pub latest_instance_id: Option<i64>,
    /// Timestamp del último evento de estado (máximo de la pista).
    pub latest_update: DateTime<Utc>,
    pub latest_status_event: EventCategory,
    pub status: InstanceStatus,
    pub storage_status: StorageStatus,
    pub destination_ids: Vec<String>,
}

impl InstanceFlowSummary {
    /// `None` si el grupo no tiene ningún evento de la pista de estado.
    pub fn from_projection(group: &GroupProjection<'_>) -> Option<Self> {
        let latest = group.latest_status?;
        let status = latest.category.instance_status()?;
        let storage_status = group.latest_storage
                                  .and_then(|e| e.category.storage_status())
                                  .unwrap_or(StorageStatus::NeverStored);
        Some(Self { key: group.key.clone(),
                    integration_id: latest.integration_id,
                    latest_instance_id: group.latest_instance_id,
                    latest_update: latest.timestamp,
                    latest_status_event: latest.category,
                    status,
                    storage_status,
                    destination_ids: group.destination_ids.clone() })
    }
}

impl SortKey for InstanceFlowSummary {
    fn latest_update(&self) -> DateTime<Utc> {
        self.latest_update
    }
    fn integration_id(&self) -> i64 {
        self.integration_id
    }
    fn aggregate_key(&self) -> &AggregateKey {
        &self.key
    }
}
