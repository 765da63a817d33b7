use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flow_core::{AggregateKey, EventError};

/// Cabeceras comunes a todos los canales de ingesta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundHeaders {
    pub source_application_id: i64,
    pub source_application_integration_id: String,
    pub source_application_instance_id: String,
    pub integration_id: i64,
    #[serde(default)]
    pub instance_id: Option<i64>,
    pub correlation_id: Uuid,
    /// Momento en que el productor generó el evento.
    pub origin_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub producer: Option<String>,
}

impl InboundHeaders {
    pub fn aggregate_key(&self) -> AggregateKey {
        AggregateKey::new(self.source_application_id,
                          self.source_application_integration_id.clone(),
                          self.source_application_instance_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub headers: InboundHeaders,
    #[serde(default)]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<EventError>,
}

impl InboundMessage {
    pub fn new(headers: InboundHeaders) -> Self {
        Self { headers,
               destination_id: None,
               errors: Vec::new() }
    }

    pub fn with_destination_id(mut self, destination_id: impl Into<String>) -> Self {
        self.destination_id = Some(destination_id.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<EventError>) -> Self {
        self.errors = errors;
        self
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
