//! Hashing y canonicalización JSON.
//!
//! Se usa para el fingerprint de eventos: dos entregas del mismo evento lógico
//! (reintento at-least-once del broker) producen el mismo fingerprint y el
//! store puede descartar la segunda.

pub mod canonical_json;

pub use canonical_json::to_canonical_json;

use serde_json::json;

use crate::constants::FINGERPRINT_VERSION;
use crate::event::NewEvent;

/// Fingerprint del contenido lógico de un evento (sin `seq`, que lo asigna el
/// store).
pub fn event_fingerprint(event: &NewEvent) -> String {
    let errors: Vec<serde_json::Value> = event.errors
                                              .iter()
                                              .map(|e| json!({ "code": e.code, "args": e.args }))
                                              .collect();
    let value = json!({
        "v": FINGERPRINT_VERSION,
        "source_application_id": event.key.source_application_id,
        "source_application_integration_id": event.key.source_application_integration_id,
        "source_application_instance_id": event.key.source_application_instance_id,
        "integration_id": event.integration_id,
        "instance_id": event.instance_id,
        "category": event.category.name(),
        "timestamp": event.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        "correlation_id": event.correlation_id.to_string(),
        "destination_id": event.destination_id,
        "producer": event.producer,
        "errors": errors,
    });
    blake3::hash(to_canonical_json(&value).as_bytes()).to_hex().to_string()
}
