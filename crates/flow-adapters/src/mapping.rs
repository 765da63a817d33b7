//! Reglas de mapeo mensaje -> evento.
//!
//! - Sólo las categorías ERROR llevan `errors`.
//! - Sólo las categorías de transferencia exitosa llevan `destination_id`.
//! - Los componentes de texto de la clave no pueden estar vacíos.

use thiserror::Error;

use flow_core::{registry, EventCategory, EventType, NewEvent};

use crate::message::InboundMessage;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MappingError {
    #[error("empty aggregate key component: {0}")]
    EmptyKeyComponent(&'static str),
    #[error("category {0} is INFO and cannot carry errors")]
    ErrorsOnInfoEvent(EventCategory),
    #[error("category {0} cannot carry a destination id")]
    DestinationNotAllowed(EventCategory),
}

pub fn map_to_event(category: EventCategory, message: InboundMessage) -> Result<NewEvent, MappingError> {
    let InboundMessage { headers,
                         destination_id,
                         errors } = message;
    if headers.source_application_integration_id.trim().is_empty() {
        return Err(MappingError::EmptyKeyComponent("sourceApplicationIntegrationId"));
    }
    if headers.source_application_instance_id.trim().is_empty() {
        return Err(MappingError::EmptyKeyComponent("sourceApplicationInstanceId"));
    }
    if category.event_type() == EventType::Info && !errors.is_empty() {
        return Err(MappingError::ErrorsOnInfoEvent(category));
    }
    if destination_id.is_some() && !registry().successful_transfer_categories().contains(&category) {
        return Err(MappingError::DestinationNotAllowed(category));
    }

    let mut event = NewEvent::new(headers.aggregate_key(), headers.integration_id, category, headers.origin_timestamp)
        .with_correlation_id(headers.correlation_id)
        .with_errors(errors);
    event.instance_id = headers.instance_id;
    event.destination_id = destination_id;
    event.producer = headers.producer;
    Ok(event)
}
