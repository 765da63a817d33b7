//! Escenario de demostración: ingesta por categoría, consultas y una
//! corrección manual sobre el mismo store.
//!
//! Dos instancias de flujo:
//! - `S3` recibe, mapea, se borra del almacenamiento y se despacha a `D1`.
//! - `S4` se registra y falla al despachar; el escenario la corrige como
//!   procesada manualmente.
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::info;
use uuid::Uuid;

use flow_adapters::{IngestError, IngestReport, IngestionHub, InboundHeaders, InboundMessage};
use flow_core::{AggregateKey, CorrectionError, CorrectionKind, CorrectionRequest, Event, EventCategory, EventError,
                EventStore, InstanceFlowFilter, InstanceFlowSummary, InstanceStatistics, ManualCorrectionService, Page,
                PageRequest, QueryError, StatisticsAggregator, SummaryQueryEngine, SummarySort};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Correction(#[from] CorrectionError),
}

/// Parámetros del escenario. `source_application_id` aísla ejecuciones
/// repetidas sobre un store durable.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub source_application_id: i64,
    pub base: DateTime<Utc>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self { source_application_id: 2,
               base: Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).single().unwrap_or_else(Utc::now) }
    }
}

#[derive(Debug)]
pub struct DemoOutcome {
    pub ingest: BTreeMap<EventCategory, IngestReport>,
    pub before_correction: Page<InstanceFlowSummary>,
    pub after_correction: Page<InstanceFlowSummary>,
    pub statistics: InstanceStatistics,
    pub correction: Event,
}

impl Scenario {
    pub fn key(&self, instance: &str) -> AggregateKey {
        AggregateKey::new(self.source_application_id, "I3", instance)
    }

    fn message(&self, instance: &str, instance_id: Option<i64>, offset_secs: i64) -> InboundMessage {
        InboundMessage::new(InboundHeaders { source_application_id: self.source_application_id,
                                             source_application_integration_id: "I3".into(),
                                             source_application_instance_id: instance.into(),
                                             integration_id: 30,
                                             instance_id,
                                             correlation_id: Uuid::new_v4(),
                                             origin_timestamp: self.base + Duration::seconds(offset_secs),
                                             producer: Some("demo".into()) })
    }

    /// Mensajes en el orden de publicación, no en el de sus timestamps. El
    /// despacho de `S3` se entrega dos veces.
    pub fn messages(&self) -> Vec<(EventCategory, InboundMessage)> {
        let dispatched = self.message("S3", Some(300), 920).with_destination_id("D1");
        vec![(EventCategory::InstanceDispatched, dispatched.clone()),
             (EventCategory::InstanceDeleted, self.message("S3", Some(300), 910)),
             (EventCategory::InstanceMapped, self.message("S3", Some(300), 900)),
             (EventCategory::InstanceReceived, self.message("S3", None, 0)),
             (EventCategory::InstanceDispatched, dispatched),
             (EventCategory::InstanceReceived, self.message("S4", None, 60)),
             (EventCategory::InstanceRegistered, self.message("S4", Some(400), 120)),
             (EventCategory::InstanceDispatchingError,
              self.message("S4", Some(400), 180)
                  .with_errors(vec![EventError::new("dispatch.rejected").with_arg("destination", "D2")]))]
    }

    fn filter(&self) -> Result<InstanceFlowFilter, QueryError> {
        Ok(InstanceFlowFilter::builder().source_application_ids([self.source_application_id]).build()?)
    }
}

/// Ingiere el escenario a través de un `IngestionHub`, consulta, corrige
/// `S4` y vuelve a consultar.
pub async fn run<S>(store: Arc<S>, config: &AppConfig, scenario: Scenario) -> Result<DemoOutcome, DemoError>
    where S: EventStore + ?Sized + 'static
{
    let hub = IngestionHub::with_channels(Arc::clone(&store), config.ingest);
    for (category, message) in scenario.messages() {
        hub.publish(category, message).await?;
    }
    let ingest = hub.shutdown().await?;

    let engine = SummaryQueryEngine::with_limits(Arc::clone(&store), config.limits);
    let filter = scenario.filter()?;
    let sort = Some(SummarySort::latest_update_desc());
    let before_correction = engine.summaries(&filter, sort, &PageRequest::first(10))?;

    let kind = CorrectionKind::ManuallyProcessed { destination_id: "ARCH-7".into() };
    let correction =
        ManualCorrectionService::new(Arc::clone(&store)).apply(CorrectionRequest::new(scenario.key("S4"), kind).by("demo-operator"))?;
    info!("demo:corrected key={} seq={}", correction.key, correction.seq);

    let after_correction = engine.summaries(&filter, sort, &PageRequest::first(10))?;
    let statistics = StatisticsAggregator::with_limits(store, config.limits)
        .total_statistics(filter.source_application_ids())?;

    Ok(DemoOutcome { ingest,
                     before_correction,
                     after_correction,
                     statistics,
                     correction })
}
