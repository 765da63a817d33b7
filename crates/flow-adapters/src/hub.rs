//! Workers de ingesta, uno por categoría.
//!
//! Política ante fallos: sin reintento. Un mensaje que no se puede mapear o
//! cuyo append falla se registra en el log y se salta.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use flow_core::{registry, AppendOutcome, EventCategory, EventStore};

use crate::mapping::map_to_event;
use crate::message::InboundMessage;
use crate::source::InboundSource;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    /// Capacidad de cada canal por categoría.
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { channel_capacity: DEFAULT_CHANNEL_CAPACITY }
    }
}

impl IngestConfig {
    /// Lee `FLOW_INGEST_CHANNEL_CAPACITY`; valores ausentes, inválidos o cero
    /// usan el valor por defecto.
    pub fn from_env() -> Self {
        let channel_capacity = env::var("FLOW_INGEST_CHANNEL_CAPACITY").ok()
                                                                        .and_then(|v| v.trim().parse().ok())
                                                                        .filter(|c: &usize| *c > 0)
                                                                        .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        Self { channel_capacity }
    }
}

/// Conteos de un worker al terminar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub received: u64,
    pub appended: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub failed: u64,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum IngestError {
    #[error("no ingestion channel for topic {0}")]
    UnknownTopic(String),
    #[error("ingestion channel for {0} is closed")]
    ChannelClosed(EventCategory),
    #[error("ingestion worker for {0} panicked")]
    WorkerPanicked(EventCategory),
}

async fn run_worker<S, Src>(category: EventCategory, store: Arc<S>, mut source: Src) -> IngestReport
    where S: EventStore + ?Sized + 'static,
          Src: InboundSource
{
    let mut report = IngestReport::default();
    while let Some(message) = source.next().await {
        report.received += 1;
        let event = match map_to_event(category, message) {
            Ok(ev) => ev,
            Err(e) => {
                warn!("ingest:rejected category={category} err={e}");
                report.rejected += 1;
                continue;
            }
        };
        let key = event.key.clone();
        let store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || store.append(event)).await {
            Ok(Ok(AppendOutcome::Appended(ev))) => {
                debug!("ingest:appended category={category} key={key} seq={}", ev.seq);
                report.appended += 1;
            }
            Ok(Ok(AppendOutcome::Duplicate { .. })) => {
                debug!("ingest:duplicate category={category} key={key}");
                report.duplicates += 1;
            }
            Ok(Err(e)) => {
                error!("ingest:append_failed category={category} key={key} err={e}");
                report.failed += 1;
            }
            Err(e) => {
                error!("ingest:append_aborted category={category} key={key} err={e}");
                report.failed += 1;
            }
        }
    }
    info!("ingest:worker_done category={category} received={} appended={} duplicates={} rejected={} failed={}",
          report.received,
          report.appended,
          report.duplicates,
          report.rejected,
          report.failed);
    report
}

/// Conjunto de workers de ingesta que escriben en un store compartido.
pub struct IngestionHub<S: EventStore + ?Sized + 'static> {
    store: Arc<S>,
    senders: HashMap<EventCategory, mpsc::Sender<InboundMessage>>,
    workers: Vec<(EventCategory, JoinHandle<IngestReport>)>,
}

impl<S: EventStore + ?Sized + 'static> IngestionHub<S> {
    /// Hub sin workers; se agregan con `attach`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store,
               senders: HashMap::new(),
               workers: Vec::new() }
    }

    /// Hub con un canal `mpsc` y un worker por cada categoría del registro.
    /// Debe llamarse dentro de un runtime tokio.
    pub fn with_channels(store: Arc<S>, config: IngestConfig) -> Self {
        let mut hub = Self::new(store);
        for category in registry().categories() {
            let (tx, rx) = mpsc::channel(config.channel_capacity);
            hub.senders.insert(category, tx);
            hub.attach(category, rx);
        }
        hub
    }

    /// Lanza un worker para `category` que consume `source` hasta agotarla.
    pub fn attach<Src>(&mut self, category: EventCategory, source: Src)
        where Src: InboundSource + 'static
    {
        let handle = tokio::spawn(run_worker(category, Arc::clone(&self.store), source));
        self.workers.push((category, handle));
    }

    /// Emisor del canal de `category`, para productores externos. Los clones
    /// deben soltarse antes de `shutdown` para que el worker termine.
    pub fn sender(&self, category: EventCategory) -> Option<mpsc::Sender<InboundMessage>> {
        self.senders.get(&category).cloned()
    }

    pub async fn publish(&self, category: EventCategory, message: InboundMessage) -> Result<(), IngestError> {
        let tx = self.senders.get(&category).ok_or(IngestError::ChannelClosed(category))?;
        tx.send(message).await.map_err(|_| IngestError::ChannelClosed(category))
    }

    /// Publica en el canal identificado por su topic (`instance-mapped`).
    pub async fn publish_to_topic(&self, topic: &str, message: InboundMessage) -> Result<(), IngestError> {
        let category = registry().category_for_topic(topic)
                                 .ok_or_else(|| IngestError::UnknownTopic(topic.to_string()))?;
        self.publish(category, message).await
    }

    /// Cierra los canales propios, espera a que cada worker drene su fuente y
    /// devuelve los conteos por categoría.
    pub async fn shutdown(self) -> Result<BTreeMap<EventCategory, IngestReport>, IngestError> {
        let Self { senders, workers, .. } = self;
        drop(senders);
        let mut reports: BTreeMap<EventCategory, IngestReport> = BTreeMap::new();
        for (category, handle) in workers {
            let report = handle.await.map_err(|_| IngestError::WorkerPanicked(category))?;
            let entry = reports.entry(category).or_default();
            entry.received += report.received;
            entry.appended += report.appended;
            entry.duplicates += report.duplicates;
            entry.rejected += report.rejected;
            entry.failed += report.failed;
        }
        Ok(reports)
    }
}

