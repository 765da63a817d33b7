//! Implementación Postgres (Diesel) de `EventStore`.
//!
//! - Tabla append-only `instance_flow_event`, orden de ingesta por `seq`
//!   (BIGSERIAL); sin updates ni deletes.
//! - Cada append corre en una transacción que toma un advisory lock por clave
//!   (`pg_advisory_xact_lock`), de modo que el append condicional ve y escribe
//!   sobre el mismo historial.
//! - Duplicados exactos: `ON CONFLICT (fingerprint) DO NOTHING`.
//! - Manejo básico de errores transitorios: reintento con backoff.
//! - La regla "último evento" se calcula con las mismas funciones del core
//!   que usa el backend en memoria.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sql_types::Text;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use flow_core::projection::latest_status_event;
use flow_core::{registry, AggregateKey, AppendOutcome, Event, EventError, EventStore, NewEvent, ScanScope, StoreError};

use crate::config::DbConfig;
use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::instance_flow_event;

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

type PooledConn = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PooledConn, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PooledConn, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Fila para insertar en `instance_flow_event`.
#[derive(Insertable, Debug)]
#[diesel(table_name = instance_flow_event)]
pub struct NewEventRow<'a> {
    pub source_application_id: i64,
    pub source_application_integration_id: &'a str,
    pub source_application_instance_id: &'a str,
    pub integration_id: i64,
    pub instance_id: Option<i64>,
    pub category: &'a str,
    pub event_type: &'a str,
    pub ts: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub destination_id: Option<&'a str>,
    pub producer: Option<&'a str>,
    pub errors: Value,
    pub fingerprint: &'a str,
}

/// Fila leída de `instance_flow_event` (todas las columnas, en orden).
#[derive(Queryable, Debug)]
pub struct EventRow {
    pub seq: i64,
    pub source_application_id: i64,
    pub source_application_integration_id: String,
    pub source_application_instance_id: String,
    pub integration_id: i64,
    pub instance_id: Option<i64>,
    pub category: String,
    pub event_type: String,
    pub ts: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub destination_id: Option<String>,
    pub producer: Option<String>,
    pub errors: Value,
    pub fingerprint: String,
    pub ingested_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = PersistenceError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| PersistenceError::CorruptRow { seq: row.seq, reason };
        let category = registry().category_of(&row.category)
                                 .ok_or_else(|| corrupt(format!("unknown category {}", row.category)))?;
        let seq = u64::try_from(row.seq).map_err(|_| corrupt("negative seq".into()))?;
        let errors: Vec<EventError> =
            serde_json::from_value(row.errors.clone()).map_err(|e| corrupt(format!("errors: {e}")))?;
        Ok(Event { seq,
                   key: AggregateKey::new(row.source_application_id,
                                          row.source_application_integration_id,
                                          row.source_application_instance_id),
                   integration_id: row.integration_id,
                   instance_id: row.instance_id,
                   category,
                   timestamp: row.ts,
                   correlation_id: row.correlation_id,
                   destination_id: row.destination_id,
                   producer: row.producer,
                   errors })
    }
}

fn rows_to_events(rows: Vec<EventRow>) -> Result<Vec<Event>, PersistenceError> {
    rows.into_iter().map(Event::try_from).collect()
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Algunos mensajes del driver llegan como Unknown con texto.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff lineal corto (hasta 3 reintentos: 15, 30, 45ms).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

fn load_key(conn: &mut PgConnection, key: &AggregateKey) -> Result<Vec<EventRow>, PersistenceError> {
    instance_flow_event::table.filter(instance_flow_event::source_application_id.eq(key.source_application_id))
                              .filter(instance_flow_event::source_application_integration_id.eq(&key.source_application_integration_id))
                              .filter(instance_flow_event::source_application_instance_id.eq(&key.source_application_instance_id))
                              .order(instance_flow_event::seq.asc())
                              .load(conn)
                              .map_err(PersistenceError::from)
}

/// `PgEventStore` append-only sobre `instance_flow_event`.
pub struct PgEventStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgEventStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Inserta `event` bajo el lock de su clave. Si `expected_seq` está
    /// presente, verifica antes que el último evento de estado no cambió.
    fn append_locked(&self, event: &NewEvent, expected_seq: Option<u64>) -> Result<AppendOutcome, PersistenceError> {
        let fingerprint = event.fingerprint();
        let errors = serde_json::to_value(&event.errors).map_err(|e| PersistenceError::Unknown(format!("ser errors: {e}")))?;
        let key = &event.key;
        debug!("append:start key={key} category={} fingerprint={fingerprint}", event.category);

        let inserted: Option<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx| {
                diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))").bind::<Text, _>(key.to_string())
                                                                                 .execute(tx)?;
                if let Some(expected) = expected_seq {
                    let current = rows_to_events(load_key(tx, key)?)?;
                    let found = latest_status_event(&current).map(|e| e.seq);
                    if found != Some(expected) {
                        return Err(PersistenceError::Conflict { expected, found });
                    }
                }
                let row = NewEventRow { source_application_id: key.source_application_id,
                                        source_application_integration_id: &key.source_application_integration_id,
                                        source_application_instance_id: &key.source_application_instance_id,
                                        integration_id: event.integration_id,
                                        instance_id: event.instance_id,
                                        category: event.category.name(),
                                        event_type: event.event_type().as_str(),
                                        ts: event.timestamp,
                                        correlation_id: event.correlation_id,
                                        destination_id: event.destination_id.as_deref(),
                                        producer: event.producer.as_deref(),
                                        errors: errors.clone(),
                                        fingerprint: &fingerprint };
                diesel::insert_into(instance_flow_event::table).values(&row)
                                                               .on_conflict(instance_flow_event::fingerprint)
                                                               .do_nothing()
                                                               .returning(instance_flow_event::all_columns)
                                                               .get_result::<EventRow>(tx)
                                                               .optional()
                                                               .map_err(PersistenceError::from)
            })
        })?;

        match inserted {
            Some(row) => {
                let ev = Event::try_from(row)?;
                debug!("append:done key={} seq={} category={}", ev.key, ev.seq, ev.category);
                Ok(AppendOutcome::Appended(ev))
            }
            None => {
                debug!("append:duplicate key={key} fingerprint={fingerprint}");
                Ok(AppendOutcome::Duplicate { fingerprint })
            }
        }
    }

    fn load_where(&self, scope: &ScanScope) -> Result<Vec<Event>, PersistenceError> {
        fn vec_of<T: Clone>(set: &BTreeSet<T>) -> Vec<T> {
            set.iter().cloned().collect()
        }
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let mut query = instance_flow_event::table.into_boxed::<diesel::pg::Pg>();
            if let Some(ids) = &scope.source_application_ids {
                query = query.filter(instance_flow_event::source_application_id.eq_any(vec_of(ids)));
            }
            if let Some(ids) = &scope.source_application_integration_ids {
                query = query.filter(instance_flow_event::source_application_integration_id.eq_any(vec_of(ids)));
            }
            if let Some(ids) = &scope.source_application_instance_ids {
                query = query.filter(instance_flow_event::source_application_instance_id.eq_any(vec_of(ids)));
            }
            if let Some(ids) = &scope.integration_ids {
                query = query.filter(instance_flow_event::integration_id.eq_any(vec_of(ids)));
            }
            if let Some(categories) = &scope.categories {
                let names: Vec<&str> = categories.iter().map(|c| c.name()).collect();
                query = query.filter(instance_flow_event::category.eq_any(names));
            }
            query.order(instance_flow_event::seq.asc())
                 .load(&mut conn)
                 .map_err(PersistenceError::from)
        })?;
        rows_to_events(rows)
    }
}

impl<P: ConnectionProvider> EventStore for PgEventStore<P> {
    fn append(&self, event: NewEvent) -> Result<AppendOutcome, StoreError> {
        Ok(self.append_locked(&event, None)?)
    }

    fn append_if_latest_status(&self, event: NewEvent, expected_seq: u64) -> Result<AppendOutcome, StoreError> {
        Ok(self.append_locked(&event, Some(expected_seq))?)
    }

    fn scan(&self, scope: &ScanScope) -> Result<Vec<Event>, StoreError> {
        let events = self.load_where(scope)?;
        debug!("scan:done count={}", events.len());
        Ok(events)
    }

    fn events_for_key(&self, key: &AggregateKey) -> Result<Vec<Event>, StoreError> {
        let rows = with_retry(|| {
            let mut conn = self.provider.connection()?;
            load_key(&mut conn, key)
        })?;
        Ok(rows_to_events(rows)?)
    }

    fn events_for_instance(&self, instance_id: i64) -> Result<Vec<Event>, StoreError> {
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            instance_flow_event::table.filter(instance_flow_event::instance_id.eq(instance_id))
                                      .order(instance_flow_event::seq.asc())
                                      .load(&mut conn)
                                      .map_err(PersistenceError::from)
        })?;
        Ok(rows_to_events(rows)?)
    }
}

/// Construye un pool Postgres r2d2 a partir de URL y corre las migraciones
/// pendientes.
///
/// Si `min_size > max_size`, usa `min_size = max_size`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Pool a partir de una `DbConfig`.
pub fn build_pool_from_config(cfg: &DbConfig) -> Result<PgPool, PersistenceError> {
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}

/// Helper de desarrollo: carga `.env`, lee configuración y construye un pool
/// ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    build_pool_from_config(&DbConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(category: &str, errors: Value) -> EventRow {
        let ts = Utc::now();
        EventRow { seq: 12,
                   source_application_id: 2,
                   source_application_integration_id: "I3".into(),
                   source_application_instance_id: "S3".into(),
                   integration_id: 30,
                   instance_id: Some(4),
                   category: category.into(),
                   event_type: "ERROR".into(),
                   ts,
                   correlation_id: Uuid::new_v4(),
                   destination_id: None,
                   producer: Some("mapper".into()),
                   errors,
                   fingerprint: "f".repeat(64),
                   ingested_at: ts }
    }

    #[test]
    fn row_converts_into_event() {
        let ev = Event::try_from(row("INSTANCE_MAPPING_ERROR",
                                     serde_json::json!([{"code": "missing", "args": {"field": "title"}}]))).unwrap();
        assert_eq!(ev.seq, 12);
        assert_eq!(ev.key, AggregateKey::new(2, "I3", "S3"));
        assert!(ev.is_error());
        assert_eq!(ev.errors[0].args["field"], "title");
    }

    #[test]
    fn unknown_category_is_a_corrupt_row() {
        let err = Event::try_from(row("INSTANCE_TELEPORTED", serde_json::json!([]))).unwrap_err();
        assert!(matches!(err, PersistenceError::CorruptRow { seq: 12, .. }));
    }

    #[test]
    fn retry_policy_only_covers_transient_errors() {
        assert!(is_retryable(&PersistenceError::SerializationConflict));
        assert!(is_retryable(&PersistenceError::Unknown("deadlock detected".into())));
        assert!(!is_retryable(&PersistenceError::Conflict { expected: 1, found: None }));
        assert!(!is_retryable(&PersistenceError::UniqueViolation("fingerprint".into())));
    }

    #[test]
    fn retry_gives_up_after_three_attempts() {
        let mut calls = 0;
        let r: Result<(), PersistenceError> = with_retry(|| {
            calls += 1;
            Err(PersistenceError::TransientIo("down".into()))
        });
        assert!(r.is_err());
        assert_eq!(calls, 4);
    }
}
