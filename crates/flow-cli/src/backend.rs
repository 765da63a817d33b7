//! Selección del store: archivo JSONL en memoria o Postgres.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use flow_core::{EventStore, InMemoryEventStore, NewEvent};
use flow_persistence::{build_dev_pool_from_env, PgEventStore, PoolProvider};
use log::info;

use crate::error::CliError;

/// `--events` tiene prioridad; si no, `DATABASE_URL`.
pub fn open_store(events_file: Option<&Path>) -> Result<Arc<dyn EventStore>, CliError> {
    if let Some(path) = events_file {
        let file = File::open(path).map_err(|e| CliError::Usage(format!("cannot open {}: {e}", path.display())))?;
        let store = load_events(BufReader::new(file))?;
        info!("cli:backend kind=memory file={} events={}", path.display(), store.len());
        return Ok(Arc::new(store));
    }
    if std::env::var("DATABASE_URL").is_ok() {
        let pool = build_dev_pool_from_env()?;
        info!("cli:backend kind=postgres");
        return Ok(Arc::new(PgEventStore::new(PoolProvider { pool })));
    }
    Err(CliError::Usage("DATABASE_URL is not set; use --events <file.jsonl>".into()))
}

/// Carga un `NewEvent` JSON por línea; las líneas en blanco se ignoran y
/// los duplicados se suprimen como en cualquier append.
pub fn load_events<R: BufRead>(reader: R) -> Result<InMemoryEventStore, CliError> {
    let store = InMemoryEventStore::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: NewEvent =
            serde_json::from_str(&line).map_err(|e| CliError::Validation(format!("line {}: {e}", n + 1)))?;
        store.append(event)?;
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{"key":{"source_application_id":1,"source_application_integration_id":"I1","source_application_instance_id":"S1"},"integration_id":10,"instance_id":null,"category":"INSTANCE_RECEIVED","timestamp":"2024-06-03T11:00:00Z","correlation_id":"6f1c3a52-0d7e-4a0b-9a57-2b8f0c1de001","destination_id":null,"producer":"fixture"}"#;

    #[test]
    fn jsonl_lines_are_appended_once() {
        let input = format!("{LINE}\n\n{LINE}\n");
        let store = load_events(input.as_bytes()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let input = format!("{LINE}\n{{not json\n");
        let err = load_events(input.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
