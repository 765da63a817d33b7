//! Ejecución de subcomandos. Toda salida es JSON en `out`.

use std::io::Write;
use std::sync::Arc;

use flow_core::{CorrectionRequest, EventStore, ManualCorrectionService, PointResolver, QueryLimits,
                StatisticsAggregator, SummaryQueryEngine};
use log::debug;
use serde::Serialize;
use serde_json::json;

use crate::args::{Command, USAGE};
use crate::error::CliError;

fn emit<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn execute<S>(command: Command, store: Arc<S>, limits: QueryLimits, out: &mut dyn Write) -> Result<(), CliError>
    where S: EventStore + ?Sized
{
    match command {
        Command::Help => writeln!(out, "{USAGE}")?,
        Command::Summaries { filter, sort, page } => {
            let engine = SummaryQueryEngine::with_limits(store, limits);
            let result = engine.summaries(&filter, sort, &page)?;
            debug!("cli:summaries rows={} has_more={}", result.len(), result.has_more);
            emit(out,
                 &json!({
                     "items": result.items,
                     "offset": result.offset,
                     "has_more": result.has_more,
                     "next_cursor": result.next_cursor(),
                 }))?;
        }
        Command::Count { filter } => {
            let total = SummaryQueryEngine::with_limits(store, limits).total_count(&filter)?;
            emit(out, &json!({ "total": total }))?;
        }
        Command::Stats { source_application_ids } => {
            let stats = StatisticsAggregator::with_limits(store, limits).total_statistics(source_application_ids.as_ref())?;
            emit(out, &stats)?;
        }
        Command::StatsByIntegration { filter, page, direction } => {
            let result = StatisticsAggregator::with_limits(store, limits).per_integration_statistics(&filter, &page, direction)?;
            emit(out, &result)?;
        }
        // la ausencia se imprime como `null`, no es un error
        Command::LatestStatus { key } => {
            let event = PointResolver::with_limits(store, limits).latest_status_event(&key)?;
            emit(out, &event)?;
        }
        Command::LatestDestination { key } => {
            let destination = PointResolver::with_limits(store, limits).latest_destination_id(&key)?;
            emit(out, &json!({ "key": key, "destination_id": destination }))?;
        }
        Command::Registration { instance_id } => {
            let event = PointResolver::with_limits(store, limits).latest_registration_event(instance_id)?;
            emit(out, &event)?;
        }
        Command::History { key, page } => {
            let result = PointResolver::with_limits(store, limits).event_history(&key, &page)?;
            emit(out, &result)?;
        }
        Command::Correct { key, kind, operator } => {
            let mut request = CorrectionRequest::new(key, kind);
            if let Some(op) = operator {
                request = request.by(op);
            }
            let event = ManualCorrectionService::new(store).apply(request)?;
            emit(out, &event)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::parse;
    use chrono::{Duration, TimeZone, Utc};
    use flow_core::{AggregateKey, EventCategory, InMemoryEventStore, NewEvent};
    use serde_json::Value;

    fn store() -> Arc<InMemoryEventStore> {
        let store = Arc::new(InMemoryEventStore::new());
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();
        let key = AggregateKey::new(2, "I3", "S3");
        let events = [(EventCategory::InstanceReceived, 0),
                      (EventCategory::InstanceMapped, 15),
                      (EventCategory::InstanceDispatchingError, 20)];
        for (category, minutes) in events {
            store.append(NewEvent::new(key.clone(), 30, category, t0 + Duration::minutes(minutes))).unwrap();
        }
        store
    }

    fn run(line: &str, store: &Arc<InMemoryEventStore>) -> Result<Value, CliError> {
        let args: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
        let inv = parse(&args)?;
        let mut out = Vec::new();
        execute(inv.command, Arc::clone(store), QueryLimits::default(), &mut out)?;
        Ok(serde_json::from_slice(&out)?)
    }

    #[test]
    fn summaries_and_count_print_json() {
        let store = store();
        let page = run("summaries --status FAILED", &store).unwrap();
        assert_eq!(page["items"][0]["status"], "FAILED");
        assert_eq!(page["has_more"], false);
        assert_eq!(run("count --status FAILED", &store).unwrap()["total"], 1);
        assert_eq!(run("count --status TRANSFERRED", &store).unwrap()["total"], 0);
    }

    #[test]
    fn stats_print_bucket_counts() {
        let store = store();
        let stats = run("stats", &store).unwrap();
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["failed"], 1);
        let per = run("stats-by-integration", &store).unwrap();
        assert_eq!(per["items"][0]["integration_id"], 30);
    }

    #[test]
    fn missing_point_results_print_null() {
        let store = store();
        let dest = run("latest-destination --key 2/I3/S3", &store).unwrap();
        assert_eq!(dest["key"]["source_application_instance_id"], "S3");
        assert!(dest["destination_id"].is_null());
        assert!(run("registration --instance-id 9", &store).unwrap().is_null());
        assert!(run("latest-status --key 7/NOPE/NONE", &store).unwrap().is_null());
    }

    #[test]
    fn correction_then_latest_status() {
        let store = store();
        let ev = run("correct --key 2/I3/S3 --category INSTANCE_MANUALLY_REJECTED --operator ops", &store).unwrap();
        assert_eq!(ev["category"], "INSTANCE_MANUALLY_REJECTED");
        let latest = run("latest-status --key 2/I3/S3", &store).unwrap();
        assert_eq!(latest["seq"], ev["seq"]);
        // el último estado ya no es un error
        let err = run("correct --key 2/I3/S3 --category INSTANCE_MANUALLY_REJECTED", &store).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn oversized_page_is_a_validation_error() {
        let err = run("history --key 2/I3/S3 --limit 100000", &store()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
