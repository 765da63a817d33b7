use std::sync::Arc;

use flowtrack::demo::{self, DemoOutcome, Scenario};
use flowtrack::logging::init_logging;
use flowtrack::CONFIG;

use flow_core::{EventStore, InMemoryEventStore};

fn print_outcome(outcome: &DemoOutcome) {
    println!("== ingesta ==");
    for (category, report) in outcome.ingest.iter().filter(|(_, r)| r.received > 0) {
        println!("{category}: recibidos={} agregados={} duplicados={} rechazados={} fallidos={}",
                 report.received, report.appended, report.duplicates, report.rejected, report.failed);
    }
    println!("== resúmenes antes de la corrección ==");
    for s in &outcome.before_correction.items {
        println!("{} status={} storage={} ultimo={} actualizado={} destinos={:?}",
                 s.key, s.status, s.storage_status, s.latest_status_event, s.latest_update, s.destination_ids);
    }
    println!("== corrección ==");
    println!("{} seq={} categoria={} destino={:?}",
             outcome.correction.key, outcome.correction.seq, outcome.correction.category, outcome.correction.destination_id);
    println!("== resúmenes después de la corrección ==");
    for s in &outcome.after_correction.items {
        println!("{} status={} ultimo={}", s.key, s.status, s.latest_status_event);
    }
    match serde_json::to_string(&outcome.statistics) {
        Ok(json) => println!("== estadísticas ==\n{json}"),
        Err(e) => eprintln!("estadísticas no serializables: {e}"),
    }
}

#[cfg(feature = "pg_demo")]
fn select_store() -> (Arc<dyn EventStore>, Scenario) {
    if let Some(db) = CONFIG.database.as_ref() {
        match flow_persistence::pg::build_pool_from_config(db) {
            Ok(pool) => {
                // id de aplicación por ejecución: el store es durable
                let scenario = Scenario { source_application_id: chrono::Utc::now().timestamp(),
                                          ..Scenario::default() };
                let store = flow_persistence::PgEventStore::new(flow_persistence::PoolProvider { pool });
                return (Arc::new(store), scenario);
            }
            Err(e) => log::warn!("demo:pg_unavailable err={e}; usando store en memoria"),
        }
    }
    (Arc::new(InMemoryEventStore::new()), Scenario::default())
}

#[cfg(not(feature = "pg_demo"))]
fn select_store() -> (Arc<dyn EventStore>, Scenario) {
    (Arc::new(InMemoryEventStore::new()), Scenario::default())
}

#[tokio::main]
async fn main() {
    init_logging();
    let (store, scenario) = select_store();
    match demo::run(store, &CONFIG, scenario).await {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => {
            eprintln!("demo falló: {e}");
            std::process::exit(1);
        }
    }
}
