use std::io;

use flow_cli::{args::{Command, USAGE}, backend::open_store, commands::execute, parse, CliError};
use flow_core::QueryLimits;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // los logs van a stderr; stdout queda para el JSON
    tracing_subscriber::fmt().with_env_filter(filter)
                             .with_writer(io::stderr)
                             .with_target(false)
                             .init();
}

fn run() -> Result<(), CliError> {
    // .env opcional con DATABASE_URL
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = parse(&args)?;
    if matches!(invocation.command, Command::Help) {
        println!("{USAGE}");
        return Ok(());
    }
    let mut out = io::stdout().lock();
    let store = open_store(invocation.events_file.as_deref())?;
    execute(invocation.command, store, QueryLimits::from_env(), &mut out)
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        tracing::error!("flow-cli failed: {e}");
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
