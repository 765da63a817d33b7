//! flow-cli: consultas y correcciones manuales sobre el store de eventos.

pub mod args;
pub mod backend;
pub mod commands;
pub mod error;

pub use args::{parse, Command, Invocation};
pub use error::CliError;
