//! flowtrack
//!
//! Librería raíz: une los crates del workspace.
//! - `config`: `AppConfig` a partir del entorno.
//! - `demo`: escenario de ingesta y consultas que ejecuta `main-core`.
//! - `logging`: subscriber de `tracing` para los binarios.

pub mod config;
pub mod demo;
pub mod logging;

pub use config::{AppConfig, CONFIG};
