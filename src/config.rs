//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone una estructura
//! inmutable (`CONFIG`) con las secciones de cada crate.
use once_cell::sync::Lazy;

use flow_adapters::IngestConfig;
use flow_core::QueryLimits;
use flow_persistence::{init_dotenv, DbConfig};

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Conexión Postgres; `None` si `DATABASE_URL` no está definida.
    pub database: Option<DbConfig>,
    /// `FLOW_MAX_PAGE_SIZE`.
    pub limits: QueryLimits,
    /// `FLOW_INGEST_CHANNEL_CAPACITY`.
    pub ingest: IngestConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        init_dotenv();
        Self { database: DbConfig::from_env_opt(),
               limits: QueryLimits::from_env(),
               ingest: IngestConfig::from_env() }
    }
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
