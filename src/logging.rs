//! Inicialización de logs para binarios.
use tracing_subscriber::EnvFilter;

/// Instala el subscriber `fmt` con `RUST_LOG` (por defecto `info`). Los
/// registros del facade `log` de los crates de librería también se emiten.
/// Llamadas repetidas no tienen efecto.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter)
                                     .with_target(false)
                                     .try_init();
}
