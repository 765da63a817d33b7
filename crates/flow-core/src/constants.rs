//! Constantes del core.

/// Tamaño máximo de página por defecto para consultas paginadas. Se puede
/// sobrescribir con `QueryLimits`.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 500;

/// Versión del esquema de fingerprint de eventos. Forma parte del input del
/// hash: cambiarla invalida la detección de duplicados entre versiones.
pub const FINGERPRINT_VERSION: &str = "E1";
