//! Errores de la CLI y su código de salida.

use flow_core::{CorrectionError, FilterError, ParseError, QueryError, StoreError};
use flow_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("infrastructure: {0}")]
    Infrastructure(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Validation(_) => 3,
            CliError::Precondition(_) => 4,
            CliError::Infrastructure(_) => 5,
        }
    }
}

impl From<ParseError> for CliError {
    fn from(e: ParseError) -> Self {
        CliError::Validation(e.to_string())
    }
}

impl From<FilterError> for CliError {
    fn from(e: FilterError) -> Self {
        CliError::Validation(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Infrastructure(e.to_string())
    }
}

impl From<PersistenceError> for CliError {
    fn from(e: PersistenceError) -> Self {
        CliError::Infrastructure(e.to_string())
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Store(s) => s.into(),
            other => CliError::Validation(other.to_string()),
        }
    }
}

impl From<CorrectionError> for CliError {
    fn from(e: CorrectionError) -> Self {
        match e {
            CorrectionError::Store(s) => s.into(),
            CorrectionError::NoPriorStatusEvent(_)
            | CorrectionError::LatestStatusNotError { .. }
            | CorrectionError::ConcurrentModification(_) => CliError::Precondition(e.to_string()),
            other => CliError::Validation(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Infrastructure(format!("json: {e}"))
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Infrastructure(format!("io: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{AggregateKey, EventCategory};

    #[test]
    fn exit_codes_follow_error_class() {
        let key = AggregateKey::new(1, "I", "S");
        let cases: Vec<(CliError, i32)> =
            vec![(CliError::Usage("x".into()), 2),
                 (FilterError::ConflictingStatusCriteria.into(), 3),
                 (QueryError::EmptyPage.into(), 3),
                 (QueryError::Store(StoreError::Unavailable("down".into())).into(), 5),
                 (CorrectionError::MissingDestinationId.into(), 3),
                 (CorrectionError::LatestStatusNotError { key: key.clone(),
                                                          category: EventCategory::InstanceDispatched }.into(),
                  4),
                 (CorrectionError::ConcurrentModification(key).into(), 4),
                 (CorrectionError::Store(StoreError::Internal("boom".into())).into(), 5)];
        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "{err}");
        }
    }
}
