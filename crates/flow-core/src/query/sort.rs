//! Orden de resúmenes.
//!
//! El orden siempre es total: a igual clave de orden se desempata por
//! `AggregateKey` ascendente, de modo que paginar repetidamente sin escrituras
//! intermedias no duplica ni salta filas.
use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::event::AggregateKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    LatestUpdate,
    IntegrationId,
    #[default]
    AggregateKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

impl FromStr for SortField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest-update" => Ok(SortField::LatestUpdate),
            "integration-id" => Ok(SortField::IntegrationId),
            "key" | "aggregate-key" => Ok(SortField::AggregateKey),
            other => Err(ParseError::new("sort field", other)),
        }
    }
}

impl FromStr for SortDirection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(ParseError::new("sort direction", other)),
        }
    }
}

/// Valores sobre los que se puede ordenar (resumen o cursor).
pub trait SortKey {
    fn latest_update(&self) -> DateTime<Utc>;
    fn integration_id(&self) -> i64;
    fn aggregate_key(&self) -> &AggregateKey;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SummarySort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Orden canónico de las vistas: más recientes primero.
    pub fn latest_update_desc() -> Self {
        Self::new(SortField::LatestUpdate, SortDirection::Desc)
    }

    pub fn compare<A: SortKey + ?Sized, B: SortKey + ?Sized>(&self, a: &A, b: &B) -> Ordering {
        let primary = match self.field {
            SortField::LatestUpdate => a.latest_update().cmp(&b.latest_update()),
            SortField::IntegrationId => a.integration_id().cmp(&b.integration_id()),
            SortField::AggregateKey => a.aggregate_key().cmp(b.aggregate_key()),
        };
        let primary = self.direction.apply(primary);
        if self.field == SortField::AggregateKey {
            return primary;
        }
        primary.then_with(|| a.aggregate_key().cmp(b.aggregate_key()))
    }
}
