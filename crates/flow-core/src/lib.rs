//! flow-core: categorización de eventos y proyección del último estado por
//! instancia de flujo.
pub mod constants;
pub mod correction;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod projection;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod statistics;

pub use correction::{CorrectionKind, CorrectionRequest, ManualCorrectionService};
pub use errors::{CorrectionError, FilterError, ParseError, QueryError, StoreError};
pub use event::{AggregateKey, AppendOutcome, Event, EventError, EventStore, InMemoryEventStore, NewEvent, ScanScope};
pub use projection::{InstanceFlowSummary, SummaryQueryEngine};
pub use query::{Cursor, InstanceFlowFilter, Page, PageRequest, QueryLimits, SortDirection, SortField, SummarySort, TimeRange};
pub use registry::{registry, EventCategory, EventType, InstanceStatus, StorageStatus};
pub use resolver::PointResolver;
pub use statistics::{InstanceStatistics, IntegrationStatistics, IntegrationStatisticsFilter, StatisticsAggregator};
