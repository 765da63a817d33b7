//! Parseo manual de la línea de comandos.
//!
//! Forma general: `flow-cli <subcomando> [--flag valor]...`. Los flags de
//! conjunto aceptan varias apariciones o valores separados por coma.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use flow_core::{AggregateKey, CorrectionKind, Cursor, EventCategory, InstanceFlowFilter, InstanceStatus,
                IntegrationStatisticsFilter, PageRequest, SortDirection, SortField, StorageStatus, SummarySort,
                TimeRange};

use crate::error::CliError;

pub const DEFAULT_PAGE_LIMIT: usize = 50;

pub const USAGE: &str = "\
uso: flow-cli <subcomando> [opciones] [--events <archivo.jsonl>]

subcomandos:
  summaries             resúmenes paginados (filtros, --sort, --dir, --offset | --after, --limit)
  count                 total de resúmenes que cumplen los filtros
  stats                 conteos por estado [--source-app]
  stats-by-integration  conteos por integración [--source-app] [--integration] [--dir] [--offset] [--limit]
  latest-status         último evento de estado --key <app/integración/instancia>
  latest-destination    último destino de transferencia --key
  registration          último registro --instance-id <n>
  history               historial de una clave --key [--offset] [--limit]
  correct               corrección manual --key --category <CAT> [--destination] [--operator]

--key se parte en las dos primeras '/': la integración no puede contener '/'.

filtros: --source-app --source-integration --source-instance --integration
         --from --to (RFC 3339) --status --latest-event --storage --associated --destination

sin DATABASE_URL se requiere --events con un NewEvent JSON por línea.";

#[derive(Debug, Clone)]
pub enum Command {
    Summaries {
        filter: InstanceFlowFilter,
        sort: Option<SummarySort>,
        page: PageRequest,
    },
    Count {
        filter: InstanceFlowFilter,
    },
    Stats {
        source_application_ids: Option<BTreeSet<i64>>,
    },
    StatsByIntegration {
        filter: IntegrationStatisticsFilter,
        page: PageRequest,
        direction: SortDirection,
    },
    LatestStatus {
        key: AggregateKey,
    },
    LatestDestination {
        key: AggregateKey,
    },
    Registration {
        instance_id: i64,
    },
    History {
        key: AggregateKey,
        page: PageRequest,
    },
    Correct {
        key: AggregateKey,
        kind: CorrectionKind,
        operator: Option<String>,
    },
    Help,
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Command,
    /// Archivo JSONL para el store en memoria.
    pub events_file: Option<PathBuf>,
}

/// Flags `--nombre valor` pendientes de consumir.
struct Flags {
    values: BTreeMap<String, Vec<String>>,
}

impl Flags {
    fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            let name = arg.strip_prefix("--")
                          .filter(|n| !n.is_empty())
                          .ok_or_else(|| CliError::Usage(format!("unexpected argument: {arg}")))?;
            let value = it.next().ok_or_else(|| CliError::Usage(format!("missing value for --{name}")))?;
            values.entry(name.to_string()).or_default().push(value.clone());
        }
        Ok(Self { values })
    }

    fn list(&mut self, name: &str) -> Vec<String> {
        self.values
            .remove(name)
            .unwrap_or_default()
            .iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn single(&mut self, name: &str) -> Result<Option<String>, CliError> {
        match self.values.remove(name) {
            None => Ok(None),
            Some(mut v) if v.len() == 1 => Ok(v.pop()),
            Some(_) => Err(CliError::Usage(format!("--{name} given more than once"))),
        }
    }

    fn required(&mut self, name: &str) -> Result<String, CliError> {
        self.single(name)?
            .ok_or_else(|| CliError::Usage(format!("--{name} is required")))
    }

    fn numbers<T: FromStr>(&mut self, name: &str) -> Result<Vec<T>, CliError> {
        self.list(name)
            .iter()
            .map(|v| v.parse::<T>().map_err(|_| CliError::Usage(format!("--{name}: not a number: {v}"))))
            .collect()
    }

    fn number<T: FromStr>(&mut self, name: &str) -> Result<Option<T>, CliError> {
        self.single(name)?
            .map(|v| v.parse::<T>().map_err(|_| CliError::Usage(format!("--{name}: not a number: {v}"))))
            .transpose()
    }

    /// Valores de enumeraciones cerradas: un nombre desconocido es un error
    /// de validación, no de uso.
    fn named<T: FromStr<Err = flow_core::ParseError>>(&mut self, name: &str) -> Result<Vec<T>, CliError> {
        self.list(name).iter().map(|v| v.parse::<T>().map_err(CliError::from)).collect()
    }

    fn timestamp(&mut self, name: &str) -> Result<Option<DateTime<Utc>>, CliError> {
        self.single(name)?
            .map(|v| {
                DateTime::parse_from_rfc3339(&v).map(|t| t.with_timezone(&Utc))
                                                .map_err(|e| CliError::Usage(format!("--{name}: {e}")))
            })
            .transpose()
    }

    fn key(&mut self) -> Result<AggregateKey, CliError> {
        Ok(self.required("key")?.parse::<AggregateKey>()?)
    }

    fn finish(self) -> Result<(), CliError> {
        match self.values.keys().next() {
            Some(name) => Err(CliError::Usage(format!("unknown flag --{name}"))),
            None => Ok(()),
        }
    }
}

fn optional_set<T: Ord>(values: Vec<T>) -> Option<BTreeSet<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values.into_iter().collect())
    }
}

fn parse_filter(flags: &mut Flags) -> Result<InstanceFlowFilter, CliError> {
    let mut builder = InstanceFlowFilter::builder().source_application_ids(flags.numbers::<i64>("source-app")?)
                                                   .source_application_integration_ids(flags.list("source-integration"))
                                                   .source_application_instance_ids(flags.list("source-instance"))
                                                   .integration_ids(flags.numbers::<i64>("integration")?)
                                                   .statuses(flags.named::<InstanceStatus>("status")?)
                                                   .latest_status_events(flags.named::<EventCategory>("latest-event")?)
                                                   .storage_statuses(flags.named::<StorageStatus>("storage")?)
                                                   .associated_events(flags.named::<EventCategory>("associated")?)
                                                   .destination_ids(flags.list("destination"));
    let from = flags.timestamp("from")?;
    let to = flags.timestamp("to")?;
    if from.is_some() || to.is_some() {
        builder = builder.latest_update(TimeRange { from, to });
    }
    Ok(builder.build()?)
}

fn parse_page(flags: &mut Flags, allow_cursor: bool) -> Result<PageRequest, CliError> {
    let limit = flags.number::<usize>("limit")?.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = flags.number::<usize>("offset")?;
    let after = if allow_cursor { flags.single("after")? } else { None };
    match (offset, after) {
        (Some(_), Some(_)) => Err(CliError::Usage("--offset and --after are mutually exclusive".into())),
        (_, Some(raw)) => {
            let cursor: Cursor =
                serde_json::from_str(&raw).map_err(|e| CliError::Usage(format!("--after: invalid cursor: {e}")))?;
            Ok(PageRequest::after(cursor, limit))
        }
        (offset, None) => Ok(PageRequest::offset(offset.unwrap_or(0), limit)),
    }
}

fn parse_direction(flags: &mut Flags) -> Result<Option<SortDirection>, CliError> {
    Ok(flags.single("dir")?.map(|d| d.parse::<SortDirection>()).transpose()?)
}

fn parse_sort(flags: &mut Flags) -> Result<Option<SummarySort>, CliError> {
    let field = flags.single("sort")?.map(|f| f.parse::<SortField>()).transpose()?;
    let direction = parse_direction(flags)?;
    Ok(match (field, direction) {
        (None, None) => None,
        (field, direction) => Some(SummarySort::new(field.unwrap_or_default(), direction.unwrap_or_default())),
    })
}

/// Parsea los argumentos sin el nombre del programa.
pub fn parse(args: &[String]) -> Result<Invocation, CliError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(CliError::Usage(USAGE.to_string()));
    };
    if matches!(sub.as_str(), "help" | "--help" | "-h") {
        return Ok(Invocation { command: Command::Help,
                               events_file: None });
    }
    let mut flags = Flags::parse(rest)?;
    let events_file = flags.single("events")?.map(PathBuf::from);

    let command = match sub.as_str() {
        "summaries" => Command::Summaries { filter: parse_filter(&mut flags)?,
                                            sort: parse_sort(&mut flags)?,
                                            page: parse_page(&mut flags, true)? },
        "count" => Command::Count { filter: parse_filter(&mut flags)? },
        "stats" => Command::Stats { source_application_ids: optional_set(flags.numbers::<i64>("source-app")?) },
        "stats-by-integration" => {
            let filter =
                IntegrationStatisticsFilter { source_application_ids: optional_set(flags.numbers::<i64>("source-app")?),
                                              integration_ids: optional_set(flags.numbers::<i64>("integration")?) };
            Command::StatsByIntegration { filter,
                                          direction: parse_direction(&mut flags)?.unwrap_or_default(),
                                          page: parse_page(&mut flags, false)? }
        }
        "latest-status" => Command::LatestStatus { key: flags.key()? },
        "latest-destination" => Command::LatestDestination { key: flags.key()? },
        "registration" => {
            let instance_id = flags.number::<i64>("instance-id")?
                                   .ok_or_else(|| CliError::Usage("--instance-id is required".into()))?;
            Command::Registration { instance_id }
        }
        "history" => Command::History { key: flags.key()?,
                                        page: parse_page(&mut flags, false)? },
        "correct" => {
            let key = flags.key()?;
            let category = flags.required("category")?.parse::<EventCategory>()?;
            let kind = CorrectionKind::from_parts(category, flags.single("destination")?)?;
            Command::Correct { key,
                               kind,
                               operator: flags.single("operator")? }
        }
        other => return Err(CliError::Usage(format!("unknown subcommand: {other}\n\n{USAGE}"))),
    };
    flags.finish()?;
    Ok(Invocation { command, events_file })
}
