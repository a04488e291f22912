pub mod band;
pub mod cache;
pub mod calculator;
pub mod drilldown;
pub mod filter;
pub mod kind;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod profile;
pub mod records;
pub mod request;
pub mod source;
pub mod timeseries;

#[cfg(test)]
mod test_support;

pub use band::{classify_change_failure_rate_band, classify_deployment_frequency_band, Band, BandTables};
pub use cache::{cache_key, CacheKey, CacheKeyInputs};
pub use calculator::{AdoCalculator, CiCdCalculator, JiraCalculator, ScmCalculator, SourceCalculator};
pub use drilldown::{unify, DrillDownPage, DrillDownRecord};
pub use filter::{merge_filters, NormalizedFilter, TimeRange};
pub use kind::{DataSourceKind, IntegrationType};
pub use metrics::{change_failure_ratio, MetricResult, Stats};
pub use normalize::{normalize, resolve_source_kind};
pub use orchestrator::{Calculators, Collaborators, DoraService, EngineSettings};
pub use profile::{DefinitionTarget, WorkflowProfile};
pub use request::{MetricKind, MetricRequest};
pub use timeseries::TimeSeries;
