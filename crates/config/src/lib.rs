pub mod env;
pub mod thresholds;
pub mod tracing_init;

pub use env::AppConfig;
pub use thresholds::{ChangeFailureThresholds, DeploymentFrequencyThresholds, DoraThresholds};
pub use tracing_init::{init_tracing, try_init_tracing};
