use cadence_common::error::{CadenceError, CadenceResult};
use serde::{Deserialize, Serialize};

/// Minimum deployments per day for each band. Anything below `medium_min` is LOW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeploymentFrequencyThresholds {
    pub elite_min: f64,
    pub high_min: f64,
    pub medium_min: f64,
}

impl Default for DeploymentFrequencyThresholds {
    fn default() -> Self {
        Self {
            elite_min: 1.0,
            high_min: 0.1428,
            medium_min: 0.0333,
        }
    }
}

/// Inclusive upper bounds on the failure percentage. Anything above `medium_max` is LOW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeFailureThresholds {
    pub elite_max: f64,
    pub high_max: f64,
    pub medium_max: f64,
}

impl Default for ChangeFailureThresholds {
    fn default() -> Self {
        Self {
            elite_max: 15.0,
            high_max: 30.0,
            medium_max: 45.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DoraThresholds {
    pub deployment_frequency: DeploymentFrequencyThresholds,
    pub change_failure_rate: ChangeFailureThresholds,
}

impl DoraThresholds {
    /// Cut points must be finite, non-negative and strictly ordered.
    pub fn validate(&self) -> CadenceResult<()> {
        let df = &self.deployment_frequency;
        let cfr = &self.change_failure_rate;

        let all = [
            df.elite_min,
            df.high_min,
            df.medium_min,
            cfr.elite_max,
            cfr.high_max,
            cfr.medium_max,
        ];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(CadenceError::Config(
                "band thresholds must be finite and non-negative".into(),
            ));
        }
        if !(df.elite_min > df.high_min && df.high_min > df.medium_min) {
            return Err(CadenceError::Config(format!(
                "deployment frequency thresholds must descend: {} > {} > {}",
                df.elite_min, df.high_min, df.medium_min
            )));
        }
        if !(cfr.elite_max < cfr.high_max && cfr.high_max < cfr.medium_max) {
            return Err(CadenceError::Config(format!(
                "change failure thresholds must ascend: {} < {} < {}",
                cfr.elite_max, cfr.high_max, cfr.medium_max
            )));
        }
        Ok(())
    }
}
