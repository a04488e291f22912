//! Qualitative performance bands.

use std::fmt;

use serde::{Deserialize, Serialize};

use cadence_common::error::{CadenceError, CadenceResult};
use cadence_config::DoraThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Band {
    Elite,
    High,
    Medium,
    Low,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elite => "ELITE",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Higher is better.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Elite => 3,
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(min_count_per_day, band)` rows, highest minimum first, ending at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentFrequencyBands(Vec<(f64, Band)>);

/// `(max_failure_percent, band)` rows, lowest maximum first, ending at infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFailureBands(Vec<(f64, Band)>);

impl DeploymentFrequencyBands {
    /// Rows must strictly descend and the last minimum must be 0 so every
    /// non-negative rate lands somewhere.
    pub fn new(rows: Vec<(f64, Band)>) -> CadenceResult<Self> {
        let descending = rows.windows(2).all(|w| w[0].0 > w[1].0);
        match rows.last() {
            Some((min, _)) if *min == 0.0 && descending => Ok(Self(rows)),
            _ => Err(CadenceError::Config(
                "deployment frequency bands must descend to a 0 minimum".into(),
            )),
        }
    }

    pub fn rows(&self) -> &[(f64, Band)] {
        &self.0
    }

    pub fn classify(&self, count_per_day: f64) -> Band {
        let value = sanitize(count_per_day);
        self.0
            .iter()
            .find(|(min, _)| value >= *min)
            .or(self.0.last())
            .map_or(Band::Low, |(_, band)| *band)
    }
}

impl ChangeFailureBands {
    pub fn new(rows: Vec<(f64, Band)>) -> CadenceResult<Self> {
        let ascending = rows.windows(2).all(|w| w[0].0 < w[1].0);
        match rows.last() {
            Some((max, _)) if max.is_infinite() && *max > 0.0 && ascending => Ok(Self(rows)),
            _ => Err(CadenceError::Config(
                "change failure bands must ascend to an unbounded maximum".into(),
            )),
        }
    }

    pub fn rows(&self) -> &[(f64, Band)] {
        &self.0
    }

    pub fn classify(&self, failure_rate_percent: f64) -> Band {
        let value = sanitize(failure_rate_percent);
        self.0
            .iter()
            .find(|(max, _)| value <= *max)
            .or(self.0.last())
            .map_or(Band::Low, |(_, band)| *band)
    }
}

/// NaN and negatives count as zero.
fn sanitize(v: f64) -> f64 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else {
        v
    }
}

/// Both classification tables, built from configured thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTables {
    pub deployment_frequency: DeploymentFrequencyBands,
    pub change_failure_rate: ChangeFailureBands,
}

impl BandTables {
    pub fn from_thresholds(t: &DoraThresholds) -> CadenceResult<Self> {
        t.validate()?;
        let df = &t.deployment_frequency;
        let cfr = &t.change_failure_rate;
        Ok(Self {
            deployment_frequency: DeploymentFrequencyBands::new(vec![
                (df.elite_min, Band::Elite),
                (df.high_min, Band::High),
                (df.medium_min, Band::Medium),
                (0.0, Band::Low),
            ])?,
            change_failure_rate: ChangeFailureBands::new(vec![
                (cfr.elite_max, Band::Elite),
                (cfr.high_max, Band::High),
                (cfr.medium_max, Band::Medium),
                (f64::INFINITY, Band::Low),
            ])?,
        })
    }
}

impl Default for BandTables {
    fn default() -> Self {
        let df = DoraThresholds::default().deployment_frequency;
        let cfr = DoraThresholds::default().change_failure_rate;
        Self {
            deployment_frequency: DeploymentFrequencyBands(vec![
                (df.elite_min, Band::Elite),
                (df.high_min, Band::High),
                (df.medium_min, Band::Medium),
                (0.0, Band::Low),
            ]),
            change_failure_rate: ChangeFailureBands(vec![
                (cfr.elite_max, Band::Elite),
                (cfr.high_max, Band::High),
                (cfr.medium_max, Band::Medium),
                (f64::INFINITY, Band::Low),
            ]),
        }
    }
}

pub fn classify_deployment_frequency_band(count_per_day: f64, tables: &BandTables) -> Band {
    tables.deployment_frequency.classify(count_per_day)
}

pub fn classify_change_failure_rate_band(failure_rate_percent: f64, tables: &BandTables) -> Band {
    tables.change_failure_rate.classify(failure_rate_percent)
}
