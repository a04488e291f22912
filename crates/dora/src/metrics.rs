use serde::{Deserialize, Serialize};

use cadence_common::error::{CadenceError, CadenceResult};

use crate::band::{classify_change_failure_rate_band, classify_deployment_frequency_band, Band, BandTables};
use crate::filter::TimeRange;
use crate::timeseries::TimeSeries;

/// Headline numbers of a metric. The band is always derived from the rate
/// by one of the constructors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_deployment: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failed_deployment: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    band: Option<Band>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_absolute: Option<bool>,
}

impl Stats {
    /// `count_per_day` and band only exist for a closed window.
    pub fn deployment_frequency(total: u64, range: Option<&TimeRange>, tables: &BandTables) -> Self {
        let count_per_day = range.and_then(TimeRange::total_days).map(|days| total as f64 / days);
        Self {
            total_deployment: Some(total),
            failed_deployment: None,
            count_per_day,
            failure_rate: None,
            band: count_per_day.map(|c| classify_deployment_frequency_band(c, tables)),
            is_absolute: None,
        }
    }

    pub fn change_failure(failed: u64, total: u64, profile_name: &str, tables: &BandTables) -> CadenceResult<Self> {
        let rate = change_failure_ratio(failed, total, profile_name)?;
        Ok(Self {
            total_deployment: Some(total),
            failed_deployment: Some(failed),
            count_per_day: None,
            failure_rate: Some(rate),
            band: Some(classify_change_failure_rate_band(rate, tables)),
            is_absolute: Some(false),
        })
    }

    /// Absolute mode reports the failed count only.
    pub fn absolute_failures(failed: u64) -> Self {
        Self {
            total_deployment: None,
            failed_deployment: Some(failed),
            count_per_day: None,
            failure_rate: None,
            band: None,
            is_absolute: Some(true),
        }
    }

    pub fn total_deployment(&self) -> Option<u64> {
        self.total_deployment
    }

    pub fn failed_deployment(&self) -> Option<u64> {
        self.failed_deployment
    }

    pub fn count_per_day(&self) -> Option<f64> {
        self.count_per_day
    }

    pub fn failure_rate(&self) -> Option<f64> {
        self.failure_rate
    }

    pub fn band(&self) -> Option<Band> {
        self.band
    }

    pub fn is_absolute(&self) -> bool {
        self.is_absolute.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    pub stats: Stats,
    pub time_series: TimeSeries,
}

/// Failed deployments as a percentage of total deployments.
///
/// Failures with no deployments at all means the profile's two definitions
/// disagree, which is a configuration error rather than a 0% or 100% rate.
pub fn change_failure_ratio(failed: u64, total: u64, profile_name: &str) -> CadenceResult<f64> {
    if failed > 0 && total == 0 {
        return Err(CadenceError::InvalidConfiguration(format!(
            "Invalid configuration for Change Failure Rate for WorkFlow Profile: {profile_name}"
        )));
    }
    if total == 0 {
        return Ok(0.0);
    }
    Ok(failed as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn days(n: i64) -> TimeRange {
        TimeRange::new(DateTime::from_timestamp(0, 0), DateTime::from_timestamp(n * 86_400, 0))
    }

    // ── ratio ─────────────────────────────────────────────────────

    #[test]
    fn ratio_invariant_holds_over_grid() {
        for failed in 0..=12u64 {
            for total in 0..=12u64 {
                let result = change_failure_ratio(failed, total, "P");
                if failed > 0 && total == 0 {
                    assert!(matches!(result, Err(CadenceError::InvalidConfiguration(_))));
                } else {
                    let expected = if total > 0 { failed as f64 * 100.0 / total as f64 } else { 0.0 };
                    assert_eq!(result.unwrap(), expected);
                }
            }
        }
    }

    #[test]
    fn ratio_error_names_profile() {
        let err = change_failure_ratio(3, 0, "Payments Flow").unwrap_err();
        assert!(err.to_string().contains("Payments Flow"));
    }

    // ── stats ─────────────────────────────────────────────────────

    #[test]
    fn frequency_band_derived_from_count_per_day() {
        let stats = Stats::deployment_frequency(10, Some(&days(5)), &BandTables::default());
        assert_eq!(stats.count_per_day(), Some(2.0));
        assert_eq!(stats.band(), Some(Band::Elite));
        assert_eq!(stats.total_deployment(), Some(10));
    }

    #[test]
    fn open_window_leaves_band_unset() {
        let open = TimeRange::new(DateTime::from_timestamp(0, 0), None);
        let stats = Stats::deployment_frequency(10, Some(&open), &BandTables::default());
        assert_eq!(stats.count_per_day(), None);
        assert_eq!(stats.band(), None);

        let none = Stats::deployment_frequency(10, None, &BandTables::default());
        assert_eq!(none.band(), None);
    }

    #[test]
    fn zero_deployments_is_a_valid_result() {
        let stats = Stats::deployment_frequency(0, Some(&days(7)), &BandTables::default());
        assert_eq!(stats.count_per_day(), Some(0.0));
        assert_eq!(stats.band(), Some(Band::Low));
    }

    #[test]
    fn change_failure_band_derived_from_rate() {
        let stats = Stats::change_failure(1, 4, "P", &BandTables::default()).unwrap();
        assert_eq!(stats.failure_rate(), Some(25.0));
        assert_eq!(stats.band(), Some(Band::High));
        assert!(!stats.is_absolute());
    }

    #[test]
    fn absolute_mode_has_no_band() {
        let stats = Stats::absolute_failures(7);
        assert_eq!(stats.failed_deployment(), Some(7));
        assert_eq!(stats.band(), None);
        assert_eq!(stats.total_deployment(), None);
        assert!(stats.is_absolute());
    }

    #[test]
    fn stats_serialize_camel_case_without_nulls() {
        let stats = Stats::absolute_failures(2);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json, serde_json::json!({"failedDeployment": 2, "isAbsolute": true}));
    }
}
