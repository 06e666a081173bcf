//! Cost anomaly detection
//!
//! Flags recent months whose cost deviates from the trailing average of the
//! months before them, services whose cost keeps growing month over month,
//! and monthly totals that sit above the interquartile fence.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::model::{CloudCostData, FlatService};
use crate::trends::desc_by;

/// Default minimum absolute deviation, in percent, reported as an anomaly
pub const DEFAULT_SENSITIVITY_THRESHOLD: f64 = 25.0;

/// Default number of trailing months inspected for growth
pub const DEFAULT_GROWTH_MONTHS: usize = 3;

/// Default average month-over-month growth, in percent, that raises an alert
pub const DEFAULT_GROWTH_THRESHOLD: f64 = 15.0;

/// Default IQR multiplier for outlier months
pub const DEFAULT_OUTLIER_FACTOR: f64 = 1.5;

/// Costs below this are too small to judge
pub const NOISE_FLOOR: f64 = 10.0;

/// Months of history required before anything is flagged
const MIN_HISTORY_MONTHS: usize = 3;

/// Recent months evaluated, and the trailing baseline length
const EVALUATION_WINDOW: usize = 3;

/// Anomaly severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Severity for an absolute percentage deviation
    pub fn from_deviation(abs_deviation: f64) -> Self {
        if abs_deviation >= 100.0 {
            Severity::High
        } else if abs_deviation >= 50.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A month whose cost deviates from its trailing average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnomaly {
    pub month: String,
    pub service: String,
    pub expected_cost: f64,
    pub actual_cost: f64,
    pub percent_deviation: f64,
    pub severity: Severity,
    pub message: String,
}

/// A service with sustained month-over-month growth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthTrend {
    pub service: String,
    pub average_growth: f64,
    pub months: Vec<String>,
}

/// A month whose total cost is above the IQR fence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierMonth {
    pub month: String,
    pub cost: f64,
    pub threshold: f64,
}

/// Detect anomalies in the last three months of every service and sub-service
///
/// Results are ordered by severity, most severe first, then by absolute
/// deviation.
pub fn detect_cost_anomalies(data: &CloudCostData, sensitivity_threshold: f64) -> Vec<CostAnomaly> {
    let mut anomalies = Vec::new();

    if data.months.len() < MIN_HISTORY_MONTHS {
        debug!(months = data.months.len(), "Not enough history for anomaly detection");
        return anomalies;
    }

    for service in data.flatten_services() {
        detect_service_anomalies(&service, &data.months, sensitivity_threshold, &mut anomalies);
    }

    anomalies.sort_by(|a, b| {
        b.severity.cmp(&a.severity).then_with(|| {
            b.percent_deviation
                .abs()
                .partial_cmp(&a.percent_deviation.abs())
                .unwrap_or(Ordering::Equal)
        })
    });

    anomalies
}

fn detect_service_anomalies(
    service: &FlatService<'_>,
    months: &[String],
    sensitivity_threshold: f64,
    anomalies: &mut Vec<CostAnomaly>,
) {
    let series = service.cost.series(months);
    if series.iter().filter(|&&c| c > 0.0).count() < MIN_HISTORY_MONTHS {
        return;
    }

    let start = months.len().saturating_sub(EVALUATION_WINDOW);
    for idx in start..months.len() {
        // The very first month has no baseline
        if idx == 0 {
            continue;
        }

        let actual = series[idx];
        if actual < NOISE_FLOOR {
            continue;
        }

        let baseline = &series[idx.saturating_sub(EVALUATION_WINDOW)..idx];
        let expected = baseline.iter().sum::<f64>() / baseline.len() as f64;
        if expected <= 0.0 {
            continue;
        }

        let percent_deviation = (actual - expected) / expected * 100.0;
        if percent_deviation.abs() < sensitivity_threshold {
            continue;
        }

        let name = service.display_name();
        let direction = if percent_deviation > 0.0 { "Aumento" } else { "Redução" };
        let message = format!(
            "{} anômalo de {:.1}% nos custos de {} em {} em relação à média dos meses anteriores.",
            direction,
            percent_deviation.abs(),
            name,
            months[idx]
        );

        anomalies.push(CostAnomaly {
            month: months[idx].clone(),
            service: name,
            expected_cost: expected,
            actual_cost: actual,
            percent_deviation,
            severity: Severity::from_deviation(percent_deviation.abs()),
            message,
        });
    }
}

/// Detect services whose average month-over-month growth meets the threshold
pub fn detect_rapid_growth_trends(
    data: &CloudCostData,
    months_to_analyze: usize,
    growth_threshold: f64,
) -> Vec<GrowthTrend> {
    if data.months.len() < 2 {
        return Vec::new();
    }

    let recent = data.last_months(months_to_analyze);
    let mut trends: Vec<GrowthTrend> = data
        .flatten_services()
        .iter()
        .filter_map(|service| {
            let average_growth = average_growth(&service.cost.series(recent));
            (average_growth >= growth_threshold).then(|| GrowthTrend {
                service: service.display_name(),
                average_growth,
                months: recent.to_vec(),
            })
        })
        .collect();

    trends.sort_by(desc_by(|t: &GrowthTrend| t.average_growth));
    trends
}

/// Mean month-over-month growth in percent, skipping pairs below the noise floor
fn average_growth(series: &[f64]) -> f64 {
    let rates: Vec<f64> = series
        .windows(2)
        .filter(|pair| pair[0] >= NOISE_FLOOR)
        .map(|pair| (pair[1] - pair[0]) / pair[0] * 100.0)
        .collect();

    if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

/// Upper IQR fence: `q3 + factor * (q3 - q1)`
pub fn outlier_threshold(values: &[f64], factor: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q1 = sorted[(sorted.len() as f64 * 0.25).floor() as usize];
    let q3 = sorted[(sorted.len() as f64 * 0.75).floor() as usize];

    Some(q3 + (q3 - q1) * factor)
}

/// Months whose total cost is above the IQR fence of all monthly totals
pub fn detect_outlier_months(data: &CloudCostData, factor: f64) -> Vec<OutlierMonth> {
    if data.months.len() < MIN_HISTORY_MONTHS {
        return Vec::new();
    }

    let totals = data.total_series();
    let Some(threshold) = outlier_threshold(&totals, factor) else {
        return Vec::new();
    };

    data.months
        .iter()
        .zip(totals)
        .filter(|(_, cost)| *cost > threshold)
        .map(|(month, cost)| OutlierMonth {
            month: month.clone(),
            cost,
            threshold,
        })
        .collect()
}
