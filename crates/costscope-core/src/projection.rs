//! Cost projection
//!
//! Extrapolates monthly totals from the average month-over-month growth
//! rate of recent history. The population standard deviation of those
//! growth rates gives the lower and upper bounds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::CloudCostData;
use crate::month::MonthLabel;
use crate::{Error, Result};

pub const DEFAULT_PROJECTION_MONTHS: usize = 3;

/// Months of history required to project
const MIN_HISTORY_MONTHS: usize = 3;

/// Most recent months used to estimate growth
const GROWTH_WINDOW_MONTHS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostProjection {
    pub month: String,
    pub projected_cost: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Average growth rate and its spread, both as fractions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthModel {
    pub average_rate: f64,
    pub std_dev: f64,
}

impl GrowthModel {
    /// Fit from consecutive totals, skipping steps whose previous total is zero
    pub fn from_totals(totals: &[f64]) -> Self {
        let rates: Vec<f64> = totals
            .windows(2)
            .filter(|pair| pair[0] > 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();

        Self {
            average_rate: mean(&rates),
            std_dev: standard_deviation(&rates),
        }
    }

    /// Compound `last_cost` forward for `months` steps
    pub fn project(&self, last_cost: f64, months: usize) -> Vec<(f64, f64, f64)> {
        let mut cost = last_cost;
        (0..months)
            .map(|_| {
                let projected = cost * (1.0 + self.average_rate);
                let lower = (cost * (1.0 + self.average_rate - self.std_dev)).max(0.0);
                let upper = cost * (1.0 + self.average_rate + self.std_dev);
                cost = projected;
                (projected, lower, upper)
            })
            .collect()
    }
}

/// Project future monthly totals
///
/// Returns an empty list with fewer than three months of history.
pub fn project_future_costs(data: &CloudCostData, months_to_project: usize) -> Result<Vec<CostProjection>> {
    if data.months.len() < MIN_HISTORY_MONTHS {
        debug!(months = data.months.len(), "Not enough history for projection");
        return Ok(Vec::new());
    }

    let recent = data.last_months(GROWTH_WINDOW_MONTHS);
    let totals: Vec<f64> = recent.iter().map(|m| data.total_for(m)).collect();
    let model = GrowthModel::from_totals(&totals);

    let last_label = data
        .months
        .last()
        .ok_or_else(|| Error::Analysis("No months to project from".to_string()))?;
    let mut month = MonthLabel::parse(last_label)
        .map_err(|e| Error::Analysis(format!("Cannot project from '{}': {}", last_label, e)))?;
    let last_cost = data.total_for(last_label);

    debug!(
        average_rate = model.average_rate,
        std_dev = model.std_dev,
        "Fitted growth model"
    );

    Ok(model
        .project(last_cost, months_to_project)
        .into_iter()
        .map(|(projected_cost, lower_bound, upper_bound)| {
            month = month.next();
            CostProjection {
                month: month.to_string(),
                projected_cost,
                lower_bound,
                upper_bound,
            }
        })
        .collect())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation, zero for an empty slice
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
