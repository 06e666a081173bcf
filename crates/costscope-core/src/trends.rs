//! Cost trends and breakdowns
//!
//! Month-over-month trend of the overall bill, top services by spend, the
//! share of each service over the most recent months and the fixed
//! three-versus-three month comparison shown on the dashboard.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::ServiceCost;

/// Number of services reported as top spenders
pub const TOP_SERVICES_LIMIT: usize = 5;

/// Months considered by the breakdown and the monthly comparison
pub const RECENT_WINDOW_MONTHS: usize = 3;

/// Cost for a single month with its change against the previous month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTrend {
    pub month: String,
    pub cost: f64,
    /// Absent for the first month and whenever the previous cost is zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
}

/// Spend summary for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAnalysis {
    pub name: String,
    pub total_cost: f64,
    pub percent_of_total: f64,
    pub trend: Vec<CostTrend>,
}

/// A named cost share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceShare {
    pub name: String,
    pub cost: f64,
    pub percentage: f64,
}

/// Service shares over the most recent months, highest cost first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub services: Vec<ServiceShare>,
}

/// Months and total cost of one comparison window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodWindow {
    pub months: Vec<String>,
    pub cost: f64,
}

/// Fixed comparison of the last three months against the three before
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostComparison {
    pub current_period: PeriodWindow,
    pub previous_period: PeriodWindow,
    pub percent_change: f64,
}

/// Percentage change from `previous` to `current`, undefined when `previous` is zero
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous > 0.0 {
        Some((current - previous) / previous * 100.0)
    } else {
        None
    }
}

/// `part` as a percentage of `whole`, zero when `whole` is zero
pub fn share_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

pub(crate) fn desc_by<T>(key: impl Fn(&T) -> f64) -> impl Fn(&T, &T) -> Ordering {
    move |a: &T, b: &T| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal)
}

fn trend_series(months: &[String], cost_of: impl Fn(&str) -> f64) -> Vec<CostTrend> {
    let mut previous: Option<f64> = None;
    months
        .iter()
        .map(|month| {
            let cost = cost_of(month);
            let trend = CostTrend {
                month: month.clone(),
                cost,
                percent_change: previous.and_then(|prev| percent_change(prev, cost)),
            };
            previous = Some(cost);
            trend
        })
        .collect()
}

/// Overall cost per month with month-over-month change
pub fn calculate_cost_trends(months: &[String], totals_by_month: &BTreeMap<String, f64>) -> Vec<CostTrend> {
    trend_series(months, |m| totals_by_month.get(m).copied().unwrap_or(0.0))
}

/// Top services by total cost, ties keep their original order
pub fn identify_top_services(
    services: &[ServiceCost],
    months: &[String],
    total_cost: f64,
) -> Vec<ServiceAnalysis> {
    let mut analyses: Vec<ServiceAnalysis> = services
        .iter()
        .map(|service| {
            let service_total = service.total_cost();
            ServiceAnalysis {
                name: service.name.clone(),
                total_cost: service_total,
                percent_of_total: share_of(service_total, total_cost),
                trend: trend_series(months, |m| service.cost_for(m)),
            }
        })
        .collect();

    analyses.sort_by(desc_by(|a: &ServiceAnalysis| a.total_cost));
    analyses.truncate(TOP_SERVICES_LIMIT);
    analyses
}

/// Share of each root service over the last three months
pub fn calculate_cost_breakdown(services: &[ServiceCost], months: &[String]) -> CostBreakdown {
    let recent = &months[months.len().saturating_sub(RECENT_WINDOW_MONTHS)..];

    let costs: Vec<(String, f64)> = services
        .iter()
        .map(|s| (s.name.clone(), s.window_cost(recent)))
        .collect();
    let total: f64 = costs.iter().map(|(_, c)| c).sum();

    let mut shares: Vec<ServiceShare> = costs
        .into_iter()
        .map(|(name, cost)| ServiceShare {
            name,
            cost,
            percentage: share_of(cost, total),
        })
        .collect();
    shares.sort_by(desc_by(|s: &ServiceShare| s.cost));

    CostBreakdown { services: shares }
}

/// Last three months against the up-to-three months before them
pub fn compare_time_periods(months: &[String], totals_by_month: &BTreeMap<String, f64>) -> CostComparison {
    let len = months.len();
    let recent = &months[len.saturating_sub(RECENT_WINDOW_MONTHS)..];
    let previous = &months[len.saturating_sub(2 * RECENT_WINDOW_MONTHS)..len.saturating_sub(RECENT_WINDOW_MONTHS)];

    let window_cost = |window: &[String]| -> f64 {
        window
            .iter()
            .map(|m| totals_by_month.get(m).copied().unwrap_or(0.0))
            .sum()
    };
    let recent_cost = window_cost(recent);
    let previous_cost = window_cost(previous);

    CostComparison {
        current_period: PeriodWindow {
            months: recent.to_vec(),
            cost: recent_cost,
        },
        previous_period: PeriodWindow {
            months: previous.to_vec(),
            cost: previous_cost,
        },
        percent_change: percent_change(previous_cost, recent_cost).unwrap_or(0.0),
    }
}

/// Service-by-month cost matrix for the given services
pub fn service_heatmap(services: &[ServiceAnalysis], months: &[String]) -> Vec<Vec<f64>> {
    services
        .iter()
        .map(|service| {
            months
                .iter()
                .map(|month| {
                    service
                        .trend
                        .iter()
                        .find(|t| &t.month == month)
                        .map(|t| t.cost)
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect()
}
