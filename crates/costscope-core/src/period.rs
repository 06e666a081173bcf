//! Period-over-period comparison
//!
//! Splits the month range into two contiguous, non-overlapping windows and
//! contrasts them service by service. When there are fewer months than the
//! two windows need, the available months are split in half with the extra
//! month going to the current window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::CloudCostData;
use crate::trends::{desc_by, percent_change, share_of, ServiceShare};

pub const DEFAULT_CURRENT_PERIOD_MONTHS: usize = 3;
pub const DEFAULT_PREVIOUS_PERIOD_MONTHS: usize = 3;

/// Number of services listed as top increases and top decreases
pub const TOP_CHANGES_LIMIT: usize = 5;

const CURRENT_PERIOD_NAME: &str = "Período Atual";
const PREVIOUS_PERIOD_NAME: &str = "Período Anterior";

/// Cost summary of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodData {
    pub name: String,
    pub months: Vec<String>,
    pub total_cost: f64,
    /// Root services and sub-services with non-zero cost, highest first
    pub service_breakdown: Vec<ServiceShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalChange {
    pub absolute: f64,
    pub percentage: f64,
}

/// How one service moved between the two windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceComparison {
    pub name: String,
    pub current_period_cost: f64,
    pub previous_period_cost: f64,
    pub absolute_change: f64,
    pub percentage_change: f64,
    pub current_period_percentage: f64,
    pub previous_period_percentage: f64,
}

impl ServiceComparison {
    /// Change in cost share, in percentage points
    pub fn share_shift(&self) -> f64 {
        self.current_period_percentage - self.previous_period_percentage
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparisonResult {
    pub current_period: PeriodData,
    pub previous_period: PeriodData,
    pub total_change: TotalChange,
    /// Ordered by absolute change, largest first
    pub service_comparison: Vec<ServiceComparison>,
    pub top_increases: Vec<ServiceComparison>,
    pub top_decreases: Vec<ServiceComparison>,
    pub insights: Vec<String>,
}

/// Resolve window sizes against the months available
///
/// Returns `(current, previous)`.
pub fn balance_windows(available: usize, current: usize, previous: usize) -> (usize, usize) {
    if available < current + previous {
        let current = available.div_ceil(2);
        (current, available - current)
    } else {
        (current, previous)
    }
}

/// Compare the most recent window against the one immediately before it
pub fn compare_periods(
    data: &CloudCostData,
    current_period_months: usize,
    previous_period_months: usize,
) -> PeriodComparisonResult {
    let len = data.months.len();
    let (current_len, previous_len) =
        balance_windows(len, current_period_months, previous_period_months);
    debug!(current = current_len, previous = previous_len, "Comparing periods");

    let current_start = len - current_len;
    let current_months = &data.months[current_start..];
    let previous_months = &data.months[current_start - previous_len..current_start];

    let current_period = period_data(data, current_months, CURRENT_PERIOD_NAME);
    let previous_period = period_data(data, previous_months, PREVIOUS_PERIOD_NAME);

    let total_change = TotalChange {
        absolute: current_period.total_cost - previous_period.total_cost,
        percentage: percent_change(previous_period.total_cost, current_period.total_cost)
            .unwrap_or(0.0),
    };

    let service_comparison = compare_services(
        data,
        current_months,
        previous_months,
        current_period.total_cost,
        previous_period.total_cost,
    );

    let mut top_increases: Vec<ServiceComparison> = service_comparison
        .iter()
        .filter(|s| s.percentage_change > 0.0)
        .cloned()
        .collect();
    top_increases.sort_by(desc_by(|s: &ServiceComparison| s.percentage_change));
    top_increases.truncate(TOP_CHANGES_LIMIT);

    let mut top_decreases: Vec<ServiceComparison> = service_comparison
        .iter()
        .filter(|s| s.percentage_change < 0.0)
        .cloned()
        .collect();
    top_decreases.sort_by(desc_by(|s: &ServiceComparison| -s.percentage_change));
    top_decreases.truncate(TOP_CHANGES_LIMIT);

    let insights = comparison_insights(&total_change, &service_comparison, &top_increases, &top_decreases);

    PeriodComparisonResult {
        current_period,
        previous_period,
        total_change,
        service_comparison,
        top_increases,
        top_decreases,
        insights,
    }
}

fn period_data(data: &CloudCostData, months: &[String], name: &str) -> PeriodData {
    // Sub-services are already part of their parent's cost
    let total_cost: f64 = data.services.iter().map(|s| s.window_cost(months)).sum();

    let mut service_breakdown: Vec<ServiceShare> = data
        .flatten_services()
        .iter()
        .filter_map(|service| {
            let cost = service.cost.window_cost(months);
            (cost > 0.0).then(|| ServiceShare {
                name: service.display_name(),
                cost,
                percentage: share_of(cost, total_cost),
            })
        })
        .collect();
    service_breakdown.sort_by(desc_by(|s: &ServiceShare| s.cost));

    PeriodData {
        name: name.to_string(),
        months: months.to_vec(),
        total_cost,
        service_breakdown,
    }
}

fn compare_services(
    data: &CloudCostData,
    current_months: &[String],
    previous_months: &[String],
    current_total: f64,
    previous_total: f64,
) -> Vec<ServiceComparison> {
    let mut comparison: Vec<ServiceComparison> = data
        .flatten_services()
        .iter()
        .filter_map(|service| {
            let current = service.cost.window_cost(current_months);
            let previous = service.cost.window_cost(previous_months);
            if current <= 0.0 && previous <= 0.0 {
                return None;
            }

            let percentage_change = match percent_change(previous, current) {
                Some(change) => change,
                None if current > 0.0 => 100.0,
                None => 0.0,
            };

            Some(ServiceComparison {
                name: service.display_name(),
                current_period_cost: current,
                previous_period_cost: previous,
                absolute_change: current - previous,
                percentage_change,
                current_period_percentage: share_of(current, current_total),
                previous_period_percentage: share_of(previous, previous_total),
            })
        })
        .collect();

    comparison.sort_by(desc_by(|s: &ServiceComparison| s.absolute_change.abs()));
    comparison
}

fn join_names(services: &[&ServiceComparison], limit: usize) -> String {
    services
        .iter()
        .take(limit)
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn comparison_insights(
    total_change: &TotalChange,
    service_comparison: &[ServiceComparison],
    top_increases: &[ServiceComparison],
    top_decreases: &[ServiceComparison],
) -> Vec<String> {
    let mut insights = Vec::new();

    if total_change.percentage > 10.0 {
        insights.push(format!(
            "Os custos aumentaram {:.1}% em relação ao período anterior. Recomendamos analisar os serviços com maior crescimento.",
            total_change.percentage
        ));
    } else if total_change.percentage < -10.0 {
        insights.push(format!(
            "Os custos diminuíram {:.1}% em relação ao período anterior. Suas otimizações estão funcionando bem.",
            total_change.percentage.abs()
        ));
    } else {
        insights.push(format!(
            "Os custos se mantiveram relativamente estáveis entre os períodos (variação de {:.1}%).",
            total_change.percentage
        ));
    }

    let significant_increases: Vec<&ServiceComparison> = top_increases
        .iter()
        .filter(|s| s.percentage_change > 20.0 && s.absolute_change > 100.0)
        .collect();
    if !significant_increases.is_empty() {
        insights.push(format!(
            "Os serviços com maior aumento percentual foram: {}. Recomendamos revisar o uso destes serviços.",
            join_names(&significant_increases, 3)
        ));
    }

    let significant_decreases: Vec<&ServiceComparison> = top_decreases
        .iter()
        .filter(|s| s.percentage_change < -20.0 && s.absolute_change.abs() > 100.0)
        .collect();
    if !significant_decreases.is_empty() {
        insights.push(format!(
            "Os serviços com maior redução percentual foram: {}. Continue aplicando as mesmas estratégias de otimização.",
            join_names(&significant_decreases, 3)
        ));
    }

    let mut shifted: Vec<&ServiceComparison> = service_comparison
        .iter()
        .filter(|s| s.share_shift().abs() > 5.0)
        .collect();
    shifted.sort_by(desc_by(|s: &&ServiceComparison| s.share_shift().abs()));
    if let Some(service) = shifted.first() {
        let direction = if service.share_shift() > 0.0 { "aumentou" } else { "diminuiu" };
        insights.push(format!(
            "A participação do serviço {} no custo total {} {:.1} pontos percentuais (de {:.1}% para {:.1}%).",
            service.name,
            direction,
            service.share_shift().abs(),
            service.previous_period_percentage,
            service.current_period_percentage
        ));
    }

    let new_services = service_comparison
        .iter()
        .filter(|s| s.previous_period_cost == 0.0 && s.current_period_cost > 0.0)
        .filter(|s| s.current_period_percentage > 1.0)
        .count();
    if new_services > 0 {
        insights.push(format!(
            "Foram identificados {} novos serviços com custo significativo no período atual. Verifique se estes serviços estão alinhados com suas necessidades de negócio.",
            new_services
        ));
    }

    let discontinued = service_comparison
        .iter()
        .filter(|s| s.current_period_cost == 0.0 && s.previous_period_cost > 0.0)
        .filter(|s| s.previous_period_percentage > 1.0)
        .count();
    if discontinued > 0 {
        insights.push(format!(
            "{} serviços com custo significativo no período anterior não apresentaram custos no período atual. Verifique se isto foi intencional.",
            discontinued
        ));
    }

    insights
}
