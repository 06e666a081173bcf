//! Analysis pipeline
//!
//! Runs every analytics component over one parsed export and assembles the
//! result the dashboard renders.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::anomaly::{detect_cost_anomalies, CostAnomaly};
use crate::config::AnalysisConfig;
use crate::insights::generate_insights;
use crate::model::CloudCostData;
use crate::period::{compare_periods, PeriodComparisonResult};
use crate::trends::{
    calculate_cost_breakdown, calculate_cost_trends, compare_time_periods, identify_top_services,
    service_heatmap, CostBreakdown, CostComparison, CostTrend, ServiceAnalysis,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnalysis {
    pub total_cost: f64,
    pub trends: Vec<CostTrend>,
    pub top_services: Vec<ServiceAnalysis>,
    /// Rows follow `top_services`, columns follow the export's months
    pub service_heatmap: Vec<Vec<f64>>,
    pub monthly_comparison: CostComparison,
    pub cost_breakdown: CostBreakdown,
    pub insights: Vec<String>,
    pub anomalies: Vec<CostAnomaly>,
    pub period_comparison: PeriodComparisonResult,
}

/// Compute the full analysis for a parsed export
#[tracing::instrument(
    name = "analysis",
    skip(data, config),
    fields(services = data.services.len(), months = data.months.len())
)]
pub fn analyze_cloud_costs(data: &CloudCostData, config: &AnalysisConfig) -> Result<CostAnalysis> {
    let total_cost: f64 = data.total_series().iter().sum();
    if !total_cost.is_finite() {
        return Err(Error::Analysis(format!(
            "Total cost is not a finite number: {}",
            total_cost
        )));
    }
    info!(
        services = data.services.len(),
        months = data.months.len(),
        total_cost,
        "Analyzing cloud costs"
    );

    let trends = calculate_cost_trends(&data.months, &data.totals_by_month);
    let top_services = identify_top_services(&data.services, &data.months, total_cost);
    let heatmap = service_heatmap(&top_services, &data.months);
    let monthly_comparison = compare_time_periods(&data.months, &data.totals_by_month);
    let cost_breakdown = calculate_cost_breakdown(&data.services, &data.months);

    let anomalies = detect_cost_anomalies(data, config.sensitivity_threshold);
    let period_comparison = compare_periods(
        data,
        config.current_period_months,
        config.previous_period_months,
    );
    debug!(
        anomalies = anomalies.len(),
        top_services = top_services.len(),
        "Computed analytics"
    );

    let insights = generate_insights(
        &trends,
        &top_services,
        &monthly_comparison,
        &cost_breakdown,
        &anomalies,
    );

    info!(
        insights = insights.len(),
        anomalies = anomalies.len(),
        "Analysis complete"
    );

    Ok(CostAnalysis {
        total_cost,
        trends,
        top_services,
        service_heatmap: heatmap,
        monthly_comparison,
        cost_breakdown,
        insights,
        anomalies,
        period_comparison,
    })
}
