//! Costscope Core - Cloud cost parsing and analytics
//!
//! This crate provides the cost analysis engine:
//! - Month labels and the parsed cost data model
//! - CSV export parsing
//! - Trends, breakdowns and period comparison
//! - Anomaly and growth detection
//! - Cost projection and insight generation

pub mod analysis;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod insights;
pub mod model;
pub mod month;
pub mod parser;
pub mod period;
pub mod projection;
pub mod trends;

pub use analysis::{analyze_cloud_costs, CostAnalysis};
pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use model::{CloudCostData, FlatService, ServiceCost};
pub use month::MonthLabel;
pub use parser::parse_cloud_cost_csv;

// Re-export analytics types
pub use anomaly::{
    detect_cost_anomalies, detect_outlier_months, detect_rapid_growth_trends, CostAnomaly,
    GrowthTrend, OutlierMonth, Severity,
};
pub use insights::generate_insights;
pub use period::{compare_periods, PeriodComparisonResult, PeriodData, ServiceComparison};
pub use projection::{project_future_costs, CostProjection};
pub use trends::{
    calculate_cost_breakdown, calculate_cost_trends, compare_time_periods, identify_top_services,
    service_heatmap, CostBreakdown, CostComparison, CostTrend, ServiceAnalysis, ServiceShare,
};
