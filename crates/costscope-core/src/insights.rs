//! Natural-language observations over computed analytics
//!
//! Pure composition: nothing here computes new figures. Observations always
//! come out in the same order: overall trend, period comparison, top
//! service concentration, growth alert, breakdown concentration, anomaly
//! summary, closing recommendation.

use crate::anomaly::{CostAnomaly, Severity};
use crate::trends::{desc_by, CostBreakdown, CostComparison, CostTrend, ServiceAnalysis};

/// Month-over-month change, in percent, still considered stable
const STABLE_MONTHLY_CHANGE: f64 = 5.0;

/// Three-month change, in percent, worth reporting
const PERIOD_CHANGE_ALERT: f64 = 10.0;

/// Share, in percent, above which the top service should be optimized
const TOP_SERVICE_CONCENTRATION: f64 = 30.0;

/// Last-month growth, in percent, that marks a top service as growing
const SERVICE_GROWTH_ALERT: f64 = 15.0;

/// Combined share, in percent, of the top three services that signals concentration
const TOP_THREE_CONCENTRATION: f64 = 70.0;

pub const CLOSING_RECOMMENDATION: &str = "Recomendamos revisar regularmente seus recursos não utilizados e considerar reservas para recursos de uso constante para otimizar custos.";

/// Compose the ordered list of observations
pub fn generate_insights(
    trends: &[CostTrend],
    top_services: &[ServiceAnalysis],
    comparison: &CostComparison,
    breakdown: &CostBreakdown,
    anomalies: &[CostAnomaly],
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(change) = trends.last().and_then(|t| t.percent_change) {
        insights.push(if change > STABLE_MONTHLY_CHANGE {
            format!(
                "Os custos aumentaram {:.1}% no último mês. Recomendamos uma análise detalhada para identificar as causas.",
                change
            )
        } else if change < -STABLE_MONTHLY_CHANGE {
            format!(
                "Os custos diminuíram {:.1}% no último mês. Continue monitorando para manter esta tendência positiva.",
                change.abs()
            )
        } else {
            format!(
                "Os custos se mantiveram estáveis no último mês (variação de {:.1}%).",
                change
            )
        });
    }

    if comparison.percent_change > PERIOD_CHANGE_ALERT {
        insights.push(format!(
            "Os custos nos últimos 3 meses aumentaram {:.1}% em relação ao período anterior. Considere revisar sua estratégia de uso de recursos.",
            comparison.percent_change
        ));
    } else if comparison.percent_change < -PERIOD_CHANGE_ALERT {
        insights.push(format!(
            "Os custos nos últimos 3 meses diminuíram {:.1}% em relação ao período anterior. Suas otimizações estão funcionando bem.",
            comparison.percent_change.abs()
        ));
    }

    if let Some(top) = top_services.first() {
        let advice = if top.percent_of_total > TOP_SERVICE_CONCENTRATION {
            "Considere otimizar este serviço para reduzir custos significativamente."
        } else {
            "Continue monitorando este serviço."
        };
        insights.push(format!(
            "{} representa {:.1}% dos seus custos totais. {}",
            top.name, top.percent_of_total, advice
        ));

        let growing: Vec<&str> = top_services
            .iter()
            .filter(|s| {
                s.trend
                    .last()
                    .and_then(|t| t.percent_change)
                    .is_some_and(|change| change > SERVICE_GROWTH_ALERT)
            })
            .map(|s| s.name.as_str())
            .collect();
        if !growing.is_empty() {
            insights.push(format!(
                "Os seguintes serviços apresentaram crescimento significativo no último mês: {}. Recomendamos uma análise detalhada.",
                growing.join(", ")
            ));
        }
    }

    let top_three = &breakdown.services[..breakdown.services.len().min(3)];
    let top_three_share: f64 = top_three.iter().map(|s| s.percentage).sum();
    if top_three_share > TOP_THREE_CONCENTRATION {
        let names: Vec<&str> = top_three.iter().map(|s| s.name.as_str()).collect();
        insights.push(format!(
            "Os três principais serviços ({}) representam {:.1}% dos seus custos. Sua infraestrutura está concentrada em poucos serviços.",
            names.join(", "),
            top_three_share
        ));
    }

    if !anomalies.is_empty() {
        let high = anomalies
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count();
        if high > 0 {
            insights.push(format!(
                "Detectamos {} anomalias de alta severidade nos custos. Recomendamos verificar imediatamente os serviços afetados.",
                high
            ));
        }

        // Sort a copy so the caller's severity ordering is untouched
        let mut by_deviation: Vec<&CostAnomaly> = anomalies.iter().collect();
        by_deviation.sort_by(desc_by(|a: &&CostAnomaly| a.percent_deviation.abs()));
        if let Some(most) = by_deviation.first() {
            let direction = if most.percent_deviation > 0.0 { "aumento" } else { "redução" };
            insights.push(format!(
                "A anomalia mais significativa foi um {} de {:.1}% em {} durante {}.",
                direction,
                most.percent_deviation.abs(),
                most.service,
                most.month
            ));
        }
    }

    insights.push(CLOSING_RECOMMENDATION.to_string());
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trends::{PeriodWindow, ServiceShare};

    fn trend(month: &str, cost: f64, change: Option<f64>) -> CostTrend {
        CostTrend {
            month: month.to_string(),
            cost,
            percent_change: change,
        }
    }

    fn comparison(percent_change: f64) -> CostComparison {
        CostComparison {
            current_period: PeriodWindow {
                months: vec![],
                cost: 0.0,
            },
            previous_period: PeriodWindow {
                months: vec![],
                cost: 0.0,
            },
            percent_change,
        }
    }

    fn share(name: &str, percentage: f64) -> ServiceShare {
        ServiceShare {
            name: name.to_string(),
            cost: percentage,
            percentage,
        }
    }

    fn anomaly(service: &str, deviation: f64, severity: Severity) -> CostAnomaly {
        CostAnomaly {
            month: "Maio/2024".to_string(),
            service: service.to_string(),
            expected_cost: 100.0,
            actual_cost: 100.0 + deviation,
            percent_deviation: deviation,
            severity,
            message: String::new(),
        }
    }

    #[test]
    fn test_only_closing_recommendation_without_data() {
        let insights = generate_insights(&[], &[], &comparison(0.0), &CostBreakdown::default(), &[]);
        assert_eq!(insights, vec![CLOSING_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn test_overall_trend_variants() {
        let up = generate_insights(
            &[trend("Jan", 100.0, None), trend("Fev", 120.0, Some(20.0))],
            &[],
            &comparison(0.0),
            &CostBreakdown::default(),
            &[],
        );
        assert_eq!(
            up[0],
            "Os custos aumentaram 20.0% no último mês. Recomendamos uma análise detalhada para identificar as causas."
        );

        let down = generate_insights(
            &[trend("Fev", 80.0, Some(-20.0))],
            &[],
            &comparison(0.0),
            &CostBreakdown::default(),
            &[],
        );
        assert!(down[0].starts_with("Os custos diminuíram 20.0% no último mês."));

        let flat = generate_insights(
            &[trend("Fev", 101.0, Some(1.0))],
            &[],
            &comparison(0.0),
            &CostBreakdown::default(),
            &[],
        );
        assert_eq!(flat[0], "Os custos se mantiveram estáveis no último mês (variação de 1.0%).");
    }

    #[test]
    fn test_ordering_of_all_sections() {
        let top = vec![ServiceAnalysis {
            name: "Compute".to_string(),
            total_cost: 800.0,
            percent_of_total: 80.0,
            trend: vec![trend("Jan", 100.0, None), trend("Fev", 200.0, Some(100.0))],
        }];
        let breakdown = CostBreakdown {
            services: vec![share("Compute", 80.0), share("Storage", 15.0), share("DB", 5.0)],
        };
        let anomalies = vec![
            anomaly("Compute", 150.0, Severity::High),
            anomaly("Storage", -400.0, Severity::High),
        ];

        let insights = generate_insights(
            &[trend("Jan", 100.0, None), trend("Fev", 200.0, Some(100.0))],
            &top,
            &comparison(50.0),
            &breakdown,
            &anomalies,
        );

        assert_eq!(insights.len(), 8);
        assert!(insights[0].starts_with("Os custos aumentaram 100.0% no último mês"));
        assert!(insights[1].starts_with("Os custos nos últimos 3 meses aumentaram 50.0%"));
        assert_eq!(
            insights[2],
            "Compute representa 80.0% dos seus custos totais. Considere otimizar este serviço para reduzir custos significativamente."
        );
        assert!(insights[3].contains("crescimento significativo no último mês: Compute."));
        assert!(insights[4].starts_with("Os três principais serviços (Compute, Storage, DB) representam 100.0%"));
        assert!(insights[5].starts_with("Detectamos 2 anomalias de alta severidade"));
        assert_eq!(
            insights[6],
            "A anomalia mais significativa foi um redução de 400.0% em Storage durante Maio/2024."
        );
        assert_eq!(insights[7], CLOSING_RECOMMENDATION);
    }

    #[test]
    fn test_small_top_service_is_monitored() {
        let top = vec![ServiceAnalysis {
            name: "Queue".to_string(),
            total_cost: 10.0,
            percent_of_total: 10.0,
            trend: vec![trend("Jan", 10.0, None)],
        }];
        let insights = generate_insights(&[], &top, &comparison(-20.0), &CostBreakdown::default(), &[]);

        assert!(insights[0].starts_with("Os custos nos últimos 3 meses diminuíram 20.0%"));
        assert_eq!(
            insights[1],
            "Queue representa 10.0% dos seus custos totais. Continue monitorando este serviço."
        );
    }
}
