//! Normalized cost model
//!
//! `CloudCostData` is built once per uploaded file by the parser and is
//! treated as immutable by every analysis function. The only mutation after
//! parsing is [`CloudCostData::validate_and_repair`], which the HTTP boundary
//! applies to client-supplied payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::month::{canonical_label, MonthLabel};
use crate::{Error, Result};

/// Separator used when a sub-service is reported alongside its parent
pub const SUB_SERVICE_SEPARATOR: &str = " > ";

/// Monthly cost series for a service or sub-service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCost {
    pub name: String,
    #[serde(default)]
    pub costs: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usages: Option<BTreeMap<String, String>>,
    /// One level deep; sub-services never carry their own sub-services
    #[serde(default)]
    pub sub_services: Vec<ServiceCost>,
}

impl ServiceCost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            costs: BTreeMap::new(),
            usages: None,
            sub_services: Vec::new(),
        }
    }

    pub fn with_costs(mut self, costs: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.costs.extend(costs);
        self
    }

    pub fn with_sub_service(mut self, sub: ServiceCost) -> Self {
        self.sub_services.push(sub);
        self
    }

    /// Cost for a month, missing entries count as zero
    pub fn cost_for(&self, month: &str) -> f64 {
        self.costs.get(month).copied().unwrap_or(0.0)
    }

    /// Sum of every recorded monthly cost
    pub fn total_cost(&self) -> f64 {
        self.costs.values().sum()
    }

    /// Sum of costs over the given months
    pub fn window_cost(&self, months: &[String]) -> f64 {
        months.iter().map(|m| self.cost_for(m)).sum()
    }

    /// Costs for each month in order
    pub fn series(&self, months: &[String]) -> Vec<f64> {
        months.iter().map(|m| self.cost_for(m)).collect()
    }

    /// Rewrite cost keys to canonical month labels
    fn canonicalize_costs(&mut self) -> Result<()> {
        let mut costs = BTreeMap::new();
        for (month, cost) in std::mem::take(&mut self.costs) {
            let label = canonical_label(&month).ok_or_else(|| {
                Error::Validation(format!("Invalid month '{}' in costs of '{}'", month, self.name))
            })?;
            if costs.insert(label.clone(), cost).is_some() {
                return Err(Error::Validation(format!(
                    "Duplicate cost for '{}' in {}",
                    self.name, label
                )));
            }
        }
        self.costs = costs;
        Ok(())
    }

    fn zero_fill(&mut self, months: &[String]) {
        for month in months {
            self.costs.entry(month.clone()).or_insert(0.0);
        }
    }
}

/// A service or sub-service paired with its display name
#[derive(Debug, Clone, Copy)]
pub struct FlatService<'a> {
    pub name: &'a str,
    pub parent: Option<&'a str>,
    pub cost: &'a ServiceCost,
}

impl FlatService<'_> {
    /// "Parent > Child" for sub-services, the plain name otherwise
    pub fn display_name(&self) -> String {
        match self.parent {
            Some(parent) => format!("{}{}{}", parent, SUB_SERVICE_SEPARATOR, self.name),
            None => self.name.to_string(),
        }
    }
}

/// Parsed cost export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCostData {
    pub services: Vec<ServiceCost>,
    /// Chronologically ascending month labels
    pub months: Vec<String>,
    #[serde(default)]
    pub totals_by_month: BTreeMap<String, f64>,
}

impl CloudCostData {
    /// Total for a month, missing entries count as zero
    pub fn total_for(&self, month: &str) -> f64 {
        self.totals_by_month.get(month).copied().unwrap_or(0.0)
    }

    /// Sum of all monthly totals
    pub fn total_cost(&self) -> f64 {
        self.totals_by_month.values().sum()
    }

    /// Sum of root-level service costs for a month
    pub fn root_cost_for(&self, month: &str) -> f64 {
        self.services.iter().map(|s| s.cost_for(month)).sum()
    }

    /// Monthly totals in month order
    pub fn total_series(&self) -> Vec<f64> {
        self.months.iter().map(|m| self.total_for(m)).collect()
    }

    /// Root services followed by each of their sub-services
    pub fn flatten_services(&self) -> Vec<FlatService<'_>> {
        let mut flat = Vec::new();
        for service in &self.services {
            flat.push(FlatService {
                name: &service.name,
                parent: None,
                cost: service,
            });
            for sub in &service.sub_services {
                flat.push(FlatService {
                    name: &sub.name,
                    parent: Some(&service.name),
                    cost: sub,
                });
            }
        }
        flat
    }

    /// The last `n` months, or all of them when fewer exist
    pub fn last_months(&self, n: usize) -> &[String] {
        let start = self.months.len().saturating_sub(n);
        &self.months[start..]
    }

    /// Ensure every service and sub-service has a cost entry for every month
    pub fn zero_fill(&mut self) {
        let months = self.months.clone();
        for service in &mut self.services {
            service.zero_fill(&months);
            for sub in &mut service.sub_services {
                sub.zero_fill(&months);
            }
        }
    }

    /// Reject malformed client payloads, then apply the tolerant repair step
    ///
    /// Month labels and cost keys are rewritten to their canonical form,
    /// months are sorted and deduplicated, missing cost entries become zero
    /// and monthly totals are rebuilt from root-service costs. Supplied totals
    /// are never trusted.
    pub fn validate_and_repair(&mut self) -> Result<()> {
        if self.months.is_empty() {
            return Err(Error::Validation("months cannot be empty".to_string()));
        }

        let mut labels = self
            .months
            .iter()
            .map(|month| {
                MonthLabel::parse(month).map_err(|_| {
                    Error::Validation(format!("Invalid month label: '{}'", month))
                })
            })
            .collect::<Result<Vec<MonthLabel>>>()?;
        labels.sort();
        labels.dedup();
        let months: Vec<String> = labels.iter().map(|m| m.to_string()).collect();
        if months != self.months {
            debug!(
                supplied = self.months.len(),
                canonical = months.len(),
                "Normalized month labels"
            );
        }
        self.months = months;

        if self.services.is_empty() {
            return Err(Error::Validation("services cannot be empty".to_string()));
        }

        for service in &mut self.services {
            service.canonicalize_costs()?;
            for sub in &mut service.sub_services {
                sub.canonicalize_costs()?;
            }
        }

        for flat in self.flatten_services() {
            for (month, cost) in &flat.cost.costs {
                if !cost.is_finite() || *cost < 0.0 {
                    return Err(Error::Validation(format!(
                        "Invalid cost {} for '{}' in {}",
                        cost,
                        flat.display_name(),
                        month
                    )));
                }
            }
        }

        self.zero_fill();

        let totals: BTreeMap<String, f64> = self
            .months
            .iter()
            .map(|m| (m.clone(), self.root_cost_for(m)))
            .collect();
        for (month, supplied) in &self.totals_by_month {
            if totals.get(month).map_or(true, |t| (t - supplied).abs() > 1e-6) {
                warn!(month = %month, supplied, "Replacing supplied monthly total");
            }
        }
        self.totals_by_month = totals;

        Ok(())
    }
}
