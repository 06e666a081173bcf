//! CSV parser for cloud cost exports
//!
//! Turns a monthly billing export into a [`CloudCostData`]. The header row
//! drives everything: `Custo: <Month>/<Year>` columns carry costs,
//! `Uso: <Month>/<Year>` columns carry free-text usage and `Estimativa:`
//! columns are ignored. Data rows name the service in column 1 (column 0 as
//! a fallback) and an optional sub-service in column 2.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::model::{CloudCostData, ServiceCost};
use crate::month::MonthLabel;
use crate::{Error, Result};

const COST_PREFIX: &str = "Custo:";
const USAGE_PREFIX: &str = "Uso:";
const ESTIMATE_PREFIX: &str = "Estimativa:";

/// Minimum number of columns for a data row to be considered
const MIN_ROW_COLUMNS: usize = 3;

// Leading decimal number, mirrors lenient float parsing of cost cells
static COST_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?").unwrap());

/// How a header cell is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderColumn {
    Cost(MonthLabel),
    Usage(MonthLabel),
    Estimate,
    Other,
}

impl HeaderColumn {
    /// Classify a header cell by its prefix
    pub fn classify(header: &str) -> Self {
        let header = header.trim();
        if let Some(rest) = header.strip_prefix(COST_PREFIX) {
            match MonthLabel::parse(rest) {
                Ok(month) => HeaderColumn::Cost(month),
                Err(e) => {
                    warn!(header = %header, error = %e, "Ignoring cost column with unrecognized month");
                    HeaderColumn::Other
                }
            }
        } else if let Some(rest) = header.strip_prefix(USAGE_PREFIX) {
            match MonthLabel::parse(rest) {
                Ok(month) => HeaderColumn::Usage(month),
                Err(_) => HeaderColumn::Other,
            }
        } else if header.starts_with(ESTIMATE_PREFIX) {
            HeaderColumn::Estimate
        } else {
            HeaderColumn::Other
        }
    }
}

/// Column positions discovered from the header row
#[derive(Debug, Default)]
struct HeaderLayout {
    /// Months in chronological order
    months: Vec<MonthLabel>,
    cost_columns: HashMap<MonthLabel, usize>,
    usage_columns: HashMap<MonthLabel, usize>,
}

impl HeaderLayout {
    fn from_headers(headers: &[String]) -> Self {
        let mut layout = HeaderLayout::default();

        for (index, header) in headers.iter().enumerate() {
            match HeaderColumn::classify(header) {
                HeaderColumn::Cost(month) => {
                    if !layout.months.contains(&month) {
                        layout.months.push(month);
                    }
                    layout.cost_columns.insert(month, index);
                }
                HeaderColumn::Usage(month) => {
                    layout.usage_columns.insert(month, index);
                }
                HeaderColumn::Estimate | HeaderColumn::Other => {}
            }
        }

        // Stable: equal labels keep discovery order
        layout.months.sort();
        layout
    }
}

/// Parse a cloud cost CSV export
pub fn parse_cloud_cost_csv(content: &str) -> Result<CloudCostData> {
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(Error::Parse(
            "CSV must contain a header row and at least one data row".to_string(),
        ));
    }

    let headers: Vec<String> = split_csv_line(lines[0].1)
        .iter()
        .map(|h| clean_cell(h))
        .collect();
    let layout = HeaderLayout::from_headers(&headers);

    if layout.months.is_empty() {
        return Err(Error::Parse(
            "No 'Custo: <Month>/<Year>' columns found in header".to_string(),
        ));
    }

    let months: Vec<String> = layout.months.iter().map(|m| m.to_string()).collect();
    debug!(months = months.len(), "Discovered cost columns");

    let mut services: Vec<ServiceCost> = Vec::new();
    let mut service_index: HashMap<String, usize> = HashMap::new();
    let mut cost_cells = 0usize;

    for &(line_no, line) in &lines[1..] {
        let columns = split_csv_line(line);

        if columns.len() < MIN_ROW_COLUMNS {
            debug!(line = line_no + 1, "Skipping row with too few columns");
            continue;
        }

        let service_name = match clean_cell(&columns[1]) {
            name if !name.is_empty() => name,
            _ => clean_cell(&columns[0]),
        };
        if service_name.is_empty() {
            debug!(line = line_no + 1, "Skipping row without a service name");
            continue;
        }
        let sub_service_name = clean_cell(&columns[2]);

        let mut costs = BTreeMap::new();
        let mut usages = BTreeMap::new();

        for (month, label) in layout.months.iter().zip(&months) {
            if let Some(raw) = layout
                .cost_columns
                .get(month)
                .and_then(|&idx| columns.get(idx))
                .filter(|raw| !raw.is_empty())
            {
                costs.insert(label.clone(), parse_cost(raw));
                cost_cells += 1;
            }

            if let Some(raw) = layout
                .usage_columns
                .get(month)
                .and_then(|&idx| columns.get(idx))
                .filter(|raw| !raw.is_empty())
            {
                usages.insert(label.clone(), clean_cell(raw));
            }
        }

        let idx = *service_index.entry(service_name.clone()).or_insert_with(|| {
            services.push(ServiceCost::new(service_name.clone()));
            services.len() - 1
        });
        let service = &mut services[idx];

        if sub_service_name.is_empty() {
            // Repeated root rows overwrite per month
            service.costs.extend(costs);
            service.usages = Some(usages);
        } else {
            service.sub_services.push(ServiceCost {
                name: sub_service_name,
                costs,
                usages: Some(usages),
                sub_services: Vec::new(),
            });
        }
    }

    if services.is_empty() {
        return Err(Error::Parse("No services found in CSV data".to_string()));
    }
    if cost_cells == 0 {
        return Err(Error::Parse("No cost values found in CSV data".to_string()));
    }

    let mut data = CloudCostData {
        services,
        months,
        totals_by_month: BTreeMap::new(),
    };
    data.zero_fill();

    let totals: BTreeMap<String, f64> = data
        .months
        .iter()
        .map(|m| (m.clone(), data.root_cost_for(m)))
        .collect();
    data.totals_by_month = totals;

    info!(
        services = data.services.len(),
        months = data.months.len(),
        "Parsed cloud cost CSV"
    );

    Ok(data)
}

/// Split a CSV line on commas that are not inside double quotes
///
/// Quote characters toggle the quoted state and are dropped from the output,
/// wherever they appear in a field. Doubled quotes are not an escape.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => result.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    result.push(current);
    result
}

/// Parse a cost cell, unparseable values resolve to zero
pub fn parse_cost(raw: &str) -> f64 {
    let cleaned = raw.replace('"', "");
    let normalized = cleaned.trim().replacen(',', ".", 1);

    COST_NUMBER_REGEX
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn clean_cell(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ID,Serviço,Subserviço,\"Custo: Fevereiro/2024\",\"Uso: Fevereiro/2024\",\"Custo: Janeiro/2024\",\"Estimativa: Março/2024\"
1,Compute,,\"150,50\",720h,100,999
2,Compute,VM Standard,\"90\",500h,60,999
3,Storage,,20,1TB,\"10,25\",999
";

    #[test]
    fn test_split_csv_line_respects_quotes() {
        let cols = split_csv_line("a,\"b,c\",,d");
        assert_eq!(cols, vec!["a", "b,c", "", "d"]);
    }

    #[test]
    fn test_split_csv_line_quotes_toggle_anywhere() {
        assert_eq!(split_csv_line("a\"b,c\"d,e"), vec!["ab,cd", "e"]);
        assert_eq!(split_csv_line("\"say \"\"hi\"\"\",x"), vec!["say hi", "x"]);
        assert_eq!(split_csv_line("\"open,ended"), vec!["open,ended"]);
    }

    #[test]
    fn test_parse_cost_variants() {
        assert_eq!(parse_cost("150,50"), 150.5);
        assert_eq!(parse_cost("\"42\""), 42.0);
        assert_eq!(parse_cost(" 7.25 "), 7.25);
        assert_eq!(parse_cost("abc"), 0.0);
        assert_eq!(parse_cost(""), 0.0);
        assert_eq!(parse_cost("12abc"), 12.0);
        assert_eq!(parse_cost("-3"), 0.0);
        assert_eq!(parse_cost("+3"), 3.0);
        assert_eq!(parse_cost("+12,5"), 12.5);
        assert_eq!(parse_cost("++3"), 0.0);
    }

    #[test]
    fn test_classify_headers() {
        assert!(matches!(HeaderColumn::classify("Custo: Março/2024"), HeaderColumn::Cost(_)));
        assert!(matches!(HeaderColumn::classify("Uso: Mar/2024"), HeaderColumn::Usage(_)));
        assert_eq!(HeaderColumn::classify("Estimativa: Abril/2024"), HeaderColumn::Estimate);
        assert_eq!(HeaderColumn::classify("Serviço"), HeaderColumn::Other);
        assert_eq!(HeaderColumn::classify("Custo: total"), HeaderColumn::Other);
    }

    #[test]
    fn test_parse_sorts_months_chronologically() {
        let data = parse_cloud_cost_csv(SAMPLE).unwrap();
        assert_eq!(data.months, vec!["Janeiro/2024", "Fevereiro/2024"]);
    }

    #[test]
    fn test_parse_services_and_sub_services() {
        let data = parse_cloud_cost_csv(SAMPLE).unwrap();
        assert_eq!(data.services.len(), 2);

        let compute = &data.services[0];
        assert_eq!(compute.name, "Compute");
        assert_eq!(compute.cost_for("Fevereiro/2024"), 150.5);
        assert_eq!(compute.cost_for("Janeiro/2024"), 100.0);
        assert_eq!(compute.sub_services.len(), 1);
        assert_eq!(compute.sub_services[0].name, "VM Standard");
        assert_eq!(compute.sub_services[0].cost_for("Fevereiro/2024"), 90.0);

        let usages = compute.usages.as_ref().unwrap();
        assert_eq!(usages.get("Fevereiro/2024").map(String::as_str), Some("720h"));
    }

    #[test]
    fn test_totals_use_root_costs_only() {
        let data = parse_cloud_cost_csv(SAMPLE).unwrap();
        assert_eq!(data.total_for("Fevereiro/2024"), 170.5);
        assert_eq!(data.total_for("Janeiro/2024"), 110.25);

        for month in &data.months {
            assert_eq!(data.total_for(month), data.root_cost_for(month));
        }
    }

    #[test]
    fn test_zero_fill_missing_cells() {
        let csv = "\
ID,Serviço,Sub,Custo: Janeiro/2024,Custo: Fevereiro/2024
1,Network,,5,
2,Network,CDN,,3
";
        let data = parse_cloud_cost_csv(csv).unwrap();
        let network = &data.services[0];
        assert_eq!(network.costs.get("Fevereiro/2024"), Some(&0.0));
        assert_eq!(network.sub_services[0].costs.get("Janeiro/2024"), Some(&0.0));
    }

    #[test]
    fn test_repeated_root_rows_last_write_wins() {
        let csv = "\
ID,Serviço,Sub,Custo: Janeiro/2024,Custo: Fevereiro/2024
1,DB,,10,20
2,DB,,30,
";
        let data = parse_cloud_cost_csv(csv).unwrap();
        assert_eq!(data.services.len(), 1);
        assert_eq!(data.services[0].cost_for("Janeiro/2024"), 30.0);
        assert_eq!(data.services[0].cost_for("Fevereiro/2024"), 20.0);
        assert_eq!(data.total_for("Janeiro/2024"), 30.0);
    }

    #[test]
    fn test_duplicate_sub_services_are_appended() {
        let csv = "\
ID,Serviço,Sub,Custo: Janeiro/2024
1,DB,Replica,10
2,DB,Replica,15
";
        let data = parse_cloud_cost_csv(csv).unwrap();
        assert_eq!(data.services[0].sub_services.len(), 2);
    }

    #[test]
    fn test_service_name_falls_back_to_column_zero() {
        let csv = "\
Serviço,Conta,Sub,Custo: Janeiro/2024
Backup,,,12
";
        let data = parse_cloud_cost_csv(csv).unwrap();
        assert_eq!(data.services[0].name, "Backup");
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let csv = "\
ID,Serviço,Sub,Custo: Janeiro/2024
garbage
1,Queue,,4
";
        let data = parse_cloud_cost_csv(csv).unwrap();
        assert_eq!(data.services.len(), 1);
        assert_eq!(data.services[0].name, "Queue");
    }

    #[test]
    fn test_month_variants_normalize() {
        let csv = "\
ID,Serviço,Sub,Custo: Marco/2024,Custo: fev/2024
1,Queue,,4,2
";
        let data = parse_cloud_cost_csv(csv).unwrap();
        assert_eq!(data.months, vec!["Fevereiro/2024", "Março/2024"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_cloud_cost_csv(""), Err(Error::Parse(_))));
        assert!(matches!(
            parse_cloud_cost_csv("ID,Serviço,Sub,Custo: Janeiro/2024\n\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_cloud_cost_csv("ID,Serviço,Sub,Total\n1,DB,,3\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_cloud_cost_csv("ID,Serviço,Sub,Custo: Janeiro/2024\nx\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_cloud_cost_csv("ID,Serviço,Sub,Custo: Janeiro/2024\n1,DB,,\n"),
            Err(Error::Parse(_))
        ));
    }
}
