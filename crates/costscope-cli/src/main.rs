//! Costscope CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use costscope_core::{
    analyze_cloud_costs, compare_periods, detect_cost_anomalies, detect_outlier_months,
    detect_rapid_growth_trends, parse_cloud_cost_csv, project_future_costs, AnalysisConfig,
    CloudCostData, CostAnalysis, PeriodComparisonResult,
};
use costscope_web::{create_router, AppState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Initialize logging with the specified verbosity level
fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter =
        EnvFilter::from_default_env().add_directive(format!("costscope={}", level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2) // Show module path at debug+
        .with_file(verbose >= 3) // Show file:line at trace
        .with_line_number(verbose >= 3);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "costscope")]
#[command(about = "Cloud cost export analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Analysis config file
    #[arg(
        long,
        global = true,
        env = "COSTSCOPE_CONFIG",
        default_value = "~/.costscope/config.toml"
    )]
    config: String,

    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output logs as JSON (for machine parsing)
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        #[arg(short, long, env = "COSTSCOPE_PORT", default_value = "8080")]
        port: u16,
        #[arg(long, env = "COSTSCOPE_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Maximum upload size in bytes
        #[arg(long, default_value_t = costscope_web::api::DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },
    /// Parse a CSV export and show its services and months
    Parse {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run the full analysis on a CSV export
    Analyze {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show cost anomalies, outlier months and rapid growth
    Anomalies {
        file: PathBuf,
        /// Minimum deviation in percent (overrides config)
        #[arg(long)]
        sensitivity: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Compare the most recent period against the one before it
    Compare {
        file: PathBuf,
        /// Months in the current period (overrides config)
        #[arg(long)]
        current: Option<usize>,
        /// Months in the previous period (overrides config)
        #[arg(long)]
        previous: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Project monthly totals forward
    Project {
        file: PathBuf,
        /// Months to project (overrides config)
        #[arg(long)]
        months: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with CLI options
    init_logging(cli.verbose, cli.quiet, cli.log_json)?;

    // Expand home directory
    let config_path = PathBuf::from(shellexpand::tilde(&cli.config).to_string());
    let mut config = AnalysisConfig::load(&config_path)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            max_upload_bytes,
        } => {
            let state = Arc::new(AppState::new(config).with_max_upload_bytes(max_upload_bytes));
            let app = create_router(state);

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "Costscope API listening");
            println!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }

        Commands::Parse { file, json } => {
            let data = load_export(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_parsed(&data);
            }
        }

        Commands::Analyze { file, json } => {
            let data = load_export(&file)?;
            let analysis = analyze_cloud_costs(&data, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }

        Commands::Anomalies {
            file,
            sensitivity,
            json,
        } => {
            if let Some(sensitivity) = sensitivity {
                config.sensitivity_threshold = sensitivity;
            }
            config.validate()?;

            let data = load_export(&file)?;
            let anomalies = detect_cost_anomalies(&data, config.sensitivity_threshold);
            let outliers = detect_outlier_months(&data, config.outlier_factor);
            let growth =
                detect_rapid_growth_trends(&data, config.growth_months, config.growth_threshold);

            if json {
                let report = serde_json::json!({
                    "anomalies": anomalies,
                    "outlierMonths": outliers,
                    "growthTrends": growth,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if anomalies.is_empty() {
                    println!("No anomalies detected");
                } else {
                    println!("{:<8} {:<16} {:<30} {:>10}", "SEVERITY", "MONTH", "SERVICE", "DEVIATION");
                    println!("{}", "-".repeat(68));
                    for anomaly in &anomalies {
                        println!(
                            "{:<8} {:<16} {:<30} {:>9.1}%",
                            anomaly.severity,
                            anomaly.month,
                            truncate(&anomaly.service, 30),
                            anomaly.percent_deviation
                        );
                    }
                }

                if !outliers.is_empty() {
                    println!();
                    println!("Outlier months:");
                    for outlier in &outliers {
                        println!(
                            "  {} {:.2} (threshold {:.2})",
                            outlier.month, outlier.cost, outlier.threshold
                        );
                    }
                }

                if !growth.is_empty() {
                    println!();
                    println!("Rapid growth:");
                    for trend in &growth {
                        println!("  {} +{:.1}%/month", trend.service, trend.average_growth);
                    }
                }
            }
        }

        Commands::Compare {
            file,
            current,
            previous,
            json,
        } => {
            if let Some(current) = current {
                config.current_period_months = current;
            }
            if let Some(previous) = previous {
                config.previous_period_months = previous;
            }
            config.validate()?;

            let data = load_export(&file)?;
            let result = compare_periods(
                &data,
                config.current_period_months,
                config.previous_period_months,
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_comparison(&result);
            }
        }

        Commands::Project { file, months, json } => {
            if let Some(months) = months {
                config.projection_months = months;
            }
            config.validate()?;

            let data = load_export(&file)?;
            let projections = project_future_costs(&data, config.projection_months)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projections)?);
            } else if projections.is_empty() {
                println!("Not enough history to project (need at least 3 months)");
            } else {
                println!("{:<16} {:>12} {:>12} {:>12}", "MONTH", "PROJECTED", "LOWER", "UPPER");
                println!("{}", "-".repeat(56));
                for p in &projections {
                    println!(
                        "{:<16} {:>12.2} {:>12.2} {:>12.2}",
                        p.month, p.projected_cost, p.lower_bound, p.upper_bound
                    );
                }
            }
        }
    }

    Ok(())
}

fn load_export(path: &Path) -> Result<CloudCostData> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let data = parse_cloud_cost_csv(&content)?;
    info!(
        file = %path.display(),
        services = data.services.len(),
        months = data.months.len(),
        "Parsed cost export"
    );
    Ok(data)
}

fn print_parsed(data: &CloudCostData) {
    println!("Months: {}", data.months.join(", "));
    println!("Services: {}", data.services.len());
    println!();
    println!("{:<40} {:>12}", "SERVICE", "TOTAL");
    println!("{}", "-".repeat(53));
    for flat in data.flatten_services() {
        let name = match flat.parent {
            Some(_) => format!("  {}", flat.name),
            None => flat.name.to_string(),
        };
        println!("{:<40} {:>12.2}", truncate(&name, 40), flat.cost.total_cost());
    }
    println!("{}", "-".repeat(53));
    println!("{:<40} {:>12.2}", "Total", data.total_series().iter().sum::<f64>());
}

fn print_analysis(analysis: &CostAnalysis) {
    println!("Total cost: {:.2}", analysis.total_cost);
    println!();

    println!("{:<16} {:>12} {:>10}", "MONTH", "COST", "CHANGE");
    println!("{}", "-".repeat(40));
    for trend in &analysis.trends {
        let change = trend
            .percent_change
            .map(|c| format!("{:+.1}%", c))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<16} {:>12.2} {:>10}", trend.month, trend.cost, change);
    }

    println!();
    println!("Top services:");
    for (i, service) in analysis.top_services.iter().enumerate() {
        println!(
            "  {}. {} {:.2} ({:.1}%)",
            i + 1,
            service.name,
            service.total_cost,
            service.percent_of_total
        );
    }

    if !analysis.anomalies.is_empty() {
        println!();
        println!("Anomalies ({}):", analysis.anomalies.len());
        for anomaly in &analysis.anomalies {
            println!("  [{}] {}", anomaly.severity, anomaly.message);
        }
    }

    println!();
    println!("Insights:");
    for insight in &analysis.insights {
        println!("  - {}", insight);
    }
}

fn print_comparison(result: &PeriodComparisonResult) {
    for period in [&result.previous_period, &result.current_period] {
        println!(
            "{}: {} ({:.2})",
            period.name,
            period.months.join(", "),
            period.total_cost
        );
    }
    println!(
        "Change: {:+.2} ({:+.1}%)",
        result.total_change.absolute, result.total_change.percentage
    );

    if !result.top_increases.is_empty() {
        println!();
        println!("Top increases:");
        for s in &result.top_increases {
            println!("  {} {:+.2} ({:+.1}%)", s.name, s.absolute_change, s.percentage_change);
        }
    }
    if !result.top_decreases.is_empty() {
        println!();
        println!("Top decreases:");
        for s in &result.top_decreases {
            println!("  {} {:+.2} ({:+.1}%)", s.name, s.absolute_change, s.percentage_change);
        }
    }

    if !result.insights.is_empty() {
        println!();
        println!("Insights:");
        for insight in &result.insights {
            println!("  - {}", insight);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
