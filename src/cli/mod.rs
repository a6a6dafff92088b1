//! Command-line interface for the route clustering pipeline.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::advisor::{ChatCompletionsAdvisor, PincodeAdvisor};
use crate::config::PipelineConfig;
use crate::core::geo::RouteSpec;
use crate::core::loaders::{load_records_csv, load_request_json, ComputeRequest};
use crate::core::writers::{write_labels_csv, write_report_json};
use crate::pipeline::{run_pipeline, PipelineOutput};

#[derive(Parser)]
#[command(name = "route-cluster")]
#[command(about = "Cluster geotagged pincode records along a route corridor", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that runs the pipeline.
#[derive(Args, Debug, Clone, Default)]
struct RunOptions {
    /// Number of clusters (auto when omitted)
    #[arg(short, long)]
    k: Option<usize>,
    /// Maximum number of corridor points to cluster
    #[arg(long)]
    max_points: Option<usize>,
    /// Skip the pincode advisor even if an API key is configured
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on a JSON request
    Compute {
        /// Request JSON file
        #[arg(short, long)]
        request: PathBuf,
        /// Write the report JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write per-point cluster labels as CSV
        #[arg(long)]
        labels: Option<PathBuf>,
        #[command(flatten)]
        run: RunOptions,
    },

    /// Run the pipeline on a records CSV with route endpoints on the command line
    Route {
        /// Records CSV (lat, lon, pincode)
        #[arg(long)]
        records: PathBuf,
        /// Route start as LAT,LON
        #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
        start: (f64, f64),
        /// Route end as LAT,LON
        #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
        end: (f64, f64),
        /// Write the report JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write per-point cluster labels as CSV
        #[arg(long)]
        labels: Option<PathBuf>,
        #[command(flatten)]
        run: RunOptions,
    },

    /// Run the pipeline and plot the clusters as a PNG
    Visualize {
        /// Request JSON file
        #[arg(short, long)]
        request: PathBuf,
        /// Output PNG file path (defaults to the request name with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        run: RunOptions,
    },

    /// Send a free-text prompt to the advisor backend
    Query {
        /// Prompt text
        prompt: String,
    },

    /// Print service status
    Health,

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

/// Parse `LAT,LON` into a coordinate pair.
fn parse_lat_lon(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", s))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude '{}': {}", lat.trim(), e))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude '{}': {}", lon.trim(), e))?;
    Ok((lat, lon))
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            format!("{}...", value.chars().take(34).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    let result = match cli.command {
        Commands::Compute {
            request,
            output,
            labels,
            run,
        } => cmd_compute(&request, output.as_deref(), labels.as_deref(), &run, &config),
        Commands::Route {
            records,
            start,
            end,
            output,
            labels,
            run,
        } => cmd_route(&records, start, end, output.as_deref(), labels.as_deref(), &run, &config),
        Commands::Visualize {
            request,
            output,
            run,
        } => cmd_visualize(&request, output, &run, &config),
        Commands::Query { prompt } => cmd_query(&prompt, &config),
        Commands::Health => cmd_health(&config),
        Commands::InitConfig { path } => cmd_init_config(&path),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Internal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Advisor for a pipeline run, or `None` when offline, disabled or unconfigured.
fn build_advisor(config: &PipelineConfig, offline: bool) -> Option<ChatCompletionsAdvisor> {
    if offline {
        info!("Offline mode: pincode advisor skipped");
        return None;
    }
    match ChatCompletionsAdvisor::from_config(&config.advisor) {
        Ok(advisor) => advisor,
        Err(e) => {
            warn!("Could not create pincode advisor: {}", e);
            None
        }
    }
}

/// Apply command-line overrides to a request.
fn apply_overrides(request: &mut ComputeRequest, run: &RunOptions) {
    if run.k.is_some() {
        request.k = run.k;
    }
    if let Some(cap) = run.max_points {
        request.max_points = Some(Some(cap));
    }
}

fn execute(
    request: &ComputeRequest,
    run: &RunOptions,
    config: &PipelineConfig,
) -> anyhow::Result<PipelineOutput> {
    let advisor = build_advisor(config, run.offline);

    info!(
        "Clustering {} records along ({}, {}) -> ({}, {})",
        request.records.len(),
        request.start_lat,
        request.start_lon,
        request.end_lat,
        request.end_lon
    );

    let spinner = create_spinner("Filtering and clustering records...");
    let result = run_pipeline(
        request,
        config,
        advisor.as_ref().map(|a| a as &dyn PincodeAdvisor),
    );
    spinner.finish_and_clear();

    Ok(result?)
}

/// Write (or print) the report and optional labels, then summarize.
fn emit_outputs(
    output: &PipelineOutput,
    report_path: Option<&Path>,
    labels_path: Option<&Path>,
    start: Instant,
) -> anyhow::Result<()> {
    let report = &output.report;

    if let Some(path) = labels_path {
        write_labels_csv(path, &output.points, &output.labels)?;
    }

    match report_path {
        Some(path) => write_report_json(path, report)?,
        None => {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }
    }

    let mut items = vec![
        ("Cleaned records", report.cleaned_count.to_string()),
        ("Removed records", report.removed_count.to_string()),
        ("In corridor", report.stats.in_corridor.to_string()),
        ("Clustered points", report.raw_used_points.to_string()),
        ("Pincodes used", report.used_pincodes.len().to_string()),
        ("Clusters", report.clusters.len().to_string()),
        ("Advisor used", report.stats.advisor_used.to_string()),
        ("Message", report.message.clone()),
    ];
    if let Some(path) = report_path {
        items.push(("Report", path.display().to_string()));
    }
    if let Some(path) = labels_path {
        items.push(("Labels", path.display().to_string()));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Route Clustering Complete", &items);
    Ok(())
}

fn cmd_compute(
    request_path: &Path,
    output: Option<&Path>,
    labels: Option<&Path>,
    run: &RunOptions,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut request = load_request_json(request_path)
        .with_context(|| format!("failed to load request {}", request_path.display()))?;
    apply_overrides(&mut request, run);

    let result = execute(&request, run, config)?;
    emit_outputs(&result, output, labels, start)
}

fn cmd_route(
    records_path: &Path,
    from: (f64, f64),
    to: (f64, f64),
    output: Option<&Path>,
    labels: Option<&Path>,
    run: &RunOptions,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let spinner = create_spinner("Loading records CSV...");
    let records = load_records_csv(records_path);
    spinner.finish_and_clear();
    let records =
        records.with_context(|| format!("failed to load records {}", records_path.display()))?;

    let route = RouteSpec::new(from.0, from.1, to.0, to.1);
    let mut request = ComputeRequest::new(route, records);
    apply_overrides(&mut request, run);

    let result = execute(&request, run, config)?;
    emit_outputs(&result, output, labels, start)
}

fn cmd_visualize(
    request_path: &Path,
    output: Option<PathBuf>,
    run: &RunOptions,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| request_path.with_extension("png"));

    let mut request = load_request_json(request_path)
        .with_context(|| format!("failed to load request {}", request_path.display()))?;
    apply_overrides(&mut request, run);

    let result = execute(&request, run, config)?;
    if result.points.is_empty() {
        bail!("{}", result.report.message);
    }

    let spinner = create_spinner("Generating plot...");
    let plotted = visualization::plot_route_clusters(
        &output_path,
        &request.route(),
        &result.points,
        &result.labels,
        &result.centers,
    );
    spinner.finish_and_clear();
    plotted?;

    print_summary(
        "Visualization Complete",
        &[
            ("Input file", request_path.display().to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Points plotted", result.points.len().to_string()),
            ("Clusters", result.report.clusters.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_query(prompt: &str, config: &PipelineConfig) -> anyhow::Result<()> {
    let advisor = ChatCompletionsAdvisor::require_from_config(&config.advisor)?;
    info!("Querying model {}", advisor.model());

    let spinner = create_spinner("Waiting for advisor...");
    let answer = advisor.complete(prompt);
    spinner.finish_and_clear();

    println!("{}", answer?);
    Ok(())
}

fn cmd_health(config: &PipelineConfig) -> anyhow::Result<()> {
    let advisor_configured = config.advisor.enabled
        && std::env::var(&config.advisor.api_key_env)
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);

    let status = serde_json::json!({
        "status": "ok",
        "advisorConfigured": advisor_configured,
        "version": crate::VERSION,
    });
    println!("{}", status);
    Ok(())
}

fn cmd_init_config(path: &Path) -> anyhow::Result<()> {
    PipelineConfig::default().to_yaml(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_lat_lon() {
        assert_eq!(parse_lat_lon("28.7041,77.1025").unwrap(), (28.7041, 77.1025));
        assert_eq!(parse_lat_lon(" -33.9 , 18.4 ").unwrap(), (-33.9, 18.4));
        assert!(parse_lat_lon("28.7041").is_err());
        assert!(parse_lat_lon("north,77").is_err());
    }

    #[test]
    fn test_cli_parses_route_command() {
        let cli = Cli::try_parse_from([
            "route-cluster",
            "-v",
            "route",
            "--records",
            "records.csv",
            "--start",
            "28.7041,77.1025",
            "--end",
            "28.4595,77.0266",
            "--k",
            "3",
            "--offline",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Route { start, end, run, .. } => {
                assert_eq!(start, (28.7041, 77.1025));
                assert_eq!(end, (28.4595, 77.0266));
                assert_eq!(run.k, Some(3));
                assert!(run.offline);
                assert_eq!(run.max_points, None);
            }
            _ => panic!("expected route command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_coordinates() {
        let result = Cli::try_parse_from([
            "route-cluster",
            "route",
            "--records",
            "r.csv",
            "--start",
            "nowhere",
            "--end",
            "1,1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut request = ComputeRequest::new(RouteSpec::new(0.0, 0.0, 1.0, 1.0), Vec::new());
        apply_overrides(&mut request, &RunOptions::default());
        assert_eq!(request.k, None);
        assert_eq!(request.max_points, None);

        let run = RunOptions {
            k: Some(4),
            max_points: Some(50),
            offline: true,
        };
        apply_overrides(&mut request, &run);
        assert_eq!(request.k, Some(4));
        assert_eq!(request.max_points, Some(Some(50)));
    }

    #[test]
    fn test_offline_skips_advisor() {
        assert!(build_advisor(&PipelineConfig::default(), true).is_none());
    }

    #[test]
    fn test_compute_writes_report_and_labels() {
        let dir = tempdir().unwrap();
        let request_path = dir.path().join("request.json");
        std::fs::write(
            &request_path,
            r#"{
                "startLat": 28.7041, "startLon": 77.1025,
                "endLat": 28.4595, "endLon": 77.0266,
                "records": [
                    {"lat": 28.60, "lon": 77.05, "pincode": "110001"},
                    {"lat": 28.55, "lon": 77.06, "pincode": 110001},
                    {"lat": 0.0, "lon": 0.0, "pincode": "999999"}
                ]
            }"#,
        )
        .unwrap();
        let report_path = dir.path().join("out").join("report.json");
        let labels_path = dir.path().join("out").join("labels.csv");

        let run = RunOptions {
            offline: true,
            ..Default::default()
        };
        cmd_compute(
            &request_path,
            Some(&report_path),
            Some(&labels_path),
            &run,
            &PipelineConfig::default(),
        )
        .unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["cleanedCount"], 3);
        assert_eq!(report["usedPincodes"][0], "110001");

        let labels = std::fs::read_to_string(&labels_path).unwrap();
        assert!(labels.starts_with("lat,lon,pincode,cluster"));
        assert_eq!(labels.lines().count(), 3);
    }

    #[test]
    fn test_route_reads_csv_and_writes_report() {
        let dir = tempdir().unwrap();
        let records_path = dir.path().join("records.csv");
        std::fs::write(
            &records_path,
            "lat,lon,pincode\n28.60,77.05,110001\n28.55,77.06,110001\n28.50,77.04,122001\n0.0,0.0,999999\nnot-a-number,77.0,110002\n",
        )
        .unwrap();
        let report_path = dir.path().join("report.json");
        let labels_path = dir.path().join("labels.csv");

        let run = RunOptions {
            offline: true,
            ..Default::default()
        };
        cmd_route(
            &records_path,
            (28.7041, 77.1025),
            (28.4595, 77.0266),
            Some(&report_path),
            Some(&labels_path),
            &run,
            &PipelineConfig::default(),
        )
        .unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["cleanedCount"], 4);
        assert_eq!(report["removedCount"], 1);
        assert_eq!(report["rawUsedPoints"], 3);
        assert_eq!(report["usedPincodes"][0], "110001");
        assert_eq!(report["usedPincodes"][1], "122001");

        let labels = std::fs::read_to_string(&labels_path).unwrap();
        assert_eq!(labels.lines().count(), 4);
    }

    #[test]
    fn test_route_missing_csv_is_error() {
        let dir = tempdir().unwrap();
        let result = cmd_route(
            &dir.path().join("absent.csv"),
            (28.7041, 77.1025),
            (28.4595, 77.0266),
            None,
            None,
            &RunOptions::default(),
            &PipelineConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_init_config_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        cmd_init_config(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.sampling.max_points, 2000);
    }
}
