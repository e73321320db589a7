#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `region_map`: render a choropleth from region polygons and metrics.
//!
//! Running without a subcommand starts the interactive flow.
//!
//! Uses `indicatif-log-bridge` (via [`region_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the stage bar never fight for the terminal.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use region_map_cli::config::{FileConfig, Overrides, PipelineConfig};
use region_map_cli::{interactive, pipeline};
use region_map_cli_utils::{IndicatifProgress, MultiProgress};

#[derive(Parser)]
#[command(name = "region_map", version, about = "Metric-driven choropleth maps")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the interactive map, static image and metrics CSV
    Render(RenderArgs),
    /// Prompt for settings, then render
    Interactive {
        /// TOML file providing prompt defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the joined region columns without rendering
    Columns(SourceArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Download the example US states dataset
    #[arg(long)]
    example: bool,

    /// Local `GeoJSON` file with region polygons
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// CSV of metrics keyed by `name` or `region_id`
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Seed for synthesized example metrics
    #[arg(long)]
    seed: Option<u64>,

    /// Timeout for the example download, in seconds
    #[arg(long)]
    fetch_timeout_secs: Option<u64>,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// CSV of points with latitude/longitude columns
    #[arg(long)]
    points: Option<PathBuf>,

    /// Column to colour regions by
    #[arg(long)]
    metric: Option<String>,

    /// Extra column shown in popups and the CSV export
    #[arg(long)]
    secondary_metric: Option<String>,

    /// Omit the secondary metric entirely
    #[arg(long, conflicts_with = "secondary_metric")]
    no_secondary_metric: bool,

    /// Interactive map output path
    #[arg(long)]
    html_out: Option<PathBuf>,

    /// Static image output path
    #[arg(long)]
    image_out: Option<PathBuf>,

    /// Metrics CSV output path
    #[arg(long)]
    csv_out: Option<PathBuf>,
}

impl SourceArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            example: self.example,
            geometry: self.geometry.clone(),
            metrics: self.metrics.clone(),
            seed: self.seed,
            fetch_timeout_secs: self.fetch_timeout_secs,
            ..Overrides::default()
        }
    }
}

impl RenderArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            points: self.points.clone(),
            metric: self.metric.clone(),
            secondary_metric: self.secondary_metric.clone(),
            no_secondary_metric: self.no_secondary_metric,
            html_out: self.html_out.clone(),
            image_out: self.image_out.clone(),
            csv_out: self.csv_out.clone(),
            ..self.source.overrides()
        }
    }
}

fn resolve(
    config_path: Option<&PathBuf>,
    overrides: &Overrides,
) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let file = match config_path {
        Some(path) => {
            log::info!("Reading config {}", path.display());
            FileConfig::load(path)?
        }
        None => FileConfig::default(),
    };
    Ok(PipelineConfig::resolve(file, overrides))
}

async fn render(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let bar = IndicatifProgress::steps_bar(multi, "Region map", 4);
    let report = pipeline::run(config, bar).await?;

    println!();
    println!(
        "Regions: {} (join: {}, matched: {})",
        report.regions, report.join_key, report.matched
    );
    if let Some(points) = report.points {
        println!("Points: {points}");
    }
    for (artifact, result) in report.render.results() {
        match result {
            Ok(path) => println!("  ok    {artifact}: {}", path.display()),
            Err(e) => println!("  FAIL  {artifact}: {e}"),
        }
    }
    for diagnostic in &report.diagnostics {
        println!("  note: {diagnostic}");
    }

    let failed = report.render.failures().count();
    if failed > 0 {
        return Err(format!("{failed} artifact(s) could not be written").into());
    }

    Ok(())
}

async fn columns(
    config: &PipelineConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = IndicatifProgress::spinner(multi, "Loading regions");
    let outcome = pipeline::load_joined(config).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    println!(
        "{} regions (join: {}, matched: {})",
        outcome.collection.len(),
        outcome.key,
        outcome.matched
    );
    for column in outcome.collection.columns() {
        println!("  {column}");
    }
    for diagnostic in &outcome.diagnostics {
        println!("  note: {diagnostic}");
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = region_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Interactive { config: None }) {
        Command::Render(args) => {
            let config = resolve(args.source.config.as_ref(), &args.overrides())?;
            render(&config, &multi).await
        }
        Command::Interactive { config } => {
            let defaults = resolve(config.as_ref(), &Overrides::default())?;
            println!("Region Map");
            println!();
            let config = interactive::prompt(defaults)?;
            render(&config, &multi).await
        }
        Command::Columns(args) => {
            let config = resolve(args.config.as_ref(), &args.overrides())?;
            columns(&config, &multi).await
        }
    }
}
