//! Pipeline orchestration.
//!
//! Runs load -> join -> points -> render in order, reporting each stage
//! through a [`ProgressCallback`]. Optional inputs that fail validation are
//! dropped with a diagnostic; everything else is terminal.

use std::sync::Arc;
use std::time::Instant;

use region_map_regions::RegionError;
use region_map_regions::joiner::{JoinKey, JoinOutcome, join_metrics};
use region_map_regions::loader::load_regions;
use region_map_regions::points::load_points;
use region_map_regions::progress::ProgressCallback;
use region_map_regions::tables::read_metrics_csv;
use region_map_regions_models::PointCollection;
use region_map_render::{RenderError, RenderReport, render_all};
use thiserror::Error;

use crate::config::PipelineConfig;

const STAGES: u64 = 4;

/// A terminal pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub regions: usize,
    pub join_key: JoinKey,
    pub matched: usize,
    pub points: Option<usize>,
    pub render: RenderReport,
    /// Diagnostics from every stage, in order.
    pub diagnostics: Vec<String>,
}

impl RunReport {
    /// Whether every artifact was written.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.render.all_succeeded()
    }
}

/// Loads the regions and joins the configured metrics table.
///
/// # Errors
///
/// Fails if the geometry source is misconfigured or any requested input
/// cannot be read.
pub async fn load_joined(config: &PipelineConfig) -> Result<JoinOutcome, RegionError> {
    let source = config.geometry_source()?;
    log::info!("Loading regions from {}", source.describe());
    let regions = load_regions(&source).await?;
    log::info!("Loaded {} regions", regions.len());

    let metrics = config
        .metrics
        .as_deref()
        .map(read_metrics_csv)
        .transpose()?;

    Ok(join_metrics(regions, metrics.as_ref()))
}

/// Loads the point overlay, degrading to no overlay on failure.
fn load_overlay(config: &PipelineConfig, diagnostics: &mut Vec<String>) -> Option<PointCollection> {
    match load_points(config.points.as_deref()) {
        Ok(points) => points,
        Err(e) => {
            let message = format!("Point overlay disabled: {e}");
            log::warn!("{message}");
            diagnostics.push(message);
            None
        }
    }
}

/// Runs the whole pipeline.
///
/// # Errors
///
/// Returns [`PipelineError`] on a terminal failure: misconfigured geometry
/// source, unreadable geometry or metrics, or a metric that is not a column
/// of the joined regions. Artifact write failures are reported in the
/// returned [`RunReport`] instead.
pub async fn run(
    config: &PipelineConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RunReport, PipelineError> {
    let start = Instant::now();
    progress.set_total(STAGES);

    progress.set_message("Loading regions".to_owned());
    let source = config.geometry_source()?;
    log::info!("Loading regions from {}", source.describe());
    let regions = load_regions(&source).await?;
    log::info!("Loaded {} regions", regions.len());
    progress.inc(1);

    progress.set_message("Joining metrics".to_owned());
    let metrics = config
        .metrics
        .as_deref()
        .map(read_metrics_csv)
        .transpose()?;
    let JoinOutcome {
        collection,
        key,
        matched,
        mut diagnostics,
    } = join_metrics(regions, metrics.as_ref());
    progress.inc(1);

    progress.set_message("Loading points".to_owned());
    let points = load_overlay(config, &mut diagnostics);
    progress.inc(1);

    progress.set_message("Rendering".to_owned());
    let render = render_all(&collection, points.as_ref(), &config.render)?;
    diagnostics.extend(render.diagnostics.iter().cloned());
    progress.inc(1);

    progress.finish(format!(
        "Finished in {:.1}s",
        start.elapsed().as_secs_f64()
    ));

    Ok(RunReport {
        regions: collection.len(),
        join_key: key,
        matched,
        points: points.as_ref().map(PointCollection::len),
        render,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use region_map_regions::progress::null_progress;
    use region_map_render::{Artifact, OutputPaths};

    use super::*;

    const REGIONS: &str = r#"{"type":"FeatureCollection","features":[
      {"type":"Feature","properties":{"name":"A"},"geometry":{"type":"Polygon","coordinates":[[[-100,30],[-98,30],[-98,32],[-100,30]]]}},
      {"type":"Feature","properties":{"name":"B"},"geometry":{"type":"Polygon","coordinates":[[[-97,30],[-95,30],[-95,32],[-97,30]]]}},
      {"type":"Feature","properties":{"name":"C"},"geometry":{"type":"Polygon","coordinates":[[[-94,30],[-92,30],[-92,32],[-94,30]]]}}
    ]}"#;

    fn fixture(dir: &Path) -> PipelineConfig {
        let geometry = dir.join("regions.geojson");
        let metrics = dir.join("metrics.csv");
        std::fs::write(&geometry, REGIONS).unwrap();
        std::fs::write(&metrics, "name,crime_rate\nA,100\nB,400\nC,800\n").unwrap();

        let mut config = PipelineConfig {
            geometry: Some(geometry),
            metrics: Some(metrics),
            ..PipelineConfig::default()
        };
        config.render.outputs = OutputPaths {
            html: dir.join("out/map.html"),
            image: dir.join("out/map.png"),
            csv: dir.join("out/metrics.csv"),
        };
        config
    }

    #[tokio::test]
    async fn file_mode_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());

        let report = run(&config, null_progress()).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.regions, 3);
        assert_eq!(report.join_key, JoinKey::Name);
        assert_eq!(report.matched, 3);
        assert_eq!(report.points, None);

        let csv = std::fs::read_to_string(dir.path().join("out/metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[tokio::test]
    async fn broken_points_file_only_disables_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let points = dir.path().join("points.csv");
        std::fs::write(&points, "lat,name\n1,x\n").unwrap();

        let mut config = fixture(dir.path());
        config.points = Some(points);

        let report = run(&config, null_progress()).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.points, None);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.contains("Point overlay disabled"))
        );
    }

    #[tokio::test]
    async fn missing_metric_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fixture(dir.path());
        config.render.metric = "pollution_index".to_owned();

        let err = run(&config, null_progress()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Render(_)));
        assert!(!dir.path().join("out/map.html").exists());
    }

    #[tokio::test]
    async fn no_geometry_source_is_terminal() {
        let err = run(&PipelineConfig::default(), null_progress())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Region(RegionError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn image_failure_is_reported_per_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut config = fixture(dir.path());
        config.render.outputs.image = blocker.join("map.png");

        let report = run(&config, null_progress()).await.unwrap();
        let failed: Vec<Artifact> = report.render.failures().map(|e| e.artifact).collect();

        assert!(!report.succeeded());
        assert_eq!(failed, vec![Artifact::StaticImage]);
    }

    #[tokio::test]
    async fn load_joined_reports_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path());

        let outcome = load_joined(&config).await.unwrap();
        assert_eq!(
            outcome.collection.columns(),
            ["region_id", "name", "crime_rate"]
        );
        assert_eq!(outcome.collection.len(), 3);
    }
}
