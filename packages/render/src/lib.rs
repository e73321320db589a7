#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map rendering for the region map pipeline.
//!
//! [`render_all`] validates the requested metric against the joined
//! collection, builds one [`ColorScale`](scale::ColorScale) and one popup
//! list, then writes three independent artifacts:
//!
//! * an interactive Leaflet web map ([`interactive`])
//! * a static PNG choropleth ([`static_map`])
//! * a flat metrics CSV ([`export`])
//!
//! A failure writing one artifact is reported in the [`RenderReport`] and
//! never prevents the others from being attempted.

pub mod export;
mod html;
pub mod interactive;
pub mod popup;
pub mod scale;
pub mod static_map;

use std::path::{Path, PathBuf};

use region_map_regions_models::{PointCollection, RegionCollection};
use thiserror::Error;

pub use export::{Artifact, ExportError, ExportErrorKind};
pub use interactive::{InteractiveMap, InteractiveOptions};
pub use popup::{PopupContent, build_popups};
pub use scale::ColorScale;

/// Errors that stop the render stage before any artifact is attempted.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The requested metric is not a column of the collection.
    #[error(
        "Metric '{metric}' not found; available columns: [{}]",
        .available.join(", ")
    )]
    MetricNotFound {
        metric: String,
        available: Vec<String>,
    },
}

/// Checks that `metric` is a column of `collection`.
///
/// # Errors
///
/// Returns [`RenderError::MetricNotFound`] listing every column in order.
pub fn validate_metric(collection: &RegionCollection, metric: &str) -> Result<(), RenderError> {
    if collection.schema().contains(metric) {
        Ok(())
    } else {
        Err(RenderError::MetricNotFound {
            metric: metric.to_owned(),
            available: collection.columns().to_vec(),
        })
    }
}

/// Where each artifact is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub html: PathBuf,
    pub image: PathBuf,
    pub csv: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            html: PathBuf::from("interactive_geospatial_map.html"),
            image: PathBuf::from("static_choropleth.png"),
            csv: PathBuf::from("region_metrics_export.csv"),
        }
    }
}

/// Everything [`render_all`] needs besides the data.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub metric: String,
    pub secondary_metric: Option<String>,
    pub interactive: InteractiveOptions,
    pub outputs: OutputPaths,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            metric: "crime_rate".to_owned(),
            secondary_metric: Some("pollution_index".to_owned()),
            interactive: InteractiveOptions::default(),
            outputs: OutputPaths::default(),
        }
    }
}

/// Per-artifact outcome of a render.
#[derive(Debug)]
pub struct RenderReport {
    pub html: Result<PathBuf, ExportError>,
    pub image: Result<PathBuf, ExportError>,
    pub csv: Result<PathBuf, ExportError>,
    /// Non-fatal observations such as an all-empty metric column.
    pub diagnostics: Vec<String>,
}

impl RenderReport {
    /// Results in write order.
    #[must_use]
    pub fn results(&self) -> [(Artifact, &Result<PathBuf, ExportError>); 3] {
        [
            (Artifact::InteractiveHtml, &self.html),
            (Artifact::StaticImage, &self.image),
            (Artifact::MetricsCsv, &self.csv),
        ]
    }

    /// Whether every artifact was written.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.html.is_ok() && self.image.is_ok() && self.csv.is_ok()
    }

    /// The artifacts that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ExportError> {
        [&self.html, &self.image, &self.csv]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
    }
}

fn tag(
    artifact: Artifact,
    path: &Path,
    result: Result<(), ExportErrorKind>,
) -> Result<PathBuf, ExportError> {
    match result {
        Ok(()) => {
            log::info!("Wrote {artifact} to {}", path.display());
            Ok(path.to_path_buf())
        }
        Err(kind) => {
            let err = ExportError {
                artifact,
                path: path.to_path_buf(),
                kind,
            };
            log::error!("{err}");
            Err(err)
        }
    }
}

/// Renders and writes every artifact.
///
/// # Errors
///
/// Returns [`RenderError::MetricNotFound`] before writing anything if the
/// metric is not a column of `collection`. Export failures are reported in
/// the returned [`RenderReport`] instead.
pub fn render_all(
    collection: &RegionCollection,
    points: Option<&PointCollection>,
    options: &RenderOptions,
) -> Result<RenderReport, RenderError> {
    let metric = options.metric.as_str();
    validate_metric(collection, metric)?;

    let mut diagnostics = Vec::new();

    let secondary = options.secondary_metric.as_deref().filter(|secondary| {
        let present = collection.schema().contains(secondary);
        if !present {
            let message = format!("Secondary metric '{secondary}' not found; omitted");
            log::warn!("{message}");
            diagnostics.push(message);
        }
        present
    });

    let scale = ColorScale::build(&collection.metric_values(metric));
    if scale.domain().is_none() {
        let message = format!("Metric '{metric}' has no numeric values; every region is unfilled");
        log::warn!("{message}");
        diagnostics.push(message);
    }
    let popups = build_popups(collection, metric, secondary);

    let outputs = &options.outputs;

    let map = InteractiveMap::compose(
        collection,
        metric,
        &scale,
        &popups,
        points,
        &options.interactive,
    );
    let html = tag(
        Artifact::InteractiveHtml,
        &outputs.html,
        export::write_interactive_html(&map, &outputs.html),
    );

    let image = static_map::render_static(collection, metric, &scale);
    let image = tag(
        Artifact::StaticImage,
        &outputs.image,
        export::save_static_image(&image, &outputs.image),
    );

    let csv = tag(
        Artifact::MetricsCsv,
        &outputs.csv,
        export::write_metrics_csv(collection, metric, secondary, &outputs.csv),
    );

    Ok(RenderReport {
        html,
        image,
        csv,
        diagnostics,
    })
}
