//! Artifact writers.
//!
//! Each writer reports an [`ExportErrorKind`]; [`crate::render_all`] tags it
//! with the artifact and path.

use std::path::Path;

use image::RgbaImage;
use region_map_regions_models::{AttributeValue, NAME_COLUMN, REGION_ID_COLUMN, RegionCollection};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::interactive::InteractiveMap;

/// The three outputs of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum Artifact {
    #[strum(serialize = "interactive map")]
    InteractiveHtml,
    #[strum(serialize = "static image")]
    StaticImage,
    #[strum(serialize = "metrics CSV")]
    MetricsCsv,
}

/// Underlying cause of a failed export.
#[derive(Debug, Error)]
pub enum ExportErrorKind {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A single artifact that could not be written. Never aborts its siblings.
#[derive(Debug, Error)]
#[error("Failed to write {artifact} to {}: {kind}", path.display())]
pub struct ExportError {
    pub artifact: Artifact,
    pub path: std::path::PathBuf,
    #[source]
    pub kind: ExportErrorKind,
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Writes the interactive map document.
///
/// # Errors
///
/// Fails if serialization or the file write fails.
pub fn write_interactive_html(map: &InteractiveMap, path: &Path) -> Result<(), ExportErrorKind> {
    let html = map.to_html()?;
    ensure_parent(path)?;
    std::fs::write(path, html)?;
    Ok(())
}

/// Saves the static map as PNG.
///
/// # Errors
///
/// Fails if the directory cannot be created or the PNG cannot be written.
pub fn save_static_image(image: &RgbaImage, path: &Path) -> Result<(), ExportErrorKind> {
    ensure_parent(path)?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Header row of the metrics export.
#[must_use]
pub fn metrics_csv_header(
    collection: &RegionCollection,
    metric: &str,
    secondary: Option<&str>,
) -> Vec<String> {
    let mut header = vec![REGION_ID_COLUMN.to_owned()];
    if collection.has_names() {
        header.push(NAME_COLUMN.to_owned());
    }
    // A metric may name a column that is already present, e.g. `name`.
    if !header.iter().any(|column| column == metric) {
        header.push(metric.to_owned());
    }
    let secondary = secondary
        .filter(|s| collection.schema().contains(s) && !header.iter().any(|column| column == s));
    if let Some(secondary) = secondary {
        header.push(secondary.to_owned());
    }
    header
}

/// Writes the flat metrics table to any writer.
///
/// # Errors
///
/// Fails if a record cannot be written.
pub fn write_metrics<W: std::io::Write>(
    writer: W,
    collection: &RegionCollection,
    metric: &str,
    secondary: Option<&str>,
) -> Result<(), ExportErrorKind> {
    let header = metrics_csv_header(collection, metric, secondary);
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&header)?;

    for region in collection {
        let record = header.iter().map(|column| match column.as_str() {
            REGION_ID_COLUMN => region.region_id.to_string(),
            NAME_COLUMN => region.name.clone().unwrap_or_default(),
            other => region
                .attribute(other)
                .map(AttributeValue::to_string)
                .unwrap_or_default(),
        });
        csv.write_record(record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes the flat metrics CSV to `path`.
///
/// # Errors
///
/// Fails if the directory or file cannot be created or written.
pub fn write_metrics_csv(
    collection: &RegionCollection,
    metric: &str,
    secondary: Option<&str>,
    path: &Path,
) -> Result<(), ExportErrorKind> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path)?;
    write_metrics(std::io::BufWriter::new(file), collection, metric, secondary)
}
