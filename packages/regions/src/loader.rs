//! Region loading: source resolution, example download, and metric
//! synthesis.
//!
//! Exactly one geometry source must be configured. Example mode downloads a
//! public polygon dataset into a temporary file, numbers the regions, and
//! synthesizes sample metrics from a seeded RNG so runs are reproducible.

use std::io::Write as _;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use region_map_regions_models::{AttributeValue, RegionCollection};
use tempfile::NamedTempFile;

use crate::RegionError;
use crate::geometry::{IdPolicy, read_regions};

/// Public US states polygons used by example mode.
pub const DEFAULT_EXAMPLE_URL: &str =
    "https://raw.githubusercontent.com/PublicaMundi/MappingAPI/master/data/geojson/us-states.json";

/// Upper bound on the example download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Seed used for metric synthesis unless overridden.
pub const DEFAULT_SEED: u64 = 42;

/// Synthesized crime rate column.
pub const CRIME_RATE_COLUMN: &str = "crime_rate";

/// Synthesized pollution index column.
pub const POLLUTION_INDEX_COLUMN: &str = "pollution_index";

/// Range of synthesized crime rates.
pub const CRIME_RATE_RANGE: RangeInclusive<f64> = 100.0..=800.0;

/// Range of synthesized pollution indices.
pub const POLLUTION_INDEX_RANGE: RangeInclusive<f64> = 10.0..=80.0;

const USER_AGENT: &str = concat!("region_map/", env!("CARGO_PKG_VERSION"));

/// Settings for example mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleSource {
    /// Dataset URL.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Seed for metric synthesis.
    pub seed: u64,
}

impl Default for ExampleSource {
    fn default() -> Self {
        Self {
            url: DEFAULT_EXAMPLE_URL.to_owned(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            seed: DEFAULT_SEED,
        }
    }
}

/// Where region polygons come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometrySource {
    /// Download the example dataset and synthesize metrics.
    Example(ExampleSource),
    /// Read a local `GeoJSON` file.
    File(PathBuf),
}

impl GeometrySource {
    /// Resolves the configured source.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Configuration`] when neither or both of
    /// `use_example` and `path` are set.
    pub fn resolve(
        use_example: bool,
        path: Option<PathBuf>,
        example: ExampleSource,
    ) -> Result<Self, RegionError> {
        match (use_example, path) {
            (true, None) => Ok(Self::Example(example)),
            (false, Some(path)) => Ok(Self::File(path)),
            (false, None) => Err(RegionError::configuration(
                "no geometry source configured: pass --geometry <path> or --example",
            )),
            (true, Some(path)) => Err(RegionError::configuration(format!(
                "ambiguous geometry source: both --example and --geometry {} were given",
                path.display()
            ))),
        }
    }

    /// Human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Example(example) => format!("example dataset {}", example.url),
            Self::File(path) => format!("file {}", path.display()),
        }
    }
}

/// Loads the region collection from the resolved source.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] if the download, file read, or
/// `GeoJSON` parse fails.
pub async fn load_regions(source: &GeometrySource) -> Result<RegionCollection, RegionError> {
    match source {
        GeometrySource::File(path) => read_regions(path, IdPolicy::PreserveIfValid),
        GeometrySource::Example(example) => {
            let download = fetch_to_tempfile(&example.url, example.timeout).await?;
            let regions = read_regions(download.path(), IdPolicy::Reassign)
                .map_err(|e| relabel(e, &example.url))?;
            Ok(synthesize_example_metrics(regions, example.seed))
        }
    }
}

/// Downloads `url` into a temporary file that is deleted when dropped.
///
/// # Errors
///
/// Returns [`RegionError::DataSource`] on connection failure, timeout,
/// non-success status, or local write failure.
pub async fn fetch_to_tempfile(url: &str, timeout: Duration) -> Result<NamedTempFile, RegionError> {
    log::info!("Downloading example dataset from {url}...");

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| RegionError::data_source(url, e))?;

    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| fetch_error(url, &e, timeout))?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| fetch_error(url, &e, timeout))?;

    log::debug!("Downloaded {} bytes from {url}", bytes.len());

    let mut file = NamedTempFile::new().map_err(|e| RegionError::data_source(url, e))?;
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .map_err(|e| RegionError::data_source(url, e))?;

    Ok(file)
}

fn fetch_error(url: &str, err: &reqwest::Error, timeout: Duration) -> RegionError {
    if err.is_timeout() {
        RegionError::data_source(
            url,
            format!("request timed out after {}s", timeout.as_secs_f64()),
        )
    } else {
        RegionError::data_source(url, err)
    }
}

/// Reports parse failures of the temporary download against the URL rather
/// than the throwaway path.
fn relabel(err: RegionError, url: &str) -> RegionError {
    match err {
        RegionError::DataSource { message, .. } => RegionError::DataSource {
            origin: url.to_owned(),
            message,
        },
        other => other,
    }
}

/// Adds `crime_rate` and `pollution_index` to every region from an RNG
/// seeded with `seed`. Values are rounded to one decimal place.
#[must_use]
pub fn synthesize_example_metrics(mut regions: RegionCollection, seed: u64) -> RegionCollection {
    let mut rng = StdRng::seed_from_u64(seed);

    for index in 0..regions.len() {
        let crime_rate = round1(rng.gen_range(CRIME_RATE_RANGE));
        let pollution_index = round1(rng.gen_range(POLLUTION_INDEX_RANGE));
        regions.set_attribute(index, CRIME_RATE_COLUMN, AttributeValue::Number(crime_rate));
        regions.set_attribute(
            index,
            POLLUTION_INDEX_COLUMN,
            AttributeValue::Number(pollution_index),
        );
    }

    log::info!(
        "Synthesized {CRIME_RATE_COLUMN} and {POLLUTION_INDEX_COLUMN} for {} regions (seed {seed})",
        regions.len()
    );

    regions
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};
    use region_map_regions_models::RegionFeature;

    use super::*;

    fn unit_regions(count: u64) -> RegionCollection {
        let regions = (1..=count)
            .map(|id| {
                #[allow(clippy::cast_precision_loss)]
                let x = id as f64;
                RegionFeature::new(
                    id,
                    None,
                    MultiPolygon(vec![polygon![
                        (x: x, y: 0.0),
                        (x: x + 1.0, y: 0.0),
                        (x: x + 1.0, y: 1.0),
                    ]]),
                )
            })
            .collect();
        RegionCollection::new(regions).unwrap()
    }

    #[test]
    fn resolve_requires_a_source() {
        let err = GeometrySource::resolve(false, None, ExampleSource::default()).unwrap_err();
        assert!(matches!(err, RegionError::Configuration { .. }));
        assert!(err.to_string().contains("--geometry"));
    }

    #[test]
    fn resolve_rejects_both_sources() {
        let err = GeometrySource::resolve(
            true,
            Some(PathBuf::from("regions.geojson")),
            ExampleSource::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RegionError::Configuration { .. }));
    }

    #[test]
    fn resolve_picks_the_configured_source() {
        assert_eq!(
            GeometrySource::resolve(false, Some(PathBuf::from("a.geojson")), ExampleSource::default())
                .unwrap(),
            GeometrySource::File(PathBuf::from("a.geojson"))
        );
        assert!(matches!(
            GeometrySource::resolve(true, None, ExampleSource::default()).unwrap(),
            GeometrySource::Example(_)
        ));
    }

    #[test]
    fn synthesis_is_reproducible_and_in_range() {
        let first = synthesize_example_metrics(unit_regions(25), 7);
        let second = synthesize_example_metrics(unit_regions(25), 7);
        let other_seed = synthesize_example_metrics(unit_regions(25), 8);

        assert_eq!(first, second);
        assert_ne!(
            first.metric_values(CRIME_RATE_COLUMN),
            other_seed.metric_values(CRIME_RATE_COLUMN)
        );

        for value in first.metric_values(CRIME_RATE_COLUMN) {
            assert!(CRIME_RATE_RANGE.contains(&value.unwrap()));
        }
        for value in first.metric_values(POLLUTION_INDEX_COLUMN) {
            assert!(POLLUTION_INDEX_RANGE.contains(&value.unwrap()));
        }
        assert_eq!(
            first.columns(),
            ["region_id", CRIME_RATE_COLUMN, POLLUTION_INDEX_COLUMN]
        );
    }

    #[tokio::test]
    async fn file_mode_assigns_contiguous_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
              {"type":"Feature","properties":{"name":"A"},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
              {"type":"Feature","properties":{"name":"B"},"geometry":{"type":"Polygon","coordinates":[[[1,0],[2,0],[2,1],[1,0]]]}}
            ]}"#,
        )
        .unwrap();

        let regions = load_regions(&GeometrySource::File(path)).await.unwrap();
        let ids: Vec<u64> = regions.iter().map(|r| r.region_id).collect();

        assert_eq!(ids, vec![1, 2]);
        assert!(!regions.schema().contains(CRIME_RATE_COLUMN));
    }

    #[tokio::test]
    async fn load_regions_reads_file_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.geojson");
        std::fs::write(
            &path,
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#,
        )
        .unwrap();

        let regions = load_regions(&GeometrySource::File(path)).await.unwrap();
        assert_eq!(regions.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_a_data_source_error() {
        let err = load_regions(&GeometrySource::File(PathBuf::from("/no/such/regions.geojson")))
            .await
            .unwrap_err();
        assert!(matches!(err, RegionError::DataSource { .. }));
    }

    #[tokio::test]
    async fn unreachable_download_is_a_data_source_error() {
        let source = GeometrySource::Example(ExampleSource {
            url: "http://127.0.0.1:9/us-states.json".to_owned(),
            timeout: Duration::from_secs(2),
            seed: DEFAULT_SEED,
        });

        let err = load_regions(&source).await.unwrap_err();
        match err {
            RegionError::DataSource { origin, .. } => assert!(origin.contains("127.0.0.1:9")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
