//! Run configuration.
//!
//! Settings come from three layers, lowest precedence first: built-in
//! defaults, an optional TOML file, and command-line flags. The merged
//! result is a [`PipelineConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use region_map_regions::RegionError;
use region_map_regions::loader::{ExampleSource, GeometrySource};
use region_map_render::{OutputPaths, RenderOptions};
use serde::Deserialize;
use thiserror::Error;

/// Errors reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unexpected keys.
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// `[source]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    pub example: Option<bool>,
    pub geometry: Option<PathBuf>,
    pub example_url: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
    pub seed: Option<u64>,
}

/// `[inputs]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputsSection {
    pub metrics: Option<PathBuf>,
    pub points: Option<PathBuf>,
}

/// `[render]` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub metric: Option<String>,
    pub secondary_metric: Option<String>,
    pub center: Option<[f64; 2]>,
    pub zoom: Option<u8>,
    pub tiles_url: Option<String>,
    pub tiles_attribution: Option<String>,
}

/// `[outputs]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputsSection {
    pub html: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

/// The config file as written on disk. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub source: SourceSection,
    pub inputs: InputsSection,
    pub render: RenderSection,
    pub outputs: OutputsSection,
}

impl FileConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Read`] if the file cannot be read
    /// * [`ConfigError::Parse`] if it is not a valid config
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parses config text; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values given on the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub example: bool,
    pub geometry: Option<PathBuf>,
    pub metrics: Option<PathBuf>,
    pub points: Option<PathBuf>,
    pub metric: Option<String>,
    pub secondary_metric: Option<String>,
    pub no_secondary_metric: bool,
    pub html_out: Option<PathBuf>,
    pub image_out: Option<PathBuf>,
    pub csv_out: Option<PathBuf>,
    pub seed: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub use_example: bool,
    pub geometry: Option<PathBuf>,
    pub example: ExampleSource,
    pub metrics: Option<PathBuf>,
    pub points: Option<PathBuf>,
    pub render: RenderOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::resolve(FileConfig::default(), &Overrides::default())
    }
}

impl PipelineConfig {
    /// Merges defaults, the file layer, and command-line overrides.
    ///
    /// A geometry selection on the command line (`--example` or
    /// `--geometry`) replaces the file's selection as a whole.
    #[must_use]
    pub fn resolve(file: FileConfig, cli: &Overrides) -> Self {
        let FileConfig {
            source,
            inputs,
            render,
            outputs,
        } = file;

        let (use_example, geometry) = if cli.example || cli.geometry.is_some() {
            (cli.example, cli.geometry.clone())
        } else {
            (source.example.unwrap_or(false), source.geometry)
        };

        let defaults = ExampleSource::default();
        let example = ExampleSource {
            url: source.example_url.unwrap_or(defaults.url),
            timeout: cli
                .fetch_timeout_secs
                .or(source.fetch_timeout_secs)
                .map_or(defaults.timeout, Duration::from_secs),
            seed: cli.seed.or(source.seed).unwrap_or(defaults.seed),
        };

        let base = RenderOptions::default();
        let secondary_metric = if cli.no_secondary_metric {
            None
        } else {
            cli.secondary_metric
                .clone()
                .or(render.secondary_metric)
                .or(base.secondary_metric)
        };

        let mut interactive = base.interactive;
        if let Some(center) = render.center {
            interactive.center = center;
        }
        if let Some(zoom) = render.zoom {
            interactive.zoom = zoom;
        }
        if let Some(url) = render.tiles_url {
            interactive.tiles_url = url;
        }
        if let Some(attribution) = render.tiles_attribution {
            interactive.tiles_attribution = attribution;
        }

        let default_outputs = OutputPaths::default();
        let outputs = OutputPaths {
            html: cli
                .html_out
                .clone()
                .or(outputs.html)
                .unwrap_or(default_outputs.html),
            image: cli
                .image_out
                .clone()
                .or(outputs.image)
                .unwrap_or(default_outputs.image),
            csv: cli
                .csv_out
                .clone()
                .or(outputs.csv)
                .unwrap_or(default_outputs.csv),
        };

        Self {
            use_example,
            geometry,
            example,
            metrics: cli.metrics.clone().or(inputs.metrics),
            points: cli.points.clone().or(inputs.points),
            render: RenderOptions {
                metric: cli.metric.clone().or(render.metric).unwrap_or(base.metric),
                secondary_metric,
                interactive,
                outputs,
            },
        }
    }

    /// Resolves the geometry source.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Configuration`] unless exactly one source is
    /// selected.
    pub fn geometry_source(&self) -> Result<GeometrySource, RegionError> {
        GeometrySource::resolve(self.use_example, self.geometry.clone(), self.example.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
[source]
geometry = "data/counties.geojson"
seed = 7

[inputs]
metrics = "data/metrics.csv"

[render]
metric = "pollution_index"
center = [35.0, -80.0]
zoom = 6

[outputs]
html = "out/map.html"
"#;

    fn file() -> FileConfig {
        FileConfig::parse(FILE, Path::new("region_map.toml")).unwrap()
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = PipelineConfig::default();

        assert!(!config.use_example);
        assert_eq!(config.render.metric, "crime_rate");
        assert_eq!(
            config.render.secondary_metric.as_deref(),
            Some("pollution_index")
        );
        assert_eq!(
            config.render.outputs.html,
            PathBuf::from("interactive_geospatial_map.html")
        );
        assert_eq!(config.example.seed, 42);
        assert_eq!(config.example.timeout, Duration::from_secs(30));
        assert!(matches!(
            config.geometry_source(),
            Err(RegionError::Configuration { .. })
        ));
    }

    #[test]
    fn file_overrides_defaults() {
        let config = PipelineConfig::resolve(file(), &Overrides::default());

        assert_eq!(config.geometry, Some(PathBuf::from("data/counties.geojson")));
        assert_eq!(config.metrics, Some(PathBuf::from("data/metrics.csv")));
        assert_eq!(config.render.metric, "pollution_index");
        assert_eq!(config.render.interactive.center, [35.0, -80.0]);
        assert_eq!(config.render.interactive.zoom, 6);
        assert_eq!(config.render.outputs.html, PathBuf::from("out/map.html"));
        assert_eq!(
            config.render.outputs.csv,
            PathBuf::from("region_metrics_export.csv")
        );
        assert_eq!(config.example.seed, 7);
    }

    #[test]
    fn flags_override_file() {
        let cli = Overrides {
            example: true,
            metric: Some("crime_rate".to_owned()),
            html_out: Some(PathBuf::from("cli.html")),
            seed: Some(99),
            no_secondary_metric: true,
            ..Overrides::default()
        };
        let config = PipelineConfig::resolve(file(), &cli);

        assert!(config.use_example);
        assert_eq!(config.geometry, None);
        assert_eq!(config.render.metric, "crime_rate");
        assert_eq!(config.render.secondary_metric, None);
        assert_eq!(config.render.outputs.html, PathBuf::from("cli.html"));
        assert_eq!(config.example.seed, 99);
        assert!(matches!(
            config.geometry_source(),
            Ok(GeometrySource::Example(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::parse("[render]\ncolour = \"red\"\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FileConfig::load(Path::new("/no/such/region_map.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
