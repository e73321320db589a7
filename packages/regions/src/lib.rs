#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input stages of the region map pipeline.
//!
//! * [`loader`] resolves the geometry source and produces a
//!   [`RegionCollection`](region_map_regions_models::RegionCollection),
//!   downloading the example dataset when asked to.
//! * [`joiner`] left-joins an external metrics table onto the regions.
//! * [`points`] parses the optional point overlay.
//!
//! Every stage returns [`RegionError`]; which variants are terminal is
//! decided by the caller.

pub mod geometry;
pub mod joiner;
pub mod loader;
pub mod points;
pub mod progress;
pub mod tables;

use thiserror::Error;

/// Errors produced while loading or joining pipeline inputs.
#[derive(Debug, Error)]
pub enum RegionError {
    /// No usable geometry source was configured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is missing or conflicting.
        message: String,
    },

    /// A remote fetch or file read failed.
    #[error("Data source error ({origin}): {message}")]
    DataSource {
        /// URL or path that failed.
        origin: String,
        /// Underlying failure.
        message: String,
    },

    /// An input table lacks required columns.
    #[error(
        "Input validation error in {input}: missing required column(s) [{}] (found: [{}])",
        .missing.join(", "),
        .available.join(", ")
    )]
    InputValidation {
        /// Which input failed (e.g. a file path).
        input: String,
        /// Logical fields that could not be resolved.
        missing: Vec<String>,
        /// Columns the input does have.
        available: Vec<String>,
    },
}

impl RegionError {
    /// Builds a [`RegionError::DataSource`] from any displayable failure.
    pub fn data_source(origin: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::DataSource {
            origin: origin.into(),
            message: err.to_string(),
        }
    }

    /// Builds a [`RegionError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_validation_message_lists_columns() {
        let err = RegionError::InputValidation {
            input: "points.csv".to_owned(),
            missing: vec!["longitude".to_owned()],
            available: vec!["lat".to_owned(), "name".to_owned()],
        };

        assert_eq!(
            err.to_string(),
            "Input validation error in points.csv: missing required column(s) [longitude] (found: [lat, name])"
        );
    }
}
