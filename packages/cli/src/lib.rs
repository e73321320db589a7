#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the region map pipeline.
//!
//! [`config`] merges defaults, an optional TOML file and flags into a
//! [`PipelineConfig`](config::PipelineConfig); [`pipeline`] runs the stages;
//! [`interactive`] collects the same settings through terminal prompts.

pub mod config;
pub mod interactive;
pub mod pipeline;
