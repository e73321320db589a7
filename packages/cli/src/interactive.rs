//! Interactive configuration flow.
//!
//! Walks the user through the same settings the `render` subcommand takes,
//! starting from an already-resolved config so file values show up as
//! prompt defaults.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::PipelineConfig;

/// Geometry source choices.
enum SourceChoice {
    Example,
    File,
}

impl SourceChoice {
    const ALL: &[Self] = &[Self::Example, Self::File];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Example => "Example dataset (US states, synthesized metrics)",
            Self::File => "Local GeoJSON file",
        }
    }
}

/// Prompts for every run setting.
///
/// # Errors
///
/// Returns an error if a prompt fails (e.g. no terminal is attached).
pub fn prompt(mut config: PipelineConfig) -> Result<PipelineConfig, dialoguer::Error> {
    let labels: Vec<&str> = SourceChoice::ALL.iter().map(SourceChoice::label).collect();
    let default_source = usize::from(!config.use_example && config.geometry.is_some());

    let choice = Select::new()
        .with_prompt("Where should region polygons come from?")
        .items(&labels)
        .default(default_source)
        .interact()?;

    match SourceChoice::ALL[choice] {
        SourceChoice::Example => {
            config.use_example = true;
            config.geometry = None;

            let seed: String = Input::new()
                .with_prompt("Seed for synthesized metrics")
                .default(config.example.seed.to_string())
                .interact_text()?;
            config.example.seed = seed.trim().parse().unwrap_or(config.example.seed);
        }
        SourceChoice::File => {
            config.use_example = false;
            let current = config
                .geometry
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let path: String = Input::new()
                .with_prompt("GeoJSON path")
                .with_initial_text(current)
                .interact_text()?;
            config.geometry = Some(PathBuf::from(path.trim()));
        }
    }

    config.metrics = prompt_optional_path(
        "Metrics CSV (empty for none)",
        config.metrics.as_ref(),
    )?;
    config.points = prompt_optional_path(
        "Points CSV (empty for none)",
        config.points.as_ref(),
    )?;

    config.render.metric = Input::new()
        .with_prompt("Metric column")
        .default(config.render.metric.clone())
        .interact_text()?;

    let secondary: String = Input::new()
        .with_prompt("Secondary metric (empty for none)")
        .with_initial_text(config.render.secondary_metric.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    config.render.secondary_metric = Some(secondary.trim().to_owned()).filter(|s| !s.is_empty());

    let change_outputs = Confirm::new()
        .with_prompt("Change output paths?")
        .default(false)
        .interact()?;

    if change_outputs {
        let outputs = &mut config.render.outputs;
        outputs.html = prompt_path("Interactive map (HTML)", &outputs.html)?;
        outputs.image = prompt_path("Static image (PNG)", &outputs.image)?;
        outputs.csv = prompt_path("Metrics export (CSV)", &outputs.csv)?;
    }

    Ok(config)
}

fn prompt_path(prompt: &str, current: &std::path::Path) -> Result<PathBuf, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(current.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(input.trim()))
}

/// Prompts for a path that may be left empty.
fn prompt_optional_path(
    prompt: &str,
    current: Option<&PathBuf>,
) -> Result<Option<PathBuf>, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .with_initial_text(current.map(|p| p.display().to_string()).unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
}
