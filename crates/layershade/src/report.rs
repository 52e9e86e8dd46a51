//! Summaries printed by `layershade --check`.

use serde::Serialize;

use crate::bootstrap::{LoadedScene, PreparedLayer, RunSettings};

#[derive(Debug, Serialize)]
pub struct SceneSummary {
    pub origin: String,
    pub width: u32,
    pub height: u32,
    pub quality_reduction: u32,
    pub target_fps: Option<f32>,
    pub validation: String,
    pub fps_report_interval_ms: u128,
    pub layers: Vec<LayerSummary>,
}

#[derive(Debug, Serialize)]
pub struct LayerSummary {
    pub index: usize,
    pub label: String,
    pub source: String,
    pub uniforms: Vec<String>,
    pub animated: usize,
}

pub fn describe(
    loaded: &LoadedScene,
    settings: &RunSettings,
    layers: &[PreparedLayer],
) -> SceneSummary {
    SceneSummary {
        origin: loaded.origin.to_string(),
        width: settings.size.width,
        height: settings.size.height,
        quality_reduction: settings.options.quality_reduction,
        target_fps: settings.options.clock.target_fps,
        validation: settings.options.validation.to_string(),
        fps_report_interval_ms: settings.options.fps_report_interval.as_millis(),
        layers: layers
            .iter()
            .enumerate()
            .map(|(index, layer)| LayerSummary {
                index,
                label: layer.label.clone(),
                source: layer.shaders.to_string(),
                uniforms: layer.uniforms.iter().map(|(name, _)| name.clone()).collect(),
                animated: layer
                    .uniforms
                    .iter()
                    .filter(|(_, binding)| binding.value.is_animated())
                    .count(),
            })
            .collect(),
    }
}

pub fn print_text(summary: &SceneSummary) {
    println!("Scene: {}", summary.origin);
    println!(
        "  surface:  {}x{} (quality reduction {})",
        summary.width, summary.height, summary.quality_reduction
    );
    match summary.target_fps {
        Some(fps) if fps > 0.0 => println!("  fps cap:  {fps}"),
        _ => println!("  fps cap:  none"),
    }
    println!("  shaders:  {} on build failure", summary.validation);
    println!("Layers (drawn in order):");
    for layer in &summary.layers {
        println!(
            "  [{}] {}: {}, {} uniforms ({} animated)",
            layer.index,
            layer.label,
            layer.source,
            layer.uniforms.len(),
            layer.animated
        );
    }
}

pub fn print_json(summary: &SceneSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
