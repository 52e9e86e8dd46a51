//! Turns CLI arguments and the on-disk scene into everything the window needs
//! before any graphics object exists: the scene itself, the surface size, the
//! renderer options, and each layer's shader text with its uniform table.
//!
//! Types:
//!
//! - `SceneOrigin` records where the scene came from for logs and `--check`.
//! - `LoadedScene` pairs a validated `SceneConfig` with its origin.
//! - `RunSettings` carries the size, options, and frame limits after CLI overrides.
//! - `PreparedLayer` and `ShaderText` hold a layer ready to compile.
//!
//! Functions:
//!
//! - `resolve_scene` applies the argument > config file > built-in precedence.
//! - `run_settings` overlays CLI flags on scene values.
//! - `prepare_layers` reads shader files and builds uniform tables.
//! - `parse_surface_size` parses `WIDTHxHEIGHT` strings.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use layerconfig::{LayerSource, SceneConfig};
use renderer::{Preset, RendererOptions, SurfaceSize, UniformTable, ValidationPolicy};
use scheduler::ClockOptions;
use tracing::{debug, info};

use crate::cli::RunArgs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneOrigin {
    Argument(PathBuf),
    ConfigDir(PathBuf),
    Builtin,
}

impl fmt::Display for SceneOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneOrigin::Argument(path) | SceneOrigin::ConfigDir(path) => {
                write!(f, "{}", path.display())
            }
            SceneOrigin::Builtin => f.write_str("built-in scene"),
        }
    }
}

#[derive(Debug)]
pub struct LoadedScene {
    pub scene: SceneConfig,
    pub origin: SceneOrigin,
}

/// Loads `explicit` when given, else `default_file` when it exists, else the
/// built-in scene.
pub fn resolve_scene(explicit: Option<&Path>, default_file: &Path) -> Result<LoadedScene> {
    let (scene, origin) = match explicit {
        Some(path) => (
            SceneConfig::load(path)
                .with_context(|| format!("failed to load scene {}", path.display()))?,
            SceneOrigin::Argument(path.to_path_buf()),
        ),
        None if default_file.is_file() => (
            SceneConfig::load(default_file)
                .with_context(|| format!("failed to load scene {}", default_file.display()))?,
            SceneOrigin::ConfigDir(default_file.to_path_buf()),
        ),
        None => (
            SceneConfig::builtin().context("built-in scene is invalid")?,
            SceneOrigin::Builtin,
        ),
    };
    info!(origin = %origin, layers = scene.layers.len(), "resolved scene");
    Ok(LoadedScene { scene, origin })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub size: SurfaceSize,
    pub options: RendererOptions,
    pub show_fps: bool,
    pub frame_limit: Option<u64>,
}

pub fn run_settings(scene: &SceneConfig, args: &RunArgs) -> Result<RunSettings> {
    let size = match args.size.as_deref() {
        Some(spec) => {
            let (width, height) = parse_surface_size(spec)?;
            SurfaceSize::new(width, height)
        }
        None => scene.surface_size(SurfaceSize::default()),
    };

    let mut options = scene.renderer_options();
    if let Some(fps) = args.fps {
        if !fps.is_finite() || fps < 0.0 {
            anyhow::bail!("--fps must be a non-negative number");
        }
        options.clock = ClockOptions::with_target_fps(Some(fps));
    }
    if let Some(quality) = args.quality {
        options.quality_reduction = quality;
    }
    if args.strict {
        options.validation = ValidationPolicy::Reject;
    }

    if args.frames == Some(0) {
        anyhow::bail!("--frames must be greater than zero");
    }

    Ok(RunSettings {
        size,
        options,
        show_fps: args.show_fps,
        frame_limit: args.frames,
    })
}

/// Shader text for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderText {
    Preset(Preset),
    Files {
        vertex_path: PathBuf,
        fragment_path: PathBuf,
        vertex: String,
        fragment: String,
    },
}

impl fmt::Display for ShaderText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderText::Preset(preset) => write!(f, "preset {preset}"),
            ShaderText::Files {
                vertex_path,
                fragment_path,
                ..
            } => write!(f, "{} + {}", vertex_path.display(), fragment_path.display()),
        }
    }
}

#[derive(Debug)]
pub struct PreparedLayer {
    pub label: String,
    pub shaders: ShaderText,
    pub uniforms: UniformTable,
}

/// Reads every layer's shader files and builds its uniform table for `size`.
pub fn prepare_layers(scene: &SceneConfig, size: SurfaceSize) -> Result<Vec<PreparedLayer>> {
    scene
        .layers
        .iter()
        .enumerate()
        .map(|(index, layer)| -> Result<PreparedLayer> {
            let label = layer.label(index);
            let shaders = match layer.source().with_context(|| format!("{label}: bad source"))? {
                LayerSource::Preset(preset) => ShaderText::Preset(preset),
                LayerSource::Files { vertex, fragment } => ShaderText::Files {
                    vertex: read_shader(&label, &vertex)?,
                    fragment: read_shader(&label, &fragment)?,
                    vertex_path: vertex,
                    fragment_path: fragment,
                },
            };
            let uniforms = layer
                .uniform_table(size)
                .with_context(|| format!("{label}: bad uniforms"))?;
            debug!(layer = %label, source = %shaders, uniforms = uniforms.len(), "prepared layer");
            Ok(PreparedLayer {
                label,
                shaders,
                uniforms,
            })
        })
        .collect()
}

fn read_shader(label: &str, path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("{label}: failed to read shader {}", path.display()))
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 1920x1080"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        anyhow::bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}
