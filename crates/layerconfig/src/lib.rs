//! Scene files for LayerShade.
//!
//! A scene is a TOML document describing the surface, renderer options and
//! the ordered list of shader layers:
//!
//! ```toml
//! version = 1
//! width = 800
//! height = 600
//! quality_reduction = 0
//! fps_report_interval = "500ms"
//! validation = "warn"
//!
//! [[layers]]
//! preset = "waves"
//! [layers.uniforms.u_speed]
//! kind = "uniform1f"
//! value = 0.4
//! [layers.uniforms.u_time]
//! kind = "uniform1f"
//! animate = { rate = 0.001, offset = 0.0 }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use renderer::{
    ClockOptions, Preset, RendererOptions, SurfaceSize, UniformBinding, UniformData, UniformKind,
    UniformTable, ValidationPolicy,
};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Scene shown when no scene file is available.
pub const BUILTIN_SCENE: &str = r#"
version = 1
quality_reduction = 1
fps_report_interval = "500ms"

[[layers]]
name = "waves"
preset = "waves"

[[layers]]
name = "glow"
preset = "blurred-colors"
[layers.uniforms.alpha]
kind = "uniform1f"
value = 0.35
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality_reduction: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_millis_opt",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_millis_opt"
    )]
    pub fps_report_interval: Option<Duration>,
    #[serde(default)]
    pub target_fps: Option<f32>,
    #[serde(
        default,
        deserialize_with = "deserialize_parsed_opt",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_display_opt"
    )]
    pub validation: Option<ValidationPolicy>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_parsed_opt",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_display_opt"
    )]
    pub preset: Option<Preset>,
    #[serde(default)]
    pub vertex: Option<PathBuf>,
    #[serde(default)]
    pub fragment: Option<PathBuf>,
    /// Start from the preset's own uniform table; entries below override it.
    #[serde(default = "default_true")]
    pub preset_uniforms: bool,
    #[serde(default)]
    pub uniforms: BTreeMap<String, UniformConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UniformConfig {
    /// Upload kind as a WebGL method name, e.g. `uniform4fv`.
    pub kind: String,
    #[serde(default)]
    pub value: Option<UniformLiteral>,
    #[serde(default)]
    pub animate: Option<Animation>,
}

/// A uniform literal as written in TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum UniformLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<UniformLiteral>),
}

/// Linear function of frame time: `time_ms * rate + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Animation {
    pub rate: f64,
    #[serde(default)]
    pub offset: f64,
}

/// Where a layer's shader text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSource {
    Preset(Preset),
    Files { vertex: PathBuf, fragment: PathBuf },
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSource::Preset(preset) => write!(f, "preset {preset}"),
            LayerSource::Files { vertex, fragment } => {
                write!(f, "{} + {}", vertex.display(), fragment.display())
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn deserialize_parsed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| value.parse::<T>().map_err(de::Error::custom))
        .transpose()
}

fn serialize_display_opt<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: fmt::Display,
{
    match value {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_millis_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(duration) => {
            serializer.serialize_str(&humantime::format_duration(*duration).to_string())
        }
        None => serializer.serialize_none(),
    }
}

fn deserialize_millis_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of milliseconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_millis(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_millis(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v / 1000.0)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a scene file. Relative shader paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scene = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            scene.resolve_paths(base);
        }
        tracing::debug!(path = %path.display(), layers = scene.layers.len(), "loaded scene");
        Ok(scene)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_SCENE)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for layer in &mut self.layers {
            for path in [&mut layer.vertex, &mut layer.fragment].into_iter().flatten() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    /// Requested surface size, filling a missing axis from `fallback`.
    pub fn surface_size(&self, fallback: SurfaceSize) -> SurfaceSize {
        SurfaceSize::new(
            self.width.unwrap_or(fallback.width),
            self.height.unwrap_or(fallback.height),
        )
    }

    /// Renderer options with scene values applied over the defaults.
    pub fn renderer_options(&self) -> RendererOptions {
        let defaults = RendererOptions::default();
        RendererOptions {
            validation: self.validation.unwrap_or(defaults.validation),
            quality_reduction: self.quality_reduction.unwrap_or(defaults.quality_reduction),
            fps_report_interval: self
                .fps_report_interval
                .unwrap_or(defaults.fps_report_interval),
            clock: ClockOptions::with_target_fps(self.target_fps.or(defaults.clock.target_fps)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.layers.is_empty() {
            return Err(ConfigError::Invalid(
                "scene must define at least one layer".into(),
            ));
        }

        for (axis, value) in [("width", self.width), ("height", self.height)] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{axis} must be greater than zero")));
            }
        }

        if let Some(fps) = self.target_fps {
            if fps.is_nan() || fps < 0.0 {
                return Err(ConfigError::Invalid("target_fps must be >= 0".into()));
            }
        }

        if self.fps_report_interval == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "fps_report_interval must be greater than zero".into(),
            ));
        }

        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate(index)?;
        }

        Ok(())
    }
}

impl LayerConfig {
    /// Label used in messages: the configured name or `layer <index>`.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("layer {index}"))
    }

    pub fn source(&self) -> Result<LayerSource, ConfigError> {
        match (&self.preset, &self.vertex, &self.fragment) {
            (Some(preset), None, None) => Ok(LayerSource::Preset(*preset)),
            (None, Some(vertex), Some(fragment)) => Ok(LayerSource::Files {
                vertex: vertex.clone(),
                fragment: fragment.clone(),
            }),
            (Some(_), _, _) => Err(ConfigError::Invalid(
                "a layer may name a preset or a vertex/fragment pair, not both".into(),
            )),
            (None, None, None) => Err(ConfigError::Invalid(
                "a layer must name a preset or a vertex/fragment pair".into(),
            )),
            (None, _, _) => Err(ConfigError::Invalid(
                "file-backed layers need both vertex and fragment".into(),
            )),
        }
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let label = self.label(index);
        self.source()
            .map_err(|err| ConfigError::Invalid(format!("{label}: {}", invalid_message(err))))?;
        for (name, uniform) in &self.uniforms {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{label}: uniform names may not be empty"
                )));
            }
            uniform
                .binding()
                .map_err(|err| ConfigError::Invalid(format!("{label}: uniform '{name}': {err}")))?;
        }
        Ok(())
    }

    /// Builds the table this layer is registered with.
    pub fn uniform_table(&self, size: SurfaceSize) -> Result<UniformTable, ConfigError> {
        let mut table = match self.preset {
            Some(preset) if self.preset_uniforms => preset.default_uniforms(size),
            _ => UniformTable::new(),
        };
        for (name, uniform) in &self.uniforms {
            let binding = uniform
                .binding()
                .map_err(|err| ConfigError::Invalid(format!("uniform '{name}': {err}")))?;
            table.insert(name.clone(), binding);
        }
        Ok(table)
    }
}

fn invalid_message(err: ConfigError) -> String {
    match err {
        ConfigError::Invalid(message) => message,
        other => other.to_string(),
    }
}

impl UniformConfig {
    pub fn kind(&self) -> Result<UniformKind, String> {
        self.kind.parse::<UniformKind>().map_err(|err| err.to_string())
    }

    /// Converts the TOML description into a renderer binding.
    pub fn binding(&self) -> Result<UniformBinding, String> {
        let kind = self.kind()?;
        match (&self.value, &self.animate) {
            (Some(_), Some(_)) => Err("set either value or animate, not both".into()),
            (None, None) => Err("one of value or animate is required".into()),
            (Some(literal), None) => {
                let data = literal.to_data(kind)?;
                kind.check(&data).map_err(|err| err.to_string())?;
                Ok(UniformBinding::constant(kind, data))
            }
            (None, Some(animation)) => animation.binding(kind),
        }
    }
}

impl Animation {
    fn binding(self, kind: UniformKind) -> Result<UniformBinding, String> {
        if !self.rate.is_finite() || !self.offset.is_finite() {
            return Err("animate rate and offset must be finite".into());
        }
        let Animation { rate, offset } = self;
        match kind {
            UniformKind::Float1 => Ok(UniformBinding::animated(kind, move |time: f64| {
                (time * rate + offset) as f32
            })),
            UniformKind::Int1 => Ok(UniformBinding::animated(kind, move |time: f64| {
                (time * rate + offset).round() as i32
            })),
            other => Err(format!(
                "animate only supports uniform1f and uniform1i, not {other}"
            )),
        }
    }
}

impl UniformLiteral {
    fn flatten(&self, out: &mut Vec<UniformLiteral>) {
        match self {
            UniformLiteral::List(items) => items.iter().for_each(|item| item.flatten(out)),
            scalar => out.push(scalar.clone()),
        }
    }

    /// Converts to uniform data of the scalar type `kind` expects. Nested
    /// lists are flattened, so `[[1, 0], [0, 1]]` works for a `mat2`.
    pub fn to_data(&self, kind: UniformKind) -> Result<UniformData, String> {
        let mut scalars = Vec::new();
        self.flatten(&mut scalars);
        if kind.is_integer() {
            scalars
                .iter()
                .map(|scalar| match scalar {
                    UniformLiteral::Bool(flag) => Ok(i32::from(*flag)),
                    UniformLiteral::Int(value) => i32::try_from(*value)
                        .map_err(|_| format!("{value} does not fit a 32-bit integer")),
                    UniformLiteral::Float(value) => {
                        Err(format!("{kind} expects integers, got {value}"))
                    }
                    UniformLiteral::List(_) => unreachable!("lists are flattened"),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(UniformData::Int)
        } else {
            scalars
                .iter()
                .map(|scalar| match scalar {
                    UniformLiteral::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
                    UniformLiteral::Int(value) => Ok(*value as f32),
                    UniformLiteral::Float(value) => Ok(*value as f32),
                    UniformLiteral::List(_) => unreachable!("lists are flattened"),
                })
                .collect::<Result<Vec<_>, String>>()
                .map(UniformData::Float)
        }
    }
}
