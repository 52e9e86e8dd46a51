//! Built-in effects: shader text plus the uniform table they expect.
//!
//! These are content rather than renderer logic; the renderer treats them
//! like any other [`crate::ProgramSource`].

use std::fmt;
use std::str::FromStr;

use crate::types::SurfaceSize;
use crate::uniforms::{UniformBinding, UniformKind, UniformTable};

/// Passthrough vertex stage for GLSL ES 3.00 fragment shaders.
pub const VERTEX_GLSL300: &str = "#version 300 es
precision mediump float;
in vec4 a_position;
void main() { gl_Position = a_position; }
";

/// Passthrough vertex stage for GLSL ES 1.00 fragment shaders.
pub const VERTEX_GLSL100: &str = "attribute vec4 a_position;
void main() { gl_Position = a_position; }
";

const WAVES_FRAGMENT: &str = r"#version 300 es
precision highp float;

out vec4 outColor;

uniform float u_time;
uniform vec2 u_resolution;
uniform vec4 u_background;
uniform vec4 u_color;
uniform float u_speed;
uniform float u_phase;
uniform float u_scale;
uniform float u_brightness;

mat2 turn(float angle) {
    float c = cos(angle);
    float s = sin(angle);
    return mat2(c, s, -s, c);
}

float field(vec2 p, float t) {
    vec2 drift = vec2(0.0);
    vec2 acc = vec2(0.0);
    float freq = 8.0;
    for (int i = 0; i < 15; i++) {
        p = turn(1.0) * p;
        drift = turn(1.0) * drift;
        vec2 layer = p * freq + float(i) + drift - t;
        drift += sin(layer);
        acc += (0.5 + 0.5 * cos(layer)) / freq;
        freq *= 1.2;
    }
    return acc.x + acc.y;
}

void main() {
    vec2 uv = gl_FragCoord.xy / u_resolution.xy - 0.5;
    float zoom = 0.75 * u_scale + 1e-4;
    uv *= 0.001 * (1.0 - step(1.0 - zoom, 1.0) / zoom) * u_resolution;
    uv += 0.5;

    float t = u_time * u_speed + u_phase * 10.0;
    float n = u_brightness * pow(field(uv, t), 3.0);
    n = max(0.0, n + pow(n, 12.0) - 0.5);

    vec3 rgb = mix(u_background.rgb * u_background.a, u_color.rgb * u_color.a, n);
    outColor = vec4(rgb, mix(u_background.a, u_color.a, n));
}
";

const BLURRED_COLORS_FRAGMENT: &str = r"precision highp float;

uniform vec2 u_resolution;
uniform float u_time;
uniform float alpha;
uniform vec4 u_colors[4];
uniform float u_blur;
uniform bool u_animate;
uniform float u_animate_speed;
uniform float u_frequency;

mat2 turn(float angle) {
    float s = sin(angle);
    float c = cos(angle);
    return mat2(c, -s, s, c);
}

vec2 hash2(vec2 p) {
    p = vec2(dot(p, vec2(2127.1, 81.17)), dot(p, vec2(1269.5, 283.37)));
    return fract(sin(p) * 43758.5453);
}

float gradient_noise(vec2 p) {
    vec2 i = floor(p);
    vec2 f = fract(p);
    vec2 u = f * f * (3.0 - 2.0 * f);
    float a = dot(-1.0 + 2.0 * hash2(i), f);
    float b = dot(-1.0 + 2.0 * hash2(i + vec2(1.0, 0.0)), f - vec2(1.0, 0.0));
    float c = dot(-1.0 + 2.0 * hash2(i + vec2(0.0, 1.0)), f - vec2(0.0, 1.0));
    float d = dot(-1.0 + 2.0 * hash2(i + vec2(1.0, 1.0)), f - vec2(1.0, 1.0));
    return 0.5 + 0.5 * mix(mix(a, b, u.x), mix(c, d, u.x), u.y);
}

void main() {
    vec2 uv = gl_FragCoord.xy / u_resolution.xy;
    float ratio = u_resolution.x / u_resolution.y;
    vec2 p = uv - 0.5;

    float speed = u_animate ? u_time * 10.0 * u_animate_speed : 0.0;
    float heading = gradient_noise(vec2(speed / 100.0, p.x * p.y));

    p.y /= ratio;
    p = turn(radians((heading - 0.5) * 720.0 + 180.0)) * p;
    p.y *= ratio;

    float frequency = 20.0 * u_frequency;
    float amplitude = 300.0 * (0.01 + u_blur);
    p.x += sin(p.y * frequency + speed) / amplitude;
    p.y += sin(p.x * frequency * 1.5 + speed) / (amplitude * 0.5);

    float across = smoothstep(-0.3, 0.2, (turn(radians(-5.0)) * p).x);
    vec4 top = mix(u_colors[0], u_colors[1], across);
    vec4 bottom = mix(u_colors[2], u_colors[3], across);
    vec4 color = mix(top, bottom, smoothstep(0.5, -0.3, p.y));
    gl_FragColor = vec4(color.rgb, color.a * alpha);
}
";

/// Named built-in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Rotating layered-noise field blended between two colours.
    Waves,
    /// Four-colour gradient warped by animated noise.
    BlurredColors,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Waves, Preset::BlurredColors];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Waves => "waves",
            Preset::BlurredColors => "blurred-colors",
        }
    }

    pub fn vertex_source(self) -> &'static str {
        match self {
            Preset::Waves => VERTEX_GLSL300,
            Preset::BlurredColors => VERTEX_GLSL100,
        }
    }

    pub fn fragment_source(self) -> &'static str {
        match self {
            Preset::Waves => WAVES_FRAGMENT,
            Preset::BlurredColors => BLURRED_COLORS_FRAGMENT,
        }
    }

    /// Uniforms that render the preset sensibly at `size` without any other
    /// configuration. `u_time` advances in seconds.
    pub fn default_uniforms(self, size: SurfaceSize) -> UniformTable {
        let resolution = [size.width as f32, size.height as f32];
        let seconds = |time: f64| (time / 1000.0) as f32;
        match self {
            Preset::Waves => UniformTable::new()
                .with("u_time", UniformBinding::animated(UniformKind::Float1, seconds))
                .with(
                    "u_resolution",
                    UniformBinding::constant(UniformKind::Float2, resolution),
                )
                .with(
                    "u_background",
                    UniformBinding::constant(UniformKind::Float4, [0.0f32, 0.0, 0.0, 0.0]),
                )
                .with(
                    "u_color",
                    UniformBinding::constant(UniformKind::Float4, [0.36f32, 0.55, 0.95, 1.0]),
                )
                .with("u_speed", UniformBinding::constant(UniformKind::Float1, 0.3f32))
                .with("u_phase", UniformBinding::constant(UniformKind::Float1, 0.0f32))
                .with("u_scale", UniformBinding::constant(UniformKind::Float1, 0.6f32))
                .with(
                    "u_brightness",
                    UniformBinding::constant(UniformKind::Float1, 1.2f32),
                ),
            Preset::BlurredColors => UniformTable::new()
                .with("u_time", UniformBinding::animated(UniformKind::Float1, seconds))
                .with(
                    "u_resolution",
                    UniformBinding::constant(UniformKind::Float2, resolution),
                )
                .with("alpha", UniformBinding::constant(UniformKind::Float1, 1.0f32))
                .with(
                    "u_colors",
                    UniformBinding::constant(
                        UniformKind::Float4v,
                        [
                            0.93f32, 0.35, 0.45, 1.0, //
                            0.98, 0.72, 0.33, 1.0, //
                            0.29, 0.45, 0.93, 1.0, //
                            0.40, 0.85, 0.75, 1.0,
                        ],
                    ),
                )
                .with("u_blur", UniformBinding::constant(UniformKind::Float1, 0.5f32))
                .with("u_animate", UniformBinding::constant(UniformKind::Int1, true))
                .with(
                    "u_animate_speed",
                    UniformBinding::constant(UniformKind::Float1, 0.5f32),
                )
                .with(
                    "u_frequency",
                    UniformBinding::constant(UniformKind::Float1, 0.5f32),
                ),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "waves" | "neuro" => Ok(Preset::Waves),
            "blurred-colors" | "blurred-colours" | "blurredcolors" => Ok(Preset::BlurredColors),
            other => Err(format!(
                "unknown preset '{other}'; expected waves or blurred-colors"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformData;

    #[test]
    fn parses_preset_names() {
        assert_eq!("waves".parse::<Preset>().unwrap(), Preset::Waves);
        assert_eq!(
            "Blurred_Colors".parse::<Preset>().unwrap(),
            Preset::BlurredColors
        );
        assert!("plasma".parse::<Preset>().is_err());
    }

    #[test]
    fn default_uniforms_pass_kind_checks() {
        for preset in Preset::ALL {
            let table = preset.default_uniforms(SurfaceSize::new(640, 480));
            for (name, binding) in &table {
                let data = binding.value.evaluate(1000.0);
                binding
                    .kind
                    .check(&data)
                    .unwrap_or_else(|err| panic!("{preset}/{name}: {err}"));
            }
        }
    }

    #[test]
    fn default_uniforms_are_declared_by_the_shader() {
        for preset in Preset::ALL {
            let table = preset.default_uniforms(SurfaceSize::default());
            for (name, _) in &table {
                assert!(
                    preset.fragment_source().contains(name.as_str()),
                    "{preset} does not declare {name}"
                );
            }
        }
    }

    #[test]
    fn resolution_tracks_requested_size() {
        let table = Preset::Waves.default_uniforms(SurfaceSize::new(800, 600));
        let binding = table.get("u_resolution").unwrap();
        assert_eq!(
            binding.value.evaluate(0.0).into_owned(),
            UniformData::Float(vec![800.0, 600.0])
        );
    }
}
