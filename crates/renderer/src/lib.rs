//! Renderer crate for LayerShade.
//!
//! Draws an ordered stack of fragment-shader programs over one shared
//! full-screen quad. The flow is:
//!
//! ```text
//!   host (layershade)
//!          │ Surface + RendererOptions
//!          ▼
//!   MultiProgramRenderer::new ──▶ register(ProgramSource, UniformTable) ×N
//!          │
//!          ▼
//!   tick(now) ──▶ FrameScheduler::poll ──▶ render_frame(time_ms)
//!                                              │
//!                                              ├─▶ FpsTracker::record
//!                                              └─▶ per layer: uniforms ─▶ draw quad
//! ```
//!
//! All graphics calls go through [`GraphicsApi`]. The `glow` feature provides
//! the implementation for a real OpenGL (ES) context; the `testing` feature
//! exposes [`RecordingApi`], an in-memory fake used by this crate's tests and
//! by downstream crates that want to drive a renderer headlessly.
//!
//! Shader build failures never abort on their own. They are recorded as a
//! [`BuildStatus`] and [`ValidationPolicy`] decides whether registration
//! logs them, ignores them, or refuses the layer.

mod error;
mod fps;
pub mod gl;
mod presets;
mod program;
mod source;
mod stack;
mod types;
mod uniforms;

pub use error::RenderError;
pub use fps::{FpsCallback, FpsTracker, FPS_WINDOW};
#[cfg(any(test, feature = "testing"))]
pub use gl::{Call, RecordingApi, RecordingSurface};
pub use gl::{BlendFactor, Components, GraphicsApi, MatrixDim, ShaderStage};
pub use presets::{Preset, VERTEX_GLSL100, VERTEX_GLSL300};
pub use program::{Lookup, ProgramUnit, POSITION_ATTRIBUTE};
pub use scheduler::{ClockOptions, ClockState, FrameClock, FrameScheduler, SchedulerError};
pub use source::{BuildError, BuildStatus, ProgramSource, StageStatus};
pub use stack::{reduced_edge, LayerId, MultiProgramRenderer, MIN_REQUESTED_EDGE, QUALITY_STEP};
pub use types::{
    PlaybackState, RendererOptions, Surface, SurfaceSize, ValidationPolicy, DEFAULT_SURFACE_SIZE,
};
pub use uniforms::{
    AnimatedFn, UniformBinding, UniformData, UniformError, UniformKind, UniformTable, UniformValue,
};
