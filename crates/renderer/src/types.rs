use std::time::Duration;

use scheduler::ClockOptions;

use crate::gl::GraphicsApi;

/// Default backing size when the caller does not supply one.
pub const DEFAULT_SURFACE_SIZE: SurfaceSize = SurfaceSize {
    width: 512,
    height: 512,
};

/// Pixel dimensions of a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        DEFAULT_SURFACE_SIZE
    }
}

impl std::fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Externally owned drawing area the renderer paints into.
///
/// The host creates the surface and decides how large it appears; the
/// renderer only resizes its backing store and asks it once for a graphics
/// context.
pub trait Surface {
    type Api: GraphicsApi;

    /// Returns the context used for every subsequent draw, or `None` when the
    /// host cannot provide one.
    fn acquire_context(&mut self) -> Option<Self::Api>;
    /// Current backing size in pixels.
    fn size(&self) -> SurfaceSize;
    /// Size the backing store is shown at. When it differs from
    /// [`Surface::size`] the renderer draws offscreen and scales the result
    /// up to fill it.
    fn display_size(&self) -> SurfaceSize {
        self.size()
    }
    /// Changes the backing size in pixels.
    fn set_size(&mut self, size: SurfaceSize);
}

/// What to do when a shader stage fails to compile or a program fails to link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Register the layer anyway and say nothing.
    Ignore,
    /// Register the layer, log the driver output, and draw nothing for it.
    #[default]
    Warn,
    /// Release the objects and return the build error to the caller.
    Reject,
}

impl std::fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationPolicy::Ignore => f.write_str("ignore"),
            ValidationPolicy::Warn => f.write_str("warn"),
            ValidationPolicy::Reject => f.write_str("reject"),
        }
    }
}

impl std::str::FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" | "off" => Ok(ValidationPolicy::Ignore),
            "warn" | "log" => Ok(ValidationPolicy::Warn),
            "reject" | "strict" => Ok(ValidationPolicy::Reject),
            other => Err(format!(
                "unknown validation policy '{other}'; expected ignore, warn, or reject"
            )),
        }
    }
}

/// Construction options for [`crate::MultiProgramRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RendererOptions {
    /// Handling of shader build failures at registration time.
    pub validation: ValidationPolicy,
    /// Each step shrinks the backing store by 64 pixels per axis on resize.
    pub quality_reduction: u32,
    /// Interval used by `watch_fps` when the caller does not pick one.
    pub fps_report_interval: Duration,
    /// Forwarded verbatim to the default frame clock.
    pub clock: ClockOptions,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::default(),
            quality_reduction: 1,
            fps_report_interval: Duration::from_millis(500),
            clock: ClockOptions::default(),
        }
    }
}

/// Lifecycle of a renderer.
///
/// `Paused --start--> Running --stop--> Paused`, and either state moves to
/// the terminal `Destroyed` on `destroy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Running,
    Destroyed,
}
