//! Desktop window host: opens a transparent winit window with a GLES 3.0
//! context, hands the context to the renderer, and drives frames from the
//! event loop.
//!
//! Types:
//!
//! - `WindowConfig` bundles the run settings and prepared layers.
//! - `GlWindowSurface` adapts a glutin window surface to `renderer::Surface`.
//!   The window keeps its own size; the backing size only decides the
//!   resolution the renderer draws at before scaling up.
//!
//! Functions:
//!
//! - `run` builds the window, registers every layer, and blocks until exit.
//! - `sync_resolution` keeps `u_resolution` in step with the backing size.

use std::num::NonZeroU32;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext, Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface as GlutinSurface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasRawWindowHandle;
use renderer::{
    LayerId, MultiProgramRenderer, Surface, SurfaceSize, UniformBinding, UniformKind,
};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::bootstrap::{PreparedLayer, RunSettings, ShaderText};

const RESOLUTION_UNIFORM: &str = "u_resolution";

// Field order is drop order: GL objects go before the window they draw into.
struct Host {
    renderer: MultiProgramRenderer<GlWindowSurface>,
    window: Window,
    layer_ids: Vec<LayerId>,
}

pub struct WindowConfig {
    pub settings: RunSettings,
    pub layers: Vec<PreparedLayer>,
    pub title: String,
}

/// Window surface whose GL context is handed to the renderer exactly once.
pub struct GlWindowSurface {
    gl: Option<glow::Context>,
    surface: GlutinSurface<WindowSurface>,
    context: PossiblyCurrentContext,
    size: SurfaceSize,
    window_size: SurfaceSize,
}

impl GlWindowSurface {
    fn present(&self) -> Result<()> {
        self.surface
            .swap_buffers(&self.context)
            .context("failed to swap buffers")
    }

    /// Follows the window; zero-sized (minimised) windows are ignored.
    fn resize_window(&mut self, size: PhysicalSize<u32>) {
        if let (Some(width), Some(height)) =
            (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        {
            self.surface.resize(&self.context, width, height);
            self.window_size = SurfaceSize::new(size.width, size.height);
        }
    }
}

impl Surface for GlWindowSurface {
    type Api = glow::Context;

    fn acquire_context(&mut self) -> Option<glow::Context> {
        self.gl.take()
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn display_size(&self) -> SurfaceSize {
        self.window_size
    }

    fn set_size(&mut self, size: SurfaceSize) {
        self.size = size;
    }
}

pub fn run(config: WindowConfig) -> Result<()> {
    let WindowConfig {
        settings,
        layers,
        title,
    } = config;

    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window_builder = WindowBuilder::new()
        .with_title(title)
        .with_transparent(true)
        .with_inner_size(PhysicalSize::new(settings.size.width, settings.size.height));
    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_transparency(true);

    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(window_builder))
        .build(&event_loop, template, pick_config)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = window.ok_or_else(|| anyhow!("display builder returned no window"))?;

    let display = gl_config.display();
    let attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::Gles(Some(Version::new(3, 0))))
        .build(Some(window.raw_window_handle()));
    // SAFETY: the raw window handle belongs to `window`, which outlives the context.
    let not_current = unsafe { display.create_context(&gl_config, &attributes) }
        .context("failed to create a GLES 3.0 context")?;
    let surface_attributes = window.build_surface_attributes(Default::default());
    // SAFETY: as above; the surface is dropped with the renderer before `window`.
    let surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes) }
        .context("failed to create window surface")?;
    let context = not_current
        .make_current(&surface)
        .context("failed to make GL context current")?;
    if let Err(err) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
        warn!(error = %err, "vsync unavailable; frames will not be refresh-paced");
    }
    // SAFETY: the context is current on this thread for the rest of `run`.
    let gl = unsafe {
        glow::Context::from_loader_function_cstr(|symbol| display.get_proc_address(symbol))
    };

    let inner = window.inner_size();
    let gl_surface = GlWindowSurface {
        gl: Some(gl),
        surface,
        context,
        size: settings.size,
        window_size: SurfaceSize::new(inner.width, inner.height),
    };
    let mut renderer =
        MultiProgramRenderer::with_clock(gl_surface, settings.size, settings.options.clone())
            .context("failed to initialise renderer")?;

    let mut layer_ids = Vec::with_capacity(layers.len());
    for PreparedLayer {
        label,
        shaders,
        uniforms,
    } in layers
    {
        let source = match &shaders {
            ShaderText::Preset(preset) => renderer.compile_preset(*preset),
            ShaderText::Files {
                vertex, fragment, ..
            } => renderer.compile_source(vertex, fragment),
        }
        .with_context(|| format!("{label}: failed to create shaders"))?;
        let id = renderer
            .register(source, uniforms)
            .with_context(|| format!("{label}: shaders did not build"))?;
        info!(layer = %label, id = %id, source = %shaders, "layer ready");
        layer_ids.push(id);
    }

    if settings.show_fps {
        renderer.watch_fps(|fps| info!(fps, "frame rate"), None);
    }
    renderer.start().context("failed to start frame clock")?;

    let frame_limit = settings.frame_limit;
    let mut presented: u64 = 0;
    let mut failure: Option<anyhow::Error> = None;
    let failure_slot = &mut failure;

    let mut host = Host {
        renderer,
        window,
        layer_ids,
    };
    let run_result = event_loop.run(move |event, elwt| {
        let Host {
            renderer,
            window,
            layer_ids,
        } = &mut host;
        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            logical_key,
                            state: ElementState::Pressed,
                            repeat: false,
                            ..
                        },
                    ..
                } => match logical_key {
                    Key::Named(NamedKey::Escape) => elwt.exit(),
                    Key::Named(NamedKey::Space) => {
                        let now = Instant::now();
                        let toggled = if renderer.is_running() {
                            renderer.pause_at(now)
                        } else {
                            renderer.resume_at(now)
                        };
                        match toggled {
                            Ok(()) => debug!(state = ?renderer.state(), "playback toggled"),
                            Err(err) => warn!(error = %err, "cannot toggle playback"),
                        }
                    }
                    _ => {}
                },
                WindowEvent::Resized(size) => {
                    renderer.surface_mut().resize_window(size);
                    renderer.resize(Some(size.width), Some(size.height));
                    sync_resolution(renderer, layer_ids);
                }
                WindowEvent::RedrawRequested => match renderer.tick(Instant::now()) {
                    Ok(true) => {
                        if let Err(err) = renderer.surface().present() {
                            *failure_slot = Some(err);
                            elwt.exit();
                            return;
                        }
                        presented += 1;
                        if frame_limit.is_some_and(|limit| presented >= limit) {
                            info!(frames = presented, "frame limit reached");
                            elwt.exit();
                        }
                    }
                    Ok(false) => {}
                    Err(err) => {
                        error!(error = %err, "frame failed");
                        *failure_slot = Some(anyhow!(err).context("frame failed"));
                        elwt.exit();
                    }
                },
                _ => {}
            },
            Event::AboutToWait => {
                if !renderer.is_running() {
                    elwt.set_control_flow(ControlFlow::Wait);
                    return;
                }
                let now = Instant::now();
                match renderer.next_deadline() {
                    Some(deadline) if deadline > now => {
                        elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                    }
                    _ => {
                        window.request_redraw();
                        elwt.set_control_flow(ControlFlow::Wait);
                    }
                }
            }
            Event::LoopExiting => {
                if let Err(err) = renderer.destroy() {
                    warn!(error = %err, "renderer teardown failed");
                }
            }
            _ => {}
        }
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    let transparent = |config: &Config| config.supports_transparency().unwrap_or(false);
    configs
        .reduce(|best, candidate| {
            if transparent(&candidate) && !transparent(&best) {
                candidate
            } else {
                best
            }
        })
        // glutin only calls the picker with a non-empty set of configs.
        .expect("display builder offers at least one config")
}

/// Points every `vec2 u_resolution` at the current backing size.
pub fn sync_resolution<S: Surface>(renderer: &mut MultiProgramRenderer<S>, ids: &[LayerId]) {
    let size = renderer.size();
    for id in ids {
        let Some(table) = renderer.layer_uniforms_mut(*id) else {
            continue;
        };
        let is_vec2 = table
            .get(RESOLUTION_UNIFORM)
            .is_some_and(|binding| binding.kind == UniformKind::Float2);
        if is_vec2 {
            table.insert(
                RESOLUTION_UNIFORM,
                UniformBinding::constant(
                    UniformKind::Float2,
                    [size.width as f32, size.height as f32],
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{
        Call, Preset, RecordingApi, RecordingSurface, RendererOptions, UniformData, UniformTable,
    };

    #[test]
    fn resize_refreshes_resolution_uniforms() {
        let surface = RecordingSurface::new(RecordingApi::new());
        let options = RendererOptions {
            quality_reduction: 1,
            ..RendererOptions::default()
        };
        let mut renderer =
            MultiProgramRenderer::with_clock(surface, SurfaceSize::new(640, 480), options)
                .unwrap();
        let preset = renderer.register_preset(Preset::Waves).unwrap();
        let source = renderer.compile_preset(Preset::Waves).unwrap();
        let custom = renderer
            .register(
                source,
                UniformTable::new().with(
                    RESOLUTION_UNIFORM,
                    UniformBinding::constant(UniformKind::Float1, 1.0f32),
                ),
            )
            .unwrap();

        renderer.resize(Some(500), Some(300));
        sync_resolution(&mut renderer, &[preset, custom]);

        let resolution = |id| {
            renderer
                .layer_uniforms(id)
                .and_then(|table| table.get(RESOLUTION_UNIFORM))
                .map(|binding| binding.value.evaluate(0.0).into_owned())
        };
        assert_eq!(
            resolution(preset),
            Some(UniformData::Float(vec![436.0, 236.0]))
        );
        assert_eq!(resolution(custom), Some(UniformData::Float(vec![1.0])));
    }

    #[test]
    fn window_resize_keeps_frames_covering_the_window() {
        let api = RecordingApi::new();
        let surface = RecordingSurface::new(api.clone());
        let mut renderer = MultiProgramRenderer::with_clock(
            surface,
            SurfaceSize::new(640, 480),
            RendererOptions::default(),
        )
        .unwrap();
        let id = renderer.register_preset(Preset::Waves).unwrap();

        // What the event loop does on `WindowEvent::Resized`.
        let window = SurfaceSize::new(1024, 768);
        renderer.surface_mut().set_display_size(window);
        renderer.resize(Some(window.width), Some(window.height));
        sync_resolution(&mut renderer, &[id]);
        api.clear_calls();
        renderer.render_frame(16.0).unwrap();

        assert_eq!(renderer.size(), SurfaceSize::new(960, 704));
        let blit = api.calls().into_iter().find_map(|call| match call {
            Call::BlitToDefault { src, dst, .. } => Some((src, dst)),
            _ => None,
        });
        assert_eq!(blit, Some(((960, 704), (1024, 768))));
    }
}
