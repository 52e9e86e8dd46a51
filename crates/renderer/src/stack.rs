//! The multi-program render loop.
//!
//! Every registered layer is drawn over one shared full-screen quad, in
//! registration order, with additive-over-alpha blending
//! (`dst = dst + src * src_alpha`). Later layers therefore light up earlier
//! ones rather than covering them.

use std::fmt;
use std::time::{Duration, Instant};

use scheduler::{ClockState, FrameClock, FrameScheduler};
use tracing::{debug, error, warn};

use crate::error::RenderError;
use crate::fps::FpsTracker;
use crate::gl::{BlendFactor, GraphicsApi};
use crate::presets::Preset;
use crate::program::ProgramUnit;
use crate::source::{BuildStatus, ProgramSource};
use crate::types::{PlaybackState, RendererOptions, Surface, SurfaceSize, ValidationPolicy};
use crate::uniforms::UniformTable;

/// Triangle-strip quad covering clip space.
const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
const QUAD_VERTEX_COUNT: i32 = 4;
const POSITION_COMPONENTS: i32 = 2;

/// Smallest size `resize` requests before quality reduction is applied.
pub const MIN_REQUESTED_EDGE: u32 = 128;
/// Pixels removed per axis for each quality reduction step.
pub const QUALITY_STEP: u32 = 64;

/// Position of a layer in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

impl LayerId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {}", self.0)
    }
}

struct Layer<G: GraphicsApi> {
    unit: ProgramUnit<G>,
    uniforms: UniformTable,
}

/// Colour target at backing size, used while the surface is displayed at a
/// different size.
struct Offscreen<G: GraphicsApi> {
    framebuffer: G::Framebuffer,
    renderbuffer: G::Renderbuffer,
    size: SurfaceSize,
}

/// Size after applying the request floor and quality reduction, never below
/// one pixel.
pub fn reduced_edge(requested: u32, quality_reduction: u32) -> u32 {
    requested
        .max(MIN_REQUESTED_EDGE)
        .saturating_sub(QUALITY_STEP.saturating_mul(quality_reduction))
        .max(1)
}

/// Draws an ordered stack of shader programs onto one surface.
///
/// The renderer owns the surface, its context, the quad buffer and every
/// registered program. Call [`MultiProgramRenderer::destroy`] when done; the
/// `Drop` impl does it as a fallback.
pub struct MultiProgramRenderer<S: Surface> {
    surface: S,
    api: S::Api,
    quad: Option<<S::Api as GraphicsApi>::Buffer>,
    offscreen: Option<Offscreen<S::Api>>,
    layers: Vec<Layer<S::Api>>,
    options: RendererOptions,
    fps: FpsTracker,
    scheduler: Box<dyn FrameScheduler>,
}

impl<S: Surface> MultiProgramRenderer<S> {
    /// Sizes `surface`, acquires its context and uploads the shared quad.
    ///
    /// The renderer starts paused.
    pub fn new(
        mut surface: S,
        size: SurfaceSize,
        options: RendererOptions,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Result<Self, RenderError> {
        surface.set_size(size);
        let Some(api) = surface.acquire_context() else {
            error!(%size, "could not acquire a graphics context from the surface");
            return Err(RenderError::ContextUnavailable);
        };

        let quad = api
            .create_buffer()
            .map_err(|message| RenderError::Allocation {
                what: "quad buffer",
                message,
            })?;
        api.bind_array_buffer(Some(quad));
        api.array_buffer_data(bytemuck::cast_slice(&QUAD_VERTICES));

        debug!(
            %size,
            validation = %options.validation,
            quality_reduction = options.quality_reduction,
            "renderer ready"
        );
        let fps = FpsTracker::new(options.fps_report_interval);
        Ok(Self {
            surface,
            api,
            quad: Some(quad),
            offscreen: None,
            layers: Vec::new(),
            options,
            fps,
            scheduler,
        })
    }

    /// [`MultiProgramRenderer::new`] driven by a [`FrameClock`] built from
    /// `options.clock`.
    pub fn with_clock(
        surface: S,
        size: SurfaceSize,
        options: RendererOptions,
    ) -> Result<Self, RenderError> {
        let clock = FrameClock::new(options.clock.clone());
        Self::new(surface, size, options, Box::new(clock))
    }

    fn ensure_live(&self) -> Result<(), RenderError> {
        if self.quad.is_some() {
            Ok(())
        } else {
            Err(RenderError::Destroyed)
        }
    }

    /// The context every program must be compiled against.
    pub fn api(&self) -> &S::Api {
        &self.api
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// For hosts that track their window size on the surface.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn compile_source(
        &self,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramSource<S::Api>, RenderError> {
        self.ensure_live()?;
        ProgramSource::compile(&self.api, vertex, fragment)
    }

    pub fn compile_preset(&self, preset: Preset) -> Result<ProgramSource<S::Api>, RenderError> {
        self.ensure_live()?;
        ProgramSource::preset(&self.api, preset)
    }

    /// Links `source` and appends it to the draw order with its uniforms.
    ///
    /// Build failures follow [`RendererOptions::validation`]. A layer that
    /// was registered despite failing to build is skipped when drawing.
    pub fn register(
        &mut self,
        source: ProgramSource<S::Api>,
        uniforms: UniformTable,
    ) -> Result<LayerId, RenderError> {
        if self.quad.is_none() {
            source.release(&self.api);
            return Err(RenderError::Destroyed);
        }

        let unit = ProgramUnit::link(&self.api, source)?;
        let id = LayerId(self.layers.len());
        let checked = unit.status().check();
        if let Err(err) = checked {
            match self.options.validation {
                ValidationPolicy::Ignore => {}
                ValidationPolicy::Warn => {
                    for failure in unit.status().failures() {
                        warn!(
                            layer = id.index(),
                            error = %failure,
                            "shader build failed; layer will draw nothing"
                        );
                    }
                }
                ValidationPolicy::Reject => {
                    unit.release(&self.api);
                    return Err(err.into());
                }
            }
        }

        debug!(
            layer = id.index(),
            uniforms = uniforms.len(),
            "registered layer"
        );
        self.layers.push(Layer { unit, uniforms });
        Ok(id)
    }

    /// Compiles `preset` and registers it with its default uniforms sized to
    /// the current surface.
    pub fn register_preset(&mut self, preset: Preset) -> Result<LayerId, RenderError> {
        let source = self.compile_preset(preset)?;
        let uniforms = preset.default_uniforms(self.surface.size());
        self.register(source, uniforms)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_status(&self, id: LayerId) -> Option<&BuildStatus> {
        self.layers.get(id.0).map(|layer| layer.unit.status())
    }

    pub fn layer_uniforms(&self, id: LayerId) -> Option<&UniformTable> {
        self.layers.get(id.0).map(|layer| &layer.uniforms)
    }

    /// Uniform table of a layer, for hosts that retune values between frames.
    pub fn layer_uniforms_mut(&mut self, id: LayerId) -> Option<&mut UniformTable> {
        self.layers.get_mut(id.0).map(|layer| &mut layer.uniforms)
    }

    pub fn start(&mut self) -> Result<(), RenderError> {
        self.start_at(Instant::now())
    }

    pub fn start_at(&mut self, now: Instant) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.scheduler.start(now)?;
        Ok(())
    }

    /// Stops frame delivery. No-op once destroyed.
    pub fn stop(&mut self) {
        if self.quad.is_some() {
            self.scheduler.stop();
        }
    }

    /// Freezes playback time without forgetting it.
    pub fn pause_at(&mut self, now: Instant) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.scheduler.pause(now)?;
        Ok(())
    }

    pub fn resume_at(&mut self, now: Instant) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.scheduler.resume(now)?;
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        if self.quad.is_none() {
            PlaybackState::Destroyed
        } else if self.scheduler.state() == ClockState::Running {
            PlaybackState::Running
        } else {
            PlaybackState::Paused
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == PlaybackState::Running
    }

    /// Earliest instant the scheduler will deliver another frame, if capped.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Renders a frame if the scheduler says one is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Result<bool, RenderError> {
        self.ensure_live()?;
        match self.scheduler.poll(now) {
            Some(time_ms) => {
                self.render_frame(time_ms)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Draws every layer once at playback time `time_ms`.
    ///
    /// When the surface is displayed larger or smaller than its backing size,
    /// layers draw into an offscreen target that is then scaled over the whole
    /// display area.
    ///
    /// A uniform whose value does not fit its upload kind aborts the frame
    /// with [`RenderError::Uniform`]; layers before it have already drawn.
    pub fn render_frame(&mut self, time_ms: f64) -> Result<(), RenderError> {
        let Some(quad) = self.quad else {
            return Err(RenderError::Destroyed);
        };
        self.fps.record(time_ms);

        let size = self.surface.size();
        let display = self.surface.display_size();
        let target = self.frame_target(size, display)?;
        let api = &self.api;
        if target.is_some() {
            api.bind_framebuffer(target);
        }
        api.viewport(0, 0, to_gl_int(size.width), to_gl_int(size.height));
        api.clear_color(0.0, 0.0, 0.0, 0.0);
        api.clear_color_buffer();
        api.enable_blend();
        api.blend_func(BlendFactor::SrcAlpha, BlendFactor::One);
        api.bind_array_buffer(Some(quad));

        for Layer { unit, uniforms } in &mut self.layers {
            if !unit.status().is_ok() {
                continue;
            }
            api.use_program(Some(unit.program()));
            // Programs may place the position attribute in different slots.
            if let Some(slot) = unit.attribute_location(api) {
                api.enable_vertex_attrib_array(slot);
                api.vertex_attrib_pointer_f32(slot, POSITION_COMPONENTS, 0, 0);
            }
            for (name, binding) in uniforms.iter() {
                let value = binding.value.evaluate(time_ms);
                let location = unit.uniform_location(api, name);
                binding
                    .kind
                    .upload(api, location, &value)
                    .map_err(|source| RenderError::Uniform {
                        name: name.clone(),
                        source,
                    })?;
            }
            api.draw_triangle_strip(0, QUAD_VERTEX_COUNT);
        }

        if let Some(framebuffer) = target {
            api.blit_to_default(
                framebuffer,
                (to_gl_int(size.width), to_gl_int(size.height)),
                (to_gl_int(display.width), to_gl_int(display.height)),
            );
        }
        Ok(())
    }

    /// Framebuffer the layers draw into, or `None` for the default one.
    fn frame_target(
        &mut self,
        size: SurfaceSize,
        display: SurfaceSize,
    ) -> Result<Option<<S::Api as GraphicsApi>::Framebuffer>, RenderError> {
        if size == display {
            self.release_offscreen();
            return Ok(None);
        }
        if let Some(offscreen) = &self.offscreen {
            if offscreen.size == size {
                return Ok(Some(offscreen.framebuffer));
            }
        }
        self.release_offscreen();

        let api = &self.api;
        let framebuffer = api
            .create_framebuffer()
            .map_err(|message| RenderError::Allocation {
                what: "offscreen framebuffer",
                message,
            })?;
        let renderbuffer = match api.create_renderbuffer() {
            Ok(renderbuffer) => renderbuffer,
            Err(message) => {
                api.delete_framebuffer(framebuffer);
                return Err(RenderError::Allocation {
                    what: "offscreen renderbuffer",
                    message,
                });
            }
        };
        api.attach_color_renderbuffer(
            framebuffer,
            renderbuffer,
            to_gl_int(size.width),
            to_gl_int(size.height),
        );
        let display_size = display;
        debug!(%size, display = %display_size, "allocated offscreen target");
        self.offscreen = Some(Offscreen {
            framebuffer,
            renderbuffer,
            size,
        });
        Ok(Some(framebuffer))
    }

    fn release_offscreen(&mut self) {
        if let Some(offscreen) = self.offscreen.take() {
            self.api.delete_framebuffer(offscreen.framebuffer);
            self.api.delete_renderbuffer(offscreen.renderbuffer);
        }
    }

    /// Frames per second over the current sampling window.
    pub fn calculate_fps(&self) -> u32 {
        self.fps.calculate()
    }

    /// Reports FPS to `callback` every `interval` (the configured report
    /// interval when `None`). Replaces any previous watcher.
    pub fn watch_fps<F>(&mut self, callback: F, interval: Option<Duration>)
    where
        F: FnMut(u32) + 'static,
    {
        if self.quad.is_none() {
            debug!("ignoring watch_fps on a destroyed renderer");
            return;
        }
        let interval = interval.unwrap_or(self.options.fps_report_interval);
        self.fps.watch(Box::new(callback), interval);
    }

    pub fn unwatch_fps(&mut self) {
        self.fps.unwatch();
    }

    /// Resizes the surface. Missing axes default to the current surface size.
    ///
    /// Each axis becomes `max(128, requested) - 64 * quality_reduction`,
    /// clamped to at least one pixel.
    pub fn resize(&mut self, width: Option<u32>, height: Option<u32>) {
        if self.quad.is_none() {
            return;
        }
        let current = self.surface.size();
        let quality = self.options.quality_reduction;
        let size = SurfaceSize::new(
            reduced_edge(width.unwrap_or(current.width), quality),
            reduced_edge(height.unwrap_or(current.height), quality),
        );
        debug!(%size, quality_reduction = quality, "resizing surface");
        self.surface.set_size(size);
    }

    pub fn size(&self) -> SurfaceSize {
        self.surface.size()
    }

    /// Takes effect on the next `resize`.
    pub fn set_quality_reduction(&mut self, quality_reduction: u32) {
        self.options.quality_reduction = quality_reduction;
    }

    pub fn quality_reduction(&self) -> u32 {
        self.options.quality_reduction
    }

    /// Stops scheduling, then releases the quad, the offscreen target and
    /// every program.
    ///
    /// Calling it again is a no-op.
    pub fn destroy(&mut self) -> Result<(), RenderError> {
        let Some(quad) = self.quad.take() else {
            return Ok(());
        };
        self.scheduler.shutdown();

        self.release_offscreen();
        let api = &self.api;
        api.use_program(None);
        api.bind_array_buffer(None);
        api.delete_buffer(quad);
        let released = self.layers.len();
        for layer in self.layers.drain(..) {
            layer.unit.release(api);
        }
        self.fps.unwatch();
        debug!(layers = released, "renderer destroyed");
        Ok(())
    }
}

impl<S: Surface> Drop for MultiProgramRenderer<S> {
    fn drop(&mut self) {
        if self.quad.is_some() {
            debug!("renderer dropped without destroy; releasing GPU objects");
            let _ = self.destroy();
        }
    }
}

impl<S: Surface> fmt::Debug for MultiProgramRenderer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiProgramRenderer")
            .field("size", &self.surface.size())
            .field("display_size", &self.surface.display_size())
            .field("state", &self.state())
            .field("layers", &self.layers.len())
            .field("options", &self.options)
            .field("fps", &self.fps)
            .finish()
    }
}

fn to_gl_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use scheduler::SchedulerError;

    use super::*;
    use crate::gl::{Call, RecordingApi, RecordingSurface};
    use crate::uniforms::{UniformBinding, UniformData, UniformError, UniformKind};

    const VERTEX: &str = "attribute vec4 a_position; void main() { gl_Position = a_position; }";
    const FRAGMENT_A: &str =
        "precision mediump float; uniform float u_a; void main() { gl_FragColor = vec4(u_a); }";
    const FRAGMENT_B: &str =
        "precision mediump float; uniform vec2 u_b; void main() { gl_FragColor = vec4(u_b, 0, 1); }";

    fn renderer_with(
        options: RendererOptions,
    ) -> (MultiProgramRenderer<RecordingSurface>, RecordingApi) {
        let api = RecordingApi::new();
        let surface = RecordingSurface::new(api.clone());
        let renderer =
            MultiProgramRenderer::with_clock(surface, SurfaceSize::new(640, 480), options)
                .unwrap();
        (renderer, api)
    }

    fn renderer() -> (MultiProgramRenderer<RecordingSurface>, RecordingApi) {
        renderer_with(RendererOptions::default())
    }

    fn register(
        renderer: &mut MultiProgramRenderer<RecordingSurface>,
        fragment: &str,
        uniforms: UniformTable,
    ) -> Result<LayerId, RenderError> {
        let source = renderer.compile_source(VERTEX, fragment)?;
        renderer.register(source, uniforms)
    }

    /// Delivers one fixed playback time while running and remembers how long
    /// the call log was when it was shut down.
    struct ScriptedScheduler {
        api: RecordingApi,
        state: ClockState,
        time_ms: f64,
        shutdown_at: Rc<Cell<Option<usize>>>,
    }

    impl ScriptedScheduler {
        fn new(api: RecordingApi, time_ms: f64) -> (Self, Rc<Cell<Option<usize>>>) {
            let shutdown_at = Rc::new(Cell::new(None));
            let scheduler = Self {
                api,
                state: ClockState::Stopped,
                time_ms,
                shutdown_at: Rc::clone(&shutdown_at),
            };
            (scheduler, shutdown_at)
        }

        fn transition(&mut self, to: ClockState) -> Result<(), SchedulerError> {
            if self.state == ClockState::Shutdown {
                return Err(SchedulerError::ShutDown);
            }
            self.state = to;
            Ok(())
        }
    }

    impl FrameScheduler for ScriptedScheduler {
        fn start(&mut self, _now: Instant) -> Result<(), SchedulerError> {
            self.transition(ClockState::Running)
        }

        fn stop(&mut self) {
            let _ = self.transition(ClockState::Stopped);
        }

        fn pause(&mut self, _now: Instant) -> Result<(), SchedulerError> {
            self.transition(ClockState::Paused)
        }

        fn resume(&mut self, _now: Instant) -> Result<(), SchedulerError> {
            self.transition(ClockState::Running)
        }

        fn shutdown(&mut self) {
            self.shutdown_at.set(Some(self.api.calls().len()));
            self.state = ClockState::Shutdown;
        }

        fn state(&self) -> ClockState {
            self.state
        }

        fn poll(&mut self, _now: Instant) -> Option<f64> {
            (self.state == ClockState::Running).then_some(self.time_ms)
        }

        fn next_deadline(&self) -> Option<Instant> {
            None
        }
    }

    fn windowed_renderer(
        window: SurfaceSize,
        options: RendererOptions,
    ) -> (MultiProgramRenderer<RecordingSurface>, RecordingApi) {
        let api = RecordingApi::new();
        let surface = RecordingSurface::new(api.clone()).with_display_size(window);
        let renderer = MultiProgramRenderer::with_clock(surface, window, options).unwrap();
        (renderer, api)
    }

    fn draws_and_programs(api: &RecordingApi) -> Vec<Call> {
        api.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::UseProgram { program: Some(_) } | Call::DrawTriangleStrip { .. }
                )
            })
            .collect()
    }

    #[test]
    fn construction_sizes_surface_and_uploads_quad() {
        let (renderer, api) = renderer();
        assert_eq!(renderer.size(), SurfaceSize::new(640, 480));
        assert_eq!(renderer.state(), PlaybackState::Paused);
        assert_eq!(
            api.count_calls(|call| matches!(call, Call::ArrayBufferData { bytes: 32 })),
            1
        );
    }

    #[test]
    fn missing_context_is_fatal() {
        let result = MultiProgramRenderer::with_clock(
            RecordingSurface::unavailable(),
            SurfaceSize::default(),
            RendererOptions::default(),
        );
        assert!(matches!(result, Err(RenderError::ContextUnavailable)));
    }

    #[test]
    fn frame_sets_up_additive_blending_and_binds_quad_once() {
        let (mut renderer, api) = renderer();
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        register(&mut renderer, FRAGMENT_B, UniformTable::new()).unwrap();
        api.clear_calls();

        renderer.render_frame(0.0).unwrap();
        let calls = api.calls();
        assert_eq!(
            &calls[..5],
            &[
                Call::Viewport {
                    width: 640,
                    height: 480
                },
                Call::ClearColor {
                    rgba: [0.0, 0.0, 0.0, 0.0]
                },
                Call::Clear,
                Call::EnableBlend,
                Call::BlendFunc {
                    src: BlendFactor::SrcAlpha,
                    dst: BlendFactor::One
                },
            ]
        );
        let binds = api.count_calls(|call| matches!(call, Call::BindArrayBuffer { buffer: Some(_) }));
        assert_eq!(binds, 1);
        let draws = api.count_calls(|call| {
            matches!(call, Call::DrawTriangleStrip { first: 0, count: 4 })
        });
        assert_eq!(draws, 2);
    }

    #[test]
    fn layers_draw_in_registration_order_every_frame() {
        let (mut renderer, api) = renderer();
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        register(&mut renderer, FRAGMENT_B, UniformTable::new()).unwrap();
        let programs: Vec<u32> = api
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateProgram { program } => Some(program),
                _ => None,
            })
            .collect();

        for frame in 0..3 {
            api.clear_calls();
            renderer.render_frame(f64::from(frame) * 16.0).unwrap();
            assert_eq!(
                draws_and_programs(&api),
                vec![
                    Call::UseProgram {
                        program: Some(programs[0])
                    },
                    Call::DrawTriangleStrip { first: 0, count: 4 },
                    Call::UseProgram {
                        program: Some(programs[1])
                    },
                    Call::DrawTriangleStrip { first: 0, count: 4 },
                ]
            );
        }
    }

    #[test]
    fn uniforms_are_evaluated_with_frame_time() {
        let (mut renderer, api) = renderer();
        let table = UniformTable::new()
            .with(
                "u_a",
                UniformBinding::animated(UniformKind::Float1, |time| (time / 1000.0) as f32),
            )
            .with(
                "u_b",
                UniformBinding::constant(UniformKind::Float2, UniformData::Float(vec![1.0, 2.0])),
            );
        register(&mut renderer, FRAGMENT_A, table).unwrap();
        api.clear_calls();

        renderer.render_frame(1500.0).unwrap();
        let uploads: Vec<Call> = api
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::UniformF32 { .. }))
            .collect();
        assert_eq!(uploads.len(), 2);
        assert!(matches!(
            &uploads[0],
            Call::UniformF32 { location: Some(_), values, .. } if values == &vec![1.5]
        ));
        // u_b is not declared by the program; the upload still happens with no location.
        assert!(matches!(
            &uploads[1],
            Call::UniformF32 { location: None, .. }
        ));
    }

    #[test]
    fn uniform_locations_are_resolved_once_across_frames() {
        let (mut renderer, api) = renderer();
        let table = UniformTable::new().with(
            "u_a",
            UniformBinding::constant(UniformKind::Float1, UniformData::Float(vec![0.5])),
        );
        register(&mut renderer, FRAGMENT_A, table).unwrap();
        for frame in 0..5 {
            renderer.render_frame(f64::from(frame)).unwrap();
        }
        let lookups = api.count_calls(|call| matches!(call, Call::UniformLocation { .. }));
        assert_eq!(lookups, 1);
        let attributes = api.count_calls(|call| matches!(call, Call::AttributeLocation { .. }));
        assert_eq!(attributes, 1);
    }

    #[test]
    fn attribute_is_pointed_per_program() {
        let (mut renderer, api) = renderer();
        api.set_attribute_slot(0);
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        register(&mut renderer, FRAGMENT_B, UniformTable::new()).unwrap();
        api.clear_calls();
        renderer.render_frame(0.0).unwrap();
        let pointers = api.count_calls(|call| {
            matches!(
                call,
                Call::VertexAttribPointer {
                    index: 0,
                    size: 2,
                    stride: 0,
                    offset: 0
                }
            )
        });
        assert_eq!(pointers, 2);
    }

    #[test]
    fn mismatched_uniform_fails_the_frame() {
        let (mut renderer, _api) = renderer();
        let table = UniformTable::new().with(
            "u_a",
            UniformBinding::constant(UniformKind::Int1, UniformData::Float(vec![1.0])),
        );
        register(&mut renderer, FRAGMENT_A, table).unwrap();
        let err = renderer.render_frame(0.0).unwrap_err();
        match err {
            RenderError::Uniform { name, source } => {
                assert_eq!(name, "u_a");
                assert!(matches!(source, UniformError::ScalarType { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn warn_policy_registers_broken_layers_but_skips_them() {
        let (mut renderer, api) = renderer();
        let broken = register(&mut renderer, "#error bad", UniformTable::new()).unwrap();
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        assert_eq!(renderer.layer_count(), 2);
        assert!(!renderer.layer_status(broken).unwrap().is_ok());

        api.clear_calls();
        renderer.render_frame(0.0).unwrap();
        let draws = api.count_calls(|call| matches!(call, Call::DrawTriangleStrip { .. }));
        assert_eq!(draws, 1);
    }

    #[test]
    fn reject_policy_returns_build_error_and_releases() {
        let (mut renderer, api) = renderer_with(RendererOptions {
            validation: ValidationPolicy::Reject,
            ..RendererOptions::default()
        });
        let err = register(&mut renderer, "#error bad", UniformTable::new()).unwrap_err();
        assert!(matches!(err, RenderError::Build(_)));
        assert_eq!(renderer.layer_count(), 0);
        // Only the quad buffer is left.
        assert_eq!(api.live_objects(), 1);
    }

    #[test]
    fn resize_applies_floor_and_quality_reduction() {
        let (mut renderer, _api) = renderer_with(RendererOptions {
            quality_reduction: 0,
            ..RendererOptions::default()
        });
        renderer.resize(Some(0), Some(0));
        assert_eq!(renderer.size(), SurfaceSize::new(128, 128));

        renderer.set_quality_reduction(1);
        assert_eq!(renderer.quality_reduction(), 1);
        // The new level does not touch the surface until the next resize.
        assert_eq!(renderer.size(), SurfaceSize::new(128, 128));
        renderer.resize(Some(500), Some(500));
        assert_eq!(renderer.size(), SurfaceSize::new(436, 436));
        assert_eq!(
            renderer.surface().resizes(),
            &[
                SurfaceSize::new(640, 480),
                SurfaceSize::new(128, 128),
                SurfaceSize::new(436, 436),
            ]
        );
    }

    #[test]
    fn resize_defaults_to_current_size_and_never_reaches_zero() {
        let (mut renderer, _api) = renderer_with(RendererOptions {
            quality_reduction: 0,
            ..RendererOptions::default()
        });
        renderer.resize(None, Some(300));
        assert_eq!(renderer.size(), SurfaceSize::new(640, 300));

        renderer.set_quality_reduction(10);
        renderer.resize(Some(200), Some(200));
        assert_eq!(renderer.size(), SurfaceSize::new(1, 1));
        assert_eq!(
            renderer.surface().resizes().last(),
            Some(&SurfaceSize::new(1, 1))
        );
    }

    #[test]
    fn fps_watcher_receives_whole_numbers() {
        let (mut renderer, _api) = renderer();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        renderer.watch_fps(
            move |fps| sink.borrow_mut().push(fps),
            Some(Duration::from_millis(100)),
        );
        for frame in 0..=10 {
            renderer.render_frame(f64::from(frame) * 20.0).unwrap();
        }
        assert_eq!(*reports.borrow(), vec![50, 50]);
        assert_eq!(renderer.calculate_fps(), 50);
    }

    #[test]
    fn unwatch_stops_reports_immediately() {
        let (mut renderer, _api) = renderer();
        let reports = Rc::new(RefCell::new(0u32));
        let sink = Rc::clone(&reports);
        renderer.watch_fps(move |_| *sink.borrow_mut() += 1, Some(Duration::ZERO));
        renderer.unwatch_fps();
        for frame in 0..10 {
            renderer.render_frame(f64::from(frame) * 16.0).unwrap();
        }
        assert_eq!(*reports.borrow(), 0);
    }

    #[test]
    fn tick_renders_only_while_running() {
        let (mut renderer, api) = renderer();
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        let now = Instant::now();
        assert!(!renderer.tick(now).unwrap());

        renderer.start_at(now).unwrap();
        assert!(renderer.is_running());
        assert!(renderer.tick(now + Duration::from_millis(16)).unwrap());

        renderer.stop();
        assert_eq!(renderer.state(), PlaybackState::Paused);
        api.clear_calls();
        assert!(!renderer.tick(now + Duration::from_millis(32)).unwrap());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn destroy_releases_everything_and_is_idempotent() {
        let (mut renderer, api) = renderer();
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        register(&mut renderer, FRAGMENT_B, UniformTable::new()).unwrap();
        renderer.start().unwrap();

        renderer.destroy().unwrap();
        assert_eq!(api.live_objects(), 0);
        assert_eq!(renderer.state(), PlaybackState::Destroyed);
        assert_eq!(renderer.layer_count(), 0);

        api.clear_calls();
        renderer.destroy().unwrap();
        assert!(api.calls().is_empty());
    }

    #[test]
    fn operations_after_destroy_fail_or_do_nothing() {
        let (mut renderer, api) = renderer();
        let source = renderer.compile_source(VERTEX, FRAGMENT_A).unwrap();
        renderer.destroy().unwrap();

        assert!(matches!(
            renderer.register(source, UniformTable::new()),
            Err(RenderError::Destroyed)
        ));
        assert_eq!(api.live_objects(), 0);
        assert!(matches!(renderer.render_frame(0.0), Err(RenderError::Destroyed)));
        assert!(matches!(renderer.start(), Err(RenderError::Destroyed)));
        assert!(matches!(
            renderer.compile_preset(Preset::Waves),
            Err(RenderError::Destroyed)
        ));

        let pushed = renderer.surface().resizes().len();
        renderer.resize(Some(1024), Some(1024));
        renderer.stop();
        assert_eq!(renderer.surface().resizes().len(), pushed);
    }

    #[test]
    fn drop_releases_gpu_objects() {
        let (mut renderer, api) = renderer();
        renderer.register_preset(Preset::Waves).unwrap();
        drop(renderer);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn destroy_stops_scheduling_before_releasing() {
        let (mut renderer, _api) = renderer();
        let now = Instant::now();
        renderer.start_at(now).unwrap();
        renderer.destroy().unwrap();
        assert!(matches!(renderer.tick(now), Err(RenderError::Destroyed)));
        assert!(!renderer.is_running());
    }

    #[test]
    fn scheduler_is_shut_down_before_any_object_is_released() {
        let api = RecordingApi::new();
        let (scheduler, shutdown_at) = ScriptedScheduler::new(api.clone(), 40.0);
        let mut renderer = MultiProgramRenderer::new(
            RecordingSurface::new(api.clone()).with_display_size(SurfaceSize::new(800, 600)),
            SurfaceSize::new(640, 480),
            RendererOptions::default(),
            Box::new(scheduler),
        )
        .unwrap();
        register(&mut renderer, FRAGMENT_A, UniformTable::new()).unwrap();
        renderer.start_at(Instant::now()).unwrap();
        assert!(renderer.tick(Instant::now()).unwrap());

        renderer.destroy().unwrap();
        let shutdown_at = shutdown_at.get().expect("scheduler was never shut down");
        let calls = api.calls();
        let first_release = calls
            .iter()
            .position(|call| {
                matches!(
                    call,
                    Call::DeleteBuffer { .. }
                        | Call::DetachShader { .. }
                        | Call::DeleteProgram { .. }
                        | Call::DeleteFramebuffer { .. }
                        | Call::DeleteRenderbuffer { .. }
                )
            })
            .unwrap();
        assert!(shutdown_at <= first_release);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn injected_scheduler_supplies_frame_time() {
        let api = RecordingApi::new();
        let (scheduler, _) = ScriptedScheduler::new(api.clone(), 2500.0);
        let mut renderer = MultiProgramRenderer::new(
            RecordingSurface::new(api.clone()),
            SurfaceSize::new(640, 480),
            RendererOptions::default(),
            Box::new(scheduler),
        )
        .unwrap();
        let table = UniformTable::new().with(
            "u_a",
            UniformBinding::animated(UniformKind::Float1, |time| (time / 1000.0) as f32),
        );
        register(&mut renderer, FRAGMENT_A, table).unwrap();
        let now = Instant::now();
        assert!(!renderer.tick(now).unwrap());

        renderer.start_at(now).unwrap();
        api.clear_calls();
        assert!(renderer.tick(now).unwrap());
        assert_eq!(
            api.count_calls(|call| matches!(
                call,
                Call::UniformF32 { values, .. } if values == &vec![2.5]
            )),
            1
        );

        renderer.pause_at(now).unwrap();
        assert_eq!(renderer.state(), PlaybackState::Paused);
        assert!(!renderer.tick(now).unwrap());
    }

    #[test]
    fn reduced_backing_store_is_scaled_over_the_whole_window() {
        let window = SurfaceSize::new(800, 600);
        let (mut renderer, api) = windowed_renderer(window, RendererOptions::default());
        renderer.register_preset(Preset::Waves).unwrap();
        renderer.resize(Some(window.width), Some(window.height));
        assert_eq!(renderer.size(), SurfaceSize::new(736, 536));
        api.clear_calls();

        renderer.render_frame(16.0).unwrap();
        let calls = api.calls();
        let framebuffer = calls
            .iter()
            .find_map(|call| match call {
                Call::AttachColorRenderbuffer {
                    framebuffer,
                    width: 736,
                    height: 536,
                    ..
                } => Some(*framebuffer),
                _ => None,
            })
            .expect("offscreen target was not sized to the backing store");
        let bind = calls
            .iter()
            .position(|call| {
                call == &Call::BindFramebuffer {
                    framebuffer: Some(framebuffer),
                }
            })
            .unwrap();
        let draw = calls
            .iter()
            .position(|call| matches!(call, Call::DrawTriangleStrip { .. }))
            .unwrap();
        assert!(bind < draw);
        assert!(calls.contains(&Call::Viewport {
            width: 736,
            height: 536
        }));
        // The scaled copy is the last thing drawn and covers the full window.
        assert_eq!(
            calls.last(),
            Some(&Call::BlitToDefault {
                framebuffer,
                src: (736, 536),
                dst: (800, 600),
            })
        );
    }

    #[test]
    fn offscreen_target_follows_the_backing_size() {
        let (mut renderer, api) = windowed_renderer(
            SurfaceSize::new(800, 600),
            RendererOptions {
                quality_reduction: 2,
                ..RendererOptions::default()
            },
        );
        let is_allocation = |call: &Call| matches!(call, Call::CreateFramebuffer { .. });

        // No reduction in effect yet: draw straight into the window.
        renderer.render_frame(0.0).unwrap();
        assert_eq!(api.count_calls(is_allocation), 0);
        assert_eq!(
            api.count_calls(|call| matches!(call, Call::BindFramebuffer { .. })),
            0
        );

        renderer.resize(None, None);
        for frame in 1..4 {
            renderer.render_frame(f64::from(frame) * 16.0).unwrap();
        }
        assert_eq!(api.count_calls(is_allocation), 1);

        renderer.resize(Some(600), Some(400));
        renderer.render_frame(64.0).unwrap();
        assert_eq!(api.count_calls(is_allocation), 2);
        assert_eq!(
            api.count_calls(|call| matches!(call, Call::DeleteFramebuffer { .. })),
            1
        );

        // Quad plus one framebuffer and its renderbuffer.
        assert_eq!(api.live_objects(), 3);
        renderer.set_quality_reduction(0);
        renderer.resize(Some(800), Some(600));
        renderer.render_frame(80.0).unwrap();
        assert_eq!(api.live_objects(), 1);

        renderer.resize(Some(700), Some(500));
        renderer.render_frame(96.0).unwrap();
        renderer.destroy().unwrap();
        assert_eq!(api.live_objects(), 0);
    }
}
