//! In-memory graphics backend that records every call.
//!
//! Handles are plain integers. A shader fails to compile when its source
//! contains `#error`; a program fails to link when an attached stage failed or
//! when link failures are forced with [`RecordingApi::fail_links`]. Uniforms
//! and the position attribute resolve only when their name appears in one of
//! the attached sources, which is close enough to a real driver for the
//! renderer's bookkeeping.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::{BlendFactor, Components, GraphicsApi, MatrixDim, ShaderStage};
use crate::types::{Surface, SurfaceSize};

/// One recorded graphics call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateShader { shader: u32, stage: ShaderStage },
    CompileShader { shader: u32 },
    DeleteShader { shader: u32 },
    CreateProgram { program: u32 },
    AttachShader { program: u32, shader: u32 },
    DetachShader { program: u32, shader: u32 },
    LinkProgram { program: u32 },
    UseProgram { program: Option<u32> },
    DeleteProgram { program: u32 },
    UniformLocation { program: u32, name: String },
    AttributeLocation { program: u32, name: String },
    CreateBuffer { buffer: u32 },
    BindArrayBuffer { buffer: Option<u32> },
    ArrayBufferData { bytes: usize },
    DeleteBuffer { buffer: u32 },
    CreateFramebuffer { framebuffer: u32 },
    CreateRenderbuffer { renderbuffer: u32 },
    AttachColorRenderbuffer {
        framebuffer: u32,
        renderbuffer: u32,
        width: i32,
        height: i32,
    },
    BindFramebuffer { framebuffer: Option<u32> },
    BlitToDefault { framebuffer: u32, src: (i32, i32), dst: (i32, i32) },
    DeleteFramebuffer { framebuffer: u32 },
    DeleteRenderbuffer { renderbuffer: u32 },
    Viewport { width: i32, height: i32 },
    ClearColor { rgba: [f32; 4] },
    Clear,
    EnableBlend,
    BlendFunc { src: BlendFactor, dst: BlendFactor },
    EnableVertexAttribArray { index: u32 },
    VertexAttribPointer { index: u32, size: i32, stride: i32, offset: i32 },
    UniformF32 { location: Option<u32>, components: Components, values: Vec<f32> },
    UniformI32 { location: Option<u32>, components: Components, values: Vec<i32> },
    UniformMatrixF32 { location: Option<u32>, dim: MatrixDim, values: Vec<f32> },
    DrawTriangleStrip { first: i32, count: i32 },
}

#[derive(Debug)]
struct ShaderRecord {
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<u32>,
    linked: bool,
}

#[derive(Debug)]
struct Inner {
    next_handle: u32,
    calls: Vec<Call>,
    shaders: HashMap<u32, ShaderRecord>,
    programs: HashMap<u32, ProgramRecord>,
    buffers: HashSet<u32>,
    framebuffers: HashSet<u32>,
    renderbuffers: HashSet<u32>,
    locations: HashMap<(u32, String), u32>,
    attribute_slot: u32,
    fail_links: bool,
}

impl Inner {
    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn program_mentions(&self, program: u32, name: &str) -> bool {
        self.programs
            .get(&program)
            .map(|record| {
                record.attached.iter().any(|shader| {
                    self.shaders
                        .get(shader)
                        .is_some_and(|s| s.source.contains(name))
                })
            })
            .unwrap_or(false)
    }
}

/// Shared-handle fake context; clones observe the same call log.
#[derive(Debug, Clone)]
pub struct RecordingApi {
    inner: Rc<RefCell<Inner>>,
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                next_handle: 0,
                calls: Vec::new(),
                shaders: HashMap::new(),
                programs: HashMap::new(),
                buffers: HashSet::new(),
                framebuffers: HashSet::new(),
                renderbuffers: HashSet::new(),
                locations: HashMap::new(),
                attribute_slot: 0,
                fail_links: false,
            })),
        }
    }
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot reported for `a_position` in programs that declare it.
    pub fn set_attribute_slot(&self, slot: u32) {
        self.inner.borrow_mut().attribute_slot = slot;
    }

    /// Forces every subsequent link to fail.
    pub fn fail_links(&self, fail: bool) {
        self.inner.borrow_mut().fail_links = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.inner.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    /// GL objects created but not yet deleted.
    pub fn live_objects(&self) -> usize {
        let inner = self.inner.borrow();
        inner.shaders.len()
            + inner.programs.len()
            + inner.buffers.len()
            + inner.framebuffers.len()
            + inner.renderbuffers.len()
    }

    fn record(&self, call: Call) {
        self.inner.borrow_mut().calls.push(call);
    }
}

impl GraphicsApi for RecordingApi {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Framebuffer = u32;
    type Renderbuffer = u32;
    type UniformLocation = u32;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let shader = {
            let mut inner = self.inner.borrow_mut();
            let shader = inner.next();
            inner.shaders.insert(
                shader,
                ShaderRecord {
                    source: String::new(),
                    compiled: false,
                },
            );
            shader
        };
        self.record(Call::CreateShader { shader, stage });
        Ok(shader)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        if let Some(record) = self.inner.borrow_mut().shaders.get_mut(&shader) {
            record.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: u32) {
        if let Some(record) = self.inner.borrow_mut().shaders.get_mut(&shader) {
            record.compiled = !record.source.contains("#error");
        }
        self.record(Call::CompileShader { shader });
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.inner
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|record| record.compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        if self.shader_compile_status(shader) {
            String::new()
        } else {
            format!("ERROR: 0:1: shader {shader} contains #error")
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.inner.borrow_mut().shaders.remove(&shader);
        self.record(Call::DeleteShader { shader });
    }

    fn create_program(&self) -> Result<u32, String> {
        let program = {
            let mut inner = self.inner.borrow_mut();
            let program = inner.next();
            inner.programs.insert(program, ProgramRecord::default());
            program
        };
        self.record(Call::CreateProgram { program });
        Ok(program)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(record) = self.inner.borrow_mut().programs.get_mut(&program) {
            record.attached.push(shader);
        }
        self.record(Call::AttachShader { program, shader });
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let Some(record) = self.inner.borrow_mut().programs.get_mut(&program) {
            record.attached.retain(|attached| *attached != shader);
        }
        self.record(Call::DetachShader { program, shader });
    }

    fn link_program(&self, program: u32) {
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let stages_ok = inner.programs.get(&program).is_some_and(|record| {
                record
                    .attached
                    .iter()
                    .all(|shader| inner.shaders.get(shader).is_some_and(|s| s.compiled))
            });
            let linked = stages_ok && !inner.fail_links;
            if let Some(record) = inner.programs.get_mut(&program) {
                record.linked = linked;
            }
        }
        self.record(Call::LinkProgram { program });
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.inner
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|record| record.linked)
    }

    fn program_info_log(&self, program: u32) -> String {
        if self.program_link_status(program) {
            String::new()
        } else {
            format!("program {program} failed to link")
        }
    }

    fn use_program(&self, program: Option<u32>) {
        self.record(Call::UseProgram { program });
    }

    fn delete_program(&self, program: u32) {
        self.inner.borrow_mut().programs.remove(&program);
        self.record(Call::DeleteProgram { program });
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        self.record(Call::UniformLocation {
            program,
            name: name.to_string(),
        });
        let mut inner = self.inner.borrow_mut();
        if !inner.program_mentions(program, name) {
            return None;
        }
        if let Some(location) = inner.locations.get(&(program, name.to_string())) {
            return Some(*location);
        }
        let location = inner.next();
        inner.locations.insert((program, name.to_string()), location);
        Some(location)
    }

    fn attribute_location(&self, program: u32, name: &str) -> Option<u32> {
        self.record(Call::AttributeLocation {
            program,
            name: name.to_string(),
        });
        let inner = self.inner.borrow();
        inner
            .program_mentions(program, name)
            .then_some(inner.attribute_slot)
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let buffer = {
            let mut inner = self.inner.borrow_mut();
            let buffer = inner.next();
            inner.buffers.insert(buffer);
            buffer
        };
        self.record(Call::CreateBuffer { buffer });
        Ok(buffer)
    }

    fn bind_array_buffer(&self, buffer: Option<u32>) {
        self.record(Call::BindArrayBuffer { buffer });
    }

    fn array_buffer_data(&self, data: &[u8]) {
        self.record(Call::ArrayBufferData { bytes: data.len() });
    }

    fn delete_buffer(&self, buffer: u32) {
        self.inner.borrow_mut().buffers.remove(&buffer);
        self.record(Call::DeleteBuffer { buffer });
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        let framebuffer = {
            let mut inner = self.inner.borrow_mut();
            let framebuffer = inner.next();
            inner.framebuffers.insert(framebuffer);
            framebuffer
        };
        self.record(Call::CreateFramebuffer { framebuffer });
        Ok(framebuffer)
    }

    fn create_renderbuffer(&self) -> Result<u32, String> {
        let renderbuffer = {
            let mut inner = self.inner.borrow_mut();
            let renderbuffer = inner.next();
            inner.renderbuffers.insert(renderbuffer);
            renderbuffer
        };
        self.record(Call::CreateRenderbuffer { renderbuffer });
        Ok(renderbuffer)
    }

    fn attach_color_renderbuffer(
        &self,
        framebuffer: u32,
        renderbuffer: u32,
        width: i32,
        height: i32,
    ) {
        self.record(Call::AttachColorRenderbuffer {
            framebuffer,
            renderbuffer,
            width,
            height,
        });
    }

    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        self.record(Call::BindFramebuffer { framebuffer });
    }

    fn blit_to_default(&self, framebuffer: u32, src: (i32, i32), dst: (i32, i32)) {
        self.record(Call::BlitToDefault {
            framebuffer,
            src,
            dst,
        });
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        self.inner.borrow_mut().framebuffers.remove(&framebuffer);
        self.record(Call::DeleteFramebuffer { framebuffer });
    }

    fn delete_renderbuffer(&self, renderbuffer: u32) {
        self.inner.borrow_mut().renderbuffers.remove(&renderbuffer);
        self.record(Call::DeleteRenderbuffer { renderbuffer });
    }

    fn viewport(&self, _x: i32, _y: i32, width: i32, height: i32) {
        self.record(Call::Viewport { width, height });
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(Call::ClearColor {
            rgba: [red, green, blue, alpha],
        });
    }

    fn clear_color_buffer(&self) {
        self.record(Call::Clear);
    }

    fn enable_blend(&self) {
        self.record(Call::EnableBlend);
    }

    fn blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        self.record(Call::BlendFunc { src, dst });
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(Call::EnableVertexAttribArray { index });
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, stride: i32, offset: i32) {
        self.record(Call::VertexAttribPointer {
            index,
            size,
            stride,
            offset,
        });
    }

    fn uniform_f32(&self, location: Option<&u32>, components: Components, values: &[f32]) {
        self.record(Call::UniformF32 {
            location: location.copied(),
            components,
            values: values.to_vec(),
        });
    }

    fn uniform_i32(&self, location: Option<&u32>, components: Components, values: &[i32]) {
        self.record(Call::UniformI32 {
            location: location.copied(),
            components,
            values: values.to_vec(),
        });
    }

    fn uniform_matrix_f32(&self, location: Option<&u32>, dim: MatrixDim, values: &[f32]) {
        self.record(Call::UniformMatrixF32 {
            location: location.copied(),
            dim,
            values: values.to_vec(),
        });
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        self.record(Call::DrawTriangleStrip { first, count });
    }
}

/// Surface backed by a [`RecordingApi`]; `unavailable()` models a host that
/// cannot provide a context.
///
/// The surface is shown at its backing size unless a fixed display size is
/// given with [`RecordingSurface::with_display_size`].
#[derive(Debug)]
pub struct RecordingSurface {
    api: Option<RecordingApi>,
    size: SurfaceSize,
    display: Option<SurfaceSize>,
    resizes: Vec<SurfaceSize>,
}

impl RecordingSurface {
    pub fn new(api: RecordingApi) -> Self {
        Self {
            api: Some(api),
            size: SurfaceSize::new(300, 150),
            display: None,
            resizes: Vec::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            api: None,
            size: SurfaceSize::new(300, 150),
            display: None,
            resizes: Vec::new(),
        }
    }

    pub fn with_display_size(mut self, size: SurfaceSize) -> Self {
        self.display = Some(size);
        self
    }

    pub fn set_display_size(&mut self, size: SurfaceSize) {
        self.display = Some(size);
    }

    /// Every size the renderer pushed onto the surface, oldest first.
    pub fn resizes(&self) -> &[SurfaceSize] {
        &self.resizes
    }
}

impl Surface for RecordingSurface {
    type Api = RecordingApi;

    fn acquire_context(&mut self) -> Option<RecordingApi> {
        self.api.clone()
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn display_size(&self) -> SurfaceSize {
        self.display.unwrap_or(self.size)
    }

    fn set_size(&mut self, size: SurfaceSize) {
        self.size = size;
        self.resizes.push(size);
    }
}
