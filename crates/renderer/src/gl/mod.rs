//! The narrow slice of a GL-style graphics API the renderer depends on.
//!
//! Every call the multi-program loop issues goes through [`GraphicsApi`], so
//! the same renderer drives a real `glow` context on the desktop and the
//! in-memory [`RecordingApi`] in tests. Methods take `&self` and are safe: an
//! implementation is responsible for only being used on the thread where its
//! context is current.

use std::fmt::Debug;

#[cfg(feature = "glow")]
mod native;
#[cfg(any(test, feature = "testing"))]
mod recording;

#[cfg(any(test, feature = "testing"))]
pub use recording::{Call, RecordingApi, RecordingSurface};

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Blend factors used by the compositing setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Component count of a vector uniform (`uniform{N}f`, `uniform{N}i`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Components {
    One,
    Two,
    Three,
    Four,
}

impl Components {
    pub fn count(self) -> usize {
        match self {
            Components::One => 1,
            Components::Two => 2,
            Components::Three => 3,
            Components::Four => 4,
        }
    }
}

/// Edge length of a square matrix uniform (`uniformMatrix{N}fv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixDim {
    Two,
    Three,
    Four,
}

impl MatrixDim {
    /// Number of floats in one matrix.
    pub fn element_count(self) -> usize {
        match self {
            MatrixDim::Two => 4,
            MatrixDim::Three => 9,
            MatrixDim::Four => 16,
        }
    }
}

/// GL-shaped operations consumed by [`crate::MultiProgramRenderer`].
///
/// Creation calls return `Err` with a driver message when the object cannot be
/// allocated. Status queries (`shader_compile_status`, `program_link_status`)
/// never fail; callers decide what a `false` means.
pub trait GraphicsApi {
    type Shader: Copy + Debug;
    type Program: Copy + Debug;
    type Buffer: Copy + Debug;
    type Framebuffer: Copy + Debug;
    type Renderbuffer: Copy + Debug;
    type UniformLocation: Clone + Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn use_program(&self, program: Option<Self::Program>);
    fn delete_program(&self, program: Self::Program);

    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>);
    /// Uploads `data` into the bound array buffer with static usage.
    fn array_buffer_data(&self, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn create_renderbuffer(&self) -> Result<Self::Renderbuffer, String>;
    /// Gives `renderbuffer` RGBA8 storage and makes it the colour target of
    /// `framebuffer`, which is left bound.
    fn attach_color_renderbuffer(
        &self,
        framebuffer: Self::Framebuffer,
        renderbuffer: Self::Renderbuffer,
        width: i32,
        height: i32,
    );
    /// Binds `framebuffer` for drawing; `None` selects the default framebuffer.
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    /// Scales the colour contents of `framebuffer` over the default
    /// framebuffer with linear filtering and leaves the default bound.
    fn blit_to_default(
        &self,
        framebuffer: Self::Framebuffer,
        src: (i32, i32),
        dst: (i32, i32),
    );
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear_color_buffer(&self);
    fn enable_blend(&self);
    fn blend_func(&self, src: BlendFactor, dst: BlendFactor);

    fn enable_vertex_attrib_array(&self, index: u32);
    /// Points attribute `index` at the bound array buffer as `size` floats.
    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, stride: i32, offset: i32);

    fn uniform_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        components: Components,
        values: &[f32],
    );
    fn uniform_i32(
        &self,
        location: Option<&Self::UniformLocation>,
        components: Components,
        values: &[i32],
    );
    fn uniform_matrix_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        dim: MatrixDim,
        values: &[f32],
    );

    fn draw_triangle_strip(&self, first: i32, count: i32);
}
