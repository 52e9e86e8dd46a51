use glow::HasContext;

use super::{BlendFactor, Components, GraphicsApi, MatrixDim, ShaderStage};

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

// SAFETY (all methods): the renderer owns this context and only touches it from
// the thread that made it current, which is the contract `glow` requires.
impl GraphicsApi for glow::Context {
    type Shader = <glow::Context as HasContext>::Shader;
    type Program = <glow::Context as HasContext>::Program;
    type Buffer = <glow::Context as HasContext>::Buffer;
    type Framebuffer = <glow::Context as HasContext>::Framebuffer;
    type Renderbuffer = <glow::Context as HasContext>::Renderbuffer;
    type UniformLocation = <glow::Context as HasContext>::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { HasContext::create_shader(self, kind) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::detach_shader(self, program, shader) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.get_attrib_location(program, name) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>) {
        unsafe { self.bind_buffer(glow::ARRAY_BUFFER, buffer) }
    }

    fn array_buffer_data(&self, data: &[u8]) {
        unsafe { self.buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::STATIC_DRAW) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String> {
        unsafe { HasContext::create_framebuffer(self) }
    }

    fn create_renderbuffer(&self) -> Result<Self::Renderbuffer, String> {
        unsafe { HasContext::create_renderbuffer(self) }
    }

    fn attach_color_renderbuffer(
        &self,
        framebuffer: Self::Framebuffer,
        renderbuffer: Self::Renderbuffer,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            self.renderbuffer_storage(glow::RENDERBUFFER, glow::RGBA8, width, height);
            self.bind_renderbuffer(glow::RENDERBUFFER, None);
            HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, Some(framebuffer));
            self.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::RENDERBUFFER,
                Some(renderbuffer),
            );
        }
    }

    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>) {
        unsafe { HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, framebuffer) }
    }

    fn blit_to_default(&self, framebuffer: Self::Framebuffer, src: (i32, i32), dst: (i32, i32)) {
        unsafe {
            HasContext::bind_framebuffer(self, glow::READ_FRAMEBUFFER, Some(framebuffer));
            HasContext::bind_framebuffer(self, glow::DRAW_FRAMEBUFFER, None);
            self.blit_framebuffer(
                0,
                0,
                src.0,
                src.1,
                0,
                0,
                dst.0,
                dst.1,
                glow::COLOR_BUFFER_BIT,
                glow::LINEAR,
            );
            HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, None);
        }
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        unsafe { HasContext::delete_framebuffer(self, framebuffer) }
    }

    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer) {
        unsafe { HasContext::delete_renderbuffer(self, renderbuffer) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { HasContext::clear_color(self, red, green, blue, alpha) }
    }

    fn clear_color_buffer(&self) {
        unsafe { self.clear(glow::COLOR_BUFFER_BIT) }
    }

    fn enable_blend(&self) {
        unsafe { self.enable(glow::BLEND) }
    }

    fn blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        unsafe { HasContext::blend_func(self, blend_factor(src), blend_factor(dst)) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, stride: i32, offset: i32) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self,
                index,
                size,
                glow::FLOAT,
                false,
                stride,
                offset,
            )
        }
    }

    fn uniform_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        components: Components,
        values: &[f32],
    ) {
        unsafe {
            match components {
                Components::One => self.uniform_1_f32_slice(location, values),
                Components::Two => self.uniform_2_f32_slice(location, values),
                Components::Three => self.uniform_3_f32_slice(location, values),
                Components::Four => self.uniform_4_f32_slice(location, values),
            }
        }
    }

    fn uniform_i32(
        &self,
        location: Option<&Self::UniformLocation>,
        components: Components,
        values: &[i32],
    ) {
        unsafe {
            match components {
                Components::One => self.uniform_1_i32_slice(location, values),
                Components::Two => self.uniform_2_i32_slice(location, values),
                Components::Three => self.uniform_3_i32_slice(location, values),
                Components::Four => self.uniform_4_i32_slice(location, values),
            }
        }
    }

    fn uniform_matrix_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        dim: MatrixDim,
        values: &[f32],
    ) {
        unsafe {
            match dim {
                MatrixDim::Two => self.uniform_matrix_2_f32_slice(location, false, values),
                MatrixDim::Three => self.uniform_matrix_3_f32_slice(location, false, values),
                MatrixDim::Four => self.uniform_matrix_4_f32_slice(location, false, values),
            }
        }
    }

    fn draw_triangle_strip(&self, first: i32, count: i32) {
        unsafe { self.draw_arrays(glow::TRIANGLE_STRIP, first, count) }
    }
}
