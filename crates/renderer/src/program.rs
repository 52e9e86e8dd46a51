//! Linked GPU programs and their binding-slot caches.

use std::collections::HashMap;
use std::fmt;

use crate::error::RenderError;
use crate::gl::GraphicsApi;
use crate::source::{BuildError, BuildStatus, ProgramSource};

/// Vertex attribute every program reads the quad position from.
pub const POSITION_ATTRIBUTE: &str = "a_position";

/// Memoized attribute slot. Slot 0 is a real slot, so "never asked" needs its
/// own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    #[default]
    Unresolved,
    Present(u32),
    Absent,
}

/// One linked program plus the stages it was built from.
pub struct ProgramUnit<G: GraphicsApi> {
    program: G::Program,
    vertex: G::Shader,
    fragment: G::Shader,
    status: BuildStatus,
    // Key present means the driver was asked; `None` means it had no slot.
    uniforms: HashMap<String, Option<G::UniformLocation>>,
    attribute: Lookup,
}

impl<G: GraphicsApi> ProgramUnit<G> {
    /// Attaches both stages of `source` to a new program and links it.
    ///
    /// Compile and link failures are recorded in [`ProgramUnit::status`];
    /// only a failure to allocate the program object is an error, in which
    /// case the stages are released.
    pub fn link(api: &G, source: ProgramSource<G>) -> Result<Self, RenderError> {
        let program = match api.create_program() {
            Ok(program) => program,
            Err(message) => {
                source.release(api);
                return Err(RenderError::Allocation {
                    what: "program",
                    message,
                });
            }
        };

        let mut status = source.status();
        let ProgramSource { vertex, fragment } = source;
        api.attach_shader(program, vertex.shader);
        api.attach_shader(program, fragment.shader);
        api.link_program(program);
        if !api.program_link_status(program) {
            status.push(BuildError::Link {
                log: api.program_info_log(program).trim().to_string(),
            });
        }

        tracing::debug!(?program, ok = status.is_ok(), "linked program");
        Ok(Self {
            program,
            vertex: vertex.shader,
            fragment: fragment.shader,
            status,
            uniforms: HashMap::new(),
            attribute: Lookup::Unresolved,
        })
    }

    pub fn program(&self) -> G::Program {
        self.program
    }

    pub fn status(&self) -> &BuildStatus {
        &self.status
    }

    /// Location of uniform `name`, asking the driver at most once per name.
    pub fn uniform_location(&mut self, api: &G, name: &str) -> Option<&G::UniformLocation> {
        if !self.uniforms.contains_key(name) {
            let location = api.uniform_location(self.program, name);
            if location.is_none() {
                tracing::trace!(program = ?self.program, name, "uniform not active in program");
            }
            self.uniforms.insert(name.to_string(), location);
        }
        self.uniforms.get(name).and_then(Option::as_ref)
    }

    /// Slot of [`POSITION_ATTRIBUTE`], resolved on first use.
    pub fn attribute_location(&mut self, api: &G) -> Option<u32> {
        if self.attribute == Lookup::Unresolved {
            self.attribute = match api.attribute_location(self.program, POSITION_ATTRIBUTE) {
                Some(slot) => Lookup::Present(slot),
                None => Lookup::Absent,
            };
        }
        match self.attribute {
            Lookup::Present(slot) => Some(slot),
            Lookup::Unresolved | Lookup::Absent => None,
        }
    }

    pub fn attribute_lookup(&self) -> Lookup {
        self.attribute
    }

    /// Detaches and deletes both stages, then deletes the program.
    pub fn release(self, api: &G) {
        api.detach_shader(self.program, self.vertex);
        api.detach_shader(self.program, self.fragment);
        api.delete_shader(self.vertex);
        api.delete_shader(self.fragment);
        api.delete_program(self.program);
    }
}

impl<G: GraphicsApi> fmt::Debug for ProgramUnit<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramUnit")
            .field("program", &self.program)
            .field("status", &self.status)
            .field("cached_uniforms", &self.uniforms.len())
            .field("attribute", &self.attribute)
            .finish()
    }
}
