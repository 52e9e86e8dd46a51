//! Compiled vertex + fragment stage pairs.
//!
//! Compilation never aborts on a syntax error: the driver log is kept on the
//! stage and surfaced through [`ProgramSource::status`], leaving the decision
//! to the caller (see [`crate::ValidationPolicy`]).

use crate::error::RenderError;
use crate::gl::{GraphicsApi, ShaderStage};
use crate::presets::Preset;

/// Why a program could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link: {log}")]
    Link { log: String },
}

/// Outcome of compiling and/or linking; empty means success.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildStatus {
    failures: Vec<BuildError>,
}

impl BuildStatus {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[BuildError] {
        &self.failures
    }

    /// First failure, if any, as a `Result`.
    pub fn check(&self) -> Result<(), BuildError> {
        match self.failures.first() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn push(&mut self, err: BuildError) {
        self.failures.push(err);
    }
}

/// Compile result for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Compiled,
    Failed { log: String },
}

pub(crate) struct CompiledStage<G: GraphicsApi> {
    pub(crate) shader: G::Shader,
    pub(crate) stage: ShaderStage,
    pub(crate) status: StageStatus,
}

impl<G: GraphicsApi> CompiledStage<G> {
    fn compile(api: &G, stage: ShaderStage, text: &str) -> Result<Self, RenderError> {
        let shader = api
            .create_shader(stage)
            .map_err(|message| RenderError::Allocation {
                what: "shader",
                message,
            })?;
        api.shader_source(shader, text);
        api.compile_shader(shader);

        let status = if api.shader_compile_status(shader) {
            StageStatus::Compiled
        } else {
            StageStatus::Failed {
                log: api.shader_info_log(shader).trim().to_string(),
            }
        };
        tracing::trace!(
            %stage,
            ?shader,
            ok = matches!(status, StageStatus::Compiled),
            "compiled shader stage"
        );
        Ok(Self {
            shader,
            stage,
            status,
        })
    }
}

/// The two compiled stages backing one program.
///
/// A source is consumed by [`crate::MultiProgramRenderer::register`]; one that
/// is never registered must be handed back with [`ProgramSource::release`],
/// since the driver does not reclaim shader objects on its own.
pub struct ProgramSource<G: GraphicsApi> {
    pub(crate) vertex: CompiledStage<G>,
    pub(crate) fragment: CompiledStage<G>,
}

impl<G: GraphicsApi> std::fmt::Debug for ProgramSource<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramSource")
            .field("vertex", &self.vertex.shader)
            .field("vertex_status", &self.vertex.status)
            .field("fragment", &self.fragment.shader)
            .field("fragment_status", &self.fragment.status)
            .finish()
    }
}

impl<G: GraphicsApi> ProgramSource<G> {
    /// Compiles both stages. Only object allocation failures are errors.
    pub fn compile(api: &G, vertex: &str, fragment: &str) -> Result<Self, RenderError> {
        let vertex = CompiledStage::compile(api, ShaderStage::Vertex, vertex)?;
        let fragment = match CompiledStage::compile(api, ShaderStage::Fragment, fragment) {
            Ok(fragment) => fragment,
            Err(err) => {
                api.delete_shader(vertex.shader);
                return Err(err);
            }
        };
        Ok(Self { vertex, fragment })
    }

    /// Compiles one of the built-in effects.
    pub fn preset(api: &G, preset: Preset) -> Result<Self, RenderError> {
        Self::compile(api, preset.vertex_source(), preset.fragment_source())
    }

    pub fn vertex_status(&self) -> &StageStatus {
        &self.vertex.status
    }

    pub fn fragment_status(&self) -> &StageStatus {
        &self.fragment.status
    }

    /// Combined compile outcome of both stages.
    pub fn status(&self) -> BuildStatus {
        let mut status = BuildStatus::default();
        for stage in [&self.vertex, &self.fragment] {
            if let StageStatus::Failed { log } = &stage.status {
                status.push(BuildError::Compile {
                    stage: stage.stage,
                    log: log.clone(),
                });
            }
        }
        status
    }

    /// Deletes both stages without linking them.
    pub fn release(self, api: &G) {
        api.delete_shader(self.vertex.shader);
        api.delete_shader(self.fragment.shader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::RecordingApi;

    const VERTEX: &str = "attribute vec4 a_position; void main() { gl_Position = a_position; }";
    const FRAGMENT: &str = "void main() { gl_FragColor = vec4(1.0); }";

    #[test]
    fn compiles_both_stages() {
        let api = RecordingApi::new();
        let source = ProgramSource::compile(&api, VERTEX, FRAGMENT).unwrap();
        assert_eq!(source.vertex_status(), &StageStatus::Compiled);
        assert_eq!(source.fragment_status(), &StageStatus::Compiled);
        assert!(source.status().is_ok());
        assert_eq!(api.live_objects(), 2);
    }

    #[test]
    fn syntax_errors_are_reported_not_raised() {
        let api = RecordingApi::new();
        let source = ProgramSource::compile(&api, VERTEX, "#error broken").unwrap();
        let status = source.status();
        assert!(!status.is_ok());
        assert!(matches!(
            status.check(),
            Err(BuildError::Compile {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
        assert_eq!(source.vertex_status(), &StageStatus::Compiled);
    }

    #[test]
    fn release_deletes_both_stages() {
        let api = RecordingApi::new();
        let source = ProgramSource::compile(&api, VERTEX, FRAGMENT).unwrap();
        source.release(&api);
        assert_eq!(api.live_objects(), 0);
    }

    #[test]
    fn presets_compile() {
        let api = RecordingApi::new();
        for preset in Preset::ALL {
            let source = ProgramSource::preset(&api, preset).unwrap();
            assert!(source.status().is_ok(), "{preset} should compile");
            source.release(&api);
        }
    }
}
