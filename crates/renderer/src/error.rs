use scheduler::SchedulerError;

use crate::source::BuildError;
use crate::uniforms::UniformError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("graphics context could not be acquired from the surface")]
    ContextUnavailable,
    #[error("failed to allocate {what}: {message}")]
    Allocation { what: &'static str, message: String },
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("uniform '{name}' could not be uploaded: {source}")]
    Uniform {
        name: String,
        #[source]
        source: UniformError,
    },
    #[error("renderer has been destroyed")]
    Destroyed,
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
