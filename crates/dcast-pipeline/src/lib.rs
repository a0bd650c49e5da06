//! DiffCast pipeline core: the stage orchestrator, per-language track
//! fan-out, and the idempotent scheduler with its bounded worker pool.

pub mod adapters;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod scheduler;
mod tracks;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use capabilities::{
    ClipSynthesizer, DemoRecorder, GoalGenerator, Narrator, ScriptGenerator, SpeechSynthesizer,
    VideoAssembler,
};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{Orchestrator, PipelineDeps};
pub use scheduler::{EnqueueOutcome, Scheduler, REASON_QUEUED, REASON_RUNNING_OR_COMPLETED};
pub use workspace::JobWorkspace;
