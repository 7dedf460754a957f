//! Pipeline error taxonomy
//!
//! Whole-media failures are fatal and carry distinct exit codes; anything
//! that affects only a single fragment is handled where it happens and
//! never reaches this type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot reach media source {source_path}: {reason}")]
    MediaUnreachable {
        source_path: String,
        reason: String,
    },

    #[error("missing external tool {tool}: {hint}")]
    MissingTool { tool: String, hint: String },

    #[error("unrecognized time string {input:?}")]
    TimeParse { input: String },

    #[error("timefile {path}: {reason}")]
    TimefileParse { path: PathBuf, reason: String },

    #[error("no words left to turn after filtering")]
    NoWords,

    #[error("fragment {text:?} ({start:.2}s - {end:.2}s) straddles a sentence boundary")]
    FragmentOutsideSentence {
        text: String,
        start: f64,
        end: f64,
    },

    #[error("word timestamps are not monotonically ordered")]
    UnorderedWords,

    #[error("no fragment could be synthesized")]
    NothingSynthesized,

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl PipelineError {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::MediaUnreachable { .. } => 2,
            PipelineError::MissingTool { .. } => 3,
            PipelineError::TimeParse { .. } | PipelineError::TimefileParse { .. } => 4,
            PipelineError::NoWords => 5,
            PipelineError::FragmentOutsideSentence { .. } | PipelineError::UnorderedWords => 6,
            PipelineError::NothingSynthesized => 7,
            PipelineError::Collaborator(_) => 1,
        }
    }
}
