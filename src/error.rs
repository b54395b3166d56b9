use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} failed: {detail}")]
    StageFailed { stage: Stage, detail: String },

    #[error("invalid connection string: {0}")]
    Connection(String),

    #[error("cancelled before {0}")]
    Cancelled(Stage),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn stage(stage: Stage, detail: impl Into<String>) -> Self {
        Self::StageFailed { stage, detail: detail.into() }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
