use thiserror::Error;

/// Result type for char pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A buffer was requested with zero slots
    #[error("Buffer capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    /// Backing storage for a buffer could not be reserved
    #[error("Failed to allocate storage for {capacity} buffer slots")]
    Allocation { capacity: usize },

    /// No stages in pipeline
    #[error("Cannot start pipeline with no stages")]
    NoStages,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading the external input or writing the external output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stage reported a failure from one of its endpoints
    #[error("Stage '{stage}' failed: {source}")]
    StageError {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// Thread spawn or join error
    #[error("Thread error: {0}")]
    ThreadError(String),
}

impl PipelineError {
    /// Wrap an error with the name of the stage it surfaced in
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        PipelineError::StageError {
            stage: stage.into(),
            source: Box::new(self),
        }
    }
}
