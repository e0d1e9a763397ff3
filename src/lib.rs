//! A fixed chain of concurrent character-transform stages joined by bounded
//! hand-off buffers.
//!
//! Every stage runs on its own thread. Adjacent stages share one bounded
//! buffer with exactly one producer and one consumer, coordinated by two
//! counting semaphores. Data moves one character at a time; the end of the
//! stream is an explicit [`Element::EndOfStream`] that each stage forwards
//! before it terminates, so the whole chain shuts down in order.
//!
//! # Features
//!
//! - Blocking single-producer/single-consumer circular buffers
//! - Builder pattern for pipelines of any length
//! - Per-stage metrics: elements received and emitted, block events, throughput
//! - The standard text pipeline: line folding, marker-pair collapsing,
//!   fixed-width records
//!
//! # Example
//!
//! ```
//! use char_pipeline::{text_pipeline, CharReader, PipelineConfig, RecordWriter};
//!
//! let config = PipelineConfig::default().with_record_width(4);
//! let pipeline = text_pipeline(&config)?;
//! let report = pipeline.run(
//!     CharReader::new(std::io::Cursor::new(b"ab**\ncd".to_vec())),
//!     RecordWriter::new(std::io::sink()),
//! )?;
//! assert_eq!(report.stages.len(), 4);
//! # Ok::<(), char_pipeline::PipelineError>(())
//! ```

pub mod buffer;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod semaphore;
pub mod stage;
pub mod transform;

// Re-exports for convenience
pub use buffer::{BoundedBuffer, Consumer, Producer};
pub use config::{text_pipeline, PipelineConfig, DEFAULT_RECORD_WIDTH};
pub use endpoint::{CharReader, RecordWriter};
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineReport, RunningPipeline, StageReport,
    DEFAULT_BUFFER_CAPACITY,
};
pub use semaphore::Semaphore;
pub use stage::{Element, Inlet, Outlet, PassthroughStage, Stage, StageRunner, StageState};
pub use transform::{LineFoldStage, MarkerCollapseStage, RecordChunkStage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
