use crate::endpoint::RecordWriter;
use crate::error::{PipelineError, Result};
use crate::pipeline::{Pipeline, PipelineBuilder, DEFAULT_BUFFER_CAPACITY};
use crate::stage::PassthroughStage;
use crate::transform::{LineFoldStage, MarkerCollapseStage, RecordChunkStage};

/// Record width used when none is configured
pub const DEFAULT_RECORD_WIDTH: usize = 80;

/// Settings for the standard four-stage text pipeline:
/// source, line folding, marker collapsing, record chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Characters per output record
    pub record_width: usize,
    /// Written after each record; the output is flushed on it
    pub record_separator: char,
    /// Slots in each of the three hand-off buffers
    pub buffer_capacity: usize,
    /// Character folded by the second stage
    pub line_terminator: char,
    /// What the line terminator is folded into
    pub fold_replacement: char,
    /// Character whose adjacent pairs are collapsed
    pub marker: char,
    /// What a collapsed pair becomes
    pub substitute: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            record_width: DEFAULT_RECORD_WIDTH,
            record_separator: '\n',
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            line_terminator: '\n',
            fold_replacement: ' ',
            marker: '*',
            substitute: '^',
        }
    }
}

impl PipelineConfig {
    /// Set the number of characters per output record
    pub fn with_record_width(mut self, width: usize) -> Self {
        self.record_width = width;
        self
    }

    /// Set the number of slots in each hand-off buffer
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the marker character and what a pair of them collapses into
    pub fn with_marker(mut self, marker: char, substitute: char) -> Self {
        self.marker = marker;
        self.substitute = substitute;
        self
    }

    /// Set the line terminator and what it folds into
    pub fn with_line_fold(mut self, terminator: char, replacement: char) -> Self {
        self.line_terminator = terminator;
        self.fold_replacement = replacement;
        self
    }

    /// Set the character written after each record
    pub fn with_record_separator(mut self, separator: char) -> Self {
        self.record_separator = separator;
        self
    }

    /// A writer for the pipeline's output that flushes at this config's
    /// record separator
    pub fn record_writer<W: std::io::Write>(&self, writer: W) -> RecordWriter<W> {
        RecordWriter::new(writer).with_separator(self.record_separator)
    }

    /// Check the settings for values that cannot produce a working pipeline
    pub fn validate(&self) -> Result<()> {
        if self.record_width == 0 {
            return Err(PipelineError::Config("record width must be positive".into()));
        }
        if self.buffer_capacity == 0 {
            return Err(PipelineError::InvalidCapacity(self.buffer_capacity));
        }
        if self.marker == self.substitute {
            return Err(PipelineError::Config(format!(
                "marker and substitute must differ, both are {:?}",
                self.marker
            )));
        }
        if self.fold_replacement == self.line_terminator {
            return Err(PipelineError::Config(format!(
                "line terminator {:?} cannot fold into itself",
                self.line_terminator
            )));
        }
        Ok(())
    }
}

/// Build the standard four-stage text pipeline described by `config`
pub fn text_pipeline(config: &PipelineConfig) -> Result<Pipeline> {
    config.validate()?;
    PipelineBuilder::new()
        .with_buffer_capacity(config.buffer_capacity)
        .add_stage(PassthroughStage)
        .add_stage(LineFoldStage::new(
            config.line_terminator,
            config.fold_replacement,
        ))
        .add_stage(MarkerCollapseStage::new(config.marker, config.substitute))
        .add_stage(
            RecordChunkStage::new(config.record_width).with_separator(config.record_separator),
        )
        .build()
}
