use crate::buffer::{BoundedBuffer, Consumer, Producer};
use crate::error::{PipelineError, Result};
use crate::metrics::{MetricsSnapshot, StageMetrics};
use crate::stage::{Element, Inlet, Outlet, Stage, StageRunner, StageState};
use crossbeam::atomic::AtomicCell;
use std::iter;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use tracing::{error, info};

/// Buffer capacity used when none is configured
pub const DEFAULT_BUFFER_CAPACITY: usize = 80;

/// A stage configuration in the pipeline builder
struct PipelineStage {
    stage: Box<dyn Stage>,
    buffer_capacity: Option<usize>,
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    stages: Vec<PipelineStage>,
    buffer_capacity: usize,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Capacity of every buffer whose upstream stage does not set its own
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Append a stage; its output buffer uses the default capacity
    pub fn add_stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(PipelineStage {
            stage: Box::new(stage),
            buffer_capacity: None,
        });
        self
    }

    /// Append a stage whose output buffer has `capacity` slots.
    /// The capacity is unused for the last stage, which writes to the sink.
    pub fn add_stage_with_capacity(mut self, stage: impl Stage, capacity: usize) -> Self {
        self.stages.push(PipelineStage {
            stage: Box::new(stage),
            buffer_capacity: Some(capacity),
        });
        self
    }

    /// Build the pipeline, creating one buffer per adjacent stage pair
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        if self.buffer_capacity == 0 {
            return Err(PipelineError::InvalidCapacity(0));
        }

        let links = self.stages.len() - 1;
        let mut producers = Vec::with_capacity(links);
        let mut consumers = Vec::with_capacity(links);
        let mut capacities = Vec::with_capacity(links);

        for stage in &self.stages[..links] {
            let capacity = stage.buffer_capacity.unwrap_or(self.buffer_capacity);
            let (producer, consumer) = BoundedBuffer::split(capacity)?;
            producers.push(producer);
            consumers.push(consumer);
            capacities.push(capacity);
        }

        Ok(Pipeline {
            stages: self.stages.into_iter().map(|s| s.stage).collect(),
            producers,
            consumers,
            capacities,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A chain of N stages joined by N-1 bounded buffers, ready to start
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    producers: Vec<Producer<Element>>,
    consumers: Vec<Consumer<Element>>,
    capacities: Vec<usize>,
}

impl Pipeline {
    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; a built pipeline has at least one stage
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in pipeline order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_owned()).collect()
    }

    /// Capacity of each buffer, upstream first
    pub fn buffer_capacities(&self) -> &[usize] {
        &self.capacities
    }

    /// Start every stage on its own thread.
    ///
    /// The first stage reads from `source` and the last writes to `sink`;
    /// each buffer's producer goes to the stage before it and its consumer
    /// to the stage after it.
    ///
    /// If a stage thread fails to spawn, `ThreadError` is returned and the
    /// stages already spawned are left detached, blocked on their buffers.
    /// Treat that error as fatal to the process.
    pub fn start<I, O>(self, source: I, sink: O) -> Result<RunningPipeline>
    where
        I: Inlet,
        O: Outlet,
    {
        let inlets = iter::once(Box::new(source) as Box<dyn Inlet>).chain(
            self.consumers
                .into_iter()
                .map(|c| Box::new(c) as Box<dyn Inlet>),
        );
        let outlets = self
            .producers
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Outlet>)
            .chain(iter::once(Box::new(sink) as Box<dyn Outlet>));

        let mut handles = Vec::with_capacity(self.stages.len());
        for (index, ((stage, inlet), outlet)) in
            self.stages.into_iter().zip(inlets).zip(outlets).enumerate()
        {
            let name = stage.name().to_owned();
            let mut runner = StageRunner::new(index, inlet, outlet);
            let metrics = runner.metrics().clone();
            let state = runner.state_handle();

            let handle = Builder::new()
                .name(format!("stage-{}-{}", index, name))
                .spawn(move || runner.run(stage))
                .map_err(|e| {
                    PipelineError::ThreadError(format!("failed to spawn stage '{}': {}", name, e))
                })?;

            handles.push(StageHandle {
                name,
                state,
                metrics,
                handle,
            });
        }

        info!(stages = handles.len(), "pipeline started");
        Ok(RunningPipeline { stages: handles })
    }

    /// Start the pipeline and wait for every stage to terminate
    pub fn run<I, O>(self, source: I, sink: O) -> Result<PipelineReport>
    where
        I: Inlet,
        O: Outlet,
    {
        self.start(source, sink)?.wait()
    }
}

struct StageHandle {
    name: String,
    state: Arc<AtomicCell<StageState>>,
    metrics: StageMetrics,
    handle: JoinHandle<Result<()>>,
}

/// A running pipeline that can be monitored and waited on
pub struct RunningPipeline {
    stages: Vec<StageHandle>,
}

impl RunningPipeline {
    /// Current state of each stage, in pipeline order
    pub fn stage_states(&self) -> Vec<StageState> {
        self.stages.iter().map(|s| s.state.load()).collect()
    }

    /// Get metrics for a stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.stages.get(index).map(|s| &s.metrics)
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, stage) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                stage.name,
                stage.metrics.snapshot().format()
            ));
        }
        summary
    }

    /// Wait for every stage to terminate.
    ///
    /// Stages are joined in pipeline order. All stages are joined even if
    /// one fails; the first failure is returned.
    pub fn wait(self) -> Result<PipelineReport> {
        let mut first_error = None;
        let mut reports = Vec::with_capacity(self.stages.len());

        for stage in self.stages {
            let outcome = match stage.handle.join() {
                Ok(result) => result,
                Err(_) => Err(PipelineError::ThreadError(format!(
                    "stage '{}' panicked",
                    stage.name
                ))),
            };
            if let Err(e) = outcome {
                error!(stage = %stage.name, "stage failed: {}", e);
                first_error.get_or_insert(e);
            }
            reports.push(StageReport {
                name: stage.name,
                metrics: stage.metrics.snapshot(),
            });
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(stages = reports.len(), "pipeline finished");
                Ok(PipelineReport { stages: reports })
            }
        }
    }
}

/// Final metrics for one stage
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub metrics: MetricsSnapshot,
}

/// Final metrics for a completed pipeline
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Get a summary of all metrics
    pub fn summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, stage) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                stage.name,
                stage.metrics.format()
            ));
        }
        summary
    }
}
