use crate::buffer::{Consumer, Producer};
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crossbeam::atomic::AtomicCell;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A value flowing through a pipeline buffer.
///
/// `EndOfStream` is the last element ever deposited into any buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Data(char),
    EndOfStream,
}

/// Lifecycle of a stage task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Spawned but not yet looping
    Pending,
    /// Moving data
    Running,
    /// End of stream observed, marker not yet forwarded
    Terminating,
    /// Marker forwarded; the task has exited its loop
    Terminated,
}

/// Trait for a per-character transformation run by one stage
pub trait Stage: Send + 'static {
    /// Process one input character, pushing 0, 1, or more outputs to `out`
    fn process(&mut self, input: char, out: &mut Vec<char>);

    /// Called once when end of stream arrives, before it is forwarded.
    /// Anything left in `out` is emitted ahead of the marker.
    fn finish(&mut self, _out: &mut Vec<char>) {}

    /// Called before the stage starts processing
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when the stage is shutting down
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// Where a stage pulls elements from
pub trait Inlet: Send + 'static {
    /// Block until the next element is available
    fn next_element(&mut self) -> Result<Element>;
}

/// Where a stage pushes elements to
pub trait Outlet: Send + 'static {
    /// Block until the element has been accepted
    fn send(&mut self, element: Element) -> Result<()>;

    /// Number of sends that had to wait for room downstream
    fn block_count(&self) -> u64 {
        0
    }
}

impl Inlet for Consumer<Element> {
    fn next_element(&mut self) -> Result<Element> {
        Ok(self.remove())
    }
}

impl Outlet for Producer<Element> {
    fn send(&mut self, element: Element) -> Result<()> {
        self.deposit(element);
        Ok(())
    }

    fn block_count(&self) -> u64 {
        Producer::block_count(self)
    }
}

/// Runs a stage by pulling from its inlet, processing, and pushing to its outlet
pub struct StageRunner {
    index: usize,
    inlet: Box<dyn Inlet>,
    outlet: Box<dyn Outlet>,
    metrics: StageMetrics,
    state: Arc<AtomicCell<StageState>>,
}

impl StageRunner {
    /// Create a new stage runner
    pub fn new(index: usize, inlet: Box<dyn Inlet>, outlet: Box<dyn Outlet>) -> Self {
        Self {
            index,
            inlet,
            outlet,
            metrics: StageMetrics::new(),
            state: Arc::new(AtomicCell::new(StageState::Pending)),
        }
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Get a handle to the published stage state
    pub fn state_handle(&self) -> Arc<AtomicCell<StageState>> {
        Arc::clone(&self.state)
    }

    fn transition(&self, name: &str, next: StageState) {
        let previous = self.state.swap(next);
        debug!(stage = name, index = self.index, from = ?previous, to = ?next, "stage transition");
    }

    /// Run the stage until end of stream has been forwarded.
    ///
    /// End of stream is forwarded exactly once even when an endpoint fails:
    /// an inlet error is treated as end of stream, and after an outlet error
    /// the remaining upstream elements are drained and discarded so that
    /// upstream stages never stay blocked. A panic in the stage's `process`
    /// or `finish` is caught and handled like an outlet error, surfacing as
    /// [`PipelineError::ThreadError`]. The first error is returned.
    pub fn run(&mut self, mut stage: Box<dyn Stage>) -> Result<()> {
        let name = stage.name().to_owned();
        self.metrics.record_start();
        self.transition(&name, StageState::Running);

        let mut failure = stage.on_start().err();
        let mut out = Vec::new();

        loop {
            let element = match self.inlet.next_element() {
                Ok(element) => element,
                Err(e) => {
                    error!(stage = %name, "input failed, ending stream: {}", e);
                    failure.get_or_insert(e);
                    Element::EndOfStream
                }
            };

            match element {
                Element::Data(c) => {
                    self.metrics.record_received();
                    if failure.is_some() {
                        continue;
                    }
                    let processed =
                        panic::catch_unwind(AssertUnwindSafe(|| stage.process(c, &mut out)));
                    if let Err(payload) = processed {
                        error!(stage = %name, "stage panicked, draining upstream");
                        out.clear();
                        failure = Some(panicked(payload));
                        continue;
                    }
                    if let Err(e) = self.emit(&mut out) {
                        warn!(stage = %name, "output failed, draining upstream: {}", e);
                        failure = Some(e);
                    }
                }
                Element::EndOfStream => {
                    self.transition(&name, StageState::Terminating);
                    if failure.is_none() {
                        match panic::catch_unwind(AssertUnwindSafe(|| stage.finish(&mut out))) {
                            Ok(()) => {
                                if let Err(e) = self.emit(&mut out) {
                                    failure = Some(e);
                                }
                            }
                            Err(payload) => failure = Some(panicked(payload)),
                        }
                    }
                    out.clear();
                    if let Err(e) = self.outlet.send(Element::EndOfStream) {
                        failure.get_or_insert(e);
                    }
                    break;
                }
            }
        }

        if let Err(e) = stage.on_shutdown() {
            failure.get_or_insert(e);
        }
        self.metrics.set_blocks(self.outlet.block_count());
        self.metrics.record_finish();
        self.transition(&name, StageState::Terminated);

        match failure {
            Some(e) => Err(e.in_stage(name)),
            None => Ok(()),
        }
    }

    fn emit(&mut self, out: &mut Vec<char>) -> Result<()> {
        for c in out.drain(..) {
            self.outlet.send(Element::Data(c))?;
            self.metrics.record_emitted();
        }
        Ok(())
    }
}

/// A pass-through stage, used by the source stage
#[derive(Debug)]
pub struct PassthroughStage;

impl Stage for PassthroughStage {
    fn process(&mut self, input: char, out: &mut Vec<char>) {
        out.push(input);
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> PipelineError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    PipelineError::ThreadError(format!("stage panicked: {}", message))
}

/// Error returned by an endpoint that has been closed
pub(crate) fn closed_endpoint(what: &str) -> PipelineError {
    PipelineError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("{} already received end of stream", what),
    ))
}
