use char_pipeline::{
    text_pipeline, CharReader, Element, Outlet, PassthroughStage, PipelineBuilder,
    PipelineConfig, PipelineError, RecordWriter, Result as PipelineResult, Stage, StageState,
};
use parking_lot::Mutex;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).expect("Output is not UTF-8")
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn reader(input: &str) -> CharReader<Cursor<Vec<u8>>> {
    CharReader::new(Cursor::new(input.as_bytes().to_vec()))
}

fn run_text(config: &PipelineConfig, input: &str) -> String {
    let sink = SharedSink::default();
    text_pipeline(config)
        .expect("Pipeline build failed")
        .run(reader(input), RecordWriter::new(sink.clone()))
        .expect("Pipeline run failed");
    sink.contents()
}

#[test]
fn test_marker_pairs_end_to_end() {
    let config = PipelineConfig::default().with_record_width(6);
    assert_eq!(run_text(&config, "a**b***c"), "a^b^*c\n");
}

#[test]
fn test_line_breaks_fold_into_records() {
    let config = PipelineConfig::default().with_record_width(5);
    let output = run_text(&config, "ab\ncd\nefgh\nij");
    assert_eq!(output, "ab cd\n efgh\n");
}

#[test]
fn test_no_short_final_record() {
    let input = format!("{}\n12345", "x".repeat(80));
    let output = run_text(&PipelineConfig::default(), &input);
    assert_eq!(output, format!("{}\n", "x".repeat(80)));
}

#[test]
fn test_terminator_inside_record_is_folded() {
    let input = format!("{}\n{}", "y".repeat(79), "tail");
    let output = run_text(&PipelineConfig::default(), &input);
    assert_eq!(output, format!("{} \n", "y".repeat(79)));
}

#[test]
fn test_empty_input_produces_nothing() {
    assert_eq!(run_text(&PipelineConfig::default(), ""), "");
}

#[test]
fn test_trailing_marker_dropped() {
    let config = PipelineConfig::default().with_record_width(3);
    assert_eq!(run_text(&config, "abc*"), "abc\n");
    assert_eq!(run_text(&config, "ab*"), "");
}

#[test]
fn test_single_slot_buffers_preserve_order() {
    let config = PipelineConfig::default()
        .with_record_width(10)
        .with_buffer_capacity(1);
    let input: String = (0..500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let output = run_text(&config, &input);

    let expected: String = input
        .as_bytes()
        .chunks(10)
        .map(|chunk| format!("{}\n", std::str::from_utf8(chunk).unwrap()))
        .collect();
    assert_eq!(output, expected);
}

#[test]
fn test_every_stage_reaches_terminated() {
    let sink = SharedSink::default();
    let running = text_pipeline(&PipelineConfig::default())
        .expect("Pipeline build failed")
        .start(reader(&"z".repeat(1000)), RecordWriter::new(sink.clone()))
        .expect("Pipeline start failed");

    let deadline = Instant::now() + Duration::from_secs(10);
    while running
        .stage_states()
        .iter()
        .any(|s| *s != StageState::Terminated)
    {
        assert!(Instant::now() < deadline, "pipeline did not terminate");
        std::thread::sleep(Duration::from_millis(5));
    }

    let source_metrics = running.stage_metrics(0).expect("Metrics not found");
    assert_eq!(source_metrics.total_received(), 1000);
    assert!(running.stage_metrics(4).is_none());
    let summary = running.metrics_summary();
    assert!(summary.contains("Stage 2 (marker_collapse)"));
    assert!(summary.contains("Received: 1000"));

    let report = running.wait().expect("Wait failed");
    assert_eq!(report.stages.len(), 4);
    assert_eq!(report.stages[0].metrics.total_received, 1000);
    assert_eq!(report.stages[3].metrics.total_emitted, 12 * 81);
    assert_eq!(sink.contents().lines().count(), 12);
}

#[test]
fn test_long_generic_chain() {
    let mut builder = PipelineBuilder::new().with_buffer_capacity(2);
    for _ in 0..8 {
        builder = builder.add_stage(PassthroughStage);
    }
    let pipeline = builder.build().expect("Pipeline build failed");
    assert_eq!(pipeline.buffer_capacities().len(), 7);

    let sink = SharedSink::default();
    pipeline
        .run(reader("ordered\nstream"), RecordWriter::new(sink.clone()))
        .expect("Pipeline run failed");
    assert_eq!(sink.contents(), "ordered\nstream");
}

#[test]
fn test_custom_stage() {
    struct UppercaseStage;

    impl Stage for UppercaseStage {
        fn process(&mut self, input: char, out: &mut Vec<char>) {
            out.extend(input.to_uppercase());
        }

        fn name(&self) -> &str {
            "uppercase"
        }
    }

    let sink = SharedSink::default();
    let report = PipelineBuilder::new()
        .add_stage(PassthroughStage)
        .add_stage(UppercaseStage)
        .build()
        .expect("Pipeline build failed")
        .run(reader("straße"), RecordWriter::new(sink.clone()))
        .expect("Pipeline run failed");

    assert_eq!(sink.contents(), "STRASSE");
    assert_eq!(report.stages[1].name, "uppercase");
    assert_eq!(report.stages[1].metrics.total_emitted, 7);
}

struct BrokenReader {
    remaining: usize,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
        }
        let n = self.remaining.min(buf.len());
        buf[..n].fill(b'r');
        self.remaining -= n;
        Ok(n)
    }
}

#[test]
fn test_input_failure_terminates_pipeline() {
    let sink = SharedSink::default();
    let result = text_pipeline(&PipelineConfig::default().with_record_width(4))
        .expect("Pipeline build failed")
        .run(
            CharReader::new(BrokenReader { remaining: 10 }),
            RecordWriter::new(sink.clone()),
        );

    match result {
        Err(PipelineError::StageError { stage, .. }) => assert_eq!(stage, "passthrough"),
        other => panic!("expected stage error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(sink.contents(), "rrrr\nrrrr\n");
}

struct RejectingSink;

impl Outlet for RejectingSink {
    fn send(&mut self, _element: Element) -> PipelineResult<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed").into())
    }
}

#[test]
fn test_output_failure_does_not_block_upstream() {
    let config = PipelineConfig::default()
        .with_record_width(1)
        .with_buffer_capacity(1);
    let result = text_pipeline(&config)
        .expect("Pipeline build failed")
        .run(reader(&"w".repeat(200)), RejectingSink);

    match result {
        Err(PipelineError::StageError { stage, .. }) => assert_eq!(stage, "record_chunk"),
        other => panic!("expected stage error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_panicking_stage_reports_error_instead_of_hanging() {
    struct PanickingStage;

    impl Stage for PanickingStage {
        fn process(&mut self, _input: char, _out: &mut Vec<char>) {
            panic!("transform blew up");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    let pipeline = PipelineBuilder::new()
        .with_buffer_capacity(2)
        .add_stage(PassthroughStage)
        .add_stage(PanickingStage)
        .add_stage(PassthroughStage)
        .build()
        .expect("Pipeline build failed");

    let sink = SharedSink::default();
    let writer = RecordWriter::new(sink.clone());
    let (done_tx, done_rx) = crossbeam::channel::bounded(1);
    thread::spawn(move || {
        let _ = done_tx.send(pipeline.run(reader(&"p".repeat(100)), writer));
    });

    let result = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("pipeline did not terminate after a stage panicked");
    match result {
        Err(PipelineError::StageError { stage, source }) => {
            assert_eq!(stage, "panicking");
            assert!(matches!(*source, PipelineError::ThreadError(_)));
        }
        other => panic!("expected stage error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(sink.contents(), "");
}

#[test]
fn test_custom_record_separator() {
    let config = PipelineConfig::default()
        .with_record_width(3)
        .with_record_separator('|');
    let sink = SharedSink::default();
    text_pipeline(&config)
        .expect("Pipeline build failed")
        .run(reader("abcdefg"), config.record_writer(sink.clone()))
        .expect("Pipeline run failed");
    assert_eq!(sink.contents(), "abc|def|");
}
