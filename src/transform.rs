//! The character policies applied by the standard text pipeline.

use crate::stage::Stage;

/// Replaces every line terminator with a fixed character. 1-to-1, stateless.
#[derive(Debug, Clone)]
pub struct LineFoldStage {
    terminator: char,
    replacement: char,
}

impl LineFoldStage {
    pub fn new(terminator: char, replacement: char) -> Self {
        Self {
            terminator,
            replacement,
        }
    }
}

impl Default for LineFoldStage {
    fn default() -> Self {
        Self::new('\n', ' ')
    }
}

impl Stage for LineFoldStage {
    fn process(&mut self, input: char, out: &mut Vec<char>) {
        if input == self.terminator {
            out.push(self.replacement);
        } else {
            out.push(input);
        }
    }

    fn name(&self) -> &str {
        "line_fold"
    }
}

/// Collapses each adjacent pair of marker characters into one substitute.
///
/// A marker is withheld until the next character shows whether it starts a
/// pair. A marker still withheld at end of stream is dropped, not emitted.
#[derive(Debug, Clone)]
pub struct MarkerCollapseStage {
    marker: char,
    substitute: char,
    pending: bool,
}

impl MarkerCollapseStage {
    pub fn new(marker: char, substitute: char) -> Self {
        Self {
            marker,
            substitute,
            pending: false,
        }
    }

    /// Whether a marker is currently being withheld
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

impl Default for MarkerCollapseStage {
    fn default() -> Self {
        Self::new('*', '^')
    }
}

impl Stage for MarkerCollapseStage {
    fn process(&mut self, input: char, out: &mut Vec<char>) {
        let is_marker = input == self.marker;
        match (self.pending, is_marker) {
            (true, true) => {
                out.push(self.substitute);
                self.pending = false;
            }
            (true, false) => {
                out.push(self.marker);
                out.push(input);
                self.pending = false;
            }
            (false, true) => self.pending = true,
            (false, false) => out.push(input),
        }
    }

    fn finish(&mut self, _out: &mut Vec<char>) {
        self.pending = false;
    }

    fn name(&self) -> &str {
        "marker_collapse"
    }
}

/// Groups characters into fixed-width records, each followed by a separator.
///
/// A record is emitted only once it is full; a partial record left at end of
/// stream is discarded. A width of zero is treated as one.
#[derive(Debug, Clone)]
pub struct RecordChunkStage {
    width: usize,
    separator: char,
    record: Vec<char>,
}

impl RecordChunkStage {
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            separator: '\n',
            record: Vec::with_capacity(width),
        }
    }

    /// Use a different record separator
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Characters per record
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of characters accumulated toward the current record
    pub fn pending_len(&self) -> usize {
        self.record.len()
    }
}

impl Stage for RecordChunkStage {
    fn process(&mut self, input: char, out: &mut Vec<char>) {
        self.record.push(input);
        if self.record.len() >= self.width {
            out.append(&mut self.record);
            out.push(self.separator);
        }
    }

    fn finish(&mut self, _out: &mut Vec<char>) {
        self.record.clear();
    }

    fn name(&self) -> &str {
        "record_chunk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<S: Stage>(stage: &mut S, input: &str) -> String {
        let mut out = Vec::new();
        for c in input.chars() {
            stage.process(c, &mut out);
        }
        stage.finish(&mut out);
        out.into_iter().collect()
    }

    #[test]
    fn test_line_fold() {
        let mut stage = LineFoldStage::default();
        assert_eq!(run(&mut stage, "one\ntwo\n\nthree"), "one two  three");
    }

    #[test]
    fn test_line_fold_custom_terminator() {
        let mut stage = LineFoldStage::new(';', '_');
        assert_eq!(run(&mut stage, "a;b\nc"), "a_b\nc");
    }

    #[test]
    fn test_marker_collapse_mixed_runs() {
        let mut stage = MarkerCollapseStage::default();
        assert_eq!(run(&mut stage, "a**b***c"), "a^b^*c");
    }

    #[test]
    fn test_marker_collapse_even_run() {
        let mut stage = MarkerCollapseStage::default();
        assert_eq!(run(&mut stage, "****"), "^^");
    }

    #[test]
    fn test_marker_collapse_drops_trailing_marker() {
        let mut stage = MarkerCollapseStage::default();
        assert_eq!(run(&mut stage, "x*"), "x");
        assert!(!stage.is_pending());

        let mut stage = MarkerCollapseStage::default();
        assert_eq!(run(&mut stage, "***"), "^");
    }

    #[test]
    fn test_marker_collapse_withholds_single_marker() {
        let mut stage = MarkerCollapseStage::default();
        let mut out = Vec::new();
        stage.process('*', &mut out);
        assert!(out.is_empty());
        assert!(stage.is_pending());
        stage.process(' ', &mut out);
        assert_eq!(out, vec!['*', ' ']);
        assert!(!stage.is_pending());
    }

    #[test]
    fn test_record_chunk_emits_full_records() {
        let mut stage = RecordChunkStage::new(4);
        assert_eq!(run(&mut stage, "abcdefgh"), "abcd\nefgh\n");
    }

    #[test]
    fn test_record_chunk_discards_partial_record() {
        let mut stage = RecordChunkStage::new(4);
        assert_eq!(run(&mut stage, "abcdef"), "abcd\n");
        assert_eq!(stage.pending_len(), 0);
    }

    #[test]
    fn test_record_chunk_custom_separator() {
        let mut stage = RecordChunkStage::new(2).with_separator('|');
        assert_eq!(run(&mut stage, "abcde"), "ab|cd|");
    }

    #[test]
    fn test_record_chunk_zero_width_clamped() {
        let mut stage = RecordChunkStage::new(0);
        assert_eq!(stage.width(), 1);
        assert_eq!(run(&mut stage, "ab"), "a\nb\n");
    }
}
