//! External collaborators at the two ends of a pipeline: a character source
//! over any reader and a record sink over any writer.

use crate::error::Result;
use crate::stage::{closed_endpoint, Element, Inlet, Outlet};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use tracing::debug;

/// Decodes UTF-8 from a reader one character per call.
///
/// Malformed sequences decode to U+FFFD. Reaching the end of the reader
/// yields [`Element::EndOfStream`].
pub struct CharReader<R: Read> {
    reader: BufReader<R>,
    finished: bool,
    chars_read: u64,
}

impl<R: Read> CharReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            finished: false,
            chars_read: 0,
        }
    }

    /// Read one character, or `None` at end of input
    pub fn read_char(&mut self) -> io::Result<Option<char>> {
        let lead = match self.next_byte(false)? {
            Some(byte) => byte,
            None => return Ok(None),
        };

        let width = match lead {
            0x00..=0x7F => return Ok(Some(lead as char)),
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };

        let mut bytes = [lead, 0, 0, 0];
        for slot in bytes.iter_mut().take(width).skip(1) {
            match self.next_byte(true)? {
                Some(byte) => *slot = byte,
                None => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }

        let decoded = std::str::from_utf8(&bytes[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Some(decoded))
    }

    // With `continuation` set, only a UTF-8 continuation byte is consumed.
    fn next_byte(&mut self, continuation: bool) -> io::Result<Option<u8>> {
        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let byte = match buf.first() {
                Some(&byte) => byte,
                None => return Ok(None),
            };
            if continuation && byte & 0xC0 != 0x80 {
                return Ok(None);
            }
            self.reader.consume(1);
            return Ok(Some(byte));
        }
    }
}

impl<R: Read + Send + 'static> Inlet for CharReader<R> {
    fn next_element(&mut self) -> Result<Element> {
        if self.finished {
            return Ok(Element::EndOfStream);
        }
        match self.read_char()? {
            Some(c) => {
                self.chars_read += 1;
                Ok(Element::Data(c))
            }
            None => {
                self.finished = true;
                debug!(chars = self.chars_read, "end of input");
                Ok(Element::EndOfStream)
            }
        }
    }
}

/// Writes characters to a writer, flushing at every record separator and
/// at end of stream.
pub struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
    separator: char,
    records: u64,
    closed: bool,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            separator: '\n',
            records: 0,
            closed: false,
        }
    }

    /// Flush at a different separator character
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Number of complete records written
    pub fn records_written(&self) -> u64 {
        self.records
    }
}

impl<W: Write + Send + 'static> Outlet for RecordWriter<W> {
    fn send(&mut self, element: Element) -> Result<()> {
        if self.closed {
            return Err(closed_endpoint("record writer"));
        }
        match element {
            Element::Data(c) => {
                let mut encoded = [0u8; 4];
                self.writer.write_all(c.encode_utf8(&mut encoded).as_bytes())?;
                if c == self.separator {
                    self.records += 1;
                    self.writer.flush()?;
                }
            }
            Element::EndOfStream => {
                self.closed = true;
                self.writer.flush()?;
                debug!(records = self.records, "output closed");
            }
        }
        Ok(())
    }
}
