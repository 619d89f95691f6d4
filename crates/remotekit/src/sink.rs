//! Where relayed session output goes

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Which remote stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of remote output, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }
}

/// Receives a session's output as it arrives
///
/// Each session owns its sink; sinks are moved to the session worker in
/// non-blocking mode.
pub trait OutputSink: Send {
    fn line(&mut self, line: &OutputLine);

    /// Called once after the last line
    fn finish(&mut self) {}
}

impl<F> OutputSink for F
where
    F: FnMut(&OutputLine) + Send,
{
    fn line(&mut self, line: &OutputLine) {
        self(line);
    }
}

/// Writes every line to a writer, optionally prefixed
pub struct WriterSink<W: Write + Send> {
    writer: W,
    prefix: String,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            prefix: String::new(),
        }
    }

    #[must_use]
    pub fn prefixed(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl<W: Write + Send> OutputSink for WriterSink<W> {
    fn line(&mut self, line: &OutputLine) {
        // A closed terminal must not abort the session
        let _ = writeln!(self.writer, "{}{}", self.prefix, line.text);
    }

    fn finish(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Collects lines in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<OutputLine>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// All captured stdout text, one line per entry
    pub fn stdout(&self) -> String {
        self.lines()
            .iter()
            .filter(|l| l.stream == Stream::Stdout)
            .map(|l| format!("{}\n", l.text))
            .collect()
    }
}

impl OutputSink for CaptureSink {
    fn line(&mut self, line: &OutputLine) {
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_sink_prefixes_lines() {
        let mut buf = Vec::new();
        {
            let mut sink = WriterSink::new(&mut buf).prefixed("[r1] ");
            sink.line(&OutputLine::stdout("pass: a"));
            sink.finish();
        }
        assert_eq!(String::from_utf8(buf).unwrap(), "[r1] pass: a\n");
    }

    #[test]
    fn test_capture_sink_shares_buffer() {
        let capture = CaptureSink::new();
        let mut clone = capture.clone();
        clone.line(&OutputLine::stdout("one"));
        clone.line(&OutputLine::stderr("oops"));
        assert_eq!(capture.lines().len(), 2);
        assert_eq!(capture.stdout(), "one\n");
    }

    #[test]
    fn test_closure_sink() {
        let mut count = 0;
        {
            let mut sink = |_: &OutputLine| count += 1;
            sink.line(&OutputLine::stdout("x"));
            sink.line(&OutputLine::stdout("y"));
        }
        assert_eq!(count, 2);
    }
}
