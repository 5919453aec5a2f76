use std::sync::{Arc, Mutex};

use sysmaint::exec::{OutputSink, OutputStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLine {
    pub stream: OutputStream,
    pub command: String,
    pub line: String,
}

/// An output sink that keeps every line instead of logging it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<RecordedLine>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<RecordedLine> {
        self.lines.lock().unwrap().clone()
    }

    /// Lines of one stream, in emission order.
    pub fn stream(&self, stream: OutputStream) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.line.clone())
            .collect()
    }

    pub fn stdout(&self) -> Vec<String> {
        self.stream(OutputStream::Stdout)
    }

    pub fn stderr(&self) -> Vec<String> {
        self.stream(OutputStream::Stderr)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().unwrap().is_empty()
    }
}

impl OutputSink for RecordingSink {
    fn emit(&self, stream: OutputStream, command: &str, line: &str) {
        self.lines.lock().unwrap().push(RecordedLine {
            stream,
            command: command.to_string(),
            line: line.to_string(),
        });
    }
}
