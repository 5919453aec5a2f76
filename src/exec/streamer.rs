// src/exec/streamer.rs

//! Line-oriented forwarding of process output to the log.
//!
//! The pieces are kept separate so they can be tested without processes:
//! - [`LineAssembler`] turns arbitrary text chunks into complete lines.
//! - [`LineShaper`] trims, filters, splits carriage-return frames, and
//!   applies the user tag.
//! - [`OutputSink`] is where finished lines go. Production uses
//!   [`TracingSink`]; tests record lines instead.
//! - [`OutputStreamer::drain`] ties them to an async reader.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, warn};

use crate::exec::encoding::Encoding;

/// Lines that are dropped instead of logged (compared case-insensitively).
pub const NOISE_LINES: &[&str] =
    &["WARNING: apt does not have a stable CLI interface. Use with caution in scripts."];

const READ_CHUNK: usize = 8 * 1024;

/// Which channel of the child a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// What to do with progress frames separated by `\r` on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarriageReturnPolicy {
    /// Every non-empty frame becomes its own log line.
    #[default]
    Split,
    /// Only the final non-empty frame is logged.
    Last,
}

impl std::str::FromStr for CarriageReturnPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "split" => Ok(CarriageReturnPolicy::Split),
            "last" => Ok(CarriageReturnPolicy::Last),
            other => Err(format!(
                "invalid carriage_return policy: {other} (expected \"split\" or \"last\")"
            )),
        }
    }
}

/// Reassembles `\n`-terminated lines from a stream of text chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: String,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line completed by it, without the
    /// terminating `\n`.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(idx) = rest.find('\n') {
            self.pending.push_str(&rest[..idx]);
            lines.push(std::mem::take(&mut self.pending));
            rest = &rest[idx + 1..];
        }
        self.pending.push_str(rest);

        lines
    }

    /// End of stream: the unterminated tail, if any, is returned once.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Turns one raw line into the zero or more entries that get logged.
#[derive(Debug, Clone, Default)]
pub struct LineShaper {
    policy: CarriageReturnPolicy,
    tag: Option<String>,
}

impl LineShaper {
    pub fn new(policy: CarriageReturnPolicy, tag: Option<String>) -> Self {
        Self { policy, tag }
    }

    pub fn shape(&self, raw: &str) -> Vec<String> {
        let frames = raw
            .split('\r')
            .map(str::trim)
            .filter(|frame| !frame.is_empty() && !is_noise(frame));

        let kept: Vec<&str> = match self.policy {
            CarriageReturnPolicy::Split => frames.collect(),
            CarriageReturnPolicy::Last => frames.last().into_iter().collect(),
        };

        kept.into_iter()
            .map(|frame| match &self.tag {
                Some(tag) => format!("{tag} {frame}"),
                None => frame.to_string(),
            })
            .collect()
    }
}

pub fn is_noise(line: &str) -> bool {
    NOISE_LINES
        .iter()
        .any(|noise| noise.eq_ignore_ascii_case(line))
}

/// Destination for finished output lines.
///
/// Implementations must tolerate concurrent calls: stdout and stderr of one
/// invocation are drained by two tasks at once.
pub trait OutputSink: Send + Sync {
    fn emit(&self, stream: OutputStream, command: &str, line: &str);
}

/// Forwards stdout lines at info and stderr lines at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn emit(&self, stream: OutputStream, command: &str, line: &str) {
        match stream {
            OutputStream::Stdout => info!(target: "sysmaint::output", command = %command, "{line}"),
            OutputStream::Stderr => warn!(target: "sysmaint::output", command = %command, "{line}"),
        }
    }
}

/// Drains child output channels into an [`OutputSink`].
#[derive(Clone)]
pub struct OutputStreamer {
    sink: Arc<dyn OutputSink>,
    policy: CarriageReturnPolicy,
}

impl OutputStreamer {
    pub fn new(sink: Arc<dyn OutputSink>, policy: CarriageReturnPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn with_policy(mut self, policy: CarriageReturnPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read `reader` to end of stream, decoding with `encoding` before line
    /// splitting. Returns the number of lines handed to the sink.
    pub async fn drain<R>(
        &self,
        mut reader: R,
        stream: OutputStream,
        description: &str,
        tag: Option<String>,
        encoding: Encoding,
    ) -> std::io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let mut decoder = encoding.decoder();
        let mut assembler = LineAssembler::new();
        let shaper = LineShaper::new(self.policy, tag);
        let mut buf = vec![0u8; READ_CHUNK];
        let mut emitted = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let text = decoder.decode(&buf[..n]);
            for raw in assembler.push(&text) {
                emitted += self.forward(&shaper, stream, description, &raw);
            }
        }

        let tail = decoder.finish();
        for raw in assembler.push(&tail) {
            emitted += self.forward(&shaper, stream, description, &raw);
        }
        if let Some(raw) = assembler.finish() {
            emitted += self.forward(&shaper, stream, description, &raw);
        }

        Ok(emitted)
    }

    fn forward(
        &self,
        shaper: &LineShaper,
        stream: OutputStream,
        description: &str,
        raw: &str,
    ) -> usize {
        let lines = shaper.shape(raw);
        for line in &lines {
            self.sink.emit(stream, description, line);
        }
        lines.len()
    }
}

impl fmt::Debug for OutputStreamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStreamer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
