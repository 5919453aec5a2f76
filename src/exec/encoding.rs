// src/exec/encoding.rs

//! Incremental decoding of raw process output.
//!
//! Child processes hand us bytes in whatever chunk sizes the pipe delivers,
//! so a multi-byte sequence (or half of a UTF-16 code unit) can straddle two
//! reads. [`StreamDecoder`] keeps that partial state between calls and only
//! emits complete characters.
//!
//! Byte-order marks are stripped when they match the declared encoding and
//! are never interpreted as a request to switch endianness.

use std::fmt;
use std::str::FromStr;

use encoding_rs::{CoderResult, Decoder};

use crate::errors::SysmaintError;

/// Declared encoding of a command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// Used by a handful of Windows tools (`sfc`, some `wmic` output).
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    fn codec(self) -> &'static encoding_rs::Encoding {
        match self {
            Encoding::Utf8 => encoding_rs::UTF_8,
            Encoding::Utf16Le => encoding_rs::UTF_16LE,
            Encoding::Utf16Be => encoding_rs::UTF_16BE,
        }
    }

    /// Create a fresh streaming decoder for this encoding.
    pub fn decoder(self) -> StreamDecoder {
        StreamDecoder::new(self)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
        };
        f.write_str(name)
    }
}

impl FromStr for Encoding {
    type Err = SysmaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "utf16le" => Ok(Encoding::Utf16Le),
            "utf16be" => Ok(Encoding::Utf16Be),
            _ => Err(SysmaintError::UnsupportedEncoding(s.trim().to_string())),
        }
    }
}

/// Stateful decoder turning arbitrary byte chunks into text.
pub struct StreamDecoder {
    encoding: Encoding,
    inner: Decoder,
}

impl StreamDecoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            inner: encoding.codec().new_decoder_with_bom_removal(),
        }
    }

    /// Decode the next chunk. Bytes belonging to an incomplete character are
    /// retained until the following call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.decode_inner(bytes, false)
    }

    /// Signal end of stream. Any dangling partial character is emitted as
    /// U+FFFD.
    pub fn finish(&mut self) -> String {
        self.decode_inner(&[], true)
    }

    fn decode_inner(&mut self, mut bytes: &[u8], last: bool) -> String {
        let capacity = self
            .inner
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len().saturating_mul(3) + 4);
        let mut out = String::with_capacity(capacity);

        loop {
            let (result, read, _replaced) = self.inner.decode_to_string(bytes, &mut out, last);
            bytes = &bytes[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => out.reserve(bytes.len().saturating_mul(3) + 16),
            }
        }

        out
    }
}

impl fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}
