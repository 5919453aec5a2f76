// src/exec/mod.rs

//! Command execution layer.
//!
//! Everything that touches an external process goes through here:
//!
//! - [`request`] defines [`CommandRequest`], the value describing one
//!   invocation.
//! - [`encoding`] decodes raw pipe bytes (UTF-8 / UTF-16LE / UTF-16BE).
//! - [`streamer`] reassembles, filters, tags and forwards output lines.
//! - [`runner`] spawns the process, drains both pipes concurrently and
//!   reports the exit status; it is also where dry run is enforced.
//! - [`backend`] provides the [`CommandBackend`] trait the runner
//!   implements, so tests can replace real processes.
//! - [`invoke`] is the [`Executor`] facade tasks call into.

pub mod backend;
pub mod encoding;
pub mod invoke;
pub mod request;
pub mod runner;
pub mod streamer;

pub use backend::{CommandBackend, command_exists};
pub use encoding::{Encoding, StreamDecoder};
pub use invoke::Executor;
pub use request::CommandRequest;
pub use runner::{CapturedOutput, Runner, UserSwitch};
pub use streamer::{
    CarriageReturnPolicy, LineAssembler, LineShaper, OutputSink, OutputStream, OutputStreamer,
    TracingSink,
};
