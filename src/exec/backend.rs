// src/exec/backend.rs

//! Pluggable command backend.
//!
//! Maintenance tasks never spawn processes themselves; they go through a
//! [`CommandBackend`]. Production uses the [`Runner`]; tests swap in a fake
//! that records requests and scripts their outcomes.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::request::CommandRequest;
use crate::exec::runner::{CapturedOutput, Runner};

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Trait abstracting how command requests are executed.
pub trait CommandBackend: Send + Sync {
    /// Run the request, streaming its output to the log.
    fn run<'a>(&'a self, req: &'a CommandRequest) -> BackendFuture<'a, ()>;

    /// Run the request and hand back its buffered output.
    fn capture<'a>(&'a self, req: &'a CommandRequest) -> BackendFuture<'a, CapturedOutput>;

    /// Whether `program` can be found on PATH.
    fn command_exists(&self, program: &str) -> bool;
}

impl CommandBackend for Runner {
    fn run<'a>(&'a self, req: &'a CommandRequest) -> BackendFuture<'a, ()> {
        Box::pin(Runner::run(self, req))
    }

    fn capture<'a>(&'a self, req: &'a CommandRequest) -> BackendFuture<'a, CapturedOutput> {
        Box::pin(Runner::capture(self, req))
    }

    fn command_exists(&self, program: &str) -> bool {
        command_exists(program)
    }
}

/// PATH lookup shared by the real backend and platform probes.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}
