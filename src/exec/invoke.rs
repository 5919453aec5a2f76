// src/exec/invoke.rs

//! Ergonomic call-site facade over a [`CommandBackend`].
//!
//! The [`Executor`] carries the run-wide dry-run flag so every request it
//! builds inherits it; tasks never decide on their own whether to skip a
//! command.

use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::exec::backend::CommandBackend;
use crate::exec::request::CommandRequest;
use crate::exec::runner::CapturedOutput;

#[derive(Clone)]
pub struct Executor {
    backend: Arc<dyn CommandBackend>,
    dry_run: bool,
}

impl Executor {
    pub fn new(backend: Arc<dyn CommandBackend>, dry_run: bool) -> Self {
        Self { backend, dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Build a request with the run's dry-run flag already applied.
    pub fn request<I, S>(
        &self,
        description: impl Into<String>,
        program: impl Into<String>,
        args: I,
    ) -> CommandRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandRequest::new(description, self.dry_run, program, args)
    }

    /// Run and stream; the common case.
    pub async fn run_and_stream(&self, req: &CommandRequest) -> Result<()> {
        self.backend.run(req).await
    }

    /// Run and buffer the output for parsing.
    pub async fn run_and_capture(&self, req: &CommandRequest) -> Result<CapturedOutput> {
        self.backend.capture(req).await
    }

    pub async fn run<I, S>(
        &self,
        description: &str,
        program: &str,
        args: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let req = self.request(description, program, args);
        self.run_and_stream(&req).await
    }

    pub async fn run_as<I, S>(
        &self,
        user: &str,
        description: &str,
        program: &str,
        args: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let req = self.request(description, program, args).as_user(user);
        self.run_and_stream(&req).await
    }

    pub async fn capture<I, S>(
        &self,
        description: &str,
        program: &str,
        args: I,
    ) -> Result<CapturedOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let req = self.request(description, program, args);
        self.run_and_capture(&req).await
    }

    pub fn command_exists(&self, program: &str) -> bool {
        self.backend.command_exists(program)
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
