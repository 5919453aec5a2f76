use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use sysmaint::errors::{Result, SysmaintError};
use sysmaint::exec::backend::BackendFuture;
use sysmaint::exec::{CapturedOutput, CommandBackend, CommandRequest};
use sysmaint::privilege::{PrivilegeGate, PrivilegeOutcome, RelaunchPlan};

#[derive(Default)]
struct State {
    requests: Vec<CommandRequest>,
    existing: HashSet<String>,
    failing: HashSet<String>,
    captures: HashMap<String, CapturedOutput>,
}

/// A fake command backend that:
/// - records every request it receives (dry-run ones included)
/// - reports only the scripted programs as present on PATH
/// - fails requests whose description was scripted to fail
/// - answers captures with canned output (empty by default).
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_programs<I, S>(self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut state = self.state.lock().unwrap();
            state.existing.extend(programs.into_iter().map(Into::into));
        }
        self
    }

    /// Requests with this description fail with a non-zero exit.
    pub fn failing(self, description: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(description.to_string());
        self
    }

    pub fn with_capture(self, description: &str, output: CapturedOutput) -> Self {
        self.state
            .lock()
            .unwrap()
            .captures
            .insert(description.to_string(), output);
        self
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.description).collect()
    }

    fn outcome(&self, req: &CommandRequest) -> Result<Option<CapturedOutput>> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(req.clone());
        if state.failing.contains(&req.description) {
            return Err(SysmaintError::Other(anyhow::anyhow!(
                "scripted failure of '{}'",
                req.description
            )));
        }
        Ok(state.captures.get(&req.description).cloned())
    }
}

impl CommandBackend for FakeBackend {
    fn run<'a>(&'a self, req: &'a CommandRequest) -> BackendFuture<'a, ()> {
        let result = self.outcome(req).map(|_| ());
        Box::pin(async move { result })
    }

    fn capture<'a>(&'a self, req: &'a CommandRequest) -> BackendFuture<'a, CapturedOutput> {
        let result = self.outcome(req).map(Option::unwrap_or_default);
        Box::pin(async move { result })
    }

    fn command_exists(&self, program: &str) -> bool {
        self.state.lock().unwrap().existing.contains(program)
    }
}

/// Privilege gate for tests: always already elevated.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysElevated;

impl PrivilegeGate for AlwaysElevated {
    fn acquire(&self) -> Result<PrivilegeOutcome> {
        Ok(PrivilegeOutcome::Elevated)
    }

    fn relaunch(&self, _plan: &RelaunchPlan) -> Result<Infallible> {
        Err(SysmaintError::Privilege("relaunch not supported in tests".to_string()))
    }
}
