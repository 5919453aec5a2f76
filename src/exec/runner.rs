// src/exec/runner.rs

//! Process runner: spawn one external program and stream its output.
//!
//! Per invocation the runner owns the child, its two pipes and a decoder per
//! pipe. Both pipes are drained by their own Tokio task so a child that
//! floods one channel can never block on a full pipe while we wait for it.
//!
//! The wait is raced against the run's cancellation token and the optional
//! per-command timeout; either one kills the child.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SysmaintError};
use crate::exec::encoding::Encoding;
use crate::exec::request::CommandRequest;
use crate::exec::streamer::{CarriageReturnPolicy, OutputSink, OutputStream, OutputStreamer};

/// How long drain tasks may keep reading after the child is gone, shared by
/// both pipes. Background descendants can inherit the pipes and keep them
/// open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// How a request with a target user is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSwitch {
    /// Re-invoke through `sudo -u <user>`.
    Sudo,
    /// Run as the current identity; the user only tags the log lines.
    TagOnly,
}

impl UserSwitch {
    pub fn platform_default() -> Self {
        if cfg!(unix) {
            UserSwitch::Sudo
        } else {
            UserSwitch::TagOnly
        }
    }
}

impl Default for UserSwitch {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Fully buffered result of a captured invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// `None` when nothing was spawned (dry run).
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// Convert an unsuccessful exit into [`SysmaintError::Exit`].
    pub fn ensure_success(self, description: &str) -> Result<Self> {
        match self.status {
            Some(status) if !status.success() => Err(SysmaintError::Exit {
                description: description.to_string(),
                status,
            }),
            _ => Ok(self),
        }
    }

    /// Non-empty trimmed stdout lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

/// Spawns requests and reports their terminal outcome.
#[derive(Debug, Clone)]
pub struct Runner {
    streamer: OutputStreamer,
    user_switch: UserSwitch,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            streamer: OutputStreamer::new(sink, CarriageReturnPolicy::default()),
            user_switch: UserSwitch::platform_default(),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_switch(mut self, user_switch: UserSwitch) -> Self {
        self.user_switch = user_switch;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_carriage_return_policy(mut self, policy: CarriageReturnPolicy) -> Self {
        self.streamer = self.streamer.with_policy(policy);
        self
    }

    /// Run a request to completion, streaming its output.
    ///
    /// Under dry run nothing is spawned and the call always succeeds.
    pub async fn run(&self, req: &CommandRequest) -> Result<()> {
        if req.dry_run {
            match &req.user {
                Some(user) => info!(
                    "Dry run: would execute '{}' as user '{}': {}",
                    req.description, user, req
                ),
                None => info!("Dry run: would execute '{}': {}", req.description, req),
            }
            return Ok(());
        }

        let result = self.run_inner(req).await;
        match &result {
            Ok(()) => debug!(command = %req.description, "{} complete.", req.description),
            Err(err) => warn!(
                command = %req.description,
                error = %err,
                "Failed to {}",
                lowercase_first(&req.description)
            ),
        }
        result
    }

    async fn run_inner(&self, req: &CommandRequest) -> Result<()> {
        let env = req.validate()?;
        if self.cancel.is_cancelled() {
            return Err(SysmaintError::Cancelled(req.description.clone()));
        }

        match &req.user {
            Some(user) => info!("{} (as user {})...", req.description, user),
            None => info!("{}...", req.description),
        }

        let mut cmd = self.build_command(req, &env)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SysmaintError::Spawn {
            program: req.program.clone(),
            source,
        })?;
        debug!(command = %req.description, pid = ?child.id(), "process started");

        let tag = req.tag();
        let (stdout_started, stdout_ready) = oneshot::channel();
        let (stderr_started, stderr_ready) = oneshot::channel();
        let stdout_task = child.stdout.take().map(|pipe| {
            self.spawn_drain(pipe, OutputStream::Stdout, req, tag.clone(), stdout_started)
        });
        let stderr_task = child.stderr.take().map(|pipe| {
            self.spawn_drain(pipe, OutputStream::Stderr, req, tag.clone(), stderr_started)
        });

        // Both consumers are live before we block on the child.
        let _ = stdout_ready.await;
        let _ = stderr_ready.await;

        let waited = self.wait_for_exit(&mut child, &req.description).await;
        let deadline = Instant::now() + DRAIN_GRACE;
        let (stdout_drained, stderr_drained) = tokio::join!(
            finish_drain(stdout_task, deadline, &req.description),
            finish_drain(stderr_task, deadline, &req.description),
        );
        let drained = stdout_drained.and(stderr_drained);

        let status = waited?;
        drained?;

        if status.success() {
            Ok(())
        } else {
            Err(SysmaintError::Exit {
                description: req.description.clone(),
                status,
            })
        }
    }

    /// Run a request and return its buffered output instead of streaming it.
    ///
    /// Dry run is honored here too: nothing is spawned and the output is
    /// empty, so callers parsing it see "nothing to report".
    pub async fn capture(&self, req: &CommandRequest) -> Result<CapturedOutput> {
        if req.dry_run {
            info!(
                "Dry run: would capture output of '{}': {}",
                req.description, req
            );
            return Ok(CapturedOutput::default());
        }

        let env = req.validate()?;
        if self.cancel.is_cancelled() {
            return Err(SysmaintError::Cancelled(req.description.clone()));
        }

        debug!(command = %req.description, "Capturing output of '{}'...", req.description);

        let mut cmd = self.build_command(req, &env)?;
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::select! {
            output = cmd.output() => output.map_err(|source| SysmaintError::Spawn {
                program: req.program.clone(),
                source,
            })?,
            _ = self.cancel.cancelled() => {
                return Err(SysmaintError::Cancelled(req.description.clone()));
            }
            _ = sleep_or_forever(self.timeout) => {
                return Err(SysmaintError::TimedOut {
                    description: req.description.clone(),
                    after: self.timeout.unwrap_or_default(),
                });
            }
        };

        let captured = CapturedOutput {
            status: Some(output.status),
            stdout: decode_all(req.encoding, &output.stdout),
            stderr: decode_all(req.encoding, &output.stderr),
        };

        if !captured.success() {
            debug!(
                command = %req.description,
                exit_code = ?captured.exit_code(),
                stderr = %captured.stderr.trim(),
                "captured command exited unsuccessfully"
            );
        }

        Ok(captured)
    }

    /// Resolve the program on PATH and build the (possibly sudo-wrapped)
    /// command.
    fn build_command(&self, req: &CommandRequest, env: &[(String, String)]) -> Result<Command> {
        let program = resolve_program(&req.program)?;

        let mut cmd = match (&req.user, self.user_switch) {
            (Some(user), UserSwitch::Sudo) => {
                let mut cmd = Command::new(resolve_program("sudo")?);
                cmd.arg("-u").arg(user);
                if !env.is_empty() {
                    // sudo resets the environment; `env` re-applies our additions
                    cmd.arg("env").args(&req.env);
                }
                cmd.arg(program);
                cmd
            }
            _ => Command::new(program),
        };
        cmd.args(&req.args);
        cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(cmd)
    }

    fn spawn_drain<R>(
        &self,
        pipe: R,
        stream: OutputStream,
        req: &CommandRequest,
        tag: Option<String>,
        started: oneshot::Sender<()>,
    ) -> JoinHandle<std::io::Result<usize>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let streamer = self.streamer.clone();
        let description = req.description.clone();
        let encoding: Encoding = req.encoding;
        tokio::spawn(async move {
            let _ = started.send(());
            let lines = streamer
                .drain(pipe, stream, &description, tag, encoding)
                .await?;
            debug!(command = %description, %stream, lines, "stream drained");
            Ok(lines)
        })
    }

    async fn wait_for_exit(&self, child: &mut Child, description: &str) -> Result<ExitStatus> {
        tokio::select! {
            status = child.wait() => status.map_err(|source| SysmaintError::Stream {
                description: description.to_string(),
                source,
            }),
            _ = self.cancel.cancelled() => {
                info!(command = %description, "cancellation requested; killing process");
                kill_child(child, description).await;
                Err(SysmaintError::Cancelled(description.to_string()))
            }
            _ = sleep_or_forever(self.timeout) => {
                let after = self.timeout.unwrap_or_default();
                warn!(command = %description, ?after, "command timed out; killing process");
                kill_child(child, description).await;
                Err(SysmaintError::TimedOut {
                    description: description.to_string(),
                    after,
                })
            }
        }
    }
}

async fn kill_child(child: &mut Child, description: &str) {
    if let Err(e) = child.kill().await {
        warn!(command = %description, error = %e, "failed to kill child process");
    }
}

async fn finish_drain(
    task: Option<JoinHandle<std::io::Result<usize>>>,
    deadline: Instant,
    description: &str,
) -> Result<()> {
    let Some(mut handle) = task else {
        return Ok(());
    };

    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(Ok(_lines))) => Ok(()),
        Ok(Ok(Err(source))) => Err(SysmaintError::Stream {
            description: description.to_string(),
            source,
        }),
        Ok(Err(join_err)) => Err(SysmaintError::Other(anyhow::anyhow!(
            "output drain task for '{description}' failed: {join_err}"
        ))),
        Err(_elapsed) => {
            warn!(
                command = %description,
                "output pipe still open after process exit; abandoning drain"
            );
            handle.abort();
            Ok(())
        }
    }
}

fn resolve_program(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|err| SysmaintError::Spawn {
        program: program.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, err),
    })
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(after) => tokio::time::sleep(after).await,
        None => std::future::pending::<()>().await,
    }
}

fn decode_all(encoding: Encoding, bytes: &[u8]) -> String {
    let mut decoder = encoding.decoder();
    let mut text = decoder.decode(bytes);
    text.push_str(&decoder.finish());
    text
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
