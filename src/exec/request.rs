// src/exec/request.rs

//! The value object every external invocation is described by.

use std::fmt;

use crate::errors::{Result, SysmaintError};
use crate::exec::encoding::Encoding;

/// One external command invocation.
///
/// Built by a caller, consumed once by the runner. Arguments are passed to
/// the program verbatim and in order; `env` entries (`KEY=VALUE`) are added
/// on top of the inherited environment, never replacing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub description: String,
    pub dry_run: bool,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    /// Target user. `None` runs as the current identity.
    pub user: Option<String>,
    pub encoding: Encoding,
}

impl CommandRequest {
    /// Positional constructor mirroring most call sites:
    /// `CommandRequest::new("Update APT package lists", dry_run, "apt", ["update", "-y"])`.
    pub fn new<I, S>(
        description: impl Into<String>,
        dry_run: bool,
        program: impl Into<String>,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            description: description.into(),
            dry_run,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            user: None,
            encoding: Encoding::default(),
        }
    }

    pub fn with_env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(env.into_iter().map(Into::into));
        self
    }

    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        let user = user.into();
        self.user = if user.is_empty() { None } else { Some(user) };
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Check the request invariants and split the environment entries.
    ///
    /// Called by the runner before anything is spawned so that malformed
    /// requests never produce a half-started process.
    pub fn validate(&self) -> Result<Vec<(String, String)>> {
        if self.description.trim().is_empty() {
            return Err(SysmaintError::InvalidRequest(
                "description must not be empty".to_string(),
            ));
        }
        if self.program.trim().is_empty() {
            return Err(SysmaintError::InvalidRequest(format!(
                "'{}' has an empty program name",
                self.description
            )));
        }
        self.env_pairs()
    }

    /// Parse `env` into key/value pairs.
    pub fn env_pairs(&self) -> Result<Vec<(String, String)>> {
        self.env
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    Ok((key.to_string(), value.to_string()))
                }
                _ => Err(SysmaintError::InvalidRequest(format!(
                    "environment entry '{}' of '{}' is not KEY=VALUE",
                    entry, self.description
                ))),
            })
            .collect()
    }

    /// Rendered log tag for the target user, e.g. `User(tag="alice")`.
    pub fn tag(&self) -> Option<String> {
        self.user.as_deref().map(render_user_tag)
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

pub fn render_user_tag(user: &str) -> String {
    format!("User(tag={user:?})")
}
