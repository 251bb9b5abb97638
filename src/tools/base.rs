// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{io::AsyncWriteExt, process::Command};

use crate::{models::ScanCategory, scanner::Error};

/// Runs an external recon binary.
///
/// Availability is checked once on construction by looking the program up,
/// bare names are searched in `PATH`.
#[derive(Debug, Clone)]
pub struct CommandTool {
    name: &'static str,
    category: ScanCategory,
    program: PathBuf,
    default_timeout: Duration,
    available: bool,
}

impl CommandTool {
    pub fn new(
        name: &'static str,
        category: ScanCategory,
        program: impl Into<PathBuf>,
        default_timeout: Duration,
    ) -> Self {
        let program = program.into();
        let available = is_executable(&program);
        if !available {
            tracing::debug!(tool = name, program = %program.display(), "tool not available");
        }
        Self {
            name,
            category,
            program,
            default_timeout,
            available,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn category(&self) -> ScanCategory {
        self.category
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Creates a `ScanFailed` error for this tool.
    pub fn failed(&self, reason: impl Into<String>) -> Error {
        Error::ScanFailed {
            scanner: self.name.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidResult` error for this tool.
    pub fn invalid_output(&self, reason: impl Into<String>) -> Error {
        Error::InvalidResult {
            scanner: self.name.to_string(),
            reason: reason.into(),
        }
    }

    /// Runs the binary and returns its standard output.
    ///
    /// A zero timeout uses the default timeout of the tool. The process is
    /// killed when it runs too long or when the returned future is dropped.
    pub async fn execute(
        &self,
        args: &[String],
        stdin: Option<String>,
        timeout: Duration,
    ) -> Result<String, Error> {
        let timeout = if timeout.is_zero() {
            self.default_timeout
        } else {
            timeout
        };
        tracing::debug!(tool = self.name, ?args, ?timeout, "executing");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|e| {
            self.failed(format!("unable to start {}: {e}", self.program.display()))
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            let name = self.name;
            tokio::spawn(async move {
                // closing the pipe signals the end of input
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    tracing::debug!(tool = name, error = %e, "unable to write to stdin");
                }
            });
        }

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::ScanTimeout {
                scanner: self.name.to_string(),
                timeout,
            })?
            .map_err(|e| self.failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failed(format!("{} {}", output.status, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn is_executable(program: &Path) -> bool {
    !program.as_os_str().is_empty() && which::which(program).is_ok()
}

/// Normalizes a user supplied target to a bare host.
///
/// Trims, lowercases, strips the `http://` or `https://` scheme and
/// everything after the first `/`.
pub fn sanitize_target(target: &str) -> String {
    let target = target.trim().to_lowercase();
    let target = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
        .unwrap_or(&target);
    match target.find('/') {
        Some(idx) => target[..idx].to_string(),
        None => target.to_string(),
    }
}

/// Returns the `http` and `https` URL of the sanitized target.
pub fn web_targets(target: &str) -> Vec<String> {
    let host = sanitize_target(target);
    if host.is_empty() {
        return vec![];
    }
    vec![format!("http://{host}"), format!("https://{host}")]
}

/// Iterates over the non empty lines of the output, comments are skipped.
pub fn parse_lines(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

/// Splits a comma separated option value.
pub fn comma_separated(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|x| !x.is_empty())
}
