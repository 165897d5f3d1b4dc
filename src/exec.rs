//! Timed execution of automation tools.
//!
//! Every call to an OS automation surface goes through [`run`], which spawns
//! the tool directly (never through a shell), bounds it with a timeout, and
//! kills the child if the timeout elapses or the caller drops the future.

use log::debug;
use std::process::Stdio;
use std::time::Duration;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args_slice(&self) -> &[String] {
        &self.args
    }
}

/// Errors from running an automation tool.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Run `inv` and return its trimmed stdout.
pub async fn run(inv: &Invocation, timeout: Duration) -> Result<String, ExecError> {
    debug!("exec {} ({} args, timeout {:?})", inv.program, inv.args.len(), timeout);

    let child = tokio::process::Command::new(&inv.program)
        .args(&inv.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: inv.program.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ExecError::Spawn {
            program: inv.program.clone(),
            source,
        })?,
        Err(_) => {
            return Err(ExecError::Timeout {
                program: inv.program.clone(),
                timeout,
            })
        }
    };

    if !output.status.success() {
        return Err(ExecError::Failed {
            program: inv.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
