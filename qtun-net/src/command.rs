//! Running host configuration commands.

use std::{io, process};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} exited with {}: {}", .output.status, .output.stderr.trim())]
    NonZero { command: String, output: Output },
}

#[derive(Debug, Clone)]
pub struct Output {
    pub status: process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            status: value.status,
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Renders a command as a shell-like string, for logs and error messages.
pub fn display(cmd: &process::Command) -> String {
    let mut cmd_str = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        cmd_str.push(' ');
        cmd_str.push_str(&arg.to_string_lossy());
    }

    cmd_str
}

#[derive(Debug)]
pub struct Runner;

impl Runner {
    /// Runs the command to completion, capturing its output. A non-zero exit status is an
    /// error.
    pub fn run(cmd: &mut process::Command) -> Result<Output> {
        cmd.stdin(process::Stdio::null())
            .stderr(process::Stdio::piped())
            .stdout(process::Stdio::piped());

        let command = display(cmd);
        tracing::debug!(%command, "running command");

        let output: Output = cmd
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|source| Error::Io {
                program: cmd.get_program().to_string_lossy().into_owned(),
                source,
            })?
            .into();

        if !output.status.success() {
            tracing::debug!(?output.stderr, ?output.status, %command, "command returned non-zero status");
            return Err(Error::NonZero { command, output });
        }

        Ok(output)
    }
}
