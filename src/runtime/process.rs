//! Shell command execution.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use super::RealRuntime;

/// Result of running a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Process exit code (`-1` when terminated by a signal)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout of a successful command, `None` otherwise or when empty.
    pub fn trimmed(&self) -> Option<&str> {
        let out = self.stdout.trim();
        (self.success() && !out.is_empty()).then_some(out)
    }
}

/// Quote a single argument for the shell that [`RealRuntime::run_impl`] spawns.
pub fn shell_quote(arg: &str) -> String {
    #[cfg(not(windows))]
    {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
    #[cfg(windows)]
    {
        format!("\"{}\"", arg.replace('"', "\"\""))
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn run_impl(&self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        };

        let output = cmd
            .current_dir(cwd)
            .output()
            .with_context(|| format!("Failed to execute `{}`", command))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn command_exists_impl(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
