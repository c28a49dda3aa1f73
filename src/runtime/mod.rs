//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over system operations,
//! enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `path` - Path utility functions (normalize, is_path_under, workspace-relative paths)
//! - `env` - Environment variables and directories
//! - `fs` - File system operations (read, write, directory)
//! - `process` - Shell command execution

mod env;
mod fs;
pub mod path;
mod process;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

pub use path::{is_path_under, relative_slash_path};
pub use process::{CommandOutput, shell_quote};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;
    fn current_dir(&self) -> Result<PathBuf>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_symlink(&self, path: &Path) -> bool;

    /// Canonicalize a path by resolving all symlinks and returning the canonical absolute path.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;

    // Processes
    /// Run a shell command line in `cwd`, capturing stdout.
    ///
    /// A non-zero exit code is reported through [`CommandOutput::exit_code`];
    /// `Err` means the command could not be spawned at all.
    fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput>;

    /// Check whether an executable can be found on `PATH`.
    fn command_exists(&self, program: &str) -> bool;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.is_symlink_impl(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.canonicalize_impl(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        self.run_impl(command, cwd)
    }

    fn command_exists(&self, program: &str) -> bool {
        self.command_exists_impl(program)
    }
}

/// Interpret an environment value the way shell-configured flags are usually read:
/// empty and `"0"` are false, everything else is true.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0")
}

/// Read an environment flag through the runtime. Unset variables are false.
pub fn env_flag<R: Runtime + ?Sized>(runtime: &R, key: &str) -> bool {
    runtime
        .env_var(key)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}
