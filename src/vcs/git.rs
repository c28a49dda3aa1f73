//! Git queries shared by the guessers, the repository and plugin bootstrap.
//!
//! Every query is best-effort: a command that cannot be spawned, exits
//! non-zero or prints nothing yields `None`.

use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, shell_quote};

pub const HEAD_COMMIT: &str = "git log -n1 --pretty=%H";
pub const ABSOLUTE_GIT_DIR: &str = "git rev-parse --absolute-git-dir";
pub const EXACT_TAG: &str = "git describe --exact-match --tags";
pub const LATEST_TAG: &str = "git describe --tags --abbrev=0";
pub const CURRENT_BRANCH: &str = "git rev-parse --abbrev-ref HEAD";
pub const LOCAL_BRANCHES: &str = "git branch --format=%(refname:short)";
pub const FETCH_TAGS: &str = "git fetch --tags --quiet";

/// Run `command` in `dir` and return its trimmed stdout on success.
pub fn query<R: Runtime + ?Sized>(runtime: &R, command: &str, dir: &Path) -> Option<String> {
    match runtime.run(command, dir) {
        Ok(output) => match output.trimmed() {
            Some(out) => Some(out.to_string()),
            None => {
                debug!(
                    "`{}` in {:?} returned no usable output (exit code {})",
                    command, dir, output.exit_code
                );
                None
            }
        },
        Err(e) => {
            debug!("`{}` in {:?} could not be executed: {}", command, dir, e);
            None
        }
    }
}

/// Hash of the commit checked out in `dir`.
pub fn head_commit<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Option<String> {
    query(runtime, HEAD_COMMIT, dir)
}

/// Root of the working tree containing `dir`: the parent of the absolute git dir.
pub fn work_tree_root<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Option<PathBuf> {
    let git_dir = query(runtime, ABSOLUTE_GIT_DIR, dir)?;
    PathBuf::from(git_dir).parent().map(Path::to_path_buf)
}

/// Number of commits reachable from HEAD but not from `rev`.
pub fn commits_since<R: Runtime + ?Sized>(runtime: &R, rev: &str, dir: &Path) -> Option<u64> {
    let command = format!("git rev-list --count {}..HEAD", shell_quote(rev));
    query(runtime, &command, dir)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CommandOutput, MockRuntime};
    use mockall::predicate::{always, eq};

    #[test]
    fn test_head_commit() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .with(eq(HEAD_COMMIT), eq(PathBuf::from("/repo")))
            .returning(|_, _| Ok(CommandOutput::new(0, "0123abcd\n")));

        assert_eq!(
            head_commit(&runtime, Path::new("/repo")),
            Some("0123abcd".to_string())
        );
    }

    #[test]
    fn test_query_failures_are_none() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .with(eq(HEAD_COMMIT), always())
            .returning(|_, _| Ok(CommandOutput::new(128, "")));
        runtime
            .expect_run()
            .with(eq(ABSOLUTE_GIT_DIR), always())
            .returning(|_, _| Err(anyhow::anyhow!("git: not found")));

        assert_eq!(head_commit(&runtime, Path::new("/repo")), None);
        assert_eq!(work_tree_root(&runtime, Path::new("/repo")), None);
    }

    #[test]
    fn test_work_tree_root_is_parent_of_git_dir() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .with(eq(ABSOLUTE_GIT_DIR), always())
            .returning(|_, _| Ok(CommandOutput::new(0, "/srv/monorepo/.git\n")));

        assert_eq!(
            work_tree_root(&runtime, Path::new("/srv/monorepo/packages/a")),
            Some(PathBuf::from("/srv/monorepo"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_commits_since() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .with(eq("git rev-list --count '2.1.0'..HEAD"), always())
            .returning(|_, _| Ok(CommandOutput::new(0, "4\n")));

        assert_eq!(commits_since(&runtime, "2.1.0", Path::new("/repo")), Some(4));
    }
}
