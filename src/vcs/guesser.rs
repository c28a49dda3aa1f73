use log::debug;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::package::version;
use crate::runtime::Runtime;

use super::git;

/// Branch names that are never treated as feature branches.
const NON_FEATURE_BRANCHES: &[&str] = &[
    "master", "main", "latest", "next", "current", "support", "tip", "trunk", "default",
    "develop",
];

/// Result of guessing a package version from version control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionGuess {
    /// Normalized version
    pub version: String,
    pub pretty_version: String,
    /// Normalized version of the feature branch, when on one
    pub feature_version: Option<String>,
    pub feature_pretty_version: Option<String>,
    /// Commit hash of HEAD, when known
    pub commit: Option<String>,
}

impl VersionGuess {
    /// Pretty version to register: the feature branch version when known.
    pub fn preferred_pretty_version(&self) -> &str {
        self.feature_pretty_version
            .as_deref()
            .unwrap_or(&self.pretty_version)
    }
}

/// Guesses a package version from the state of its version control checkout.
#[cfg_attr(test, mockall::automock)]
pub trait VersionGuesser: Send + Sync {
    fn guess_version(&self, manifest: &Map<String, Value>, path: &Path) -> Option<VersionGuess>;
}

/// Tag and branch based guesser backed by the `git` command line.
pub struct GitVersionGuesser<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime> GitVersionGuesser<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    fn guess_from_tag(&self, path: &Path) -> Option<(String, String)> {
        let tag = git::query(self.runtime.as_ref(), git::EXACT_TAG, path)?;
        match version::normalize(&tag) {
            Ok(normalized) => Some((normalized, tag)),
            Err(e) => {
                debug!("Ignoring tag {} on HEAD: {}", tag, e);
                None
            }
        }
    }

    /// Nearest non-feature local branch by number of commits HEAD is ahead of it.
    fn nearest_non_feature_branch(&self, current: &str, path: &Path) -> Option<String> {
        let listing = git::query(self.runtime.as_ref(), git::LOCAL_BRANCHES, path)?;

        let mut best: Option<(u64, String)> = None;
        let mut branches: Vec<&str> = listing
            .lines()
            .map(str::trim)
            .filter(|b| !b.is_empty() && *b != current && !is_feature_branch(b))
            .collect();
        branches.sort_unstable();

        for branch in branches {
            let Some(distance) = git::commits_since(self.runtime.as_ref(), branch, path) else {
                continue;
            };
            if best.as_ref().is_none_or(|(d, _)| distance < *d) {
                best = Some((distance, branch.to_string()));
            }
        }

        best.map(|(_, branch)| branch)
    }
}

impl<R: Runtime> VersionGuesser for GitVersionGuesser<R> {
    #[tracing::instrument(skip(self, _manifest))]
    fn guess_version(&self, _manifest: &Map<String, Value>, path: &Path) -> Option<VersionGuess> {
        let commit = git::head_commit(self.runtime.as_ref(), path);

        let branch = git::query(self.runtime.as_ref(), git::CURRENT_BRANCH, path)
            .filter(|branch| branch != "HEAD");
        let Some(branch) = branch else {
            // Detached HEAD: tags only count here
            if let Some((normalized, tag)) = self.guess_from_tag(path) {
                return Some(VersionGuess {
                    version: normalized,
                    pretty_version: tag,
                    commit,
                    ..Default::default()
                });
            }
            let commit = commit?;
            let pretty = format!("dev-{}", commit);
            return Some(VersionGuess {
                version: pretty.clone(),
                pretty_version: pretty,
                commit: Some(commit),
                ..Default::default()
            });
        };

        let pretty = branch_version(&branch);
        let normalized = version::normalize(&pretty).ok()?;

        if !is_feature_branch(&branch) {
            return Some(VersionGuess {
                version: normalized,
                pretty_version: pretty,
                commit,
                ..Default::default()
            });
        }

        let mut guess = VersionGuess {
            version: normalized.clone(),
            pretty_version: pretty.clone(),
            feature_version: Some(normalized),
            feature_pretty_version: Some(pretty),
            commit,
        };

        if let Some(parent) = self.nearest_non_feature_branch(&branch, path) {
            let parent_pretty = branch_version(&parent);
            if let Ok(parent_normalized) = version::normalize(&parent_pretty) {
                debug!("Feature branch {} is closest to {}", branch, parent);
                guess.version = parent_normalized;
                guess.pretty_version = parent_pretty;
            }
        }

        Some(guess)
    }
}

/// Pretty dev version of a branch: `2.x` → `2.x-dev`, `1.0` → `1.0.x-dev`,
/// anything non-numeric → `dev-<branch>`.
pub fn branch_version(branch: &str) -> String {
    if !version::is_numeric_branch(branch) {
        return format!("dev-{}", branch);
    }

    let name = branch
        .strip_prefix(['v', 'V'])
        .unwrap_or(branch)
        .replace(['*', 'X'], "x");
    if name.ends_with(".x") {
        format!("{}-dev", name)
    } else {
        format!("{}.x-dev", name)
    }
}

pub fn is_feature_branch(branch: &str) -> bool {
    !(version::is_numeric_branch(branch) || NON_FEATURE_BRANCHES.contains(&branch))
}
