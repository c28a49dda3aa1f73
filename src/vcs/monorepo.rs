use log::{debug, info};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::runtime::Runtime;

use super::git;
use super::guesser::VersionGuesser;

/// Version used when neither tags nor branches tell anything.
pub const DEV_FALLBACK: &str = "dev-master";

/// Computes the monorepo-convention version of a sub-package.
#[cfg_attr(test, mockall::automock)]
pub trait PackageVersionGuesser: Send + Sync {
    fn package_version(&self, manifest: &Map<String, Value>, package_root: &Path) -> String;
}

/// Derives versions from the monorepo's own tag lineage.
///
/// Every sub-package gets the same answer: the latest tag when HEAD sits on
/// it, otherwise the development line of that tag. The result is computed
/// once and reused for every package.
pub struct MonorepoVersionGuesser<R: Runtime> {
    root: PathBuf,
    runtime: Arc<R>,
    guesser: Arc<dyn VersionGuesser>,
    offline: bool,
    cached: OnceLock<String>,
}

impl<R: Runtime> MonorepoVersionGuesser<R> {
    pub fn new(
        root: impl Into<PathBuf>,
        runtime: Arc<R>,
        guesser: Arc<dyn VersionGuesser>,
        offline: bool,
    ) -> Self {
        Self {
            root: root.into(),
            runtime,
            guesser,
            offline,
            cached: OnceLock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[tracing::instrument(skip(self), fields(root = ?self.root))]
    fn compute(&self) -> String {
        let runtime = self.runtime.as_ref();

        if self.offline {
            debug!("Offline mode, not fetching tags");
        } else {
            match runtime.run(git::FETCH_TAGS, &self.root) {
                Ok(output) if output.success() => {}
                Ok(output) => debug!("Fetching tags failed with exit code {}", output.exit_code),
                Err(e) => debug!("Fetching tags failed: {}", e),
            }
        }

        let Some(tag) = git::query(runtime, git::LATEST_TAG, &self.root) else {
            return self.fallback();
        };

        match git::commits_since(runtime, &tag, &self.root) {
            Some(0) => strip_v(&tag).to_string(),
            Some(distance) => match dev_line(&tag) {
                Some(line) => {
                    debug!("HEAD is {} commits ahead of {}, using {}", distance, tag, line);
                    line
                }
                None => self.fallback(),
            },
            None => self.fallback(),
        }
    }

    fn fallback(&self) -> String {
        let version = self
            .guesser
            .guess_version(&Map::new(), &self.root)
            .map(|guess| guess.preferred_pretty_version().to_string())
            .unwrap_or_else(|| DEV_FALLBACK.to_string());
        info!("No usable monorepo tag, falling back to {}", version);
        version
    }
}

impl<R: Runtime> PackageVersionGuesser for MonorepoVersionGuesser<R> {
    fn package_version(&self, _manifest: &Map<String, Value>, _package_root: &Path) -> String {
        self.cached.get_or_init(|| self.compute()).clone()
    }
}

/// Development line of a tag: `3.0.0-alpha1` → `3.0.x-dev`, `v4` → `4.x-dev`.
pub fn dev_line(tag: &str) -> Option<String> {
    let mut parts = strip_v(tag).split('.');

    let major = parts
        .next()
        .filter(|m| !m.is_empty() && m.bytes().all(|b| b.is_ascii_digit()))?;
    let minor = parts.next().map(|m| {
        let end = m.find(|c: char| !c.is_ascii_digit()).unwrap_or(m.len());
        &m[..end]
    });

    Some(match minor {
        Some(minor) if !minor.is_empty() => format!("{}.{}.x-dev", major, minor),
        _ => format!("{}.x-dev", major),
    })
}

fn strip_v(tag: &str) -> &str {
    match tag.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => tag,
    }
}
