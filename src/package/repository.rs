//! Repository of monorepo-internal packages.
//!
//! The repository discovers packages lazily: the first query walks the tree,
//! asks both version guessers for candidates and registers one package per
//! surviving candidate. Later queries read the populated set.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

use crate::config::PluginConfiguration;
use crate::runtime::{Runtime, env_flag};
use crate::vcs::{PackageVersionGuesser, VersionGuesser, git};

use super::version::{self, CandidateList, CandidateSource};
use super::{ArrayLoader, Dist, Package, PackageFinder, PackageRoot, build_record};

/// Truthy value forces copying path packages instead of symlinking them.
pub const ENV_MIRROR_PATH_REPOS: &str = "COMPOSER_MIRROR_PATH_REPOS";

/// Queryable collection of packages, as consumed by a resolver.
pub trait Repository {
    fn packages(&self) -> &[Package];

    /// Every registered version of `name`, compared case-insensitively.
    fn find_packages(&self, name: &str) -> Vec<&Package> {
        let name = name.to_lowercase();
        self.packages().iter().filter(|p| p.name == name).collect()
    }

    /// Package `name` at `version`, given either normalized or pretty.
    fn find_package(&self, name: &str, version: &str) -> Option<&Package> {
        let normalized = version::normalize(version).ok();
        self.find_packages(name).into_iter().find(|p| {
            p.pretty_version == version
                || p.version == version
                || normalized.as_deref() == Some(p.version.as_str())
        })
    }

    fn has_package(&self, name: &str, version: &str) -> bool {
        self.find_package(name, version).is_some()
    }

    fn count(&self) -> usize {
        self.packages().len()
    }
}

/// Population state of a [`MonorepoRepository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Uninitialized,
    Initializing,
    Populated,
}

pub struct MonorepoRepository<R: Runtime> {
    root: PathBuf,
    runtime: Arc<R>,
    config: PluginConfiguration,
    root_version: String,
    guesser: Arc<dyn VersionGuesser>,
    monorepo_guesser: Arc<dyn PackageVersionGuesser>,
    loader: ArrayLoader,
    enabled: AtomicBool,
    disable_reason: OnceLock<String>,
    initializing: AtomicBool,
    packages: OnceLock<Vec<Package>>,
}

impl<R: Runtime> MonorepoRepository<R> {
    /// `root_version` is the version of the host's root package; it is offered
    /// as a candidate for every discovered package.
    pub fn new(
        root: impl Into<PathBuf>,
        runtime: Arc<R>,
        config: &PluginConfiguration,
        root_version: impl Into<String>,
        guesser: Arc<dyn VersionGuesser>,
        monorepo_guesser: Arc<dyn PackageVersionGuesser>,
    ) -> Self {
        Self {
            root: root.into(),
            runtime,
            config: config.clone(),
            root_version: root_version.into(),
            guesser,
            monorepo_guesser,
            loader: ArrayLoader,
            enabled: AtomicBool::new(true),
            disable_reason: OnceLock::new(),
            initializing: AtomicBool::new(false),
            packages: OnceLock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stop the repository from populating itself. Packages registered
    /// before the call stay visible. Only the first reason is kept.
    pub fn disable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("{}", reason);
            let _ = self.disable_reason.set(reason);
        } else {
            debug!("Repository already disabled, ignoring: {}", reason);
        }
    }

    pub fn disable_reason(&self) -> Option<&str> {
        self.disable_reason.get().map(String::as_str)
    }

    pub fn state(&self) -> RepositoryState {
        if self.packages.get().is_some() {
            RepositoryState::Populated
        } else if self.initializing.load(Ordering::SeqCst) {
            RepositoryState::Initializing
        } else {
            RepositoryState::Uninitialized
        }
    }

    fn loaded(&self) -> &[Package] {
        if let Some(packages) = self.packages.get() {
            return packages;
        }
        if !self.is_enabled() {
            return &[];
        }
        self.packages.get_or_init(|| self.populate())
    }

    #[tracing::instrument(skip(self), fields(root = ?self.root))]
    fn populate(&self) -> Vec<Package> {
        self.initializing.store(true, Ordering::SeqCst);
        let runtime = self.runtime.as_ref();

        if self.config.is_offline_mode() {
            warn!("Offline mode is active.");
        }

        let commit = git::head_commit(runtime, &self.root);

        let symlink = !env_flag(runtime, ENV_MIRROR_PATH_REPOS);
        if !symlink {
            warn!("Packages are going to be copied instead of symlinked.");
        }

        let finder = PackageFinder::new(
            runtime,
            &self.root,
            self.config.max_discovery_depth(),
            self.config.excluded_directories(),
        );

        let mut packages = Vec::new();
        let mut registered = HashSet::new();
        for dir in finder {
            match PackageRoot::load(runtime, &dir) {
                Ok(package_root) => self.register(
                    &package_root,
                    commit.as_deref(),
                    symlink,
                    &mut registered,
                    &mut packages,
                ),
                Err(e) => error!(
                    "Unable to load package data from {:?}: {:#}",
                    PackageRoot::manifest_path(&dir),
                    e
                ),
            }
        }

        debug!("Registered {} monorepo package versions", packages.len());
        self.initializing.store(false, Ordering::SeqCst);
        packages
    }

    /// Candidate versions of one package, in registration order.
    pub fn candidates(&self, package_root: &PackageRoot) -> CandidateList {
        let mut candidates = CandidateList::new();
        candidates.push(self.root_version.as_str(), CandidateSource::RootPackageFallback);

        if let Some(guess) = self
            .guesser
            .guess_version(&package_root.manifest, &package_root.path)
        {
            let (pretty, source) = match &guess.feature_pretty_version {
                Some(feature) => (feature.as_str(), CandidateSource::VcsFeatureBranch),
                None => (guess.pretty_version.as_str(), CandidateSource::VcsPretty),
            };
            candidates.push(pretty, source);

            if !pretty.contains("dev-")
                && let Some(alias) = package_root.branch_alias(pretty)
            {
                candidates.push(alias, CandidateSource::BranchAlias);
            }
        }

        candidates.push(
            self.monorepo_guesser
                .package_version(&package_root.manifest, &package_root.path),
            CandidateSource::MonorepoConvention,
        );

        candidates
    }

    /// Load one package per candidate. `registered` holds the (name, normalized
    /// version) pairs of the whole pass; a pair is never registered twice.
    fn register(
        &self,
        package_root: &PackageRoot,
        commit: Option<&str>,
        symlink: bool,
        registered: &mut HashSet<(String, String)>,
        packages: &mut Vec<Package>,
    ) {
        let reference = commit.unwrap_or(&package_root.content_hash);
        let dist = Dist::path(&package_root.path, reference);

        for candidate in &self.candidates(package_root) {
            let record = build_record(&package_root.manifest, &dist, symlink, &candidate.version);
            match self.loader.load(&record) {
                Ok(package) => {
                    if !registered.insert((package.name.clone(), package.version.clone())) {
                        debug!(
                            "Skipping {} {} from {:?}: version {} is already registered",
                            package.pretty_name,
                            package.pretty_version,
                            package_root.path,
                            package.version
                        );
                        continue;
                    }
                    info!(
                        "Added {} {} as {} version from the monorepo.",
                        package.pretty_name, package.package_type, package.pretty_version
                    );
                    packages.push(package);
                }
                Err(e) => error!(
                    "Unable to load package data from {:?} as {} ({}): {:#}",
                    PackageRoot::manifest_path(&package_root.path),
                    candidate.version,
                    candidate.source,
                    e
                ),
            }
        }
    }
}

impl<R: Runtime> Repository for MonorepoRepository<R> {
    fn packages(&self) -> &[Package] {
        self.loaded()
    }
}
