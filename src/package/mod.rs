//! Monorepo packages
//!
//! This module discovers sub-packages inside a monorepo tree, computes their
//! candidate versions and exposes them through the [`Repository`] contract.

mod discovery;
mod loader;
mod manifest;
mod repository;
pub mod version;

pub use discovery::{PackageFinder, VENDOR_DIR, find_package_roots};
pub use loader::{ArrayLoader, DEFAULT_PACKAGE_TYPE, Dist, Package, build_record};
pub use manifest::{MANIFEST_FILE, PackageRoot, branch_alias, content_hash, parse_manifest};
pub use repository::{ENV_MIRROR_PATH_REPOS, MonorepoRepository, Repository, RepositoryState};
pub use version::{CandidateList, CandidateSource, VersionCandidate};
