//! Version-control introspection.
//!
//! - `git` - Best-effort git queries through the [`Runtime`](crate::runtime::Runtime)
//! - `guesser` - Generic tag/branch version guesser
//! - `monorepo` - Monorepo-convention version guesser

pub mod git;
mod guesser;
mod monorepo;

pub use guesser::{
    GitVersionGuesser, VersionGuess, VersionGuesser, branch_version, is_feature_branch,
};
pub use monorepo::{DEV_FALLBACK, MonorepoVersionGuesser, PackageVersionGuesser, dev_line};

#[cfg(test)]
pub use guesser::MockVersionGuesser;
#[cfg(test)]
pub use monorepo::MockPackageVersionGuesser;
