//! Version candidates and version-string normalization.
//!
//! Candidates are the raw version strings proposed for one package by the
//! different guessers. Normalization turns a pretty version into the canonical
//! form the resolver compares (`1.2` → `1.2.0.0`, `2.x-dev` →
//! `2.9999999.9999999.9999999-dev`); it does not compare versions.

use anyhow::{Result, bail};
use std::fmt;

/// Where a candidate version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    /// Plain pretty version from the VCS guesser
    VcsPretty,
    /// Feature branch version from the VCS guesser
    VcsFeatureBranch,
    /// `extra.branch-alias` target of the VCS guess
    BranchAlias,
    /// Monorepo version guesser
    MonorepoConvention,
    /// Version of the root package
    RootPackageFallback,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CandidateSource::VcsPretty => "vcs-pretty",
            CandidateSource::VcsFeatureBranch => "vcs-feature-branch",
            CandidateSource::BranchAlias => "branch-alias",
            CandidateSource::MonorepoConvention => "monorepo-convention",
            CandidateSource::RootPackageFallback => "root-package-fallback",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    pub version: String,
    pub source: CandidateSource,
}

impl VersionCandidate {
    pub fn new(version: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            version: version.into(),
            source,
        }
    }
}

/// Ordered candidate versions for one package.
///
/// Pushing a version string that is already present is a no-op, so the first
/// source that proposed a version keeps it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateList {
    candidates: Vec<VersionCandidate>,
}

impl CandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate. Returns false when the version was already listed or is blank.
    pub fn push(&mut self, version: impl Into<String>, source: CandidateSource) -> bool {
        let version = version.into();
        if version.trim().is_empty() || self.contains(&version) {
            return false;
        }
        self.candidates.push(VersionCandidate::new(version, source));
        true
    }

    pub fn contains(&self, version: &str) -> bool {
        self.candidates.iter().any(|c| c.version == version)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionCandidate> {
        self.candidates.iter()
    }

    pub fn versions(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.version.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a VersionCandidate;
    type IntoIter = std::slice::Iter<'a, VersionCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Whether a pretty version denotes an unreleased development version.
pub fn is_dev(version: &str) -> bool {
    let lower = version.trim().to_ascii_lowercase();
    lower.starts_with("dev-") || lower.ends_with("-dev")
}

/// Normalize a pretty version string.
pub fn normalize(version: &str) -> Result<String> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        bail!("Invalid version string \"{}\": empty", version);
    }

    if let Some(branch) = trimmed.strip_prefix("dev-") {
        if branch.is_empty() {
            bail!("Invalid version string \"{}\": missing branch name", version);
        }
        return Ok(trimmed.to_string());
    }

    // Build metadata does not take part in comparisons
    let without_build = trimmed.split('+').next().unwrap_or(trimmed);

    if let Some(normalized) = normalize_numeric(without_build) {
        return Ok(normalized);
    }

    let lower = without_build.to_ascii_lowercase();
    if let Some(base) = lower.strip_suffix("dev") {
        let base = base.trim_end_matches(['.', '-']);
        if let Some(normalized) = normalize_branch(base) {
            return Ok(normalized);
        }
    }

    bail!("Invalid version string \"{}\"", version)
}

/// Normalize a numeric branch name such as `2.x` or `1.0` into its dev version.
pub fn normalize_branch(name: &str) -> Option<String> {
    let name = strip_v(name.trim());
    let parts: Vec<&str> = name.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    if !parts[0].chars().all(|c| c.is_ascii_digit()) || parts[0].is_empty() {
        return None;
    }

    let mut normalized = Vec::with_capacity(4);
    for part in &parts {
        if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
            normalized.push(part.to_string());
        } else if matches!(*part, "x" | "X" | "*") {
            normalized.push("9999999".to_string());
        } else {
            return None;
        }
    }
    while normalized.len() < 4 {
        normalized.push("9999999".to_string());
    }

    Some(format!("{}-dev", normalized.join(".")))
}

/// Whether a branch name looks like a version line (`2.x`, `1.0`, `v3`).
pub fn is_numeric_branch(name: &str) -> bool {
    normalize_branch(name).is_some()
}

fn strip_v(s: &str) -> &str {
    match s.strip_prefix(['v', 'V']) {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => s,
    }
}

/// `1.2.3-beta2` style versions: up to four numeric parts plus an optional
/// stability modifier and an optional dev suffix.
fn normalize_numeric(version: &str) -> Option<String> {
    let version = strip_v(version);

    let numeric_end = version
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(version.len());
    let (numbers, rest) = version.split_at(numeric_end);

    // A trailing dot belongs to the modifier separator ("1.0.dev")
    let (numbers, rest) = match numbers.strip_suffix('.') {
        Some(n) => (n, &version[n.len()..]),
        None => (numbers, rest),
    };

    let parts: Vec<&str> = numbers.split('.').collect();
    if parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let mut normalized: Vec<&str> = parts.clone();
    while normalized.len() < 4 {
        normalized.push("0");
    }
    let mut result = normalized.join(".");

    if rest.is_empty() {
        return Some(result);
    }

    let (stability, dev) = parse_modifier(rest)?;
    if let Some((name, number)) = stability
        && name != "stable"
    {
        result.push('-');
        result.push_str(name);
        result.push_str(&number);
    }
    if dev {
        result.push_str("-dev");
    }
    Some(result)
}

const STABILITIES: &[(&str, &str)] = &[
    ("stable", "stable"),
    ("alpha", "alpha"),
    ("beta", "beta"),
    ("patch", "patch"),
    ("pl", "patch"),
    ("rc", "RC"),
    ("a", "alpha"),
    ("b", "beta"),
    ("p", "patch"),
];

/// Parse `[._-]?<stability>[[.-]?<digits>]*([.-]?dev)?` or `[.-]?dev`.
fn parse_modifier(rest: &str) -> Option<(Option<(&'static str, String)>, bool)> {
    let lower = rest.to_ascii_lowercase();
    let mut s = lower.trim_start_matches(['.', '_', '-']);
    if s.len() + 1 < lower.len() {
        // More than one separator
        return None;
    }

    if let Some(after) = s.strip_prefix("dev")
        && after.is_empty()
    {
        return Some((None, true));
    }

    let (keyword, expanded) = STABILITIES
        .iter()
        .find(|(keyword, _)| s.starts_with(keyword))?;
    s = &s[keyword.len()..];

    let mut number = String::new();
    loop {
        let body = s.strip_prefix(['.', '-']).unwrap_or(s);
        let digits_len = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
        if digits_len == 0 {
            break;
        }
        if !number.is_empty() {
            number.push('.');
        }
        number.push_str(&body[..digits_len]);
        s = &body[digits_len..];
    }

    let dev = match s {
        "" => false,
        "dev" | ".dev" | "-dev" => true,
        _ => return None,
    };

    Some((Some((*expanded, number)), dev))
}
