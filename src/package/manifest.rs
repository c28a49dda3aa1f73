use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "composer.json";

/// A discovered package directory together with its parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRoot {
    /// Directory containing the manifest
    pub path: PathBuf,
    /// Parsed manifest, key order preserved
    pub manifest: Map<String, Value>,
    /// Hex SHA-1 of the raw manifest bytes
    pub content_hash: String,
}

impl PackageRoot {
    /// Read and parse the manifest inside `dir`.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Self> {
        let manifest_path = Self::manifest_path(dir);
        let raw = runtime
            .read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {:?}", manifest_path))?;

        let manifest = parse_manifest(&raw)
            .with_context(|| format!("Failed to parse {:?}", manifest_path))?;

        Ok(Self {
            path: dir.to_path_buf(),
            manifest,
            content_hash: content_hash(&raw),
        })
    }

    pub fn manifest_path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Declared package name, if any.
    pub fn name(&self) -> Option<&str> {
        self.manifest.get("name").and_then(Value::as_str)
    }

    /// Alias registered for `version` under `extra.branch-alias`.
    pub fn branch_alias(&self, version: &str) -> Option<&str> {
        branch_alias(&self.manifest, version)
    }
}

/// Parse a manifest document; anything but a JSON object is rejected.
pub fn parse_manifest(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "expected a JSON object at the top level, found {}",
            json_kind(&other)
        )),
    }
}

/// Hex SHA-1 of raw manifest contents.
pub fn content_hash(raw: &str) -> String {
    hex::encode(Sha1::digest(raw.as_bytes()))
}

pub fn branch_alias<'a>(manifest: &'a Map<String, Value>, version: &str) -> Option<&'a str> {
    manifest
        .get("extra")?
        .get("branch-alias")?
        .get(version)?
        .as_str()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
