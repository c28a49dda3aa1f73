//! Frontend workspace list in the monorepo's `package.json`.
//!
//! Packages carrying a `frontend/package.json` are listed in the root
//! `workspaces` array so a JavaScript package manager can install them
//! together. Failures here are logged and never reach the host.

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

use crate::package::parse_manifest;
use crate::runtime::{Runtime, relative_slash_path};

pub const WORKSPACE_MANIFEST: &str = "package.json";
pub const FRONTEND_DIR: &str = "frontend";

const DEFAULT_NAME: &str = "monorepo-workspace";
const DEFAULT_LICENSE: &str = "GPL-2.0-or-later";

/// Whether the package installed at `package_path` ships a frontend sub-project.
pub fn has_frontend_assets<R: Runtime + ?Sized>(runtime: &R, package_path: &Path) -> bool {
    runtime.exists(&package_path.join(FRONTEND_DIR).join(WORKSPACE_MANIFEST))
}

/// Edits the workspace list of the `package.json` in a monorepo root.
pub struct Workspaces<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    root: &'a Path,
}

impl<'a, R: Runtime + ?Sized> Workspaces<'a, R> {
    pub fn new(runtime: &'a R, root: &'a Path) -> Self {
        Self { runtime, root }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(WORKSPACE_MANIFEST)
    }

    /// Workspace entry of a package: its install path relative to the root,
    /// symlinks resolved, plus `/frontend`.
    pub fn entry(&self, package_path: &Path) -> Result<String> {
        let resolved = self.resolve(package_path);
        let root = self.resolve(self.root);
        let relative = relative_slash_path(&root, &resolved).ok_or_else(|| {
            anyhow!("{:?} cannot be expressed relative to {:?}", resolved, root)
        })?;

        Ok(if relative.is_empty() {
            FRONTEND_DIR.to_string()
        } else {
            format!("{}/{}", relative, FRONTEND_DIR)
        })
    }

    /// Add the package's frontend to the workspace list, creating the manifest when needed.
    #[tracing::instrument(skip(self))]
    pub fn register(&self, package_name: &str, package_path: &Path) {
        let manifest_path = self.manifest_path();
        match self.add_entry(package_path) {
            Ok(true) => info!(
                "Registered {} package as workspace in package.json at {:?} path.",
                package_name, manifest_path
            ),
            Ok(false) => debug!(
                "{} package is already registered as workspace in {:?}",
                package_name, manifest_path
            ),
            Err(e) => error!(
                "The package.json at {:?} path could not be updated. Reason: {:#}",
                manifest_path, e
            ),
        }
    }

    /// Remove the package's frontend from the workspace list.
    #[tracing::instrument(skip(self))]
    pub fn deregister(&self, package_name: &str, package_path: &Path) {
        let manifest_path = self.manifest_path();
        if !self.runtime.exists(&manifest_path) {
            info!(
                "No package.json file at {:?} path to deregister workspace from.",
                manifest_path
            );
            return;
        }

        match self.remove_entry(package_path) {
            Ok(true) => info!(
                "Deregistered {} package as workspace from package.json at {:?} path.",
                package_name, manifest_path
            ),
            Ok(false) => debug!(
                "The {} package as workspace was not registered in package.json at {:?} path.",
                package_name, manifest_path
            ),
            Err(e) => error!(
                "Failed to deregister {} package from package.json at {:?}. Reason: {:#}",
                package_name, manifest_path, e
            ),
        }
    }

    fn add_entry(&self, package_path: &Path) -> Result<bool> {
        let manifest_path = self.manifest_path();
        if !self.runtime.exists(&manifest_path) {
            self.save(&default_manifest())?;
            info!("Created package.json file at {:?} path", manifest_path);
        }

        let mut manifest = self.load()?;
        let entry = self.entry(package_path)?;

        let workspaces = manifest
            .entry("workspaces")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| anyhow!("\"workspaces\" is not an array"))?;

        let added = !workspaces.iter().any(|w| w.as_str() == Some(entry.as_str()));
        if added {
            workspaces.push(Value::String(entry));
        }

        self.save(&manifest)?;
        Ok(added)
    }

    fn remove_entry(&self, package_path: &Path) -> Result<bool> {
        let mut manifest = self.load()?;
        let entry = self.entry(package_path)?;

        let Some(workspaces) = manifest.get_mut("workspaces").and_then(Value::as_array_mut) else {
            return Ok(false);
        };
        let Some(index) = workspaces
            .iter()
            .position(|w| w.as_str() == Some(entry.as_str()))
        else {
            return Ok(false);
        };

        workspaces.remove(index);
        self.save(&manifest)?;
        Ok(true)
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let path = self.manifest_path();
        let raw = self
            .runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        parse_manifest(&raw).with_context(|| format!("Failed to decode {:?}", path))
    }

    fn save(&self, manifest: &Map<String, Value>) -> Result<()> {
        let path = self.manifest_path();
        let content = serde_json::to_string_pretty(manifest)?;
        self.runtime
            .write(&path, content.as_bytes())
            .with_context(|| format!("Failed to write {:?}", path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.runtime
            .canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn default_manifest() -> Map<String, Value> {
    let mut manifest = Map::new();
    manifest.insert("name".to_string(), json!(DEFAULT_NAME));
    manifest.insert("private".to_string(), json!(true));
    manifest.insert("license".to_string(), json!(DEFAULT_LICENSE));
    manifest.insert("workspaces".to_string(), json!([]));
    manifest
}
