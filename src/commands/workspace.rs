use anyhow::Result;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    plugin::{Event, InstalledPackage, Operation, Plugin},
    runtime::{Runtime, path::make_absolute},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceAction {
    Register,
    Deregister,
}

/// Replay an install or uninstall of the package at `path` through the plugin.
#[tracing::instrument(skip(runtime))]
pub fn workspace<R: Runtime + 'static>(
    runtime: Arc<R>,
    root_version: &str,
    action: WorkspaceAction,
    path: &Path,
    name: Option<&str>,
) -> Result<()> {
    let working_dir = runtime.current_dir()?;
    let plugin = super::activate(runtime, root_version)?;
    if !plugin.is_active() {
        warn!("Plugin is not active, workspaces are left untouched");
    }

    plugin.dispatch(&package_event(action, &make_absolute(path, &working_dir), name));
    Ok(())
}

fn package_event(action: WorkspaceAction, path: &Path, name: Option<&str>) -> Event {
    let name = name
        .map(String::from)
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let package = InstalledPackage::new(name, Some(PathBuf::from(path)));

    match action {
        WorkspaceAction::Register => Event::PostPackageInstall(Operation::Install(package)),
        WorkspaceAction::Deregister => Event::PrePackageUninstall(Operation::Uninstall(package)),
    }
}
