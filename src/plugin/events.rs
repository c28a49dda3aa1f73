//! Host events the plugin reacts to.

use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::Plugin;
use super::workspace::{Workspaces, has_frontend_assets};

/// Executable whose absence disables the repository.
pub const GIT_EXECUTABLE: &str = "git";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Command,
    PostPackageInstall,
    PostPackageUpdate,
    PrePackageUninstall,
}

/// A host command about to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandEvent {
    pub name: String,
    pub prefer_lowest: bool,
}

/// A package as seen by the host installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    /// Where the installer puts the package; `None` for metapackages
    pub install_path: Option<PathBuf>,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, install_path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            install_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install(InstalledPackage),
    Update {
        initial: InstalledPackage,
        target: InstalledPackage,
    },
    Uninstall(InstalledPackage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(CommandEvent),
    PostPackageInstall(Operation),
    PostPackageUpdate(Operation),
    PrePackageUninstall(Operation),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Command(_) => EventKind::Command,
            Event::PostPackageInstall(_) => EventKind::PostPackageInstall,
            Event::PostPackageUpdate(_) => EventKind::PostPackageUpdate,
            Event::PrePackageUninstall(_) => EventKind::PrePackageUninstall,
        }
    }

    fn operation(&self) -> Option<&Operation> {
        match self {
            Event::Command(_) => None,
            Event::PostPackageInstall(op)
            | Event::PostPackageUpdate(op)
            | Event::PrePackageUninstall(op) => Some(op),
        }
    }
}

pub type Handler<R> = fn(&Plugin<R>, &Event);

/// Handler table registered with the host.
pub fn handlers<R: Runtime>() -> HashMap<EventKind, Handler<R>> {
    let mut map: HashMap<EventKind, Handler<R>> = HashMap::new();
    map.insert(EventKind::Command, on_command::<R>);
    map.insert(EventKind::PostPackageInstall, on_package_install::<R>);
    map.insert(EventKind::PostPackageUpdate, on_package_update::<R>);
    map.insert(EventKind::PrePackageUninstall, on_package_uninstall::<R>);
    map
}

fn on_command<R: Runtime>(plugin: &Plugin<R>, event: &Event) {
    let (Event::Command(command), Some(repository)) = (event, plugin.repository()) else {
        return;
    };

    if !plugin.runtime().command_exists(GIT_EXECUTABLE) {
        repository.disable(format!(
            "Plugin is disabled because the \"{}\" executable could not be found.",
            GIT_EXECUTABLE
        ));
        return;
    }
    if command.prefer_lowest {
        repository.disable("Plugin is disabled on prefer-lowest installs.");
    }
}

fn on_package_install<R: Runtime>(plugin: &Plugin<R>, event: &Event) {
    register_frontend_workspace(plugin, event);
}

fn on_package_update<R: Runtime>(plugin: &Plugin<R>, event: &Event) {
    register_frontend_workspace(plugin, event);
}

fn on_package_uninstall<R: Runtime>(plugin: &Plugin<R>, event: &Event) {
    let (Some(Operation::Uninstall(package)), Some(root)) =
        (event.operation(), plugin.monorepo_root())
    else {
        return;
    };
    let Some(path) = frontend_package_path(plugin, package) else {
        return;
    };

    debug!("Deregistering workspace related to {} package.", package.name);
    Workspaces::new(plugin.runtime(), root).deregister(&package.name, path);
}

fn register_frontend_workspace<R: Runtime>(plugin: &Plugin<R>, event: &Event) {
    let package = match event.operation() {
        Some(Operation::Install(package)) => package,
        Some(Operation::Update { target, .. }) => target,
        _ => return,
    };
    let Some(root) = plugin.monorepo_root() else {
        return;
    };
    let Some(path) = frontend_package_path(plugin, package) else {
        return;
    };

    debug!("Frontend assets detected in the {} package.", package.name);
    Workspaces::new(plugin.runtime(), root).register(&package.name, path);
}

fn frontend_package_path<'p, R: Runtime>(
    plugin: &Plugin<R>,
    package: &'p InstalledPackage,
) -> Option<&'p Path> {
    let path = package.install_path.as_deref()?;
    has_frontend_assets(plugin.runtime(), path).then_some(path)
}
