//! Plugin bootstrap and host integration.
//!
//! [`Plugin::activate`] locates the monorepo root, wires the version guessers
//! into a [`MonorepoRepository`] and keeps the handler table the host calls
//! back through [`Plugin::dispatch`]. A plugin that could not activate is
//! inert: it exposes no repository and ignores every event.

mod events;
pub mod workspace;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PluginConfiguration;
use crate::package::{MANIFEST_FILE, MonorepoRepository, parse_manifest};
use crate::runtime::Runtime;
use crate::runtime::path::make_absolute;
use crate::vcs::{GitVersionGuesser, MonorepoVersionGuesser, VersionGuesser, git};

pub use events::{
    CommandEvent, Event, EventKind, GIT_EXECUTABLE, Handler, InstalledPackage, Operation,
};

/// Overrides the file name of the host manifest.
pub const ENV_COMPOSER: &str = "COMPOSER";
/// Overrides the host home directory.
pub const ENV_COMPOSER_HOME: &str = "COMPOSER_HOME";

/// What the host knows when the plugin is activated.
#[derive(Debug, Clone, PartialEq)]
pub struct HostContext {
    pub working_dir: PathBuf,
    /// Path of the host's root manifest; it may not exist
    pub manifest_path: PathBuf,
    pub home_dir: Option<PathBuf>,
    /// Version of the host's root package
    pub root_version: String,
    /// Parsed root manifest, empty when there is none
    pub root_manifest: Map<String, Value>,
}

impl HostContext {
    /// Describe a host running in `working_dir`.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(
        runtime: &R,
        working_dir: &Path,
        root_version: &str,
    ) -> Result<Self> {
        let manifest_name = runtime
            .env_var(ENV_COMPOSER)
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| MANIFEST_FILE.to_string());
        let manifest_path = make_absolute(Path::new(&manifest_name), working_dir);

        let root_manifest = if runtime.exists(&manifest_path) {
            let raw = runtime
                .read_to_string(&manifest_path)
                .with_context(|| format!("Failed to read {:?}", manifest_path))?;
            parse_manifest(&raw).with_context(|| format!("Failed to parse {:?}", manifest_path))?
        } else {
            debug!("No root manifest at {:?}", manifest_path);
            Map::new()
        };

        let home_dir = runtime
            .env_var(ENV_COMPOSER_HOME)
            .ok()
            .filter(|home| !home.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| runtime.home_dir());

        Ok(Self {
            working_dir: working_dir.to_path_buf(),
            manifest_path,
            home_dir,
            root_version: root_version.to_string(),
            root_manifest,
        })
    }
}

pub struct Plugin<R: Runtime> {
    runtime: Arc<R>,
    config: PluginConfiguration,
    monorepo_root: Option<PathBuf>,
    repository: Option<Arc<MonorepoRepository<R>>>,
    handlers: HashMap<EventKind, Handler<R>>,
}

impl<R: Runtime + 'static> Plugin<R> {
    #[tracing::instrument(skip(runtime, host))]
    pub fn activate(runtime: Arc<R>, host: &HostContext) -> Self {
        let config = PluginConfiguration::load(runtime.as_ref(), &host.root_manifest);
        let mut plugin = Self {
            runtime,
            config,
            monorepo_root: None,
            repository: None,
            handlers: Self::subscribed_events(),
        };

        if !plugin.config.is_enabled() {
            info!("Plugin is configured to be disabled.");
            return plugin;
        }

        let Some(root) = detect_monorepo_root(plugin.runtime.as_ref(), &plugin.config, host)
        else {
            return plugin;
        };

        let guesser: Arc<dyn VersionGuesser> =
            Arc::new(GitVersionGuesser::new(plugin.runtime.clone()));
        let monorepo_guesser = Arc::new(MonorepoVersionGuesser::new(
            root.clone(),
            plugin.runtime.clone(),
            guesser.clone(),
            plugin.config.is_offline_mode(),
        ));
        plugin.repository = Some(Arc::new(MonorepoRepository::new(
            root.clone(),
            plugin.runtime.clone(),
            &plugin.config,
            host.root_version.clone(),
            guesser,
            monorepo_guesser,
        )));
        plugin.monorepo_root = Some(root);

        plugin
    }
}

impl<R: Runtime> Plugin<R> {
    /// Handler table, one entry per event kind.
    pub fn subscribed_events() -> HashMap<EventKind, Handler<R>> {
        events::handlers()
    }

    /// Route an event to its handler. Inert plugins ignore everything.
    #[tracing::instrument(skip(self, event), fields(kind = ?event.kind()))]
    pub fn dispatch(&self, event: &Event) {
        if !self.is_active() {
            debug!("Plugin is inactive, ignoring {:?}", event.kind());
            return;
        }
        if let Some(handler) = self.handlers.get(&event.kind()) {
            handler(self, event);
        }
    }

    pub fn is_active(&self) -> bool {
        self.repository.is_some()
    }

    pub fn config(&self) -> &PluginConfiguration {
        &self.config
    }

    pub fn monorepo_root(&self) -> Option<&Path> {
        self.monorepo_root.as_deref()
    }

    /// The repository to prepend to the host's repository chain.
    pub fn repository(&self) -> Option<&Arc<MonorepoRepository<R>>> {
        self.repository.as_ref()
    }

    pub(crate) fn runtime(&self) -> &R {
        self.runtime.as_ref()
    }
}

fn detect_monorepo_root<R: Runtime + ?Sized>(
    runtime: &R,
    config: &PluginConfiguration,
    host: &HostContext,
) -> Option<PathBuf> {
    let Some(forced) = config.forced_monorepo_root() else {
        return match git::work_tree_root(runtime, &host.working_dir) {
            Some(root) => {
                info!("Detected monorepo root: {:?}", root);
                Some(root)
            }
            None => {
                let cwd = runtime
                    .canonicalize(&host.working_dir)
                    .unwrap_or_else(|_| host.working_dir.clone());
                info!(
                    "Plugin is disabled because no GIT root found in {:?} directory",
                    cwd
                );
                None
            }
        };
    };

    let mut bases = Vec::new();
    if let Ok(manifest) = runtime.canonicalize(&host.manifest_path)
        && let Some(dir) = manifest.parent()
    {
        bases.push(dir.to_path_buf());
    }
    bases.extend(host.home_dir.clone());

    for base in bases {
        debug!("Monorepo base path candidate is {:?}.", base);
        let candidate = make_absolute(forced, &base);
        debug!("Monorepo root candidate is {:?}.", candidate);

        if runtime.is_dir(&candidate.join(".git")) {
            warn!("Forced monorepo root is {:?}.", candidate);
            return Some(candidate);
        }
    }

    info!("Plugin is disabled because forced monorepo root does not seem to be a valid GIT root.");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENV_ENABLED, ENV_MONOREPO_ROOT};
    use crate::package::Repository;
    use crate::runtime::MockRuntime;
    use crate::test_utils::{answer_commands, answer_env, delegate_fs};
    use serde_json::json;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn host(dir: &Path, manifest: Value) -> HostContext {
        HostContext {
            working_dir: dir.to_path_buf(),
            manifest_path: dir.join(MANIFEST_FILE),
            home_dir: None,
            root_version: "dev-main".to_string(),
            root_manifest: manifest.as_object().cloned().unwrap_or_default(),
        }
    }

    /// A monorepo with a `.git` directory and one package carrying a frontend.
    fn monorepo() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), r#"{"name": "acme/site"}"#).unwrap();
        let ui = dir.path().join("packages/ui");
        fs::create_dir_all(ui.join("frontend")).unwrap();
        fs::write(ui.join(MANIFEST_FILE), r#"{"name": "acme/ui"}"#).unwrap();
        fs::write(ui.join("frontend/package.json"), "{}").unwrap();
        dir
    }

    fn runtime(
        env: &'static [(&'static str, &'static str)],
        commands: &'static [(&'static str, &'static str)],
        git_installed: bool,
    ) -> Arc<MockRuntime> {
        let mut runtime = MockRuntime::new();
        delegate_fs(&mut runtime);
        answer_env(&mut runtime, env);
        answer_commands(&mut runtime, commands);
        runtime
            .expect_command_exists()
            .returning(move |_| git_installed);
        runtime.expect_home_dir().returning(|| None);
        Arc::new(runtime)
    }

    fn forced_root_env() -> &'static [(&'static str, &'static str)] {
        &[(ENV_MONOREPO_ROOT, ".")]
    }

    #[test]
    fn test_disabled_configuration_is_inert() {
        let dir = monorepo();
        let plugin = Plugin::activate(
            runtime(&[(ENV_ENABLED, "0")], &[], true),
            &host(dir.path(), json!({})),
        );

        assert!(!plugin.is_active());
        assert!(plugin.repository().is_none());
        assert!(!plugin.config().is_enabled());
    }

    #[test]
    fn test_without_git_root_is_inert() {
        let dir = tempdir().unwrap();
        let plugin = Plugin::activate(runtime(&[], &[], true), &host(dir.path(), json!({})));

        assert!(!plugin.is_active());
        assert_eq!(plugin.monorepo_root(), None);
    }

    #[test]
    fn test_root_detected_from_git_dir() {
        let mut runtime = MockRuntime::new();
        answer_env(&mut runtime, &[]);
        answer_commands(
            &mut runtime,
            &[(git::ABSOLUTE_GIT_DIR, "/srv/monorepo/.git\n")],
        );

        let plugin = Plugin::activate(
            Arc::new(runtime),
            &host(Path::new("/srv/monorepo/web"), json!({})),
        );

        assert!(plugin.is_active());
        assert_eq!(plugin.monorepo_root(), Some(Path::new("/srv/monorepo")));
    }

    #[test]
    fn test_forced_root_relative_to_manifest_dir() {
        let dir = monorepo();
        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], true),
            &host(dir.path(), json!({})),
        );

        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(plugin.monorepo_root(), Some(expected.as_path()));
    }

    #[test]
    fn test_forced_root_from_manifest_extra() {
        let dir = monorepo();
        let web = dir.path().join("web");
        fs::create_dir_all(&web).unwrap();
        fs::write(web.join(MANIFEST_FILE), "{}").unwrap();

        let plugin = Plugin::activate(
            runtime(&[], &[], true),
            &host(&web, json!({"extra": {"monorepo-helper": {"monorepo-root": ".."}}})),
        );

        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(plugin.monorepo_root(), Some(expected.as_path()));
    }

    #[test]
    fn test_forced_root_without_git_dir_is_inert() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();

        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], true),
            &host(dir.path(), json!({})),
        );

        assert!(!plugin.is_active());
    }

    #[test]
    fn test_prefer_lowest_disables_repository() {
        let dir = monorepo();
        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], true),
            &host(dir.path(), json!({})),
        );

        plugin.dispatch(&Event::Command(CommandEvent {
            name: "update".to_string(),
            prefer_lowest: true,
        }));

        let repository = plugin.repository().unwrap();
        assert!(!repository.is_enabled());
        assert_eq!(repository.count(), 0);
        assert_eq!(
            repository.disable_reason(),
            Some("Plugin is disabled on prefer-lowest installs.")
        );
    }

    #[test]
    fn test_missing_git_executable_disables_repository() {
        let dir = monorepo();
        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], false),
            &host(dir.path(), json!({})),
        );

        plugin.dispatch(&Event::Command(CommandEvent::default()));

        let repository = plugin.repository().unwrap();
        assert!(!repository.is_enabled());
        assert!(repository.disable_reason().unwrap().contains(GIT_EXECUTABLE));
    }

    #[test]
    fn test_plain_command_keeps_repository_enabled() {
        let dir = monorepo();
        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], true),
            &host(dir.path(), json!({})),
        );

        plugin.dispatch(&Event::Command(CommandEvent::default()));

        let repository = plugin.repository().unwrap();
        assert!(repository.is_enabled());
        assert!(repository.has_package("acme/ui", "dev-main"));
    }

    #[test]
    fn test_install_update_and_uninstall_sync_workspaces() {
        let dir = monorepo();
        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], true),
            &host(dir.path(), json!({})),
        );
        let ui = InstalledPackage::new("acme/ui", Some(dir.path().join("packages/ui")));
        let workspace_manifest = dir.path().join("package.json");
        let workspaces = || -> Value {
            serde_json::from_str::<Value>(&fs::read_to_string(&workspace_manifest).unwrap())
                .unwrap()["workspaces"]
                .clone()
        };

        plugin.dispatch(&Event::PostPackageInstall(Operation::Install(ui.clone())));
        assert_eq!(workspaces(), json!(["packages/ui/frontend"]));

        plugin.dispatch(&Event::PostPackageUpdate(Operation::Update {
            initial: ui.clone(),
            target: ui.clone(),
        }));
        assert_eq!(workspaces(), json!(["packages/ui/frontend"]));

        plugin.dispatch(&Event::PrePackageUninstall(Operation::Uninstall(ui)));
        assert_eq!(workspaces(), json!([]));
    }

    #[test]
    fn test_package_without_frontend_is_ignored() {
        let dir = monorepo();
        let api = dir.path().join("packages/api");
        fs::create_dir_all(&api).unwrap();

        let plugin = Plugin::activate(
            runtime(forced_root_env(), &[], true),
            &host(dir.path(), json!({})),
        );
        plugin.dispatch(&Event::PostPackageInstall(Operation::Install(
            InstalledPackage::new("acme/api", Some(api)),
        )));

        assert!(!dir.path().join("package.json").exists());
    }

    #[test]
    fn test_host_context_load() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"name": "acme/site", "extra": {"monorepo-helper": {"offline-mode": true}}}"#,
        )
        .unwrap();

        let mut runtime = MockRuntime::new();
        delegate_fs(&mut runtime);
        answer_env(&mut runtime, &[(ENV_COMPOSER_HOME, "/opt/composer")]);

        let host = HostContext::load(&runtime, dir.path(), "1.0.x-dev").unwrap();
        assert_eq!(host.manifest_path, dir.path().join(MANIFEST_FILE));
        assert_eq!(host.home_dir, Some(PathBuf::from("/opt/composer")));
        assert_eq!(host.root_manifest["name"], "acme/site");
        assert_eq!(host.root_version, "1.0.x-dev");
    }

    #[test]
    fn test_host_context_with_malformed_manifest_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "[]").unwrap();

        let mut runtime = MockRuntime::new();
        delegate_fs(&mut runtime);
        answer_env(&mut runtime, &[]);

        assert!(HostContext::load(&runtime, dir.path(), "dev-main").is_err());
    }
}
