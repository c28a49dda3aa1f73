//! Plugin configuration.
//!
//! Settings come from the `extra.monorepo-helper` object of the root manifest and
//! can be overridden with `MONOREPO_HELPER_*` environment variables.

use log::{debug, warn};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::runtime::{Runtime, env_flag, is_truthy};

/// Key of the settings object inside the root manifest's `extra` section.
pub const EXTRA_KEY: &str = "monorepo-helper";

pub const ENV_ENABLED: &str = "MONOREPO_HELPER_ENABLED";
pub const ENV_OFFLINE_MODE: &str = "MONOREPO_HELPER_OFFLINE_MODE";
pub const ENV_MAX_DISCOVERY_DEPTH: &str = "MONOREPO_HELPER_MAX_DISCOVERY_DEPTH";
pub const ENV_EXCLUDED_DIRECTORIES: &str = "MONOREPO_HELPER_EXCLUDED_DIRECTORIES";
pub const ENV_MONOREPO_ROOT: &str = "MONOREPO_HELPER_MONOREPO_ROOT";
/// Composer's own switch for disabling network access.
pub const ENV_DISABLE_NETWORK: &str = "COMPOSER_DISABLE_NETWORK";

pub const DEFAULT_MAX_DISCOVERY_DEPTH: usize = 5;

/// Immutable plugin settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfiguration {
    enabled: bool,
    offline_mode: bool,
    max_discovery_depth: usize,
    excluded_directories: Vec<String>,
    forced_monorepo_root: Option<PathBuf>,
}

impl Default for PluginConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            offline_mode: false,
            max_discovery_depth: DEFAULT_MAX_DISCOVERY_DEPTH,
            excluded_directories: Vec::new(),
            forced_monorepo_root: None,
        }
    }
}

impl PluginConfiguration {
    /// Build the configuration from the root manifest and the environment.
    #[tracing::instrument(skip(runtime, root_manifest))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, root_manifest: &Map<String, Value>) -> Self {
        let mut config = Self::default();

        if let Some(settings) = root_manifest
            .get("extra")
            .and_then(|extra| extra.get(EXTRA_KEY))
        {
            match settings.as_object() {
                Some(settings) => config.apply_manifest(settings),
                None => warn!("Ignoring extra.{}: expected an object", EXTRA_KEY),
            }
        }

        config.apply_env(runtime);
        debug!("Plugin configuration: {:?}", config);
        config
    }

    fn apply_manifest(&mut self, settings: &Map<String, Value>) {
        for (key, value) in settings {
            match key.as_str() {
                "enabled" => match value.as_bool() {
                    Some(enabled) => self.enabled = enabled,
                    None => warn!("Ignoring {}.enabled: expected a boolean", EXTRA_KEY),
                },
                "offline-mode" => match value.as_bool() {
                    Some(offline) => self.offline_mode = offline,
                    None => warn!("Ignoring {}.offline-mode: expected a boolean", EXTRA_KEY),
                },
                "max-discovery-depth" => match value.as_u64() {
                    Some(depth) => self.max_discovery_depth = depth as usize,
                    None => warn!(
                        "Ignoring {}.max-discovery-depth: expected a non-negative integer",
                        EXTRA_KEY
                    ),
                },
                "excluded-directories" => match value.as_array() {
                    Some(dirs) => {
                        self.excluded_directories = dirs
                            .iter()
                            .filter_map(|d| d.as_str())
                            .filter(|d| !d.trim().is_empty())
                            .map(|d| d.trim().to_string())
                            .collect();
                    }
                    None => warn!(
                        "Ignoring {}.excluded-directories: expected an array of strings",
                        EXTRA_KEY
                    ),
                },
                "monorepo-root" => match value.as_str() {
                    Some(root) if !root.trim().is_empty() => {
                        self.forced_monorepo_root = Some(PathBuf::from(root.trim()));
                    }
                    _ => warn!("Ignoring {}.monorepo-root: expected a path", EXTRA_KEY),
                },
                other => debug!("Unknown {} setting: {}", EXTRA_KEY, other),
            }
        }
    }

    fn apply_env<R: Runtime + ?Sized>(&mut self, runtime: &R) {
        if let Ok(value) = runtime.env_var(ENV_ENABLED) {
            self.enabled = is_truthy(&value);
        }

        if let Ok(value) = runtime.env_var(ENV_OFFLINE_MODE) {
            self.offline_mode = is_truthy(&value);
        }
        if env_flag(runtime, ENV_DISABLE_NETWORK) {
            self.offline_mode = true;
        }

        if let Ok(value) = runtime.env_var(ENV_MAX_DISCOVERY_DEPTH) {
            match value.trim().parse::<usize>() {
                Ok(depth) => self.max_discovery_depth = depth,
                Err(_) => warn!(
                    "Ignoring {}={:?}: expected a non-negative integer",
                    ENV_MAX_DISCOVERY_DEPTH, value
                ),
            }
        }

        if let Ok(value) = runtime.env_var(ENV_EXCLUDED_DIRECTORIES) {
            self.excluded_directories = value
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(value) = runtime.env_var(ENV_MONOREPO_ROOT)
            && !value.trim().is_empty()
        {
            self.forced_monorepo_root = Some(PathBuf::from(value.trim()));
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_offline_mode(mut self, offline_mode: bool) -> Self {
        self.offline_mode = offline_mode;
        self
    }

    pub fn with_max_discovery_depth(mut self, depth: usize) -> Self {
        self.max_discovery_depth = depth;
        self
    }

    pub fn with_excluded_directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_directories = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_forced_monorepo_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.forced_monorepo_root = Some(root.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_offline_mode(&self) -> bool {
        self.offline_mode
    }

    pub fn max_discovery_depth(&self) -> usize {
        self.max_discovery_depth
    }

    pub fn excluded_directories(&self) -> &[String] {
        &self.excluded_directories
    }

    pub fn forced_monorepo_root(&self) -> Option<&PathBuf> {
        self.forced_monorepo_root.as_ref()
    }
}
