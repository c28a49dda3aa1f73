use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    package::Repository,
    plugin::{CommandEvent, Event, Plugin},
    runtime::Runtime,
};

/// Print the packages the monorepo repository registers, as a JSON array of records.
#[tracing::instrument(skip(runtime))]
pub fn packages<R: Runtime + 'static>(
    runtime: Arc<R>,
    root_version: &str,
    name: Option<&str>,
    prefer_lowest: bool,
) -> Result<()> {
    let plugin = super::activate(runtime, root_version)?;
    println!("{}", render_packages(&plugin, name, prefer_lowest)?);
    Ok(())
}

/// Run the command event through the plugin, then render the repository content.
pub fn render_packages<R: Runtime>(
    plugin: &Plugin<R>,
    name: Option<&str>,
    prefer_lowest: bool,
) -> Result<String> {
    plugin.dispatch(&Event::Command(CommandEvent {
        name: "packages".to_string(),
        prefer_lowest,
    }));

    let records: Vec<Value> = match plugin.repository() {
        Some(repository) => {
            let packages = match name {
                Some(name) => repository.find_packages(name),
                None => repository.packages().iter().collect(),
            };
            packages
                .into_iter()
                .map(|p| Value::Object(p.data.clone()))
                .collect()
        }
        None => Vec::new(),
    };

    debug!("Rendering {} package records", records.len());
    serde_json::to_string_pretty(&records).context("Failed to serialize package records")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MONOREPO_ROOT;
    use crate::plugin::HostContext;
    use crate::runtime::MockRuntime;
    use crate::test_utils::{answer_commands, answer_env, delegate_fs};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn monorepo() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("composer.json"), r#"{"name": "acme/site"}"#).unwrap();
        fs::create_dir_all(dir.path().join("packages/a")).unwrap();
        fs::write(
            dir.path().join("packages/a/composer.json"),
            r#"{"name": "acme/a", "description": "A"}"#,
        )
        .unwrap();
        dir
    }

    fn plugin(dir: &TempDir) -> Plugin<MockRuntime> {
        let mut runtime = MockRuntime::new();
        delegate_fs(&mut runtime);
        answer_env(&mut runtime, &[(ENV_MONOREPO_ROOT, ".")]);
        answer_commands(&mut runtime, &[]);
        runtime.expect_command_exists().returning(|_| true);
        runtime.expect_home_dir().returning(|| None);

        let host = HostContext::load(&runtime, dir.path(), "dev-main").unwrap();
        Plugin::activate(Arc::new(runtime), &host)
    }

    #[test]
    fn test_render_packages_filters_by_name() {
        let dir = monorepo();
        let plugin = plugin(&dir);

        let rendered = render_packages(&plugin, Some("ACME/A"), false).unwrap();
        let records: Vec<Value> = serde_json::from_str(&rendered).unwrap();

        let versions: Vec<_> = records.iter().map(|r| r["version"].clone()).collect();
        assert_eq!(versions, vec!["dev-main", "dev-master"]);
        assert!(records.iter().all(|r| r["name"] == "acme/a"));
        assert!(records.iter().all(|r| r["description"] == "A"));
        assert!(records.iter().all(|r| r["dist"]["type"] == "path"));
    }

    #[test]
    fn test_render_packages_prefer_lowest_is_empty() {
        let dir = monorepo();
        let plugin = plugin(&dir);

        assert_eq!(render_packages(&plugin, None, true).unwrap(), "[]");
    }
}
