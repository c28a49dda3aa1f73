//! Conversion of package records into resolver-consumable packages.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

use super::version;

pub const DEFAULT_PACKAGE_TYPE: &str = "library";

/// How the resolver materializes a package: a local path, linked or copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dist {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub reference: String,
}

impl Dist {
    pub fn path(url: &Path, reference: impl Into<String>) -> Self {
        Self {
            kind: "path".to_string(),
            url: url.to_string_lossy().into_owned(),
            reference: reference.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": self.kind,
            "url": self.url,
            "reference": self.reference,
        })
    }
}

/// Build the record registered for one candidate version: the manifest with the
/// `dist`, `transport-options` and `version` keys injected.
pub fn build_record(
    manifest: &Map<String, Value>,
    dist: &Dist,
    symlink: bool,
    version: &str,
) -> Map<String, Value> {
    let mut record = manifest.clone();
    record.insert("dist".to_string(), dist.to_value());
    record.insert(
        "transport-options".to_string(),
        json!({ "symlink": symlink }),
    );
    record.insert("version".to_string(), Value::String(version.to_string()));
    record
}

/// A validated package as handed to the resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    /// Lowercased package name
    pub name: String,
    pub pretty_name: String,
    /// Normalized version
    pub version: String,
    pub pretty_version: String,
    #[serde(rename = "type")]
    pub package_type: String,
    pub dist: Dist,
    pub transport_symlink: bool,
    /// The complete record the package was loaded from
    #[serde(skip)]
    pub data: Map<String, Value>,
}

impl Package {
    pub fn dist_path(&self) -> PathBuf {
        PathBuf::from(&self.dist.url)
    }

    pub fn extra(&self) -> Option<&Map<String, Value>> {
        self.data.get("extra").and_then(Value::as_object)
    }

    pub fn is_dev(&self) -> bool {
        version::is_dev(&self.pretty_version)
    }
}

/// Validates records and turns them into [`Package`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrayLoader;

impl ArrayLoader {
    pub fn load(&self, record: &Map<String, Value>) -> Result<Package> {
        let pretty_name = required_str(record, "name")?;
        let pretty_version = required_str(record, "version")?;
        let normalized = version::normalize(pretty_version)
            .with_context(|| format!("Invalid version for package {}", pretty_name))?;

        let package_type = match record.get("type") {
            None => DEFAULT_PACKAGE_TYPE.to_string(),
            Some(Value::String(t)) if !t.trim().is_empty() => t.clone(),
            Some(_) => return Err(anyhow!("\"type\" must be a non-empty string")),
        };

        let dist = parse_dist(record.get("dist"))?;
        let transport_symlink = record
            .get("transport-options")
            .and_then(|o| o.get("symlink"))
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(Package {
            name: pretty_name.to_lowercase(),
            pretty_name: pretty_name.to_string(),
            version: normalized,
            pretty_version: pretty_version.to_string(),
            package_type,
            dist,
            transport_symlink,
            data: record.clone(),
        })
    }
}

fn required_str<'a>(record: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match record.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(_) => Err(anyhow!("\"{}\" must be a non-empty string", key)),
        None => Err(anyhow!("Missing required \"{}\" field", key)),
    }
}

fn parse_dist(value: Option<&Value>) -> Result<Dist> {
    let dist = value
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("Missing \"dist\" object"))?;

    let field = |key: &str| -> Result<String> {
        dist.get(key)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| anyhow!("\"dist.{}\" must be a string", key))
    };

    Ok(Dist {
        kind: field("type")?,
        url: field("url")?,
        reference: field("reference")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_build_record_injects_dist_transport_and_version() {
        let manifest = manifest(json!({"name": "acme/lib", "require": {"php": ">=8.1"}}));
        let dist = Dist::path(Path::new("/repo/packages/lib"), "abc123");

        let record = build_record(&manifest, &dist, false, "2.x-dev");

        assert_eq!(record["name"], "acme/lib");
        assert_eq!(record["require"]["php"], ">=8.1");
        assert_eq!(
            record["dist"],
            json!({"type": "path", "url": "/repo/packages/lib", "reference": "abc123"})
        );
        assert_eq!(record["transport-options"], json!({"symlink": false}));
        assert_eq!(record["version"], "2.x-dev");
    }

    #[test]
    fn test_load_valid_record() {
        let manifest = manifest(json!({"name": "Acme/Lib", "type": "drupal-module"}));
        let dist = Dist::path(Path::new("/repo/lib"), "abc");
        let record = build_record(&manifest, &dist, true, "1.2");

        let package = ArrayLoader.load(&record).unwrap();
        assert_eq!(package.name, "acme/lib");
        assert_eq!(package.pretty_name, "Acme/Lib");
        assert_eq!(package.version, "1.2.0.0");
        assert_eq!(package.pretty_version, "1.2");
        assert_eq!(package.package_type, "drupal-module");
        assert_eq!(package.dist, dist);
        assert!(package.transport_symlink);
        assert!(!package.is_dev());
        assert_eq!(package.dist_path(), PathBuf::from("/repo/lib"));
    }

    #[test]
    fn test_load_defaults_type_to_library() {
        let record = build_record(
            &manifest(json!({"name": "acme/lib"})),
            &Dist::path(Path::new("/repo/lib"), "abc"),
            true,
            "dev-main",
        );
        let package = ArrayLoader.load(&record).unwrap();
        assert_eq!(package.package_type, DEFAULT_PACKAGE_TYPE);
        assert!(package.is_dev());
    }

    #[test]
    fn test_load_rejects_missing_name() {
        let record = build_record(
            &manifest(json!({"description": "nameless"})),
            &Dist::path(Path::new("/repo/lib"), "abc"),
            true,
            "1.0.0",
        );
        let err = ArrayLoader.load(&record).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_load_rejects_invalid_version() {
        let record = build_record(
            &manifest(json!({"name": "acme/lib"})),
            &Dist::path(Path::new("/repo/lib"), "abc"),
            true,
            "not a version",
        );
        assert!(ArrayLoader.load(&record).is_err());
    }

    #[test]
    fn test_load_requires_dist() {
        let record = manifest(json!({"name": "acme/lib", "version": "1.0.0"}));
        let err = ArrayLoader.load(&record).unwrap_err();
        assert!(err.to_string().contains("dist"));
    }
}
