use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::MANIFEST_FILE;

/// Directory name that is never descended into.
pub const VENDOR_DIR: &str = "vendor";

/// Lazily walks a monorepo tree and yields every directory that holds a manifest.
///
/// The traversal is depth-first in file-name order, skips the vendor directory,
/// hidden directories, symlinked directories and the configured exclusions, and
/// never descends below `max_depth` levels. Directories that cannot be read are
/// skipped. The iterator is one-shot: create a new finder to rescan.
pub struct PackageFinder<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    root: PathBuf,
    max_depth: usize,
    excluded: Vec<PathBuf>,
    pending: Vec<(PathBuf, usize)>,
}

impl<'a, R: Runtime + ?Sized> PackageFinder<'a, R> {
    pub fn new<S: AsRef<str>>(
        runtime: &'a R,
        root: &Path,
        max_depth: usize,
        excluded: &[S],
    ) -> Self {
        let excluded = excluded
            .iter()
            .map(|e| e.as_ref().trim_matches('/'))
            .filter(|e| !e.is_empty())
            .map(PathBuf::from)
            .collect();

        Self {
            runtime,
            root: root.to_path_buf(),
            max_depth,
            excluded,
            pending: vec![(root.to_path_buf(), 0)],
        }
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        let Ok(relative) = dir.strip_prefix(&self.root) else {
            return false;
        };

        self.excluded.iter().any(|excluded| {
            if relative.starts_with(excluded) {
                return true;
            }
            // Single-name entries match at any depth
            excluded.components().count() == 1
                && relative
                    .components()
                    .any(|c| c.as_os_str() == excluded.as_os_str())
        })
    }

    fn should_descend(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        name != VENDOR_DIR
            && !name.starts_with('.')
            && self.runtime.is_dir(path)
            && !self.runtime.is_symlink(path)
            && !self.is_excluded(path)
    }
}

impl<R: Runtime + ?Sized> Iterator for PackageFinder<'_, R> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        while let Some((dir, depth)) = self.pending.pop() {
            let mut entries = match self.runtime.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping unreadable directory {:?}: {}", dir, e);
                    continue;
                }
            };
            entries.sort();

            let mut has_manifest = false;
            let mut subdirs = Vec::new();
            for entry in entries {
                if entry.file_name().is_some_and(|n| n == MANIFEST_FILE) {
                    has_manifest = !self.runtime.is_dir(&entry);
                } else if depth < self.max_depth && self.should_descend(&entry) {
                    subdirs.push((entry, depth + 1));
                }
            }

            // Reversed so the stack pops children in file-name order
            self.pending.extend(subdirs.into_iter().rev());

            if has_manifest {
                return Some(dir);
            }
        }
        None
    }
}

/// Collect every package root below `root`.
#[tracing::instrument(skip(runtime, excluded))]
pub fn find_package_roots<R: Runtime + ?Sized, S: AsRef<str>>(
    runtime: &R,
    root: &Path,
    max_depth: usize,
    excluded: &[S],
) -> Vec<PathBuf> {
    PackageFinder::new(runtime, root, max_depth, excluded).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn touch_manifest(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "{}").unwrap();
    }

    fn relative(root: &Path, found: Vec<PathBuf>) -> Vec<String> {
        found
            .into_iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_finds_nested_manifests_in_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch_manifest(root);
        touch_manifest(&root.join("packages/beta"));
        touch_manifest(&root.join("packages/alpha"));
        touch_manifest(&root.join("modules/gamma"));
        fs::create_dir_all(root.join("docs")).unwrap();

        let found = find_package_roots(&RealRuntime, root, 5, &[] as &[&str]);

        assert_eq!(
            relative(root, found),
            vec!["", "modules/gamma", "packages/alpha", "packages/beta"]
        );
    }

    #[test]
    fn test_respects_max_depth() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch_manifest(&root.join("a"));
        touch_manifest(&root.join("a/b"));
        touch_manifest(&root.join("a/b/c"));

        let found = find_package_roots(&RealRuntime, root, 2, &[] as &[&str]);
        assert_eq!(relative(root, found), vec!["a", "a/b"]);

        let found = find_package_roots(&RealRuntime, root, 0, &[] as &[&str]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_skips_vendor_and_hidden_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch_manifest(&root.join("vendor/acme/lib"));
        touch_manifest(&root.join("packages/vendor"));
        touch_manifest(&root.join(".git/hooks"));
        touch_manifest(&root.join("packages/real"));

        let found = find_package_roots(&RealRuntime, root, 5, &[] as &[&str]);
        assert_eq!(relative(root, found), vec!["packages/real"]);
    }

    #[test]
    fn test_excluded_directories_only_remove_their_packages() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch_manifest(&root.join("packages/keep"));
        touch_manifest(&root.join("tests/fixtures/broken"));
        touch_manifest(&root.join("tests/other"));
        touch_manifest(&root.join("web/node_modules/pkg"));

        let found = find_package_roots(&RealRuntime, root, 5, &["tests/fixtures", "node_modules"]);
        assert_eq!(relative(root, found), vec!["packages/keep", "tests/other"]);
    }

    #[test]
    fn test_is_lazy() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch_manifest(&root.join("a"));
        touch_manifest(&root.join("b"));

        let mut finder = PackageFinder::new(&RealRuntime, root, 5, &[] as &[&str]);
        assert!(finder.next().unwrap().ends_with("a"));
        assert!(finder.next().unwrap().ends_with("b"));
        assert!(finder.next().is_none());
    }

    #[test]
    fn test_unreadable_directory_is_skipped() {
        let mut runtime = MockRuntime::new();
        let root = PathBuf::from("/repo");

        runtime
            .expect_read_dir()
            .with(eq(root.clone()))
            .returning(|p| Ok(vec![p.join("broken"), p.join("ok")]));
        runtime
            .expect_read_dir()
            .with(eq(root.join("broken")))
            .returning(|_| {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
            });
        runtime
            .expect_read_dir()
            .with(eq(root.join("ok")))
            .returning(|p| Ok(vec![p.join(MANIFEST_FILE)]));
        // Everything except the manifest file is a directory
        runtime
            .expect_is_dir()
            .returning(|p| p.file_name().is_some_and(|n| n != MANIFEST_FILE));
        runtime.expect_is_symlink().returning(|_| false);

        let found = find_package_roots(&runtime, &root, 3, &[] as &[&str]);
        assert_eq!(found, vec![root.join("ok")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_does_not_follow_symlinked_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch_manifest(&root.join("packages/real"));
        std::os::unix::fs::symlink(root.join("packages"), root.join("loop")).unwrap();

        let found = find_package_roots(&RealRuntime, root, 5, &[] as &[&str]);
        assert_eq!(relative(root, found), vec!["packages/real"]);
    }
}
