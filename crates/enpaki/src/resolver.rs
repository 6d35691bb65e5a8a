use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use serde::Deserialize;

use crate::{
    builtins::is_builtin,
    error::BundleError,
    util::{absolute_path, append_to_path, normalize_path},
};

/// Name of the dependency-root directory searched for bare specifiers
pub const DEPENDENCY_ROOT: &str = "node_modules";

/// File name of a package manifest
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Result of resolving a specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// Host built-in, kept by its bare name
    Builtin(String),
    /// Absolute, lexically normalized file path
    File(PathBuf),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(name) => f.write_str(name),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The subset of a package manifest the resolver cares about
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

/// Classification of a specifier by its leading syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `.` or `..`
    Relative,
    /// Starts at the filesystem root
    Absolute,
    /// Package name, optionally followed by a sub-path
    Bare,
}

impl SpecifierKind {
    pub fn of(specifier: &str) -> Self {
        if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            Self::Relative
        } else if specifier.starts_with('/') || Path::new(specifier).is_absolute() {
            Self::Absolute
        } else {
            Self::Bare
        }
    }
}

/// Maps a specifier and a starting directory to a concrete location
///
/// The lookup order follows the host's module resolution exactly: built-ins first, then
/// file candidates (literal path, then each extension in order), then directory
/// candidates (manifest `main`, then `index`), and for bare specifiers the same probes
/// inside every ancestor's dependency-root directory, innermost first.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    extensions: Vec<String>,
}

impl ModuleResolver {
    /// Create a resolver probing `extensions` in the given order
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Resolve `specifier` as requested from `start_dir`
    pub fn resolve(&self, specifier: &str, start_dir: &Path) -> Result<Location, BundleError> {
        if is_builtin(specifier) {
            trace!("'{specifier}' is a host built-in");
            return Ok(Location::Builtin(specifier.to_owned()));
        }

        let start_dir = absolute_path(start_dir)?;
        let found = match SpecifierKind::of(specifier) {
            SpecifierKind::Relative | SpecifierKind::Absolute => {
                self.load_as_path(&start_dir.join(specifier), specifier.ends_with('/'))
            }
            SpecifierKind::Bare => self.load_from_dependency_roots(specifier, &start_dir),
        };

        match found {
            Some(path) => {
                debug!("Resolved '{specifier}' from {} to {}", start_dir.display(), path.display());
                Ok(Location::File(path))
            }
            None => Err(BundleError::not_found(specifier, start_dir)),
        }
    }

    /// Load-as-file then load-as-directory on a joined path
    fn load_as_path(&self, target: &Path, directory_only: bool) -> Option<PathBuf> {
        let target = normalize_path(target);
        if !directory_only && let Some(file) = self.load_as_file(&target) {
            return Some(file);
        }
        self.load_as_directory(&target)
    }

    /// Try the literal path, then the path with each extension appended
    fn load_as_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        self.extensions
            .iter()
            .map(|ext| append_to_path(path, ext))
            .find(|candidate| candidate.is_file())
    }

    /// Try `<dir>/index` with each extension
    fn load_index(&self, dir: &Path) -> Option<PathBuf> {
        let index = dir.join("index");
        self.extensions
            .iter()
            .map(|ext| append_to_path(&index, ext))
            .find(|candidate| candidate.is_file())
    }

    /// Follow the manifest `main` entry when present, then fall back to the index file
    fn load_as_directory(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(main) = read_manifest_main(&dir.join(PACKAGE_MANIFEST)) {
            let main_path = normalize_path(&dir.join(main));
            if let Some(file) = self
                .load_as_file(&main_path)
                .or_else(|| self.load_index(&main_path))
            {
                return Some(file);
            }
            debug!(
                "Manifest main of {} does not exist, falling back to index",
                dir.display()
            );
        }
        self.load_index(dir)
    }

    /// Probe `<ancestor>/node_modules/<specifier>` from `start_dir` up to the root
    fn load_from_dependency_roots(&self, specifier: &str, start_dir: &Path) -> Option<PathBuf> {
        dependency_root_dirs(start_dir)
            .into_iter()
            .find_map(|root| self.load_as_path(&root.join(specifier), specifier.ends_with('/')))
    }

    /// Find the nearest `package.json` at or above the directory containing `file`
    pub fn find_package_manifest(&self, file: &Path) -> Option<PathBuf> {
        file.ancestors()
            .skip(1)
            .map(|dir| dir.join(PACKAGE_MANIFEST))
            .find(|manifest| manifest.is_file())
    }
}

/// Every dependency-root directory visible from `start_dir`, innermost first, ending with
/// the one at the filesystem root
pub fn dependency_root_dirs(start_dir: &Path) -> Vec<PathBuf> {
    start_dir
        .ancestors()
        .map(|ancestor| ancestor.join(DEPENDENCY_ROOT))
        .collect()
}

/// Read the `main` field of a manifest, ignoring unreadable or malformed documents
fn read_manifest_main(manifest: &Path) -> Option<String> {
    if !manifest.is_file() {
        return None;
    }
    let content = fs::read_to_string(manifest)
        .inspect_err(|err| debug!("Ignoring unreadable {}: {err}", manifest.display()))
        .ok()?;
    let parsed: PackageManifest = serde_json::from_str(&content)
        .inspect_err(|err| debug!("Ignoring malformed {}: {err}", manifest.display()))
        .ok()?;
    parsed.main.filter(|main| !main.is_empty())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn create_test_file(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn resolver() -> ModuleResolver {
        ModuleResolver::new(vec![".js".to_owned(), ".json".to_owned()])
    }

    fn resolved(location: Location) -> PathBuf {
        match location {
            Location::File(path) => path,
            Location::Builtin(name) => panic!("expected a file, got built-in '{name}'"),
        }
    }

    #[test]
    fn test_builtin_is_returned_unresolved() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(&temp_dir.path().join("fs.js"), "")?;

        let location = resolver().resolve("fs", temp_dir.path())?;
        assert_eq!(location, Location::Builtin("fs".to_owned()));
        Ok(())
    }

    #[test]
    fn test_literal_path_before_extensions() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("a"), "")?;
        create_test_file(&root.join("a.js"), "")?;

        let location = resolved(resolver().resolve("./a", root)?);
        assert_eq!(location, root.join("a"));
        Ok(())
    }

    #[test]
    fn test_extension_order_is_respected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("config.json"), "{}")?;
        create_test_file(&root.join("config.js"), "")?;

        let location = resolved(resolver().resolve("./config", root)?);
        assert_eq!(location, root.join("config.js"));
        Ok(())
    }

    #[test]
    fn test_file_before_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("lib.js"), "")?;
        create_test_file(&root.join("lib/index.js"), "")?;

        assert_eq!(resolved(resolver().resolve("./lib", root)?), root.join("lib.js"));
        assert_eq!(
            resolved(resolver().resolve("./lib/", root)?),
            root.join("lib/index.js")
        );
        Ok(())
    }

    #[test]
    fn test_manifest_main_before_index() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("pkg/package.json"), r#"{"main": "lib/a.js"}"#)?;
        create_test_file(&root.join("pkg/lib/a.js"), "")?;
        create_test_file(&root.join("pkg/index.js"), "")?;

        assert_eq!(
            resolved(resolver().resolve("./pkg", root)?),
            root.join("pkg/lib/a.js")
        );
        Ok(())
    }

    #[test]
    fn test_manifest_main_is_extension_completed_and_indexed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("one/package.json"), r#"{"main": "lib/a"}"#)?;
        create_test_file(&root.join("one/lib/a.js"), "")?;
        create_test_file(&root.join("two/package.json"), r#"{"main": "./lib"}"#)?;
        create_test_file(&root.join("two/lib/index.js"), "")?;

        assert_eq!(
            resolved(resolver().resolve("./one", root)?),
            root.join("one/lib/a.js")
        );
        assert_eq!(
            resolved(resolver().resolve("./two", root)?),
            root.join("two/lib/index.js")
        );
        Ok(())
    }

    #[test]
    fn test_missing_or_malformed_main_falls_back_to_index() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("gone/package.json"), r#"{"main": "missing.js"}"#)?;
        create_test_file(&root.join("gone/index.js"), "")?;
        create_test_file(&root.join("broken/package.json"), "{ not json")?;
        create_test_file(&root.join("broken/index.json"), "{}")?;

        assert_eq!(
            resolved(resolver().resolve("./gone", root)?),
            root.join("gone/index.js")
        );
        assert_eq!(
            resolved(resolver().resolve("./broken", root)?),
            root.join("broken/index.json")
        );
        Ok(())
    }

    #[test]
    fn test_bare_specifier_searches_closest_dependency_root_first() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("node_modules/dep/index.js"), "// outer")?;
        create_test_file(&root.join("app/node_modules/dep/index.js"), "// inner")?;
        create_test_file(&root.join("app/src/main.js"), "")?;

        assert_eq!(
            resolved(resolver().resolve("dep", &root.join("app/src"))?),
            root.join("app/node_modules/dep/index.js")
        );
        assert_eq!(
            resolved(resolver().resolve("dep", root)?),
            root.join("node_modules/dep/index.js")
        );
        Ok(())
    }

    #[test]
    fn test_bare_specifier_ignores_sibling_files() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("helper.js"), "")?;

        let result = resolver().resolve("helper", root);
        assert!(matches!(result, Err(BundleError::NotFound { .. })));
        Ok(())
    }

    #[test]
    fn test_bare_specifier_with_subpath() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("node_modules/dep/lib/util.js"), "")?;

        assert_eq!(
            resolved(resolver().resolve("dep/lib/util", root)?),
            root.join("node_modules/dep/lib/util.js")
        );
        Ok(())
    }

    #[test]
    fn test_absolute_specifier() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let target = temp_dir.path().join("abs/target.js");
        create_test_file(&target, "")?;

        let specifier = temp_dir.path().join("abs/target");
        let location = resolver().resolve(&specifier.to_string_lossy(), Path::new("/"))?;
        assert_eq!(resolved(location), target);
        Ok(())
    }

    #[test]
    fn test_not_found_names_specifier_and_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let err = resolver()
            .resolve("./missing", temp_dir.path())
            .expect_err("missing module must not resolve");

        let message = err.to_string();
        assert!(message.contains("./missing"));
        assert!(message.contains(&temp_dir.path().display().to_string()));
        Ok(())
    }

    #[test]
    fn test_resolution_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("lib/a.js"), "")?;

        let first = resolver().resolve("./lib/a", root)?;
        let second = resolver().resolve("./lib/a", root)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_find_package_manifest_walks_upward() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(&root.join("node_modules/dep/package.json"), "{}")?;
        create_test_file(&root.join("node_modules/dep/lib/deep/x.js"), "")?;

        assert_eq!(
            resolver().find_package_manifest(&root.join("node_modules/dep/lib/deep/x.js")),
            Some(root.join("node_modules/dep/package.json"))
        );
        Ok(())
    }

    #[test]
    fn test_specifier_kind() {
        assert_eq!(SpecifierKind::of("./a"), SpecifierKind::Relative);
        assert_eq!(SpecifierKind::of(".."), SpecifierKind::Relative);
        assert_eq!(SpecifierKind::of("/abs"), SpecifierKind::Absolute);
        assert_eq!(SpecifierKind::of("express"), SpecifierKind::Bare);
        assert_eq!(SpecifierKind::of(".hidden"), SpecifierKind::Bare);
    }
}
