//! Bundle-relative module identities
//!
//! An identity is the key a module is registered under inside the artifact. It is the
//! lexical path from the entry file's directory to the module, with forward slashes,
//! anchored at a leading `/` root marker: `/entry.js`, `/lib/a.js`,
//! `/node_modules/pkg/index.js`, `/../shared/c.js`. The runtime loader relies on the
//! marker to tell bundle identities apart from specifiers meant for the host.

use std::{fmt, path::Path};

use crate::{
    resolver::DEPENDENCY_ROOT,
    util::{relative_path, to_forward_slashes},
};

/// Root marker every identity starts with
pub const ROOT_MARKER: char = '/';

/// Bundle-relative string key of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdentity(String);

impl ModuleIdentity {
    /// Derive the identity of `location` relative to the entry directory `base_dir`
    pub fn from_location(base_dir: &Path, location: &Path) -> Self {
        let relative = relative_path(base_dir, location);
        Self(format!("{ROOT_MARKER}{}", to_forward_slashes(&relative)))
    }

    /// Identity of the entry file itself: its file name under the root marker
    pub fn for_entry(entry: &Path) -> Self {
        let name = entry
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self(format!("{ROOT_MARKER}{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identity lies below a dependency-root directory
    pub fn is_dependency(&self) -> bool {
        self.0.split('/').any(|segment| segment == DEPENDENCY_ROOT)
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
