//! Error kinds produced while setting up and running a bundling operation

use std::path::PathBuf;

/// Errors surfaced by the bundler library
///
/// Every variant that concerns a dependency reference names the specifier together with
/// the directory or file it was requested from, so a fatal error can be traced back to
/// the offending `require` call.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// No candidate file exists for the specifier
    #[error("Cannot find module '{specifier}' from '{}'", directory.display())]
    NotFound {
        specifier: String,
        directory: PathBuf,
    },

    /// A `require` found while scanning a file could not be resolved
    #[error("can't locate '{specifier}' (required by '{}')", referrer.display())]
    UnresolvedRequire {
        specifier: String,
        referrer: PathBuf,
        #[source]
        source: Box<BundleError>,
    },

    /// A compiler failed while producing the source of a file
    #[error("can't compile '{}': {message}", path.display())]
    Compile { path: PathBuf, message: String },

    /// A compiler does not expose a usable set of extensions
    #[error("invalid compiler '{name}': {reason}")]
    InvalidCompiler { name: String, reason: String },

    /// The entry argument is not a readable file
    #[error("invalid entry script '{}': {reason}", path.display())]
    InvalidEntry { path: PathBuf, reason: String },

    /// An include or exclude override could not be applied
    #[error("can't add '{specifier}' to the {list} list")]
    Setup {
        list: &'static str,
        specifier: String,
        #[source]
        source: Box<BundleError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// Build a `NotFound` error for a specifier requested from a directory
    pub fn not_found(specifier: &str, directory: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            specifier: specifier.to_owned(),
            directory: directory.into(),
        }
    }
}
