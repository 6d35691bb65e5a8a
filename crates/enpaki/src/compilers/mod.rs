//! Per-extension compilers
//!
//! A compiler turns a file on disk into source text of the artifact's language. The
//! registry maps extensions to compilers; later registrations for an extension replace
//! earlier ones, which is how user compilers override the built-in ones. Files whose
//! extension has no registered compiler are read verbatim.

use std::{fmt, fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::BundleError;

mod command;
mod json;

pub use command::CommandCompiler;
pub use json::JsonCompiler;

/// Extensions the host resolves natively, probed before any compiler-provided one
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".json"];

/// Capability of turning a file into bundle source
pub trait Compiler: fmt::Debug + Send + Sync {
    /// Human readable name used in diagnostics
    fn name(&self) -> &str;

    /// Extensions handled by this compiler, each starting with a dot
    fn supported_extensions(&self) -> Vec<String>;

    /// Produce the source text for the file at `path`
    fn compile(&self, path: &Path) -> Result<String>;

    /// Whether the produced source may hold `require` calls to follow
    fn emits_references(&self) -> bool {
        true
    }
}

/// Passthrough compiler: the file content is the source
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceCompiler;

impl Compiler for SourceCompiler {
    fn name(&self) -> &str {
        "source"
    }

    fn supported_extensions(&self) -> Vec<String> {
        DEFAULT_EXTENSIONS
            .iter()
            .map(|ext| (*ext).to_owned())
            .collect()
    }

    fn compile(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("can't read '{}'", path.display()))
    }
}

/// Registration table mapping extensions to compilers
#[derive(Debug, Clone)]
pub struct CompilerRegistry {
    by_extension: IndexMap<String, Arc<dyn Compiler>>,
    fallback: SourceCompiler,
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerRegistry {
    /// Create a registry holding the built-in JSON compiler
    pub fn new() -> Self {
        let mut by_extension: IndexMap<String, Arc<dyn Compiler>> = IndexMap::new();
        by_extension.insert(".json".to_owned(), Arc::new(JsonCompiler));
        Self {
            by_extension,
            fallback: SourceCompiler,
        }
    }

    /// Register a compiler for every extension it supports
    pub fn register(&mut self, compiler: Box<dyn Compiler>) -> Result<(), BundleError> {
        let extensions = compiler.supported_extensions();
        validate_extensions(compiler.name(), &extensions)?;

        let compiler: Arc<dyn Compiler> = Arc::from(compiler);
        for extension in extensions {
            debug!("Registering compiler '{}' for {extension}", compiler.name());
            if let Some(previous) = self
                .by_extension
                .insert(extension.clone(), Arc::clone(&compiler))
            {
                debug!(
                    "Compiler '{}' replaces '{}' for {extension}",
                    compiler.name(),
                    previous.name()
                );
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn has_compiler(&self, extension: &str) -> bool {
        self.by_extension.contains_key(extension)
    }

    /// Number of extensions with a registered compiler
    pub(crate) fn len(&self) -> usize {
        self.by_extension.len()
    }

    /// Compiler for an extension, or the passthrough compiler when none is registered
    pub fn compiler_for(&self, extension: &str) -> &dyn Compiler {
        match self.by_extension.get(extension) {
            Some(compiler) => compiler.as_ref(),
            None => &self.fallback,
        }
    }

    /// Compile a file with the compiler registered for its extension
    pub fn compile(&self, path: &Path) -> Result<String, BundleError> {
        let extension = extension_of(path);
        let compiler = self.compiler_for(&extension);
        trace!("Compiling {} with '{}'", path.display(), compiler.name());
        compiler.compile(path).map_err(|err| BundleError::Compile {
            path: path.to_path_buf(),
            message: format!("{err:#}"),
        })
    }

    /// Extension probing order used by the resolver: the host defaults first, then every
    /// other registered extension in registration order
    pub fn resolution_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = DEFAULT_EXTENSIONS
            .iter()
            .map(|ext| (*ext).to_owned())
            .collect();
        for extension in self.by_extension.keys() {
            if !extensions.contains(extension) {
                extensions.push(extension.clone());
            }
        }
        extensions
    }
}

/// Extension of a path including its leading dot, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn validate_extensions(name: &str, extensions: &[String]) -> Result<(), BundleError> {
    let invalid = |reason: String| BundleError::InvalidCompiler {
        name: name.to_owned(),
        reason,
    };

    if extensions.is_empty() {
        return Err(invalid("it does not support any extension".to_owned()));
    }
    for extension in extensions {
        if !extension.starts_with('.') || extension.len() < 2 {
            return Err(invalid(format!(
                "extension '{extension}' must start with a dot followed by a name"
            )));
        }
    }
    Ok(())
}
