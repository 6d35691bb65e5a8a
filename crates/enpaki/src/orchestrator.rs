//! Setup of one bundling operation
//!
//! [`Bundler::new`] validates the entry, registers compilers and applies the exclude and
//! include lists, all of which fail fast. The returned bundler is turned into a lazy
//! [`BundleStream`] or drained into a [`BundleOutput`].

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    code_generator::CodeGenerator,
    compilers::{CommandCompiler, Compiler, CompilerRegistry},
    config::{Config, UnresolvedPolicy},
    error::BundleError,
    graph_builder::GraphBuilder,
    identity::ModuleIdentity,
    resolver::ModuleResolver,
    stream::{BundleReport, BundleStream},
    util::absolute_path,
};

/// Overrides for one bundling operation
#[derive(Default)]
pub struct BundleOptions {
    /// Specifiers to inline even when no `require` reaches them
    pub include: Vec<String>,
    /// Specifiers left for the host to resolve at run time
    pub exclude: Vec<String>,
    /// Extra compilers; a later one replaces an earlier one for a shared extension
    pub compilers: Vec<Box<dyn Compiler>>,
    pub on_unresolved: UnresolvedPolicy,
}

impl fmt::Debug for BundleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleOptions")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field(
                "compilers",
                &self
                    .compilers
                    .iter()
                    .map(|compiler| compiler.name())
                    .collect::<Vec<_>>(),
            )
            .field("on_unresolved", &self.on_unresolved)
            .finish()
    }
}

impl BundleOptions {
    /// Build options from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let compilers = config
            .compilers
            .iter()
            .map(|compiler| -> Box<dyn Compiler> {
                Box::new(CommandCompiler::new(
                    compiler.extensions.clone(),
                    compiler.command.clone(),
                    compiler.args.clone(),
                ))
            })
            .collect();

        Self {
            include: config.include.clone(),
            exclude: config.exclude.clone(),
            compilers,
            on_unresolved: config.unresolved_policy(),
        }
    }
}

/// The artifact of a fully drained bundling operation
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub code: String,
    pub report: BundleReport,
}

/// A configured bundling operation that has not produced anything yet
#[derive(Debug)]
pub struct Bundler {
    builder: GraphBuilder,
    generator: CodeGenerator,
}

impl Bundler {
    /// Prepare a bundling operation for `entry`
    ///
    /// Every setup step is fatal: an unusable entry, an invalid compiler, or an include
    /// or exclude entry that can't be resolved.
    pub fn new(entry: impl AsRef<Path>, options: BundleOptions) -> Result<Self, BundleError> {
        let entry = validate_entry(entry.as_ref())?;
        debug!("Bundling entry {}", entry.display());

        let mut compilers = CompilerRegistry::new();
        for compiler in options.compilers {
            compilers.register(compiler)?;
        }
        let extensions = compilers.resolution_extensions();
        debug!(
            "{} extensions have a compiler, resolution order: {extensions:?}",
            compilers.len()
        );

        let generator = CodeGenerator::new(ModuleIdentity::for_entry(&entry), extensions.clone());
        let mut builder = GraphBuilder::new(
            entry,
            ModuleResolver::new(extensions),
            compilers,
            options.on_unresolved,
        );

        for specifier in &options.exclude {
            builder.exclude(specifier)?;
        }
        for specifier in &options.include {
            builder.include(specifier)?;
        }

        Ok(Self { builder, generator })
    }

    pub fn entry(&self) -> &Path {
        self.builder.entry()
    }

    /// Stream the artifact chunk by chunk
    pub fn into_stream(self) -> BundleStream {
        BundleStream::new(self.builder, self.generator)
    }

    /// Produce the whole artifact in memory
    pub fn bundle(self) -> Result<BundleOutput, BundleError> {
        let mut stream = self.into_stream();
        let mut code = String::new();
        while let Some(chunk) = stream.next_chunk()? {
            code.push_str(&chunk);
        }
        let report = stream.finish();
        info!("Bundled {} modules", report.modules.len());
        Ok(BundleOutput { code, report })
    }
}

/// Bundle `entry` into a single script held in memory
pub fn bundle(entry: impl AsRef<Path>, options: BundleOptions) -> Result<BundleOutput, BundleError> {
    Bundler::new(entry, options)?.bundle()
}

/// Make the entry absolute and check it is a readable file
fn validate_entry(entry: &Path) -> Result<PathBuf, BundleError> {
    let invalid = |reason: String| BundleError::InvalidEntry {
        path: entry.to_path_buf(),
        reason,
    };

    if entry.as_os_str().is_empty() {
        return Err(invalid("the path is empty".to_owned()));
    }
    let absolute = absolute_path(entry)
        .map_err(|err| invalid(format!("can't make the path absolute: {err}")))?;
    if !absolute.is_file() {
        return Err(invalid("not a file".to_owned()));
    }
    Ok(absolute)
}
