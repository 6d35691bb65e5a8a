//! Incremental discovery of the modules reachable from an entry file
//!
//! The builder owns the work queue and the emitted set for exactly one bundling
//! operation. Each pull compiles one newly discovered file, rewrites every static
//! `require('...')` in it to the bundle identity of its target and queues targets that
//! have not been emitted yet. A location is turned into a record at most once, which is
//! what makes circular references terminate.

use std::{
    collections::VecDeque,
    fmt,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::{
    builtins::is_builtin,
    bundle_graph::BundleGraph,
    code_generator::require_call,
    compilers::{CompilerRegistry, extension_of},
    config::UnresolvedPolicy,
    error::BundleError,
    identity::ModuleIdentity,
    resolver::{Location, ModuleResolver, SpecifierKind},
    util::{escape_single_quoted, relative_path, to_forward_slashes},
};

/// `require` followed by a parenthesized, single- or double-quoted string literal.
/// Dynamically built specifiers never match and are left for the runtime loader.
static REQUIRE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\s*\(\s*(?:"([^"]+)"|'([^']+)')\s*\)"#)
        .expect("require pattern is a valid regex")
});

/// One module as it will appear in the artifact
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub location: PathBuf,
    pub identity: ModuleIdentity,
    /// Output of the compiler for this file
    pub compiled_source: String,
    /// Compiled source with the interpreter line removed and references rewritten
    pub rewritten_source: String,
}

/// A reference that could not be resolved while scanning, kept under
/// [`UnresolvedPolicy::Collect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub specifier: String,
    pub referrer: PathBuf,
    pub message: String,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "can't locate '{}' (required by '{}'): {}",
            self.specifier,
            self.referrer.display(),
            self.message
        )
    }
}

/// Specifiers and locations that must stay outside the artifact
#[derive(Debug, Default, Clone)]
pub struct ExcludeSet {
    specifiers: FxHashSet<String>,
    locations: FxHashSet<PathBuf>,
}

impl ExcludeSet {
    /// Check if a package name was excluded, either exactly or as one of its sub-paths
    pub fn contains_specifier(&self, specifier: &str) -> bool {
        if self.specifiers.contains(specifier) {
            return true;
        }
        specifier
            .match_indices('/')
            .any(|(index, _)| self.specifiers.contains(&specifier[..index]))
    }

    pub fn contains_location(&self, location: &Path) -> bool {
        self.locations.contains(location)
    }
}

#[derive(Debug)]
pub struct GraphBuilder {
    entry: PathBuf,
    base_dir: PathBuf,
    resolver: ModuleResolver,
    compilers: CompilerRegistry,
    policy: UnresolvedPolicy,
    /// Locations waiting to be processed, in discovery order
    queue: VecDeque<PathBuf>,
    /// Every location ever queued, so the queue never holds duplicates
    scheduled: FxHashSet<PathBuf>,
    /// Locations already turned into records; only grows
    emitted: IndexSet<PathBuf>,
    exclude: ExcludeSet,
    errors: Vec<UnresolvedReference>,
    graph: BundleGraph,
}

impl GraphBuilder {
    /// Create a builder whose queue holds the entry file
    ///
    /// `entry` must be an absolute, normalized path to an existing file.
    pub fn new(
        entry: PathBuf,
        resolver: ModuleResolver,
        compilers: CompilerRegistry,
        policy: UnresolvedPolicy,
    ) -> Self {
        let base_dir = entry
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
        let mut builder = Self {
            entry: entry.clone(),
            base_dir,
            resolver,
            compilers,
            policy,
            queue: VecDeque::new(),
            scheduled: FxHashSet::default(),
            emitted: IndexSet::new(),
            exclude: ExcludeSet::default(),
            errors: Vec::new(),
            graph: BundleGraph::new(),
        };
        builder.enqueue(entry);
        builder
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn identity_of(&self, location: &Path) -> ModuleIdentity {
        ModuleIdentity::from_location(&self.base_dir, location)
    }

    /// Force a module into the artifact even if no `require` reaches it
    ///
    /// The specifier is resolved from the entry directory; failure is fatal.
    pub fn include(&mut self, specifier: &str) -> Result<(), BundleError> {
        let location = self
            .resolver
            .resolve(specifier, &self.base_dir)
            .map_err(|err| setup_error("include", specifier, err))?;

        match location {
            Location::Builtin(name) => {
                warn!("'{name}' is a host built-in and can't be included");
            }
            Location::File(path) if self.exclude.contains_location(&path) => {
                warn!("'{specifier}' is excluded and won't be included");
            }
            Location::File(path) => {
                if self.enqueue(path.clone()) {
                    debug!("Included '{specifier}'");
                }
                self.enqueue_manifest_of(&path);
            }
        }
        Ok(())
    }

    /// Keep a module out of the artifact; references to it are resolved by the host
    ///
    /// Package names are matched textually wherever they appear, sub-paths included, and
    /// don't have to be installed. Path specifiers must resolve from the entry directory and match by
    /// location.
    pub fn exclude(&mut self, specifier: &str) -> Result<(), BundleError> {
        if is_builtin(specifier) {
            return Ok(());
        }

        let by_name = SpecifierKind::of(specifier) == SpecifierKind::Bare;
        if by_name {
            self.exclude.specifiers.insert(specifier.to_owned());
        }

        match self.resolver.resolve(specifier, &self.base_dir) {
            Ok(Location::File(path)) => {
                debug!("Excluded '{specifier}' ({})", path.display());
                self.exclude.locations.insert(path);
            }
            Ok(Location::Builtin(_)) => {}
            Err(err) if by_name => {
                debug!("Excluded package '{specifier}' is not installed: {err}");
            }
            Err(err) => return Err(setup_error("exclude", specifier, err)),
        }
        Ok(())
    }

    /// Process the next pending location, or return `None` once the queue is drained
    pub fn next_record(&mut self) -> Result<Option<ModuleRecord>, BundleError> {
        while let Some(location) = self.queue.pop_front() {
            if self.emitted.contains(&location) {
                trace!("Skipping already emitted {}", location.display());
                continue;
            }
            if self.exclude.contains_location(&location) {
                debug!("Skipping excluded {}", location.display());
                continue;
            }
            return self.process(location).map(Some);
        }
        Ok(None)
    }

    /// Drain the queue into records
    pub fn build_all(&mut self) -> Result<Vec<ModuleRecord>, BundleError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Locations turned into records so far, in emission order
    pub fn emitted(&self) -> &IndexSet<PathBuf> {
        &self.emitted
    }

    /// Number of locations still waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// References left unresolved under the collect policy
    pub fn errors(&self) -> &[UnresolvedReference] {
        &self.errors
    }

    pub fn graph(&self) -> &BundleGraph {
        &self.graph
    }

    /// Queue a location unless it was queued or emitted before
    fn enqueue(&mut self, location: PathBuf) -> bool {
        if self.emitted.contains(&location) || !self.scheduled.insert(location.clone()) {
            return false;
        }
        trace!("Queued {}", location.display());
        self.queue.push_back(location);
        true
    }

    /// Queue the nearest package manifest of a file that lives in a dependency root
    fn enqueue_manifest_of(&mut self, location: &Path) {
        if !self.identity_of(location).is_dependency() {
            return;
        }
        if let Some(manifest) = self.resolver.find_package_manifest(location)
            && self.enqueue(manifest.clone())
        {
            trace!("Queued package manifest {}", manifest.display());
        }
    }

    fn process(&mut self, location: PathBuf) -> Result<ModuleRecord, BundleError> {
        let compiled_source = self.compilers.compile(&location)?;
        let identity = self.identity_of(&location);
        self.graph.add_module(&identity);

        let source = strip_interpreter_directive(&compiled_source);
        let rewritten_source = if self
            .compilers
            .compiler_for(&extension_of(&location))
            .emits_references()
        {
            self.rewrite_references(source, &location, &identity)?
        } else {
            source.to_owned()
        };
        trace!(
            "{identity} requires {:?}",
            self.graph.dependencies_of(&identity)
        );

        debug!("Emitting {identity} ({})", location.display());
        self.emitted.insert(location.clone());

        Ok(ModuleRecord {
            location,
            identity,
            compiled_source,
            rewritten_source,
        })
    }

    /// Rewrite every static `require` in `source`, queueing newly discovered targets
    fn rewrite_references(
        &mut self,
        source: &str,
        referrer: &Path,
        referrer_identity: &ModuleIdentity,
    ) -> Result<String, BundleError> {
        let mut rewritten = String::with_capacity(source.len());
        let mut last = 0;

        for captures in REQUIRE_PATTERN.captures_iter(source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let specifier = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map_or("", |group| group.as_str());

            rewritten.push_str(&source[last..whole.start()]);
            let replacement =
                self.rewrite_reference(whole.as_str(), specifier, referrer, referrer_identity)?;
            rewritten.push_str(&replacement);
            last = whole.end();
        }

        rewritten.push_str(&source[last..]);
        Ok(rewritten)
    }

    fn rewrite_reference(
        &mut self,
        matched: &str,
        specifier: &str,
        referrer: &Path,
        referrer_identity: &ModuleIdentity,
    ) -> Result<String, BundleError> {
        let referrer_dir = referrer.parent().unwrap_or(referrer);

        if is_builtin(specifier) {
            return Ok(matched.to_owned());
        }
        if self.exclude.contains_specifier(specifier) {
            return Ok(matched.to_owned());
        }

        let location = match self.resolver.resolve(specifier, referrer_dir) {
            Ok(Location::File(path)) => path,
            Ok(Location::Builtin(_)) => return Ok(matched.to_owned()),
            Err(err) => return self.unresolved(matched, specifier, referrer, err),
        };

        if self.exclude.contains_location(&location) {
            trace!("'{specifier}' in {} is excluded", referrer.display());
            return Ok(excluded_reference(matched, specifier, referrer_dir, &location));
        }

        let identity = self.identity_of(&location);
        self.graph.add_dependency(referrer_identity, &identity);

        if !self.emitted.contains(&location) {
            self.enqueue(location.clone());
            self.enqueue_manifest_of(&location);
        }

        Ok(require_call(&identity))
    }

    fn unresolved(
        &mut self,
        matched: &str,
        specifier: &str,
        referrer: &Path,
        err: BundleError,
    ) -> Result<String, BundleError> {
        match self.policy {
            UnresolvedPolicy::Fail => Err(BundleError::UnresolvedRequire {
                specifier: specifier.to_owned(),
                referrer: referrer.to_path_buf(),
                source: Box::new(err),
            }),
            UnresolvedPolicy::Collect => {
                let reference = UnresolvedReference {
                    specifier: specifier.to_owned(),
                    referrer: referrer.to_path_buf(),
                    message: err.to_string(),
                };
                debug!("Collected unresolved reference: {reference}");
                self.errors.push(reference);
                Ok(matched.to_owned())
            }
        }
    }
}

/// Remove a `#!` interpreter line when it is the very first line
pub fn strip_interpreter_directive(source: &str) -> &str {
    if !source.starts_with("#!") {
        return source;
    }
    source.find('\n').map_or("", |newline| &source[newline..])
}

/// Text for a reference to an excluded module
///
/// Literal unless the specifier is an absolute path: root-anchored strings are bundle
/// identities at run time, so those are rewritten relative to the referring file.
fn excluded_reference(
    matched: &str,
    specifier: &str,
    referrer_dir: &Path,
    location: &Path,
) -> String {
    if SpecifierKind::of(specifier) != SpecifierKind::Absolute {
        return matched.to_owned();
    }
    let relative = to_forward_slashes(&relative_path(referrer_dir, location));
    let relative = if relative.starts_with("../") {
        relative
    } else {
        format!("./{relative}")
    };
    format!("require('{}')", escape_single_quoted(&relative))
}

fn setup_error(list: &'static str, specifier: &str, err: BundleError) -> BundleError {
    BundleError::Setup {
        list,
        specifier: specifier.to_owned(),
        source: Box::new(err),
    }
}
