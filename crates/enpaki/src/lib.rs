//! Bundle a CommonJS module tree into one self-contained script
//!
//! Starting from an entry file, every statically visible `require('...')` is resolved
//! the way the host runtime resolves it, the target is compiled and rewritten to a
//! bundle-relative identity, and the result is wrapped in a factory registered with an
//! embedded runtime loader. The artifact behaves like requiring the entry file.

pub mod builtins;
pub mod bundle_graph;
pub mod code_generator;
pub mod compilers;
pub mod config;
pub mod dirs;
pub mod error;
pub mod graph_builder;
pub mod identity;
pub mod orchestrator;
pub mod resolver;
pub mod stream;
pub mod util;

pub use compilers::{CommandCompiler, Compiler, CompilerRegistry, JsonCompiler, SourceCompiler};
pub use config::{Config, UnresolvedPolicy};
pub use error::BundleError;
pub use graph_builder::{ModuleRecord, UnresolvedReference};
pub use identity::ModuleIdentity;
pub use orchestrator::{BundleOptions, BundleOutput, Bundler, bundle};
pub use resolver::{Location, ModuleResolver};
pub use stream::{BundleReport, BundleStream};
