use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::dirs;

/// What to do with a `require` that cannot be resolved while scanning a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedPolicy {
    /// Abort the whole bundling operation
    #[default]
    Fail,
    /// Record the failure, leave the reference untouched and keep going
    Collect,
}

impl FromStr for UnresolvedPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "fail" => Ok(Self::Fail),
            "collect" => Ok(Self::Collect),
            other => Err(anyhow!(
                "unknown unresolved policy '{other}', expected 'fail' or 'collect'"
            )),
        }
    }
}

impl fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => f.write_str("fail"),
            Self::Collect => f.write_str("collect"),
        }
    }
}

/// External compiler declared in a configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompilerConfig {
    pub extensions: Vec<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Bundling configuration
///
/// Layers are applied in order (defaults, user file, project file, explicit file,
/// environment, command line). List entries accumulate across layers; the unresolved
/// policy is taken from the last layer that sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Specifiers to inline even when no `require` reaches them
    pub include: Vec<String>,
    /// Specifiers left for the host to resolve at run time
    pub exclude: Vec<String>,
    pub on_unresolved: Option<UnresolvedPolicy>,
    #[serde(rename = "compiler")]
    pub compilers: Vec<CompilerConfig>,
}

impl Config {
    /// Load the layered configuration: user file, project file, then `explicit` if given,
    /// followed by environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let candidates: Vec<PathBuf> = [dirs::user_config_file(), dirs::project_config_file()]
            .into_iter()
            .flatten()
            .filter(|path| path.is_file())
            .collect();
        for path in candidates {
            config.merge(Self::from_file(&path)?);
        }

        if let Some(path) = explicit {
            config.merge(Self::from_file(path)?);
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Parse one configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("can't read configuration file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid configuration file '{}'", path.display()))
    }

    /// Apply a later layer on top of this one
    pub fn merge(&mut self, other: Self) {
        self.include.extend(other.include);
        self.exclude.extend(other.exclude);
        self.compilers.extend(other.compilers);
        if other.on_unresolved.is_some() {
            self.on_unresolved = other.on_unresolved;
        }
    }

    /// Apply `ENPAKI_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("ENPAKI_INCLUDE") {
            self.include.extend(split_list(&value));
        }
        if let Some(value) = lookup("ENPAKI_EXCLUDE") {
            self.exclude.extend(split_list(&value));
        }
        if let Some(value) = lookup("ENPAKI_ON_UNRESOLVED") {
            self.on_unresolved = Some(
                value
                    .parse()
                    .context("invalid ENPAKI_ON_UNRESOLVED environment variable")?,
            );
        }
        Ok(())
    }

    pub fn unresolved_policy(&self) -> UnresolvedPolicy {
        self.on_unresolved.unwrap_or_default()
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
}
