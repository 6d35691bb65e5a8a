use std::{path::Path, process::Command};

use anyhow::{Context, Result, bail};
use log::debug;

use super::Compiler;

/// Compiler backed by an external program
///
/// The program is invoked with its configured arguments followed by the path of the file
/// to compile; whatever it prints on standard output is the compiled source.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    name: String,
    extensions: Vec<String>,
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(extensions: Vec<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            name: program.clone(),
            extensions,
            program,
            args,
        }
    }

    /// Parse a definition of the form `.ext[,.ext...]=program [args...]`
    pub fn parse(definition: &str) -> Result<Self> {
        let Some((extensions, command)) = definition.split_once('=') else {
            bail!("compiler definition '{definition}' must look like '.ext=program [args...]'");
        };

        let extensions: Vec<String> = extensions
            .split(',')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_owned)
            .collect();

        let mut words = command.split_whitespace().map(str::to_owned);
        let Some(program) = words.next() else {
            bail!("compiler definition '{definition}' does not name a program");
        };

        Ok(Self::new(extensions, program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Compiler for CommandCompiler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn compile(&self, path: &Path) -> Result<String> {
        debug!("Running '{}' on {}", self.program, path.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .with_context(|| format!("can't run compiler '{}'", self.program))?;

        if !output.status.success() {
            bail!(
                "compiler '{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("compiler '{}' produced non UTF-8 output", self.program))
    }
}
