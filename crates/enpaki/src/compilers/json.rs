use std::{fs, path::Path};

use anyhow::{Context, Result};

use super::Compiler;

/// Built-in compiler for JSON documents
///
/// The document becomes the module's export value. It is validated up front so a broken
/// document fails the build instead of the artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCompiler;

impl Compiler for JsonCompiler {
    fn name(&self) -> &str {
        "json"
    }

    fn supported_extensions(&self) -> Vec<String> {
        vec![".json".to_owned()]
    }

    fn compile(&self, path: &Path) -> Result<String> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("can't read '{}'", path.display()))?;
        let document = raw.strip_prefix('\u{feff}').unwrap_or(&raw).trim();

        serde_json::from_str::<serde_json::Value>(document)
            .with_context(|| format!("'{}' is not a valid JSON document", path.display()))?;

        Ok(format!("module.exports = {document};"))
    }

    fn emits_references(&self) -> bool {
        false
    }
}
