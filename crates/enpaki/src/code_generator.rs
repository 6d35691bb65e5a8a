//! Text generation for the artifact
//!
//! The artifact is laid out as:
//! 1. the runtime loader template, parameterized by the entry identity,
//! 2. one definition block per module, registering a factory under its identity,
//! 3. a trailer that loads the entry identity and exposes its exports.
//!
//! Factories receive `exports`, a `require` bound to their own identity, their `module`
//! record, `__filename` and `__dirname`, mirroring the host's module wrapper.

use cow_utils::CowUtils;

use crate::{builtins::HOST_BUILTINS, identity::ModuleIdentity, util::escape_single_quoted};

/// Runtime loader installed at the top of every artifact
const RUNTIME_LOADER: &str = include_str!("runtime/loader.js");

const ENTRY_PLACEHOLDER: &str = "__ENPAKI_ENTRY__";
const BUILTINS_PLACEHOLDER: &str = "__ENPAKI_BUILTINS__";
const EXTENSIONS_PLACEHOLDER: &str = "__ENPAKI_EXTENSIONS__";

const BUNDLE_FOOTER: &str = r"
var __enpaki_result = __enpaki_require(null, __enpaki_entry);
if (typeof module === 'object' && module !== null && typeof module.exports !== 'undefined') {
  module.exports = __enpaki_result;
}
return __enpaki_result;
}());
/** end of bundle */
";

/// The `require` call a resolved reference is rewritten to
pub fn require_call(identity: &ModuleIdentity) -> String {
    format!("require('{}')", escape_single_quoted(identity.as_str()))
}

/// Produces the fixed parts of an artifact for one entry module
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    entry: ModuleIdentity,
    extensions: Vec<String>,
}

impl CodeGenerator {
    /// `extensions` is the probing order the runtime loader uses for dynamic requests
    pub fn new(entry: ModuleIdentity, extensions: Vec<String>) -> Self {
        Self { entry, extensions }
    }

    pub fn entry(&self) -> &ModuleIdentity {
        &self.entry
    }

    /// Runtime loader text with the entry identity, built-in table and extension order
    /// filled in
    pub fn bundle_header(&self) -> String {
        RUNTIME_LOADER
            .replace(ENTRY_PLACEHOLDER, &json_literal(self.entry.as_str()))
            .replace(BUILTINS_PLACEHOLDER, &json_literal(HOST_BUILTINS))
            .replace(EXTENSIONS_PLACEHOLDER, &json_literal(&self.extensions))
    }

    /// Opening of a module definition block
    pub fn module_header(&self, identity: &ModuleIdentity) -> String {
        format!(
            "\n/** module: {} */\n__enpaki_modules['{}'] = function (exports, require, module, \
             __filename, __dirname) {{\n",
            comment_safe(identity),
            escape_single_quoted(identity.as_str())
        )
    }

    /// Closing of a module definition block
    pub fn module_footer(&self, identity: &ModuleIdentity) -> String {
        format!(
            "\nreturn module.exports;\n}}; /** end module: {} */\n",
            comment_safe(identity)
        )
    }

    /// Complete definition block wrapping the rewritten source of a module
    pub fn wrap_module(&self, identity: &ModuleIdentity, source: &str) -> String {
        let header = self.module_header(identity);
        let footer = self.module_footer(identity);
        let mut block = String::with_capacity(header.len() + source.len() + footer.len());
        block.push_str(&header);
        block.push_str(source);
        block.push_str(&footer);
        block
    }

    /// Trailer loading the entry module and exposing its exports
    pub fn bundle_footer(&self) -> String {
        BUNDLE_FOOTER.to_owned()
    }
}

/// Encode a value as a JSON literal, which is also a valid JavaScript literal
fn json_literal<T: serde::Serialize + ?Sized>(value: &T) -> String {
    // Serializing strings and string slices cannot fail
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_owned())
}

fn comment_safe(identity: &ModuleIdentity) -> std::borrow::Cow<'_, str> {
    identity.as_str().cow_replace("*/", "*\\/")
}
