//! Host built-in module detection
//!
//! This module is the single source of truth for deciding whether a specifier names a
//! module supplied by the host itself. Built-ins are never file-probed and never
//! inlined; the same table is embedded into the runtime loader so both sides agree.

/// Prefix the host accepts in front of any built-in name
pub const BUILTIN_SCHEME: &str = "node:";

/// Core modules provided by the host runtime, including their slash sub-paths
pub const HOST_BUILTINS: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "inspector/promises",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "readline/promises",
    "repl",
    "stream",
    "stream/consumers",
    "stream/promises",
    "stream/web",
    "string_decoder",
    "sys",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Check if a specifier names a host built-in module
///
/// Any `node:`-prefixed specifier is a built-in; otherwise the bare name must appear in
/// [`HOST_BUILTINS`] exactly.
pub fn is_builtin(specifier: &str) -> bool {
    if let Some(name) = specifier.strip_prefix(BUILTIN_SCHEME) {
        return !name.is_empty();
    }
    HOST_BUILTINS.contains(&specifier)
}
