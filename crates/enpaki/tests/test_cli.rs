use std::{
    fs,
    path::Path,
    process::{Command, Output},
};

use anyhow::Result;
use tempfile::TempDir;

fn create_test_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Run the binary from `cwd` with no configuration leaking in from the environment
fn enpaki(cwd: &Path, args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_enpaki"))
        .current_dir(cwd)
        .args(args)
        .env_remove("ENPAKI_INCLUDE")
        .env_remove("ENPAKI_EXCLUDE")
        .env_remove("ENPAKI_ON_UNRESOLVED")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", cwd.join(".config"))
        .output()?)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_bundle_to_stdout() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "module.exports = require('./a');")?;
    create_test_file(&root.join("a.js"), "module.exports = 41;")?;

    let output = enpaki(root, &["-e", "entry.js"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let code = stdout(&output);
    assert!(code.starts_with("/** start of bundle */"));
    assert!(code.contains("__enpaki_modules['/a.js']"));
    assert!(code.trim_end().ends_with("/** end of bundle */"));
    Ok(())
}

#[test]
fn test_bundle_to_output_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("src/entry.js"), "module.exports = 1;")?;

    let output = enpaki(root, &["--entry", "src/entry.js", "--output", "bundle.js"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());

    let code = fs::read_to_string(root.join("bundle.js"))?;
    assert!(code.contains("__enpaki_modules['/entry.js']"));
    Ok(())
}

#[test]
fn test_unresolved_reference_fails_with_context() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "require('./missing');")?;

    let output = enpaki(root, &["-e", "entry.js"])?;
    assert_eq!(output.status.code(), Some(1));

    let message = stderr(&output);
    assert!(message.contains("'./missing'"), "stderr: {message}");
    assert!(message.contains("entry.js"), "stderr: {message}");
    Ok(())
}

#[test]
fn test_unresolved_reference_collected_on_request() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "require('./missing');")?;

    let output = enpaki(root, &["-e", "entry.js", "--on-unresolved", "collect"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("require('./missing')"));
    assert!(stderr(&output).contains("./missing"));
    Ok(())
}

#[test]
fn test_missing_entry_is_an_error() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let output = enpaki(temp_dir.path(), &["-e", "nope.js"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("invalid entry script"));
    Ok(())
}

#[test]
fn test_include_and_exclude_flags() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "require('./config');")?;
    create_test_file(&root.join("config.js"), "")?;
    create_test_file(&root.join("extra.js"), "")?;

    let output = enpaki(root, &["-e", "entry.js", "-i", "./extra", "-x", "./config"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let code = stdout(&output);
    assert!(code.contains("__enpaki_modules['/extra.js']"));
    assert!(!code.contains("__enpaki_modules['/config.js']"));
    assert!(code.contains("require('./config')"));
    Ok(())
}

#[test]
fn test_project_configuration_is_applied() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "require('./missing');")?;
    create_test_file(&root.join("enpaki.toml"), "on-unresolved = \"collect\"\n")?;

    let output = enpaki(root, &["-e", "entry.js"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    // The command line wins over the file
    let output = enpaki(root, &["-e", "entry.js", "--on-unresolved", "fail"])?;
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn test_explicit_configuration_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "")?;
    create_test_file(&root.join("extra.js"), "")?;
    create_test_file(&root.join("conf/bundle.toml"), "include = [\"./extra\"]\n")?;

    let output = enpaki(root, &["-e", "entry.js", "--config", "conf/bundle.toml"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("__enpaki_modules['/extra.js']"));
    Ok(())
}

#[test]
fn test_malformed_configuration_is_fatal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "")?;
    create_test_file(&root.join("enpaki.toml"), "include = 3\n")?;

    let output = enpaki(root, &["-e", "entry.js"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("enpaki.toml"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_command_compiler_flag() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_test_file(&root.join("entry.js"), "module.exports = require('./value');")?;
    create_test_file(&root.join("value.txt"), "module.exports = 'from cat';")?;

    let output = enpaki(root, &["-e", "entry.js", "-c", ".txt=cat"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let code = stdout(&output);
    assert!(code.contains("module.exports = require('/value.txt');"));
    assert!(code.contains("module.exports = 'from cat';"));
    Ok(())
}

#[test]
fn test_version_flag() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let output = enpaki(temp_dir.path(), &["-V"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}
