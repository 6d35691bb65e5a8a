use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use enpaki::{
    BundleOptions, BundleReport, Bundler, CommandCompiler, Config, ModuleIdentity, UnresolvedPolicy,
};

/// Pack a CommonJS module tree into one self-contained script
#[derive(Parser, Debug)]
#[command(name = "enpaki", author, version, about, long_about = None)]
struct Cli {
    /// Entry script of the bundle
    #[arg(short, long, value_name = "FILE")]
    entry: PathBuf,

    /// Write the bundle to this file instead of standard output
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Inline these modules even when no require reaches them
    #[arg(short, long, num_args = 1.., value_name = "SPECIFIER")]
    include: Vec<String>,

    /// Leave these modules out; the host resolves them when the bundle runs
    #[arg(short = 'x', long, num_args = 1.., value_name = "SPECIFIER")]
    exclude: Vec<String>,

    /// Compile extra extensions with an external program, e.g. '.coffee=coffee -b -p'
    #[arg(short, long = "compiler", num_args = 1.., value_name = "DEFINITION")]
    compilers: Vec<String>,

    /// Configuration file applied on top of the user and project files
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// What to do with a require that can't be resolved
    #[arg(long, value_enum)]
    on_unresolved: Option<UnresolvedPolicy>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.format_timestamp(None).init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.include.extend(cli.include);
    config.exclude.extend(cli.exclude);
    if cli.on_unresolved.is_some() {
        config.on_unresolved = cli.on_unresolved;
    }

    let mut options = BundleOptions::from_config(&config);
    for definition in &cli.compilers {
        let compiler = CommandCompiler::parse(definition)
            .with_context(|| format!("invalid --compiler '{definition}'"))?;
        options.compilers.push(Box::new(compiler));
    }
    debug!("{options:?}");

    let started = Instant::now();
    let mut stream = Bundler::new(&cli.entry, options)
        .with_context(|| format!("can't bundle '{}'", cli.entry.display()))?
        .into_stream();

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("can't create output file '{}'", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    for chunk in &mut stream {
        let chunk = chunk.with_context(|| format!("can't bundle '{}'", cli.entry.display()))?;
        writer
            .write_all(chunk.as_bytes())
            .context("can't write the bundle")?;
    }
    writer.flush().context("can't write the bundle")?;

    let report = stream.finish();
    info!(
        "Bundled {} modules ({} references) in {:.2?}",
        report.modules.len(),
        report.dependency_count,
        started.elapsed()
    );
    print_diagnostics(&report);
    Ok(())
}

fn print_diagnostics(report: &BundleReport) {
    for group in &report.circular_groups {
        let members: Vec<&str> = group.iter().map(ModuleIdentity::as_str).collect();
        info!("Circular dependency: {}", members.join(" <-> "));
    }

    if !report.unresolved.is_empty() {
        for reference in &report.unresolved {
            warn!("{reference}");
        }
        warn!(
            "{} reference(s) were left for the host to resolve",
            report.unresolved.len()
        );
    }
}
