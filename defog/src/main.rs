use clap::{Parser, ValueEnum};
use defog_core::config::{CleanupMode, Config};
use defog_core::harness::EvalStatus;
use log::info;
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Times the execution of a closure and prints the elapsed time if verbose.
fn time<T, F: FnOnce() -> T>(name: &str, verbose: bool, f: F) -> T {
    let start = Instant::now();
    let result = f();
    if verbose {
        let elapsed = start.elapsed().as_millis();
        eprintln!("{}: {}ms", name, elapsed);
    }
    result
}

/// Cleanup behavior for dead helpers and initializer blocks
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Cleanup {
    /// Leave dead code intact (default)
    #[default]
    None,
    /// Wrap dead code in [cleanup] block comments
    Comment,
    /// Delete dead code
    Remove,
}

impl From<Cleanup> for CleanupMode {
    fn from(value: Cleanup) -> Self {
        match value {
            Cleanup::None => CleanupMode::None,
            Cleanup::Comment => CleanupMode::Comment,
            Cleanup::Remove => CleanupMode::Remove,
        }
    }
}

#[derive(Parser)]
#[command(name = "defog")]
#[command(about = "Partially evaluates obfuscated helper calls and rewrites them to literals", long_about = None)]
struct Cli {
    /// Input source file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to rewriting the input in place)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write a .bak copy of the input before overwriting it
    #[arg(long)]
    backup: bool,

    /// Regex selecting helper routines by name
    #[arg(short, long, value_name = "REGEX", default_value = r"^f\d+$")]
    pattern: Regex,

    /// Regex further restricting which helpers are evaluated
    #[arg(long, value_name = "REGEX")]
    filter: Option<Regex>,

    /// Minimum argument count for a rewritable call
    #[arg(long, value_name = "N", default_value_t = 4)]
    min_args: usize,

    /// Maximum argument count for a rewritable call
    #[arg(long, value_name = "N", default_value_t = 6)]
    max_args: usize,

    /// Disable the reversed-string-literal normalizer
    #[arg(long)]
    no_string_reverse: bool,

    /// Disable call extraction, evaluation and rewriting
    #[arg(long)]
    no_function_calls: bool,

    /// Evaluate helper calls but do not rewrite the source
    #[arg(long)]
    disable_replace: bool,

    /// What to do with provably dead helpers after rewriting
    #[arg(long, value_enum, default_value_t = Cleanup::None)]
    cleanup: Cleanup,

    /// Sandbox wall-clock limit in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Write a JSON call trace to this path
    #[arg(long, value_name = "FILE")]
    debug_output: Option<PathBuf>,

    /// Log the assembled evaluator program
    #[arg(long)]
    debug: bool,

    /// Trace each driver line fed to the sandbox
    #[arg(long)]
    trace_lines: bool,

    /// Print verbose output and phase timing
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Core(#[from] defog_core::error::CoreError),
}

fn main() -> Result<(), DriverError> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config {
        intercept_pattern: cli.pattern.clone(),
        function_name_filter: cli.filter.clone(),
        min_args: cli.min_args,
        max_args: cli.max_args,
        string_reverse: !cli.no_string_reverse,
        function_calls: !cli.no_function_calls,
        disable_replace: cli.disable_replace,
        cleanup_mode: cli.cleanup.into(),
        verbose: cli.verbose,
        debug: cli.debug,
        trace_lines: cli.trace_lines,
        debug_output_path: cli.debug_output.clone(),
        eval_timeout: Duration::from_secs(cli.timeout),
    };

    run(&cli, &config)
}

fn run(cli: &Cli, config: &Config) -> Result<(), DriverError> {
    if cli.verbose {
        info!("Deobfuscating {}...", cli.input.display());
    }

    let source = fs::read_to_string(&cli.input)?;

    let output = time("pipeline", cli.verbose, || defog_core::deobfuscate(&source, config))?;

    if cli.verbose {
        match &output.eval_status {
            EvalStatus::Ok => info!(
                "rewrote {} call site(s), removed {} helper(s)",
                output.rewrite_stats.total,
                output.cleanup_stats.dead_helpers.len()
            ),
            EvalStatus::Skipped => info!("nothing to evaluate"),
            EvalStatus::Timeout => info!("sandbox timed out; source left unchanged"),
            EvalStatus::Fatal(message) => {
                info!("sandbox failed ({}); source left unchanged", message)
            }
        }
    }

    let destination = cli.output.as_ref().unwrap_or(&cli.input);
    if cli.backup && destination == &cli.input {
        let mut backup_path = cli.input.clone();
        backup_path.set_extension(match cli.input.extension() {
            Some(ext) => format!("{}.bak", ext.to_string_lossy()),
            None => "bak".to_string(),
        });
        fs::write(&backup_path, &source)?;
        if cli.verbose {
            info!("wrote backup to {}", backup_path.display());
        }
    }

    fs::write(destination, &output.source)?;
    if cli.verbose {
        info!("wrote output to {}", destination.display());
    }

    Ok(())
}
