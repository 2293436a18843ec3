//! Tinker CLI: builds plugin modules and manages the module cache.
//!
//! `tinker build` produces a plugin's module through the cache, `tinker
//! compile` compiles loose script files, `tinker inspect` dumps module and
//! debug files, and `tinker cache` maintains the cache tree. The hidden
//! `toolchain-worker` subcommand serves the isolated compiler process.
//!
//! Exit codes: 0 on success, 1 on failure, 2 when a plugin is temporarily
//! unavailable because of a network error.

#![warn(missing_docs)]

mod build;
mod cache;
mod compile;
mod inspect;
mod setup;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Exit code for a network failure that may clear up on retry.
pub const EXIT_TRANSIENT: i32 = 2;

/// Tinker: on-demand plugin compilation.
#[derive(Parser, Debug)]
#[command(name = "tinker", version, about = "Tinker plugin compiler and module cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `tinker.toml`, or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce a plugin's module, compiling only if the cache is stale.
    Build(BuildArgs),
    /// Compile script files into a module.
    Compile(CompileArgs),
    /// Print the contents of a `.tkm` or `.tkd` file.
    Inspect(InspectArgs),
    /// Maintain the module cache.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Serve the toolchain protocol on stdin/stdout.
    #[command(name = "toolchain-worker", hide = true)]
    ToolchainWorker,
}

/// Arguments for `tinker build`.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Plugin descriptor, or the directory containing `plugin.toml`.
    #[arg(default_value = ".")]
    pub plugin: PathBuf,

    /// Alternate version name to build instead of the default revision.
    #[arg(long = "select")]
    pub select: Option<String>,

    /// Produce a debug build.
    #[arg(long)]
    pub debug: bool,

    /// Also copy the module image to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the configured toolchain isolation.
    #[arg(long, value_enum)]
    pub isolation: Option<IsolationArg>,
}

/// Arguments for `tinker compile`.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Script files to compile into one module.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output module path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Module name (default: output file stem).
    #[arg(long)]
    pub name: Option<String>,

    /// Produce a debug build and write a `.tkd` next to the module.
    #[arg(long)]
    pub debug: bool,

    /// Override the configured toolchain isolation.
    #[arg(long, value_enum)]
    pub isolation: Option<IsolationArg>,
}

/// Arguments for `tinker inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// A `.tkm` module or `.tkd` debug file.
    pub file: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// `tinker cache` subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Delete staged files no cache manifest tracks.
    Gc,
    /// Delete every cached module.
    Clear,
    /// Force the next build of a plugin to recompile.
    Invalidate {
        /// Plugin descriptor, or the directory containing `plugin.toml`.
        #[arg(default_value = ".")]
        plugin: PathBuf,
    },
}

/// Toolchain isolation selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum IsolationArg {
    /// Run the compiler in a worker process.
    Process,
    /// Run the compiler in this process.
    InProcess,
}

/// Output format for `inspect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print debug-level logs.
    pub verbose: bool,
    /// Optional path to a custom config file or directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    setup::init_logging(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Compile(ref args) => compile::run(args, &global),
        Command::Inspect(ref args) => inspect::run(args),
        Command::Cache(ref command) => cache::run(command, &global),
        Command::ToolchainWorker => run_worker(),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn run_worker() -> Result<i32, Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    tinker_toolchain::worker::serve(stdin.lock(), stdout.lock())?;
    Ok(0)
}
