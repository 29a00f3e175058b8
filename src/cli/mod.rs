//! CLI module for testscan
//!
//! ## Commands
//!
//! - `discover <manifest>` - Discover the tests of a unit described by a JSON manifest
//! - `info <manifest>` - Print the strategy name and the unit's target framework
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `reporter` - Console and JSON-lines output
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod reporter;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Test discovery for compiled units
#[derive(Parser, Debug)]
#[command(name = "testscan")]
#[command(version = VERSION)]
#[command(about = "Discover the tests in a compiled unit", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover tests and report them
    Discover(DiscoverArgs),

    /// Print the discovery strategy and the unit's target framework
    Info {
        /// Unit manifest (JSON)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DiscoverArgs {
    /// Unit manifest (JSON)
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Only discover the named type
    #[arg(long = "type", value_name = "TYPE")]
    pub type_name: Option<String>,

    /// Deliver messages on the discovery thread instead of a queue worker
    #[arg(long = "sync")]
    pub synchronous: bool,

    /// Attach source file and line information
    #[arg(long = "source-info")]
    pub source_info: bool,

    /// Report each theory once instead of once per data row
    #[arg(long = "no-pre-enumerate")]
    pub no_pre_enumerate: bool,

    /// Switch the process working directory to the unit's directory during discovery
    #[arg(long = "process-cwd")]
    pub process_cwd: bool,

    /// Include non-public types
    #[arg(long = "include-private")]
    pub include_private: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Also print the serialized form of each test case
    #[arg(long)]
    pub serialize: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Json,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Discover(args) => commands::discover(&args),
        Command::Info { manifest } => commands::info(&manifest),
    }
}

// ============================================================================
// Tests
// ============================================================================
