//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{self, Runtime};
use tokio::sync::oneshot;

use testscan_core::{DiagnosticMessage, DiscoveryMessage, TestCase};

use crate::attribute::AttributeStrategy;
use crate::bus::MessageSink;
use crate::diagnostics::DiagnosticSink;
use crate::discoverer::TestFrameworkDiscoverer;
use crate::error::DiscoveryError;
use crate::manifest::ManifestUnit;
use crate::options::DiscoveryOptions;
use crate::workdir::DirectoryMode;

use super::reporter::{ConsoleReporter, DiscoveryReporter, DiscoverySummary, JsonReporter};
use super::{CliError, CliResult, DiscoverArgs, ExitCode, OutputFormat};

// ============================================================================
// discover
// ============================================================================

/// Discover the tests of a manifest unit and print them to stdout.
///
/// Exits with failure when any type could not be discovered.
pub fn discover(args: &DiscoverArgs) -> CliResult<ExitCode> {
    let reporter: Box<dyn DiscoveryReporter> = match args.format {
        OutputFormat::Console => Box::new(ConsoleReporter::new(io::stdout(), args.verbose, args.serialize)),
        OutputFormat::Json => Box::new(JsonReporter::new(io::stdout(), args.serialize)),
    };

    let summary = run_discovery(args, reporter)?;
    if summary.diagnostics > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Run one discovery with the given reporter and return its totals.
pub fn run_discovery(args: &DiscoverArgs, reporter: Box<dyn DiscoveryReporter>) -> CliResult<DiscoverySummary> {
    let unit = load_manifest(&args.manifest)?;
    let runtime = build_runtime()?;
    let started = Instant::now();

    let session = Arc::new(ReportSession::new(reporter));
    let (done_tx, mut done_rx) = oneshot::channel();
    let done = Mutex::new(Some(done_tx));

    let sink_session = Arc::clone(&session);
    let sink: Arc<dyn MessageSink> = Arc::new(move |message: &DiscoveryMessage| match message {
        DiscoveryMessage::TestCaseDiscovered { test_case } => sink_session.test_case(test_case),
        DiscoveryMessage::DiscoveryComplete => {
            if let Some(tx) = done.lock().take() {
                let _ = tx.send(());
            }
            true
        }
    });

    let diagnostic_session = Arc::clone(&session);
    let diagnostics: Arc<dyn DiagnosticSink> =
        Arc::new(move |message: &DiagnosticMessage| diagnostic_session.diagnostic(message));

    let mut builder = TestFrameworkDiscoverer::builder(Arc::new(unit.clone()), AttributeStrategy::new())
        .runtime(runtime.handle().clone())
        .diagnostic_sink(diagnostics);
    if args.source_info {
        builder = builder.source_information_provider(Arc::new(unit.source_provider()));
    }
    let discoverer = builder.build().map_err(discovery_failure)?;

    let options = discovery_options(args);
    let handle = match &args.type_name {
        Some(name) => discoverer.find_type(name, args.source_info, sink, options),
        None => discoverer.find(args.source_info, sink, options),
    }
    .map_err(discovery_failure)?;

    let completed = runtime.block_on(async {
        tokio::select! {
            result = &mut done_rx => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; cancelling discovery");
                handle.cancel();
                (&mut done_rx).await
            }
        }
    });
    if completed.is_err() {
        return Err(CliError::failure("Error: discovery ended without reporting completion"));
    }

    discoverer.dispose().map_err(discovery_failure)?;
    session.finish(started.elapsed())
}

/// Map CLI flags onto per-call options.
pub fn discovery_options(args: &DiscoverArgs) -> DiscoveryOptions {
    let mode = if args.process_cwd {
        DirectoryMode::Process
    } else {
        DirectoryMode::CallScoped
    };
    DiscoveryOptions::new()
        .with_synchronous_message_reporting(args.synchronous)
        .with_pre_enumerate_theories(!args.no_pre_enumerate)
        .with_directory_mode(mode)
        .with_include_private_types(args.include_private)
}

/// Reporter plus running totals, shared by the bus worker and the discovery task.
struct ReportSession {
    reporter: Mutex<Box<dyn DiscoveryReporter>>,
    summary: Mutex<DiscoverySummary>,
    write_error: Mutex<Option<io::Error>>,
}

impl ReportSession {
    fn new(reporter: Box<dyn DiscoveryReporter>) -> Self {
        Self {
            reporter: Mutex::new(reporter),
            summary: Mutex::new(DiscoverySummary::default()),
            write_error: Mutex::new(None),
        }
    }

    /// Returns false once output can no longer be written; discovery stops.
    fn test_case(&self, test_case: &TestCase) -> bool {
        self.summary.lock().record(test_case);
        let result = self.reporter.lock().on_test_case(test_case);
        self.keep(result)
    }

    fn diagnostic(&self, message: &DiagnosticMessage) {
        self.summary.lock().diagnostics += 1;
        let result = self.reporter.lock().on_diagnostic(message);
        self.keep(result);
    }

    fn keep(&self, result: io::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "output write failed");
                self.write_error.lock().get_or_insert(e);
                false
            }
        }
    }

    fn finish(&self, duration: Duration) -> CliResult<DiscoverySummary> {
        let summary = {
            let mut summary = self.summary.lock();
            summary.duration = duration;
            *summary
        };
        if let Some(e) = self.write_error.lock().take() {
            return Err(CliError::failure(format!("Error writing output: {}", e)));
        }
        self.reporter
            .lock()
            .on_complete(&summary)
            .map_err(|e| CliError::failure(format!("Error writing output: {}", e)))?;
        Ok(summary)
    }
}

// ============================================================================
// info
// ============================================================================

/// Print the strategy's display name and the unit's target framework.
pub fn info(manifest: &Path) -> CliResult<ExitCode> {
    let unit = load_manifest(manifest)?;
    let runtime = build_runtime()?;

    let discoverer = TestFrameworkDiscoverer::builder(Arc::new(unit), AttributeStrategy::new())
        .runtime(runtime.handle().clone())
        .build()
        .map_err(discovery_failure)?;

    let display_name = discoverer.display_name().map_err(discovery_failure)?;
    let target_framework = discoverer.target_framework().map_err(discovery_failure)?;
    println!("strategy:         {}", display_name);
    if target_framework.is_empty() {
        println!("target framework: (none)");
    } else {
        println!("target framework: {}", target_framework);
    }

    discoverer.dispose().map_err(discovery_failure)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helpers
// ============================================================================

fn load_manifest(path: &Path) -> CliResult<ManifestUnit> {
    ManifestUnit::load(path).map_err(|e| CliError::failure(format!("Error: {}", e)))
}

fn build_runtime() -> CliResult<Runtime> {
    runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("testscan-runtime")
        .build()
        .map_err(|e| CliError::failure(format!("Error starting runtime: {}", e)))
}

/// Render with miette so codes and help text reach the user.
fn discovery_failure(error: DiscoveryError) -> CliError {
    CliError::failure(format!("{:?}", miette::Report::new(error)))
}
