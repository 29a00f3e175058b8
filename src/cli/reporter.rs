//! Output formats for `testscan discover`.
//!
//! Reporters receive events from two threads (the bus worker and the discovery task), so the command wraps
//! them in a mutex; individual reporters are plain `&mut self` writers.

use std::io::{self, Write};
use std::time::Duration;

use serde_json::json;

use testscan_core::{DiagnosticMessage, TestCase, serialize_test_case};

/// Totals for one discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub discovered: usize,
    pub skipped: usize,
    pub diagnostics: usize,
    pub duration: Duration,
}

impl DiscoverySummary {
    pub fn record(&mut self, test_case: &TestCase) {
        self.discovered += 1;
        if test_case.skip_reason().is_some() {
            self.skipped += 1;
        }
    }
}

/// Receives discovery events and renders them.
///
/// A write error on a test case stops discovery (the message sink reports it as a refusal).
pub trait DiscoveryReporter: Send {
    fn on_test_case(&mut self, test_case: &TestCase) -> io::Result<()>;
    fn on_diagnostic(&mut self, message: &DiagnosticMessage) -> io::Result<()>;
    fn on_complete(&mut self, summary: &DiscoverySummary) -> io::Result<()>;
}

/// Human-readable, one line per test case.
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    verbose: bool,
    serialize: bool,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool, serialize: bool) -> Self {
        Self { out, verbose, serialize }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DiscoveryReporter for ConsoleReporter<W> {
    fn on_test_case(&mut self, test_case: &TestCase) -> io::Result<()> {
        match test_case.skip_reason() {
            Some(reason) => writeln!(
                self.out,
                "{} \x1b[33mSKIPPED\x1b[0m ({})",
                test_case.display_name(),
                reason
            )?,
            None => writeln!(self.out, "{}", test_case.display_name())?,
        }

        if self.verbose {
            writeln!(self.out, "    id: {}", test_case.unique_id())?;
            for (name, values) in test_case.traits() {
                writeln!(self.out, "    trait: {}={}", name, values.join(","))?;
            }
            if let Some(source) = test_case.source_information() {
                match (&source.file_name, source.line_number) {
                    (Some(file), Some(line)) => writeln!(self.out, "    source: {}:{}", file, line)?,
                    (Some(file), None) => writeln!(self.out, "    source: {}", file)?,
                    _ => {}
                }
            }
        }

        if self.serialize {
            let serialized = serialize_test_case(test_case).map_err(io::Error::other)?;
            writeln!(self.out, "    {}", serialized)?;
        }
        Ok(())
    }

    fn on_diagnostic(&mut self, message: &DiagnosticMessage) -> io::Result<()> {
        writeln!(self.out, "\x1b[31mERROR\x1b[0m {}", message)
    }

    fn on_complete(&mut self, summary: &DiscoverySummary) -> io::Result<()> {
        if summary.discovered == 0 {
            writeln!(self.out, "No tests discovered")?;
        }

        let mut parts = vec![format!("\x1b[32m{} discovered\x1b[0m", summary.discovered)];
        if summary.skipped > 0 {
            parts.push(format!("\x1b[33m{} skipped\x1b[0m", summary.skipped));
        }
        if summary.diagnostics > 0 {
            parts.push(format!("\x1b[31m{} errors\x1b[0m", summary.diagnostics));
        }

        writeln!(
            self.out,
            "====== {} in {:.2}s ======",
            parts.join(", "),
            summary.duration.as_secs_f64()
        )?;
        self.out.flush()
    }
}

/// JSON lines: one object per event, for tooling.
pub struct JsonReporter<W: Write + Send> {
    out: W,
    serialize: bool,
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W, serialize: bool) -> Self {
        Self { out, serialize }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DiscoveryReporter for JsonReporter<W> {
    fn on_test_case(&mut self, test_case: &TestCase) -> io::Result<()> {
        let mut event = json!({ "event": "test_case", "test_case": test_case });
        if self.serialize {
            let serialized = serialize_test_case(test_case).map_err(io::Error::other)?;
            event["serialized"] = serialized.into();
        }
        writeln!(self.out, "{}", event)
    }

    fn on_diagnostic(&mut self, message: &DiagnosticMessage) -> io::Result<()> {
        writeln!(self.out, "{}", json!({ "event": "diagnostic", "message": message.message }))
    }

    fn on_complete(&mut self, summary: &DiscoverySummary) -> io::Result<()> {
        let event = json!({
            "event": "complete",
            "discovered": summary.discovered,
            "skipped": summary.skipped,
            "diagnostics": summary.diagnostics,
        });
        writeln!(self.out, "{}", event)?;
        self.out.flush()
    }
}
