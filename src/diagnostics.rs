//! Diagnostic sinks and source information providers: the engine's side channels.

use testscan_core::{DiagnosticMessage, SourceInformation, TestCase};

/// Receives free-text diagnostics, notably per-type discovery failures.
pub trait DiagnosticSink: Send + Sync {
    fn on_diagnostic(&self, message: &DiagnosticMessage);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&DiagnosticMessage) + Send + Sync,
{
    fn on_diagnostic(&self, message: &DiagnosticMessage) {
        self(message)
    }
}

/// Default sink: forwards diagnostics to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn on_diagnostic(&self, message: &DiagnosticMessage) {
        tracing::warn!(target: "testscan::diagnostics", "{}", message);
    }
}

/// Looks up file/line information for a discovered test case.
pub trait SourceInformationProvider: Send + Sync {
    fn source_information(&self, test_case: &TestCase) -> Option<SourceInformation>;
}

impl<F> SourceInformationProvider for F
where
    F: Fn(&TestCase) -> Option<SourceInformation> + Send + Sync,
{
    fn source_information(&self, test_case: &TestCase) -> Option<SourceInformation> {
        self(test_case)
    }
}
