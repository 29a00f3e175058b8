//! Messages emitted during a discovery run.

use serde::Serialize;

use crate::test_case::TestCase;

/// An event delivered through a message bus, in emission order within one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryMessage {
    /// A test case was found.
    TestCaseDiscovered { test_case: TestCase },
    /// The run finished. Emitted exactly once per run, always last.
    DiscoveryComplete,
}

impl DiscoveryMessage {
    pub fn discovered(test_case: TestCase) -> Self {
        Self::TestCaseDiscovered { test_case }
    }

    /// True for the message that ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DiscoveryComplete)
    }

    pub fn test_case(&self) -> Option<&TestCase> {
        match self {
            Self::TestCaseDiscovered { test_case } => Some(test_case),
            Self::DiscoveryComplete => None,
        }
    }
}

/// Free-text diagnostic, delivered to a diagnostic sink rather than the discovery bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticMessage {
    pub message: String,
}

impl DiagnosticMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
