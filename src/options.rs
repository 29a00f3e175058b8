//! Per-call discovery options.
//!
//! Follows the builder-style config used across the workspace: a plain struct with a `Default`
//! and `with_*` setters.

use crate::workdir::DirectoryMode;

/// Options for one `find` / `find_type` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Deliver messages inline instead of through the queued worker
    pub synchronous_message_reporting: bool,
    /// Expand data-driven tests into one case per data row
    pub pre_enumerate_theories: bool,
    /// How the unit's directory is exposed to the strategy
    pub directory_mode: DirectoryMode,
    /// Also consider non-public types
    pub include_private_types: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            synchronous_message_reporting: false,
            pre_enumerate_theories: true,
            directory_mode: DirectoryMode::CallScoped,
            include_private_types: false,
        }
    }
}

impl DiscoveryOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_synchronous_message_reporting(mut self, synchronous: bool) -> Self {
        self.synchronous_message_reporting = synchronous;
        self
    }

    pub fn with_pre_enumerate_theories(mut self, pre_enumerate: bool) -> Self {
        self.pre_enumerate_theories = pre_enumerate;
        self
    }

    pub fn with_directory_mode(mut self, mode: DirectoryMode) -> Self {
        self.directory_mode = mode;
        self
    }

    pub fn with_include_private_types(mut self, include: bool) -> Self {
        self.include_private_types = include;
        self
    }
}
