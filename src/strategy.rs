//! The pluggable half of discovery.
//!
//! The discoverer owns scheduling, filtering, error containment and message delivery. A
//! [`DiscoveryStrategy`] owns the framework-specific part: wrapping a candidate type into a test class and
//! turning that class into test cases, which it reports through the [`DiscoveryContext`].

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use testscan_core::{DiscoverableUnit, TestCase, TypeInfo};

use crate::bus::MessageBus;
use crate::diagnostics::SourceInformationProvider;
use crate::discoverer::report_discovered_test_case;
use crate::error::StrategyError;
use crate::options::DiscoveryOptions;
use crate::workdir::WorkingDirectoryGuard;

/// Framework-specific discovery hooks.
pub trait DiscoveryStrategy: Send + Sync + 'static {
    /// The strategy's wrapper around one candidate type.
    type TestClass: Send;

    /// Human-readable framework name.
    fn display_name(&self) -> &str;

    /// Wrap a qualifying candidate type.
    fn create_test_class(&self, unit: &dyn DiscoverableUnit, type_info: TypeInfo) -> Self::TestClass;

    /// Discover the tests of one class and report each through `context`.
    ///
    /// Return `Ok(false)` to stop enumerating further types. Errors (and panics) are contained by the
    /// discoverer and surface as diagnostics; enumeration continues with the next type.
    fn find_tests_for_type(
        &self,
        test_class: &Self::TestClass,
        context: &mut DiscoveryContext<'_>,
    ) -> Result<bool, StrategyError>;

    /// Filter applied before a test class is created.
    ///
    /// Pure base classes (abstract and not sealed) are skipped; sealed abstract (static-only) types are kept.
    fn is_valid_test_class(&self, type_info: &TypeInfo) -> bool {
        !type_info.is_abstract || type_info.is_sealed
    }
}

/// A candidate type together with the unit it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestClass {
    pub unit_name: String,
    pub type_info: TypeInfo,
}

impl TestClass {
    pub fn new(unit: &dyn DiscoverableUnit, type_info: TypeInfo) -> Self {
        Self {
            unit_name: unit.name().to_string(),
            type_info,
        }
    }

    pub fn name(&self) -> &str {
        &self.type_info.name
    }
}

/// Everything a strategy may touch while discovering one run's types.
pub struct DiscoveryContext<'a> {
    unit: &'a dyn DiscoverableUnit,
    bus: &'a dyn MessageBus,
    source_provider: Option<&'a dyn SourceInformationProvider>,
    options: &'a DiscoveryOptions,
    directory: &'a WorkingDirectoryGuard,
    cancellation: &'a CancellationToken,
    include_source_information: bool,
    reported: usize,
    stop_requested: bool,
}

impl<'a> DiscoveryContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        unit: &'a dyn DiscoverableUnit,
        bus: &'a dyn MessageBus,
        source_provider: Option<&'a dyn SourceInformationProvider>,
        options: &'a DiscoveryOptions,
        directory: &'a WorkingDirectoryGuard,
        cancellation: &'a CancellationToken,
        include_source_information: bool,
    ) -> Self {
        Self {
            unit,
            bus,
            source_provider,
            options,
            directory,
            cancellation,
            include_source_information,
            reported: 0,
            stop_requested: false,
        }
    }

    /// Report one discovered case. Returns `false` when the bus refused it; the strategy should stop.
    pub fn report(&mut self, test_case: TestCase) -> bool {
        let accepted = report_discovered_test_case(
            test_case,
            self.include_source_information,
            self.bus,
            self.source_provider,
        );
        if accepted {
            self.reported += 1;
        } else {
            self.stop_requested = true;
        }
        accepted
    }

    pub fn unit(&self) -> &dyn DiscoverableUnit {
        self.unit
    }

    pub fn options(&self) -> &DiscoveryOptions {
        self.options
    }

    pub fn include_source_information(&self) -> bool {
        self.include_source_information
    }

    /// Directory relative paths should be resolved against (the unit's directory when known).
    pub fn working_directory(&self) -> &Path {
        self.directory.directory()
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        self.directory.resolve(path)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Number of cases reported so far in this run.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// True once the bus has refused a message.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}
