#![forbid(unsafe_code)]
//! testscan: test discovery for compiled units
//!
//! Given a loaded unit of compiled code and a framework-specific [`DiscoveryStrategy`], the
//! [`TestFrameworkDiscoverer`] enumerates candidate types in the background and streams every discovered test
//! case to a [`MessageSink`], ending each run with exactly one `DiscoveryComplete`.
//!
//! ## Modules
//!
//! - `discoverer` - Scheduling, filtering, error containment
//! - `strategy` - The framework hooks and the per-run discovery context
//! - `bus` - Queued and synchronous message delivery
//! - `disposal` - Ordered, failure-tolerant resource release
//! - `workdir` - Working directory scoping for a run
//! - `attribute` - Reference attribute-driven strategy (`Fact`, `Theory`, `InlineData`)
//! - `manifest` - JSON-described units for hosts without reflection
//! - `cli` - The `testscan` command
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//! - **Strategy code**: panics inside a strategy are caught per type and reported as diagnostics.

pub mod attribute;
pub mod bus;
pub mod cli;
pub mod diagnostics;
pub mod discoverer;
pub mod disposal;
pub mod error;
pub mod manifest;
pub mod options;
pub mod strategy;
pub mod workdir;

pub use attribute::AttributeStrategy;
pub use bus::{MessageBus, MessageSink, QueuedMessageBus, SynchronousMessageBus, create_message_bus};
pub use diagnostics::{DiagnosticSink, SourceInformationProvider, TracingDiagnosticSink};
pub use discoverer::{DiscovererBuilder, FindHandle, TestFrameworkDiscoverer};
pub use disposal::{Disposable, DisposalTracker};
pub use error::{DiscoveryError, DiscoveryResult, DisposeError, StrategyError};
pub use manifest::{ManifestError, ManifestSourceProvider, ManifestUnit};
pub use options::DiscoveryOptions;
pub use strategy::{DiscoveryContext, DiscoveryStrategy, TestClass};
pub use workdir::{DirectoryMode, WorkingDirectoryGuard};

pub use testscan_core::{
    AttributeInfo, DiagnosticMessage, DiscoverableUnit, DiscoveryMessage, MethodInfo, SourceInformation, TestCase,
    TypeInfo, UnitDescriptor, deserialize_test_case, serialize_test_case,
};
