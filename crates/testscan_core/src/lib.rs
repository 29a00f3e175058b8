//! Provide the shared discovery vocabulary used by the testscan engine and its collaborators.
//!
//! This crate is intentionally small. It describes:
//! - what a discoverable unit looks like from the outside (`DiscoverableUnit`, `TypeInfo`, `MethodInfo`),
//! - what discovery produces (`TestCase`, `SourceInformation`),
//! - what flows to observers (`DiscoveryMessage`, `DiagnosticMessage`),
//! - and the persisted form of a test case (`serialize_test_case` / `deserialize_test_case`).
//!
//! ## Notes
//!
//! - No scheduling and no global state live here. The engine crate owns threads, buses and directories.
//! - The serialized test case format is a compatibility contract: downstream tooling stores these strings and
//!   rehydrates them in later processes.

pub mod message;
pub mod serialization;
pub mod test_case;
pub mod unit;

pub use message::{DiagnosticMessage, DiscoveryMessage};
pub use serialization::{SerializationError, deserialize_test_case, serialize_test_case};
pub use test_case::{SourceInformation, TestCase, TestCaseBuilder};
pub use unit::{AttributeInfo, DiscoverableUnit, MethodInfo, TypeInfo, UnitDescriptor};

/// Attribute type name carrying the target framework label of a unit.
///
/// The label is the attribute's first positional argument.
pub const TARGET_FRAMEWORK_ATTRIBUTE: &str = "TargetFramework";
