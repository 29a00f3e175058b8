//! Discovered test cases.
//!
//! A `TestCase` is immutable once built. The only later change the engine makes is annotating a case with
//! source information, which produces a new value (`with_source_information`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// File and line of a test method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl SourceInformation {
    pub fn new(file_name: impl Into<String>, line_number: Option<u32>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            line_number,
        }
    }

    /// True when neither file nor line is known.
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none() && self.line_number.is_none()
    }
}

/// One discovered unit of executable test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    unique_id: String,
    display_name: String,
    class_name: String,
    method_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    traits: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_information: Option<SourceInformation>,
}

impl TestCase {
    /// Start building a test case for `class_name.method_name` inside the named unit.
    pub fn builder(
        unit_name: impl Into<String>,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> TestCaseBuilder {
        TestCaseBuilder {
            unit_name: unit_name.into(),
            class_name: class_name.into(),
            method_name: method_name.into(),
            display_name: None,
            arguments: None,
            traits: BTreeMap::new(),
            skip_reason: None,
            source_information: None,
        }
    }

    /// Rebuild a test case from already-known parts (used by the deserializer).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        unique_id: String,
        display_name: String,
        class_name: String,
        method_name: String,
        arguments: Option<Vec<Value>>,
        traits: BTreeMap<String, Vec<String>>,
        skip_reason: Option<String>,
        source_information: Option<SourceInformation>,
    ) -> Self {
        Self {
            unique_id,
            display_name,
            class_name,
            method_name,
            arguments,
            traits,
            skip_reason,
            source_information,
        }
    }

    /// Stable identity: identical for the same unit, class, method and arguments in every process.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn arguments(&self) -> Option<&[Value]> {
        self.arguments.as_deref()
    }

    pub fn traits(&self) -> &BTreeMap<String, Vec<String>> {
        &self.traits
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn source_information(&self) -> Option<&SourceInformation> {
        self.source_information.as_ref()
    }

    /// Return a copy annotated with the given source location. The identity does not change.
    pub fn with_source_information(&self, source_information: SourceInformation) -> Self {
        Self {
            source_information: Some(source_information),
            ..self.clone()
        }
    }
}

/// Builder for [`TestCase`]; computes the unique id and default display name on `build`.
#[derive(Debug, Clone)]
pub struct TestCaseBuilder {
    unit_name: String,
    class_name: String,
    method_name: String,
    display_name: Option<String>,
    arguments: Option<Vec<Value>>,
    traits: BTreeMap<String, Vec<String>>,
    skip_reason: Option<String>,
    source_information: Option<SourceInformation>,
}

impl TestCaseBuilder {
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Attach serialized argument data (theory rows).
    pub fn arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn add_trait(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    pub fn source_information(mut self, source_information: SourceInformation) -> Self {
        self.source_information = Some(source_information);
        self
    }

    pub fn build(self) -> TestCase {
        let unique_id = compute_unique_id(
            &self.unit_name,
            &self.class_name,
            &self.method_name,
            self.arguments.as_deref(),
        );
        let display_name = self
            .display_name
            .unwrap_or_else(|| default_display_name(&self.class_name, &self.method_name, self.arguments.as_deref()));

        TestCase {
            unique_id,
            display_name,
            class_name: self.class_name,
            method_name: self.method_name,
            arguments: self.arguments,
            traits: self.traits,
            skip_reason: self.skip_reason,
            source_information: self.source_information,
        }
    }
}

/// SHA-256 over `unit \0 class \0 method \0 arguments-json`, lowercase hex.
///
/// Cases without arguments hash an empty argument segment, so `[]` and "no arguments" differ.
pub fn compute_unique_id(unit_name: &str, class_name: &str, method_name: &str, arguments: Option<&[Value]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(unit_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(class_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(method_name.as_bytes());
    hasher.update([0u8]);
    if let Some(args) = arguments {
        // Value's Display is compact JSON with sorted object keys.
        hasher.update(Value::Array(args.to_vec()).to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn default_display_name(class_name: &str, method_name: &str, arguments: Option<&[Value]>) -> String {
    match arguments {
        Some(args) => {
            let rendered: Vec<String> = args.iter().map(Value::to_string).collect();
            format!("{}.{}({})", class_name, method_name, rendered.join(", "))
        }
        None => format!("{}.{}", class_name, method_name),
    }
}
