//! Persisted form of a test case.
//!
//! Runners store the serialized string and rehydrate the case in a later process, so the output must be
//! byte-stable for the same logical test case. The format is compact JSON with a fixed field order and a
//! version tag:
//!
//! ```text
//! {"v":1,"id":"<sha256>","display":"...","class":"...","method":"...","args":[...],"traits":{...},"skip":"...","source":{...}}
//! ```
//!
//! Optional fields are omitted when absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::test_case::{SourceInformation, TestCase};

/// Current format version written by [`serialize_test_case`].
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("malformed serialized test case: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported serialized test case version {found} (expected {expected})", expected = FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedTestCase {
    v: u32,
    id: String,
    display: String,
    class: String,
    method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    traits: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<SourceInformation>,
}

/// Produce the stable textual form of a test case.
pub fn serialize_test_case(test_case: &TestCase) -> Result<String, SerializationError> {
    let serialized = SerializedTestCase {
        v: FORMAT_VERSION,
        id: test_case.unique_id().to_string(),
        display: test_case.display_name().to_string(),
        class: test_case.class_name().to_string(),
        method: test_case.method_name().to_string(),
        args: test_case.arguments().map(<[Value]>::to_vec),
        traits: test_case.traits().clone(),
        skip: test_case.skip_reason().map(str::to_string),
        source: test_case.source_information().cloned(),
    };
    Ok(serde_json::to_string(&serialized)?)
}

/// Rebuild a test case from [`serialize_test_case`] output.
pub fn deserialize_test_case(value: &str) -> Result<TestCase, SerializationError> {
    let serialized: SerializedTestCase = serde_json::from_str(value)?;
    if serialized.v != FORMAT_VERSION {
        return Err(SerializationError::UnsupportedVersion { found: serialized.v });
    }

    Ok(TestCase::from_parts(
        serialized.id,
        serialized.display,
        serialized.class,
        serialized.method,
        serialized.args,
        serialized.traits,
        serialized.skip,
        serialized.source,
    ))
}
