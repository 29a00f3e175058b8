//! JSON manifests describing a unit, for hosts without a reflection layer.
//!
//! A manifest is a serialized [`UnitDescriptor`] with an optional `sources` table mapping
//! `Class.Method` to a source location:
//!
//! ```json
//! {
//!   "name": "Sample.Tests",
//!   "path": "bin/Sample.Tests.dll",
//!   "attributes": [ { "type": "TargetFramework", "args": [".NETCoreApp,Version=v8.0"] } ],
//!   "types": [ { "name": "Sample.CalcTests", "methods": [ { "name": "Adds", "attributes": [ { "type": "Fact" } ] } ] } ],
//!   "sources": { "Sample.CalcTests.Adds": { "file_name": "CalcTests.cs", "line_number": 12 } }
//! }
//! ```
//!
//! A relative `path` is anchored at the manifest's own directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use testscan_core::{AttributeInfo, DiscoverableUnit, SourceInformation, TestCase, TypeInfo, UnitDescriptor};

use crate::diagnostics::SourceInformationProvider;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct ManifestFile {
    #[serde(flatten)]
    unit: UnitDescriptor,
    #[serde(default)]
    sources: BTreeMap<String, SourceInformation>,
}

/// A unit loaded from a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestUnit {
    descriptor: UnitDescriptor,
    sources: Arc<BTreeMap<String, SourceInformation>>,
}

impl ManifestUnit {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut unit = Self::from_json(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        if let Some(unit_path) = unit.descriptor.path.as_mut() {
            if unit_path.is_relative() {
                *unit_path = base.join(&*unit_path);
            }
        }
        tracing::debug!(manifest = %path.display(), types = unit.descriptor.types.len(), "loaded manifest");
        Ok(unit)
    }

    /// Parse manifest text. Relative unit paths are left untouched.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: ManifestFile = serde_json::from_str(text)?;
        Ok(Self {
            descriptor: file.unit,
            sources: Arc::new(file.sources),
        })
    }

    pub fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    /// Provider answering from the manifest's `sources` table.
    pub fn source_provider(&self) -> ManifestSourceProvider {
        ManifestSourceProvider {
            sources: Arc::clone(&self.sources),
        }
    }
}

impl DiscoverableUnit for ManifestUnit {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn path(&self) -> Option<&Path> {
        self.descriptor.path()
    }

    fn attributes(&self, type_name: &str) -> Vec<AttributeInfo> {
        self.descriptor.attributes(type_name)
    }

    fn types(&self, include_private: bool) -> Vec<TypeInfo> {
        self.descriptor.types(include_private)
    }

    fn get_type(&self, name: &str) -> Option<TypeInfo> {
        self.descriptor.get_type(name)
    }
}

/// Source lookup keyed by `Class.Method`.
#[derive(Debug, Clone)]
pub struct ManifestSourceProvider {
    sources: Arc<BTreeMap<String, SourceInformation>>,
}

impl SourceInformationProvider for ManifestSourceProvider {
    fn source_information(&self, test_case: &TestCase) -> Option<SourceInformation> {
        let key = format!("{}.{}", test_case.class_name(), test_case.method_name());
        self.sources.get(&key).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "Sample.Tests",
        "path": "bin/Sample.Tests.dll",
        "types": [ { "name": "Sample.CalcTests" } ],
        "sources": { "Sample.CalcTests.Adds": { "file_name": "CalcTests.cs", "line_number": 12 } }
    }"#;

    #[test]
    fn test_from_json_reads_unit_and_sources() {
        let unit = ManifestUnit::from_json(MANIFEST).unwrap();
        assert_eq!(unit.name(), "Sample.Tests");
        assert_eq!(unit.path(), Some(Path::new("bin/Sample.Tests.dll")));
        assert_eq!(unit.types(false).len(), 1);

        let provider = unit.source_provider();
        let hit = TestCase::builder("Sample.Tests", "Sample.CalcTests", "Adds").build();
        let miss = TestCase::builder("Sample.Tests", "Sample.CalcTests", "Subtracts").build();
        assert_eq!(
            provider.source_information(&hit),
            Some(SourceInformation::new("CalcTests.cs", Some(12)))
        );
        assert!(provider.source_information(&miss).is_none());
    }

    #[test]
    fn test_sources_are_optional() {
        let unit = ManifestUnit::from_json(r#"{ "name": "Bare" }"#).unwrap();
        assert!(unit.types(true).is_empty());
        assert!(unit.path().is_none());
    }

    #[test]
    fn test_load_anchors_relative_path_at_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("unit.json");
        fs::write(&file, MANIFEST).unwrap();

        let unit = ManifestUnit::load(&file).unwrap();
        assert_eq!(unit.path(), Some(dir.path().join("bin/Sample.Tests.dll").as_path()));
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(ManifestUnit::load(&missing), Err(ManifestError::Io { .. })));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        let err = ManifestUnit::load(&broken).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().starts_with("invalid manifest "));
    }
}
