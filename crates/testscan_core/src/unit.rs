//! Discoverable units and the reflection facts they expose.
//!
//! A unit is an opaque handle over a compiled binary. The engine only ever reads from it: it asks for the
//! on-disk path, custom attributes and the contained types. `UnitDescriptor` is a plain in-memory
//! implementation that tools (and tests) can build directly or deserialize from JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A custom attribute attached to a unit, type or method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    /// Attribute type name, e.g. `Fact` or `TargetFramework`
    #[serde(rename = "type")]
    pub type_name: String,
    /// Positional constructor arguments, rendered as text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Named arguments (`Skip = "reason"`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named: BTreeMap<String, String>,
}

impl AttributeInfo {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set a named argument.
    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn named_arg(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// A method exposed by a candidate type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeInfo) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// All attributes of the given type, in declaration order.
    pub fn attributes_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a AttributeInfo> + 'a {
        self.attributes.iter().filter(move |a| a.type_name == type_name)
    }

    pub fn has_attribute(&self, type_name: &str) -> bool {
        self.attributes_of(type_name).next().is_some()
    }
}

fn default_public() -> bool {
    true
}

/// A candidate type: a name plus the reflection facts used for filtering and discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Fully qualified type name
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "sealed")]
    pub is_sealed: bool,
    #[serde(default, rename = "generic_definition")]
    pub is_generic_definition: bool,
    #[serde(default = "default_public", rename = "public")]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodInfo>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            is_sealed: false,
            is_generic_definition: false,
            is_public: true,
            attributes: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_sealed(mut self, is_sealed: bool) -> Self {
        self.is_sealed = is_sealed;
        self
    }

    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn with_generic_definition(mut self, is_generic_definition: bool) -> Self {
        self.is_generic_definition = is_generic_definition;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeInfo) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// Short name (the segment after the last `.`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// All attributes of the given type, in declaration order.
    pub fn attributes_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a AttributeInfo> + 'a {
        self.attributes.iter().filter(move |a| a.type_name == type_name)
    }
}

/// Read-only access to a loaded unit of compiled code.
///
/// Implementations are provided by the host (a reflection layer, a metadata reader, a manifest file).
/// The engine borrows the unit for the lifetime of a discovery call and never mutates it.
pub trait DiscoverableUnit: Send + Sync {
    /// Display name of the unit (for example the assembly or crate name).
    fn name(&self) -> &str;

    /// On-disk location of the unit, when known.
    fn path(&self) -> Option<&Path>;

    /// Unit-level custom attributes of the given type.
    fn attributes(&self, type_name: &str) -> Vec<AttributeInfo>;

    /// Enumerate contained types in a stable order.
    fn types(&self, include_private: bool) -> Vec<TypeInfo>;

    /// Look up one type by its fully qualified name.
    fn get_type(&self, name: &str) -> Option<TypeInfo>;
}

/// In-memory description of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeInfo>,
    #[serde(default)]
    pub types: Vec<TypeInfo>,
}

impl UnitDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeInfo) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_type(mut self, type_info: TypeInfo) -> Self {
        self.types.push(type_info);
        self
    }
}

impl DiscoverableUnit for UnitDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn attributes(&self, type_name: &str) -> Vec<AttributeInfo> {
        self.attributes
            .iter()
            .filter(|a| a.type_name == type_name)
            .cloned()
            .collect()
    }

    fn types(&self, include_private: bool) -> Vec<TypeInfo> {
        self.types
            .iter()
            .filter(|t| include_private || t.is_public)
            .cloned()
            .collect()
    }

    fn get_type(&self, name: &str) -> Option<TypeInfo> {
        self.types.iter().find(|t| t.name == name).cloned()
    }
}
