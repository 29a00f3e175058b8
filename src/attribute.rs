//! Reference strategy: attribute-driven test discovery.
//!
//! Methods become tests based on their attributes:
//!
//! - `Fact`: one test case.
//! - `Theory`: one case per `InlineData` row when theories are pre-enumerated, otherwise a single case.
//! - `Skip = "reason"` (named argument on `Fact`/`Theory`): the case is reported with a skip reason.
//! - `Trait("Name", "Value")` on the method or the class: attached as a trait.
//! - `SourceFile("path", "line")`: explicit source location, resolved against the run's working directory.
//!
//! `InlineData` arguments are parsed as JSON when possible (`1`, `true`, `"text"`), and kept as plain
//! strings otherwise.

use std::path::Path;

use serde_json::Value;

use testscan_core::{AttributeInfo, DiscoverableUnit, MethodInfo, SourceInformation, TestCase, TypeInfo};

use crate::error::StrategyError;
use crate::strategy::{DiscoveryContext, DiscoveryStrategy, TestClass};

pub const FACT_ATTRIBUTE: &str = "Fact";
pub const THEORY_ATTRIBUTE: &str = "Theory";
pub const INLINE_DATA_ATTRIBUTE: &str = "InlineData";
pub const TRAIT_ATTRIBUTE: &str = "Trait";
pub const SOURCE_FILE_ATTRIBUTE: &str = "SourceFile";
const SKIP_ARGUMENT: &str = "Skip";

#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeStrategy;

impl AttributeStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DiscoveryStrategy for AttributeStrategy {
    type TestClass = TestClass;

    fn display_name(&self) -> &str {
        "testscan attribute strategy"
    }

    fn create_test_class(&self, unit: &dyn DiscoverableUnit, type_info: TypeInfo) -> TestClass {
        TestClass::new(unit, type_info)
    }

    fn find_tests_for_type(
        &self,
        test_class: &TestClass,
        context: &mut DiscoveryContext<'_>,
    ) -> Result<bool, StrategyError> {
        for method in &test_class.type_info.methods {
            if context.is_cancelled() {
                return Ok(false);
            }
            for test_case in cases_for_method(test_class, method, context)? {
                if !context.report(test_case) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn cases_for_method(
    test_class: &TestClass,
    method: &MethodInfo,
    context: &DiscoveryContext<'_>,
) -> Result<Vec<TestCase>, StrategyError> {
    let member = format!("{}.{}", test_class.name(), method.name);
    let fact = method.attributes_of(FACT_ATTRIBUTE).next();
    let theory = method.attributes_of(THEORY_ATTRIBUTE).next();

    let (marker, is_theory) = match (fact, theory) {
        (None, None) => return Ok(Vec::new()),
        (Some(_), Some(_)) => {
            return Err(StrategyError::MalformedAttribute {
                attribute: THEORY_ATTRIBUTE.to_string(),
                member,
                reason: "a method cannot be both a Fact and a Theory".to_string(),
            });
        }
        (Some(fact), None) => (fact, false),
        (None, Some(theory)) => (theory, true),
    };

    let traits = collect_traits(test_class, method, &member)?;
    let source = source_location(method, &member, context)?;
    let skip = marker.named_arg(SKIP_ARGUMENT);

    let base = || {
        let mut builder = TestCase::builder(&test_class.unit_name, test_class.name(), &method.name);
        for (name, value) in &traits {
            builder = builder.add_trait(name.as_str(), value.as_str());
        }
        if let Some(reason) = skip {
            builder = builder.skip_reason(reason);
        }
        if let Some(info) = &source {
            builder = builder.source_information(info.clone());
        }
        builder
    };

    let rows: Vec<&AttributeInfo> = method.attributes_of(INLINE_DATA_ATTRIBUTE).collect();
    // Skipped theories are never expanded; there is nothing to run per row.
    if is_theory && skip.is_none() && context.options().pre_enumerate_theories && !rows.is_empty() {
        return Ok(rows
            .into_iter()
            .map(|row| base().arguments(row.args.iter().map(|a| parse_argument(a.as_str())).collect()).build())
            .collect());
    }

    Ok(vec![base().build()])
}

fn collect_traits(
    test_class: &TestClass,
    method: &MethodInfo,
    member: &str,
) -> Result<Vec<(String, String)>, StrategyError> {
    test_class
        .type_info
        .attributes_of(TRAIT_ATTRIBUTE)
        .chain(method.attributes_of(TRAIT_ATTRIBUTE))
        .map(|attr| match attr.args.as_slice() {
            [name, value, ..] => Ok((name.clone(), value.clone())),
            _ => Err(StrategyError::MalformedAttribute {
                attribute: TRAIT_ATTRIBUTE.to_string(),
                member: member.to_string(),
                reason: "expected a name and a value".to_string(),
            }),
        })
        .collect()
}

fn source_location(
    method: &MethodInfo,
    member: &str,
    context: &DiscoveryContext<'_>,
) -> Result<Option<SourceInformation>, StrategyError> {
    let Some(attr) = method.attributes_of(SOURCE_FILE_ATTRIBUTE).next() else {
        return Ok(None);
    };
    let Some(file) = attr.first_arg() else {
        return Err(StrategyError::MalformedAttribute {
            attribute: SOURCE_FILE_ATTRIBUTE.to_string(),
            member: member.to_string(),
            reason: "missing file path".to_string(),
        });
    };
    let line = match attr.args.get(1) {
        Some(raw) => Some(raw.parse::<u32>().map_err(|e| StrategyError::MalformedAttribute {
            attribute: SOURCE_FILE_ATTRIBUTE.to_string(),
            member: member.to_string(),
            reason: format!("invalid line number '{}': {}", raw, e),
        })?),
        None => None,
    };

    let resolved = context.resolve_path(Path::new(file));
    Ok(Some(SourceInformation::new(resolved.to_string_lossy(), line)))
}

fn parse_argument(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
