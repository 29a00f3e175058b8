//! Behavioural tests for the discovery orchestrator
//!
//! Every test drives a real `TestFrameworkDiscoverer` on a multi-threaded runtime and observes it only through
//! the message sink and diagnostic sink, the way a host would.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use testscan::{
    AttributeInfo, DiagnosticMessage, DiagnosticSink, DiscoverableUnit, DiscoveryContext, DiscoveryError,
    DiscoveryMessage, DiscoveryOptions, DiscoveryStrategy, Disposable, DisposeError, FindHandle, MessageSink,
    MethodInfo, SourceInformation, StrategyError, TestCase, TestClass, TestFrameworkDiscoverer, TypeInfo,
    UnitDescriptor, deserialize_test_case,
};

// =============================================================================
// Harness
// =============================================================================

/// Records every message and wakes the test when `DiscoveryComplete` arrives.
#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<DiscoveryMessage>>,
    complete: Notify,
    stop_after: Option<usize>,
}

impl Recorder {
    fn stopping_after(count: usize) -> Self {
        Self {
            stop_after: Some(count),
            ..Self::default()
        }
    }

    async fn wait(&self) -> Vec<DiscoveryMessage> {
        tokio::time::timeout(Duration::from_secs(10), self.complete.notified())
            .await
            .expect("discovery did not complete in time");
        self.messages.lock().clone()
    }
}

impl MessageSink for Recorder {
    fn on_message(&self, message: &DiscoveryMessage) -> bool {
        let seen = {
            let mut messages = self.messages.lock();
            messages.push(message.clone());
            messages.len()
        };
        if message.is_terminal() {
            self.complete.notify_one();
        }
        self.stop_after.is_none_or(|limit| seen < limit)
    }
}

fn diagnostics() -> (Arc<Mutex<Vec<String>>>, Arc<dyn DiagnosticSink>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let sink: Arc<dyn DiagnosticSink> =
        Arc::new(move |m: &DiagnosticMessage| recorder.lock().push(m.message.clone()));
    (seen, sink)
}

fn discovered_names(messages: &[DiscoveryMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(DiscoveryMessage::test_case)
        .map(|tc| format!("{}.{}", tc.class_name(), tc.method_name()))
        .collect()
}

fn assert_single_trailing_completion(messages: &[DiscoveryMessage]) {
    let completions = messages.iter().filter(|m| m.is_terminal()).count();
    assert_eq!(completions, 1, "expected exactly one completion in {messages:?}");
    assert!(messages.last().is_some_and(DiscoveryMessage::is_terminal));
}

async fn wait_finished(handle: &FindHandle) {
    for _ in 0..500 {
        if handle.is_finished() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("discovery task did not finish");
}

fn test_type(name: &str) -> TypeInfo {
    TypeInfo::new(name).with_method(MethodInfo::new("Runs"))
}

fn unit_with(types: Vec<TypeInfo>) -> Arc<dyn DiscoverableUnit> {
    let unit = types
        .into_iter()
        .fold(UnitDescriptor::new("Sample.Tests"), UnitDescriptor::with_type);
    Arc::new(unit)
}

/// Reports one case per method. Type names drive failure modes:
/// `Throws*` returns an error, `Panics*` panics while discovering, `BrokenCtor*` panics while being wrapped,
/// `Halts*` reports its cases and then asks to stop.
#[derive(Default)]
struct ScriptedStrategy {
    created: Arc<Mutex<Vec<String>>>,
}

impl DiscoveryStrategy for ScriptedStrategy {
    type TestClass = TestClass;

    fn display_name(&self) -> &str {
        "scripted"
    }

    fn create_test_class(&self, unit: &dyn DiscoverableUnit, type_info: TypeInfo) -> TestClass {
        if type_info.name.starts_with("BrokenCtor") {
            panic!("cannot wrap {}", type_info.name);
        }
        self.created.lock().push(type_info.name.clone());
        TestClass::new(unit, type_info)
    }

    fn find_tests_for_type(
        &self,
        test_class: &TestClass,
        context: &mut DiscoveryContext<'_>,
    ) -> Result<bool, StrategyError> {
        let name = test_class.name();
        if name.starts_with("Throws") {
            return Err(StrategyError::other("boom"));
        }
        if name.starts_with("Panics") {
            panic!("kaboom");
        }
        for method in &test_class.type_info.methods {
            let test_case = TestCase::builder(&test_class.unit_name, name, &method.name).build();
            if !context.report(test_case) {
                return Ok(false);
            }
        }
        Ok(!name.starts_with("Halts"))
    }
}

fn discoverer(unit: Arc<dyn DiscoverableUnit>) -> (TestFrameworkDiscoverer<ScriptedStrategy>, Arc<Mutex<Vec<String>>>) {
    let strategy = ScriptedStrategy::default();
    let created = Arc::clone(&strategy.created);
    let discoverer = TestFrameworkDiscoverer::new(unit, strategy).unwrap();
    (discoverer, created)
}

fn both_buses() -> [DiscoveryOptions; 2] {
    [
        DiscoveryOptions::new(),
        DiscoveryOptions::new().with_synchronous_message_reporting(true),
    ]
}

// =============================================================================
// Completion and filtering
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_abstract_base_is_filtered_and_concrete_types_are_discovered() {
    for options in both_buses() {
        let unit = unit_with(vec![
            test_type("AbstractBase").with_abstract(true),
            test_type("ConcreteA"),
            test_type("ConcreteB"),
        ]);
        let (discoverer, created) = discoverer(unit);
        let recorder = Arc::new(Recorder::default());

        discoverer.find(false, recorder.clone(), options).unwrap();
        let messages = recorder.wait().await;

        assert_eq!(discovered_names(&messages), vec!["ConcreteA.Runs", "ConcreteB.Runs"]);
        assert_single_trailing_completion(&messages);
        assert_eq!(*created.lock(), vec!["ConcreteA", "ConcreteB"]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sealed_abstract_types_are_kept() {
    let unit = unit_with(vec![test_type("StaticHelpers").with_abstract(true).with_sealed(true)]);
    let (discoverer, _) = discoverer(unit);
    let recorder = Arc::new(Recorder::default());

    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;

    assert_eq!(discovered_names(&messages), vec!["StaticHelpers.Runs"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_unit_still_completes() {
    for options in both_buses() {
        let (discoverer, _) = discoverer(unit_with(Vec::new()));
        let recorder = Arc::new(Recorder::default());

        discoverer.find(false, recorder.clone(), options).unwrap();
        let messages = recorder.wait().await;

        assert_eq!(messages, vec![DiscoveryMessage::DiscoveryComplete]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_private_types_require_opt_in() {
    let unit = unit_with(vec![test_type("Visible"), test_type("Hidden").with_public(false)]);
    let (discoverer, _) = discoverer(unit);

    let recorder = Arc::new(Recorder::default());
    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    assert_eq!(discovered_names(&recorder.wait().await), vec!["Visible.Runs"]);

    let recorder = Arc::new(Recorder::default());
    let options = DiscoveryOptions::new().with_include_private_types(true);
    discoverer.find(false, recorder.clone(), options).unwrap();
    assert_eq!(discovered_names(&recorder.wait().await), vec!["Visible.Runs", "Hidden.Runs"]);
}

// =============================================================================
// Failure containment
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_failing_types_become_diagnostics_and_enumeration_continues() {
    for options in both_buses() {
        let unit = unit_with(vec![
            test_type("ThrowsOnDiscover"),
            test_type("PanicsOnDiscover"),
            test_type("BrokenCtorType"),
            test_type("Healthy"),
        ]);
        let strategy = ScriptedStrategy::default();
        let (diagnostics, sink) = diagnostics();
        let discoverer = TestFrameworkDiscoverer::builder(unit, strategy)
            .diagnostic_sink(sink)
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());

        discoverer.find(false, recorder.clone(), options).unwrap();
        let messages = recorder.wait().await;

        assert_eq!(discovered_names(&messages), vec!["Healthy.Runs"]);
        assert_single_trailing_completion(&messages);

        let diagnostics = diagnostics.lock();
        assert_eq!(
            *diagnostics,
            vec![
                "exception during discovery of type 'ThrowsOnDiscover': boom",
                "exception during discovery of type 'PanicsOnDiscover': kaboom",
                "exception during discovery of type 'BrokenCtorType': cannot wrap BrokenCtorType",
            ]
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_working_directory_is_unchanged_even_when_every_type_fails() {
    let before = env::current_dir().unwrap();
    let unit: Arc<dyn DiscoverableUnit> = Arc::new(
        UnitDescriptor::new("Sample.Tests")
            .with_path("/nonexistent/testscan/bin/Sample.Tests.dll")
            .with_type(test_type("ThrowsA"))
            .with_type(test_type("PanicsB")),
    );
    let (discoverer, _) = discoverer(unit);
    let recorder = Arc::new(Recorder::default());

    let handle = discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;
    wait_finished(&handle).await;

    assert_eq!(messages, vec![DiscoveryMessage::DiscoveryComplete]);
    assert_eq!(env::current_dir().unwrap(), before);
}

// =============================================================================
// Stopping
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_strategy_returning_false_halts_enumeration() {
    let unit = unit_with(vec![test_type("HaltsHere"), test_type("NeverSeen")]);
    let (discoverer, created) = discoverer(unit);
    let recorder = Arc::new(Recorder::default());

    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;

    assert_eq!(discovered_names(&messages), vec!["HaltsHere.Runs"]);
    assert_single_trailing_completion(&messages);
    assert_eq!(*created.lock(), vec!["HaltsHere"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sink_refusal_stops_enumeration() {
    let unit = unit_with(vec![test_type("First"), test_type("Second"), test_type("Third")]);
    let (discoverer, created) = discoverer(unit);
    let recorder = Arc::new(Recorder::stopping_after(1));

    let options = DiscoveryOptions::new().with_synchronous_message_reporting(true);
    discoverer.find(false, recorder.clone(), options).unwrap();
    let messages = recorder.wait().await;

    assert_eq!(discovered_names(&messages), vec!["First.Runs"]);
    assert_single_trailing_completion(&messages);
    assert_eq!(*created.lock(), vec!["First"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sink_refusal_on_queued_bus_still_completes() {
    let types = (0..50).map(|i| test_type(&format!("Type{i:02}"))).collect();
    let (discoverer, _) = discoverer(unit_with(types));
    let recorder = Arc::new(Recorder::stopping_after(3));

    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;

    assert_single_trailing_completion(&messages);
    assert_eq!(discovered_names(&messages), vec!["Type00.Runs", "Type01.Runs", "Type02.Runs"]);
}

/// Blocks inside the first type until the test lets it go.
struct GatedStrategy {
    gate: Arc<Barrier>,
}

impl DiscoveryStrategy for GatedStrategy {
    type TestClass = TestClass;

    fn display_name(&self) -> &str {
        "gated"
    }

    fn create_test_class(&self, unit: &dyn DiscoverableUnit, type_info: TypeInfo) -> TestClass {
        TestClass::new(unit, type_info)
    }

    fn find_tests_for_type(
        &self,
        test_class: &TestClass,
        context: &mut DiscoveryContext<'_>,
    ) -> Result<bool, StrategyError> {
        if test_class.name() == "First" {
            self.gate.wait();
            self.gate.wait();
        }
        context.report(TestCase::builder(&test_class.unit_name, test_class.name(), "Runs").build());
        Ok(true)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancellation_stops_before_the_next_type_and_still_completes() {
    let gate = Arc::new(Barrier::new(2));
    let unit = unit_with(vec![test_type("First"), test_type("Second")]);
    let discoverer = TestFrameworkDiscoverer::new(unit, GatedStrategy { gate: Arc::clone(&gate) }).unwrap();
    let recorder = Arc::new(Recorder::default());

    let handle = discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    gate.wait();
    handle.cancel();
    gate.wait();

    let messages = recorder.wait().await;
    assert_eq!(discovered_names(&messages), vec!["First.Runs"]);
    assert_single_trailing_completion(&messages);
    assert!(handle.cancellation_token().is_cancelled());
}

// =============================================================================
// find_type
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_find_type_discovers_only_the_named_type() {
    let unit = unit_with(vec![test_type("ConcreteA"), test_type("ConcreteB")]);
    let (discoverer, _) = discoverer(unit);
    let recorder = Arc::new(Recorder::default());

    discoverer
        .find_type("ConcreteB", false, recorder.clone(), DiscoveryOptions::new())
        .unwrap();
    let messages = recorder.wait().await;

    assert_eq!(discovered_names(&messages), vec!["ConcreteB.Runs"]);
    assert_single_trailing_completion(&messages);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_type_absent_or_filtered_yields_only_completion() {
    for name in ["Missing", "AbstractBase"] {
        let unit = unit_with(vec![test_type("AbstractBase").with_abstract(true)]);
        let (discoverer, _) = discoverer(unit);
        let recorder = Arc::new(Recorder::default());

        discoverer
            .find_type(name, false, recorder.clone(), DiscoveryOptions::new())
            .unwrap();

        assert_eq!(recorder.wait().await, vec![DiscoveryMessage::DiscoveryComplete]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_type_rejects_empty_name_before_scheduling() {
    let (discoverer, _) = discoverer(unit_with(vec![test_type("ConcreteA")]));
    let recorder = Arc::new(Recorder::default());

    for name in ["", "   "] {
        let err = discoverer
            .find_type(name, false, recorder.clone(), DiscoveryOptions::new())
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidArgument { name: "type_name", .. }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(recorder.messages.lock().is_empty());
}

// =============================================================================
// Source information
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_source_information_is_attached_only_when_requested() {
    let unit = unit_with(vec![test_type("ConcreteA")]);
    let discoverer = TestFrameworkDiscoverer::builder(unit, ScriptedStrategy::default())
        .source_information_provider(Arc::new(|tc: &TestCase| {
            Some(SourceInformation::new(format!("{}.cs", tc.class_name()), Some(3)))
        }))
        .build()
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    discoverer.find(true, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;
    let info = messages[0].test_case().unwrap().source_information().unwrap();
    assert_eq!(info, &SourceInformation::new("ConcreteA.cs", Some(3)));

    let recorder = Arc::new(Recorder::default());
    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;
    assert!(messages[0].test_case().unwrap().source_information().is_none());
}

// =============================================================================
// Target framework
// =============================================================================

/// Unit that counts how often its attributes are read.
struct CountingUnit {
    inner: UnitDescriptor,
    attribute_reads: AtomicUsize,
}

impl DiscoverableUnit for CountingUnit {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn path(&self) -> Option<&std::path::Path> {
        self.inner.path()
    }

    fn attributes(&self, type_name: &str) -> Vec<AttributeInfo> {
        self.attribute_reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        self.inner.attributes(type_name)
    }

    fn types(&self, include_private: bool) -> Vec<TypeInfo> {
        self.inner.types(include_private)
    }

    fn get_type(&self, name: &str) -> Option<TypeInfo> {
        self.inner.get_type(name)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_target_framework_is_computed_once_under_concurrent_access() {
    let unit = Arc::new(CountingUnit {
        inner: UnitDescriptor::new("Sample.Tests")
            .with_attribute(AttributeInfo::new("TargetFramework").with_arg(".NETCoreApp,Version=v8.0")),
        attribute_reads: AtomicUsize::new(0),
    });
    let (discoverer, _) = discoverer(unit.clone());

    let shared = &discoverer;
    let labels: Vec<String> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(move |_| scope.spawn(move || shared.target_framework().unwrap().to_string()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert!(labels.iter().all(|l| l == ".NETCoreApp,Version=v8.0"));
    assert_eq!(unit.attribute_reads.load(Ordering::SeqCst), 1);

    assert_eq!(discoverer.target_framework().unwrap(), ".NETCoreApp,Version=v8.0");
    assert_eq!(unit.attribute_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_target_framework_is_empty_without_attribute() {
    let (discoverer, _) = discoverer(unit_with(Vec::new()));
    assert_eq!(discoverer.target_framework().unwrap(), "");
    assert_eq!(discoverer.display_name().unwrap(), "scripted");
}

// =============================================================================
// Serialization
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_serialize_rehydrates_discovered_cases() {
    let (discoverer, _) = discoverer(unit_with(vec![test_type("ConcreteA")]));
    let recorder = Arc::new(Recorder::default());

    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = recorder.wait().await;
    let original = messages[0].test_case().unwrap();

    let serialized = discoverer.serialize(original).unwrap();
    assert_eq!(serialized, discoverer.serialize(original).unwrap());
    assert_eq!(&deserialize_test_case(&serialized).unwrap(), original);
}

// =============================================================================
// Disposal
// =============================================================================

struct Tracked {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl Disposable for Tracked {
    fn name(&self) -> &str {
        self.name
    }

    fn dispose(&mut self) -> Result<(), DisposeError> {
        self.log.lock().push(self.name);
        if self.fail {
            Err(DisposeError::new(self.name, "locked"))
        } else {
            Ok(())
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dispose_releases_tracked_resources_once_and_rejects_reuse() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let tracked = |name, fail| {
        Box::new(Tracked {
            name,
            log: Arc::clone(&log),
            fail,
        })
    };
    let discoverer = TestFrameworkDiscoverer::builder(unit_with(Vec::new()), ScriptedStrategy::default())
        .track(tracked("cache", false))
        .track(tracked("index", true))
        .track(tracked("reader", false))
        .build()
        .unwrap();

    discoverer.dispose().unwrap();
    assert!(discoverer.is_disposed());
    assert_eq!(*log.lock(), vec!["reader", "index", "cache"]);

    assert!(matches!(discoverer.dispose(), Err(DiscoveryError::AlreadyDisposed)));
    assert_eq!(log.lock().len(), 3);

    let recorder = Arc::new(Recorder::default());
    assert!(matches!(
        discoverer.find(false, recorder.clone(), DiscoveryOptions::new()),
        Err(DiscoveryError::AlreadyDisposed)
    ));
    assert!(matches!(discoverer.target_framework(), Err(DiscoveryError::AlreadyDisposed)));
    assert!(matches!(discoverer.display_name(), Err(DiscoveryError::AlreadyDisposed)));
}

// =============================================================================
// Runtime
// =============================================================================

#[test]
fn test_build_without_runtime_fails_synchronously() {
    let result = TestFrameworkDiscoverer::new(unit_with(Vec::new()), ScriptedStrategy::default());
    assert!(matches!(result, Err(DiscoveryError::NoRuntime)));
}

#[test]
fn test_explicit_runtime_handle_schedules_without_ambient_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
    let discoverer = TestFrameworkDiscoverer::builder(unit_with(vec![test_type("ConcreteA")]), ScriptedStrategy::default())
        .runtime(runtime.handle().clone())
        .build()
        .unwrap();
    let recorder = Arc::new(Recorder::default());

    discoverer.find(false, recorder.clone(), DiscoveryOptions::new()).unwrap();
    let messages = runtime.block_on(recorder.wait());

    assert_eq!(discovered_names(&messages), vec!["ConcreteA.Runs"]);
}
