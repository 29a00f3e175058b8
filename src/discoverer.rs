//! The discovery orchestrator.
//!
//! A [`TestFrameworkDiscoverer`] pairs one unit with one strategy. Each `find` call is scheduled on the
//! runtime's blocking pool and returns immediately; the caller observes progress only through the message
//! sink, which always ends with exactly one `DiscoveryComplete`.
//!
//! ## Run lifecycle
//!
//! 1. Acquire the message bus (queued or synchronous, per options) and the working-directory guard.
//! 2. Enumerate candidate types (all, or the single named type) and apply `is_valid_test_class`.
//! 3. Per type: create the test class, call `find_tests_for_type`. Errors and panics are reported to the
//!    diagnostic sink and enumeration moves on. A `false` return, a refused message or cancellation stops it.
//! 4. Flush the bus, release the directory guard, then emit `DiscoveryComplete` and release the bus.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use testscan_core::{
    DiagnosticMessage, DiscoverableUnit, DiscoveryMessage, TARGET_FRAMEWORK_ATTRIBUTE, TestCase, TypeInfo,
    serialize_test_case,
};

use crate::bus::{MessageBus, MessageSink, create_message_bus};
use crate::diagnostics::{DiagnosticSink, SourceInformationProvider, TracingDiagnosticSink};
use crate::disposal::{Disposable, DisposalTracker, panic_message};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::options::DiscoveryOptions;
use crate::strategy::{DiscoveryContext, DiscoveryStrategy};
use crate::workdir::WorkingDirectoryGuard;

/// Which types a run considers.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DiscoveryTarget {
    All,
    Named(String),
}

/// State shared between the discoverer and its in-flight runs.
struct Shared<S> {
    unit: Arc<dyn DiscoverableUnit>,
    strategy: S,
    source_provider: Option<Arc<dyn SourceInformationProvider>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    target_framework: OnceLock<String>,
}

/// Orchestrates discovery of one unit with one strategy.
pub struct TestFrameworkDiscoverer<S: DiscoveryStrategy> {
    shared: Arc<Shared<S>>,
    runtime: Handle,
    disposal: Mutex<DisposalTracker>,
    disposed: AtomicBool,
}

/// Builder for [`TestFrameworkDiscoverer`].
pub struct DiscovererBuilder<S: DiscoveryStrategy> {
    unit: Arc<dyn DiscoverableUnit>,
    strategy: S,
    source_provider: Option<Arc<dyn SourceInformationProvider>>,
    diagnostics: Arc<dyn DiagnosticSink>,
    runtime: Option<Handle>,
    tracked: Vec<Box<dyn Disposable>>,
}

impl<S: DiscoveryStrategy> DiscovererBuilder<S> {
    pub fn source_information_provider(mut self, provider: Arc<dyn SourceInformationProvider>) -> Self {
        self.source_provider = Some(provider);
        self
    }

    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Schedule runs on this runtime instead of the ambient one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Release `resource` when the discoverer is disposed.
    pub fn track(mut self, resource: Box<dyn Disposable>) -> Self {
        self.tracked.push(resource);
        self
    }

    pub fn build(self) -> DiscoveryResult<TestFrameworkDiscoverer<S>> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| DiscoveryError::NoRuntime)?,
        };

        let mut disposal = DisposalTracker::new();
        for resource in self.tracked {
            disposal.add(resource);
        }

        Ok(TestFrameworkDiscoverer {
            shared: Arc::new(Shared {
                unit: self.unit,
                strategy: self.strategy,
                source_provider: self.source_provider,
                diagnostics: self.diagnostics,
                target_framework: OnceLock::new(),
            }),
            runtime,
            disposal: Mutex::new(disposal),
            disposed: AtomicBool::new(false),
        })
    }
}

/// Handle to an in-flight discovery run.
///
/// Completion is signalled through the message sink; the handle only offers cooperative cancellation.
#[derive(Debug)]
pub struct FindHandle {
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl FindHandle {
    /// Stop before the next type. The run still emits `DiscoveryComplete`.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<S: DiscoveryStrategy> TestFrameworkDiscoverer<S> {
    pub fn builder(unit: Arc<dyn DiscoverableUnit>, strategy: S) -> DiscovererBuilder<S> {
        DiscovererBuilder {
            unit,
            strategy,
            source_provider: None,
            diagnostics: Arc::new(TracingDiagnosticSink),
            runtime: None,
            tracked: Vec::new(),
        }
    }

    /// Build with defaults on the ambient runtime.
    pub fn new(unit: Arc<dyn DiscoverableUnit>, strategy: S) -> DiscoveryResult<Self> {
        Self::builder(unit, strategy).build()
    }

    fn ensure_not_disposed(&self) -> DiscoveryResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(DiscoveryError::AlreadyDisposed)
        } else {
            Ok(())
        }
    }

    /// Framework name supplied by the strategy.
    pub fn display_name(&self) -> DiscoveryResult<&str> {
        self.ensure_not_disposed()?;
        Ok(self.shared.strategy.display_name())
    }

    /// Target framework label of the unit, computed on first access and cached.
    ///
    /// Empty when the unit carries no `TargetFramework` attribute.
    pub fn target_framework(&self) -> DiscoveryResult<&str> {
        self.ensure_not_disposed()?;
        Ok(self.shared.target_framework.get_or_init(|| {
            self.shared
                .unit
                .attributes(TARGET_FRAMEWORK_ATTRIBUTE)
                .first()
                .and_then(|attr| attr.first_arg())
                .unwrap_or_default()
                .to_string()
        }))
    }

    /// Discover every type in the unit in the background.
    pub fn find(
        &self,
        include_source_information: bool,
        sink: Arc<dyn MessageSink>,
        options: DiscoveryOptions,
    ) -> DiscoveryResult<FindHandle> {
        self.ensure_not_disposed()?;
        Ok(self.schedule(DiscoveryTarget::All, include_source_information, sink, options))
    }

    /// Discover a single named type in the background.
    pub fn find_type(
        &self,
        type_name: &str,
        include_source_information: bool,
        sink: Arc<dyn MessageSink>,
        options: DiscoveryOptions,
    ) -> DiscoveryResult<FindHandle> {
        self.ensure_not_disposed()?;
        if type_name.trim().is_empty() {
            return Err(DiscoveryError::empty("type_name"));
        }
        Ok(self.schedule(
            DiscoveryTarget::Named(type_name.to_string()),
            include_source_information,
            sink,
            options,
        ))
    }

    /// Stable, rehydratable text form of a test case.
    pub fn serialize(&self, test_case: &TestCase) -> DiscoveryResult<String> {
        self.ensure_not_disposed()?;
        Ok(serialize_test_case(test_case)?)
    }

    /// Annotate (when asked and possible) and emit one discovered case.
    ///
    /// Returns whether the bus accepted it; a refusal means enumeration should stop.
    pub fn report_discovered_test_case(
        &self,
        test_case: TestCase,
        include_source_information: bool,
        bus: &dyn MessageBus,
    ) -> DiscoveryResult<bool> {
        self.ensure_not_disposed()?;
        Ok(report_discovered_test_case(
            test_case,
            include_source_information,
            bus,
            self.shared.source_provider.as_deref(),
        ))
    }

    /// Release every tracked resource. A second call fails with `AlreadyDisposed`.
    pub fn dispose(&self) -> DiscoveryResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DiscoveryError::AlreadyDisposed);
        }
        let failures = self.disposal.lock().dispose();
        if !failures.is_empty() {
            tracing::debug!(count = failures.len(), "some resources failed to release");
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn schedule(
        &self,
        target: DiscoveryTarget,
        include_source_information: bool,
        sink: Arc<dyn MessageSink>,
        options: DiscoveryOptions,
    ) -> FindHandle {
        let shared = Arc::clone(&self.shared);
        let cancellation = CancellationToken::new();
        let token = cancellation.clone();

        let task = self.runtime.spawn_blocking(move || {
            shared.run(&target, include_source_information, sink, &options, &token);
        });

        FindHandle { cancellation, task }
    }
}

impl<S: DiscoveryStrategy> Shared<S> {
    #[tracing::instrument(skip_all, fields(unit = %self.unit.name(), target = ?target))]
    fn run(
        &self,
        target: &DiscoveryTarget,
        include_source_information: bool,
        sink: Arc<dyn MessageSink>,
        options: &DiscoveryOptions,
        cancellation: &CancellationToken,
    ) {
        let bus = create_message_bus(sink, options.synchronous_message_reporting);
        let directory = WorkingDirectoryGuard::acquire(self.unit.path(), options.directory_mode);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.discover(
                target,
                include_source_information,
                bus.as_ref(),
                &directory,
                options,
                cancellation,
            )
        }));
        let reported = match outcome {
            Ok(reported) => reported,
            Err(payload) => {
                self.report_failure(
                    &format!("exception during discovery of unit '{}'", self.unit.name()),
                    &panic_message(payload.as_ref()),
                );
                0
            }
        };

        // Test cases are delivered while the directory is still scoped; completion only after it is restored.
        bus.flush();
        drop(directory);
        bus.queue_message(DiscoveryMessage::DiscoveryComplete);
        bus.dispose();

        tracing::info!(discovered = reported, "discovery complete");
    }

    fn discover(
        &self,
        target: &DiscoveryTarget,
        include_source_information: bool,
        bus: &dyn MessageBus,
        directory: &WorkingDirectoryGuard,
        options: &DiscoveryOptions,
        cancellation: &CancellationToken,
    ) -> usize {
        let candidates: Vec<TypeInfo> = match target {
            DiscoveryTarget::All => self.unit.types(options.include_private_types),
            DiscoveryTarget::Named(name) => self.unit.get_type(name).into_iter().collect(),
        };

        let mut context = DiscoveryContext::new(
            self.unit.as_ref(),
            bus,
            self.source_provider.as_deref(),
            options,
            directory,
            cancellation,
            include_source_information,
        );

        for type_info in candidates {
            if cancellation.is_cancelled() {
                tracing::debug!("discovery cancelled");
                break;
            }
            if !self.strategy.is_valid_test_class(&type_info) {
                tracing::debug!(type_name = %type_info.name, "skipping: not a valid test class");
                continue;
            }
            if !self.find_tests_for_type(type_info, &mut context) || context.stop_requested() {
                tracing::debug!("stop requested; ending enumeration");
                break;
            }
        }

        context.reported()
    }

    /// Run the strategy for one type, containing any failure. Returns whether to continue.
    fn find_tests_for_type(&self, type_info: TypeInfo, context: &mut DiscoveryContext<'_>) -> bool {
        let type_name = type_info.name.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let test_class = self.strategy.create_test_class(self.unit.as_ref(), type_info);
            self.strategy.find_tests_for_type(&test_class, context)
        }));

        match outcome {
            Ok(Ok(keep_going)) => keep_going,
            Ok(Err(e)) => {
                self.report_failure(&format!("exception during discovery of type '{}'", type_name), &e.to_string());
                true
            }
            Err(payload) => {
                self.report_failure(
                    &format!("exception during discovery of type '{}'", type_name),
                    &panic_message(payload.as_ref()),
                );
                true
            }
        }
    }

    fn report_failure(&self, context: &str, reason: &str) {
        tracing::debug!(%reason, "{}", context);
        self.diagnostics
            .on_diagnostic(&DiagnosticMessage::new(format!("{}: {}", context, reason)));
    }
}

/// Fill in source information when requested and missing, then emit the discovery message.
pub(crate) fn report_discovered_test_case(
    test_case: TestCase,
    include_source_information: bool,
    bus: &dyn MessageBus,
    source_provider: Option<&dyn SourceInformationProvider>,
) -> bool {
    let test_case = match source_provider {
        Some(provider) if include_source_information && test_case.source_information().is_none() => {
            match provider.source_information(&test_case) {
                Some(info) if !info.is_empty() => test_case.with_source_information(info),
                _ => test_case,
            }
        }
        _ => test_case,
    };

    bus.queue_message(DiscoveryMessage::discovered(test_case))
}
