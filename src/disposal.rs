//! Release-on-shutdown registry.
//!
//! Resources are released in reverse registration order: later registrations may depend on earlier ones.
//! One failing (or panicking) release never prevents the rest from running.

use std::panic::{self, AssertUnwindSafe};

use crate::error::DisposeError;

/// A resource that must be released deterministically at shutdown.
pub trait Disposable: Send {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str {
        "resource"
    }

    fn dispose(&mut self) -> Result<(), DisposeError>;
}

/// Collects disposables created during a discoverer's lifetime.
#[derive(Default)]
pub struct DisposalTracker {
    resources: Vec<Box<dyn Disposable>>,
}

impl DisposalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Box<dyn Disposable>) {
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Release every tracked resource exactly once and return the failures that were contained.
    ///
    /// The tracker is empty afterwards, so a second call is a no-op.
    pub fn dispose(&mut self) -> Vec<DisposeError> {
        let mut failures = Vec::new();

        while let Some(mut resource) = self.resources.pop() {
            let name = resource.name().to_string();
            match panic::catch_unwind(AssertUnwindSafe(|| resource.dispose())) {
                Ok(Ok(())) => tracing::trace!(resource = %name, "released"),
                Ok(Err(e)) => {
                    tracing::warn!(resource = %name, error = %e, "release failed");
                    failures.push(e);
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    tracing::warn!(resource = %name, %reason, "release panicked");
                    failures.push(DisposeError::new(name, reason));
                }
            }
        }

        failures
    }
}

impl Drop for DisposalTracker {
    fn drop(&mut self) {
        if !self.resources.is_empty() {
            let _ = self.dispose();
        }
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
