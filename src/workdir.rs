//! Working directory scoping for a discovery run.
//!
//! Some strategies resolve relative source paths against the directory that contains the unit under
//! inspection. Two modes are supported:
//!
//! - `CallScoped` (default): the unit's directory is computed and handed to the strategy through the discovery
//!   context. Process state is never touched, so concurrent runs cannot race each other.
//! - `Process`: the process-wide current directory is switched on acquisition and restored when the guard is
//!   dropped. Restore failures are swallowed; they must not mask the outcome of the run.

use std::env;
use std::path::{Path, PathBuf};

/// How a discovery run exposes the unit's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryMode {
    #[default]
    CallScoped,
    Process,
}

/// Scoped working directory for one discovery run.
#[derive(Debug)]
pub struct WorkingDirectoryGuard {
    original: Option<PathBuf>,
    effective: PathBuf,
    restore_on_drop: bool,
}

impl WorkingDirectoryGuard {
    /// Record the current directory and, when the unit has a known path, scope the run to its directory.
    pub fn acquire(unit_path: Option<&Path>, mode: DirectoryMode) -> Self {
        let original = env::current_dir().ok();
        let fallback = original.clone().unwrap_or_else(|| PathBuf::from("."));

        let Some(target) = unit_path.map(|p| containing_directory(p, original.as_deref())) else {
            return Self {
                original,
                effective: fallback,
                restore_on_drop: false,
            };
        };

        match mode {
            DirectoryMode::CallScoped => Self {
                original,
                effective: target,
                restore_on_drop: false,
            },
            DirectoryMode::Process => match env::set_current_dir(&target) {
                Ok(()) => {
                    tracing::debug!(directory = %target.display(), "switched working directory");
                    Self {
                        original,
                        effective: target,
                        restore_on_drop: true,
                    }
                }
                Err(e) => {
                    tracing::debug!(directory = %target.display(), error = %e, "could not switch working directory");
                    Self {
                        original,
                        effective: fallback,
                        restore_on_drop: false,
                    }
                }
            },
        }
    }

    /// Directory the run should treat as current.
    pub fn directory(&self) -> &Path {
        &self.effective
    }

    /// Resolve a possibly relative path against the run's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.effective.join(path)
        }
    }
}

impl Drop for WorkingDirectoryGuard {
    fn drop(&mut self) {
        if !self.restore_on_drop {
            return;
        }
        if let Some(original) = &self.original {
            if let Err(e) = env::set_current_dir(original) {
                tracing::debug!(directory = %original.display(), error = %e, "could not restore working directory");
            }
        }
    }
}

/// Absolute directory containing `unit_path`.
fn containing_directory(unit_path: &Path, cwd: Option<&Path>) -> PathBuf {
    let absolute = match cwd {
        Some(cwd) if unit_path.is_relative() => cwd.join(unit_path),
        _ => unit_path.to_path_buf(),
    };
    match absolute.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => cwd.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")),
    }
}
