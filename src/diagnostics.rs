// ABOUTME: Diagnostics accumulator for non-fatal warnings during a command.
// ABOUTME: Collects problems that shouldn't fail the command but should be shown to users.

use crate::backend::BackendKind;
use crate::output::Output;

/// Collects non-fatal warnings while a command runs.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Print every collected warning.
    pub fn emit(&self, output: &Output) {
        for warning in &self.warnings {
            output.warning(&warning.message);
        }
    }
}

/// A non-fatal warning collected during a command.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a warning for something prune could not clean up.
    pub fn prune_cleanup(backend: BackendKind, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::PruneCleanup,
            message: format!("{}: {}", backend, message.into()),
        }
    }

    /// Create a warning for a backend that was skipped because it is unreachable.
    pub fn backend_skipped(backend: BackendKind) -> Self {
        Self {
            kind: WarningKind::BackendSkipped,
            message: format!("the '{}' backend is unavailable and was skipped", backend),
        }
    }
}

/// Categories of warnings that can occur during a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A prune pass left something behind.
    PruneCleanup,
    /// A backend could not be reached.
    BackendSkipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::prune_cleanup(BackendKind::Ostree, "failed to remove etcd.1"));
        diag.warn(Warning::backend_skipped(BackendKind::Docker));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(diag.warnings()[0].message, "ostree: failed to remove etcd.1");
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        let prune = Warning::prune_cleanup(BackendKind::Ostree, "test");
        assert_eq!(prune.kind, WarningKind::PruneCleanup);

        let skipped = Warning::backend_skipped(BackendKind::Docker);
        assert_eq!(skipped.kind, WarningKind::BackendSkipped);
    }

    #[test]
    fn emit_prints_each_warning() {
        let (output, captured) = Output::captured(OutputMode::Normal);
        let mut diag = Diagnostics::default();
        diag.warn(Warning::backend_skipped(BackendKind::Ostree));
        diag.emit(&output);
        assert_eq!(
            captured.stderr(),
            "Warning: the 'ostree' backend is unavailable and was skipped\n"
        );
    }
}
