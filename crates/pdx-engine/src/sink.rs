//! Where diagnostics go once they are ready.

use pdx_parse::Diagnostic;

use crate::orchestrator::Phase;

/// One phase worth of diagnostics for one document version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticBatch {
    pub phase: Phase,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBatch {
    pub fn new(phase: Phase, diagnostics: Vec<Diagnostic>) -> Self {
        Self { phase, diagnostics }
    }
}

/// Receives diagnostics from the scheduler.
///
/// Calls for one uri arrive in non-decreasing version order, and for a given
/// version the syntax batch precedes the semantic batch. Implementations must
/// not block; hand the batch off to another task if delivery is slow.
pub trait DiagnosticsSink: Send + Sync + 'static {
    fn publish(&self, uri: &str, version: u64, batch: DiagnosticBatch);

    /// The document was closed; anything published for it is obsolete.
    fn clear(&self, uri: &str) {
        let _ = uri;
    }
}
