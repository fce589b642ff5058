//! Cross-cutting per-operation state.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use super::refs::{DeferredOp, ForwardMap, LookaheadIndex, ReverseMap};
use super::report::{Report, ReportEntry, ReportLevel};

/// The mutable state threaded through every step of one operation: identity
/// maps, the lookahead index, the deferred-operation queue, and the
/// diagnostics report.
///
/// Lives for exactly one top-level serialize or deserialize invocation.
pub(crate) struct OpContext {
    pub forward: ForwardMap,
    pub reverse: ReverseMap,
    pub lookahead: LookaheadIndex,
    pub queue: VecDeque<DeferredOp>,
    /// Set whenever an identity registers, a deferred member attaches, or a
    /// resumed construction moves forward; a retry pass that clears nothing
    /// has reached a fixed point.
    pub progress: bool,
    pub report: Report,
    /// Step-local diagnostics awaiting a path; the driver flushes them with
    /// the live stack's member chain after each step.
    notes: Vec<(ReportLevel, String)>,
}

impl OpContext {
    pub fn new() -> Self {
        Self {
            forward: ForwardMap::default(),
            reverse: ReverseMap::default(),
            lookahead: LookaheadIndex::default(),
            queue: VecDeque::new(),
            progress: false,
            report: Report::default(),
            notes: Vec::new(),
        }
    }

    pub fn note_warn(&mut self, message: String) {
        self.notes.push((ReportLevel::Warning, message));
    }

    pub fn note_error(&mut self, message: String) {
        self.notes.push((ReportLevel::Error, message));
    }

    /// Moves pending notes into the report under `path`.
    pub fn flush_notes(&mut self, path: &str) {
        for (level, message) in self.notes.drain(..) {
            self.report.push(ReportEntry {
                level,
                message,
                path: path.into(),
            });
        }
    }
}
