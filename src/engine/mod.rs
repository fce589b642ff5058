//! The incremental traversal engine.
//!
//! A [`Driver`] walks an object graph and its node tree in lock-step as a
//! cooperative, pausable state machine: an explicit stack of per-node
//! cursors replaces call-stack recursion, identity references (forward and
//! circular included) resolve across retry passes over a deferred-operation
//! queue, and constructor-based creation interleaves with field population.
//!
//! Suspension is cooperative and explicit: [`Driver::tick`] checks its
//! [`Budget`] only between discrete steps, and a paused driver resumes
//! exactly where it stopped.

mod context;
mod cursor;
mod deserializer;
mod driver;
mod refs;
mod report;
mod serializer;
mod stack;

pub use driver::{Budget, Driver, deserialize, serialize};
pub use report::{Report, ReportEntry, ReportLevel};

/// The outcome of one [`Driver::tick`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The budget ran out with work remaining; tick again to continue.
    Pending,
    /// The operation has run to completion.
    Complete,
}
