//! The driver: a time-budgeted tick loop over the execution stack and the
//! deferred-operation queue.

use alloc::boxed::Box;
use alloc::format;
use core::any::Any;

use crate::descriptor::{
    Accessor as _, CompositeDescriptor as _, Descriptor as _, Instance, Member,
};
use crate::error::TraverseError;
use crate::impls::take_typed;
use crate::node::Node;
use crate::registry::{Describe, DescriptorRegistry};

use super::context::OpContext;
use super::cursor::{Advance, Cursor, Dest, Operation};
use super::refs::{Attach, DeferredOp, LookaheadIndex};
use super::stack::{Completed, ExecStack};
use super::{deserializer, serializer};
use super::{Report, Tick};

// -----------------------------------------------------------------------------
// Budget

/// How much work one [`Driver::tick`] call may do.
///
/// Budgets are checked only between discrete steps, never inside one, so a
/// single member's read or write always completes or is not attempted.
#[derive(Debug, Clone, Copy)]
pub enum Budget {
    /// Run to completion.
    Unlimited,
    /// Advance at most this many steps.
    Steps(usize),
    /// Stop once this much wall-clock time has elapsed.
    #[cfg(feature = "std")]
    Time(core::time::Duration),
}

enum Meter {
    Unlimited,
    Steps(usize),
    #[cfg(feature = "std")]
    Deadline(std::time::Instant),
}

impl Meter {
    fn new(budget: Budget) -> Self {
        match budget {
            Budget::Unlimited => Self::Unlimited,
            Budget::Steps(steps) => Self::Steps(steps),
            #[cfg(feature = "std")]
            Budget::Time(duration) => Self::Deadline(std::time::Instant::now() + duration),
        }
    }

    /// Whether another step may run; counts the step when it may.
    fn admit(&mut self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Steps(left) => {
                if *left == 0 {
                    false
                } else {
                    *left -= 1;
                    true
                }
            }
            #[cfg(feature = "std")]
            Self::Deadline(deadline) => std::time::Instant::now() < *deadline,
        }
    }
}

// -----------------------------------------------------------------------------
// Driver

/// Drives one serialize or deserialize operation over an object graph.
///
/// All traversal state lives in the driver, so ticking may stop at any step
/// boundary and resume arbitrarily later; any sequence of budgeted ticks
/// produces the same result as a single unbounded one.
///
/// ```
/// use trellis::{Budget, DescriptorRegistry, Driver, Tick};
///
/// let mut registry = DescriptorRegistry::new();
/// registry.register::<Vec<i32>>();
///
/// let values: Vec<i32> = (0..100).collect();
/// let mut driver = Driver::serializer(&registry, &values).unwrap();
/// while driver.tick(Budget::Steps(16)).unwrap() == Tick::Pending {}
///
/// let node = driver.into_node().unwrap();
/// assert_eq!(node.element_count(), Some(100));
/// ```
pub struct Driver<'r> {
    registry: &'r DescriptorRegistry,
    op: Operation,
    stack: ExecStack,
    ctx: OpContext,
    result: Option<Completed>,
    /// Deferred ops left in the current retry pass; 0 between passes.
    pass_remaining: usize,
    done: bool,
}

impl<'r> Driver<'r> {
    /// Prepares a serialize operation over a clone of `value`.
    pub fn serializer<T>(
        registry: &'r DescriptorRegistry,
        value: &T,
    ) -> Result<Self, TraverseError>
    where
        T: Describe + Instance,
    {
        let declared = registry.resolve(&T::type_ref())?;
        let target = (value as &dyn Instance).clone_instance();
        let mut stack = ExecStack::default();
        stack.push(Cursor::ser_root(declared, target));
        Ok(Self {
            registry,
            op: Operation::Serialize,
            stack,
            ctx: OpContext::new(),
            result: None,
            pass_remaining: 0,
            done: false,
        })
    }

    /// Prepares a deserialize operation, building the lookahead identity
    /// index in one upfront tree walk.
    pub fn deserializer<T>(registry: &'r DescriptorRegistry, node: Node) -> Result<Self, TraverseError>
    where
        T: Describe,
    {
        let declared = registry.resolve(&T::type_ref())?;
        let mut ctx = OpContext::new();
        ctx.lookahead = LookaheadIndex::build(&node);
        let mut stack = ExecStack::default();
        stack.push(Cursor::de_root(declared, node));
        Ok(Self {
            registry,
            op: Operation::Deserialize,
            stack,
            ctx,
            result: None,
            pass_remaining: 0,
            done: false,
        })
    }

    /// Advances the operation until it completes or the budget runs out,
    /// leaving all state intact for the next tick.
    pub fn tick(&mut self, budget: Budget) -> Result<Tick, TraverseError> {
        let mut meter = Meter::new(budget);
        loop {
            if self.done {
                return Ok(Tick::Complete);
            }
            if !meter.admit() {
                return Ok(Tick::Pending);
            }
            if !self.stack.is_empty() {
                self.step()?;
            } else if !self.ctx.queue.is_empty() {
                self.retry_one()?;
            } else {
                self.done = true;
                return Ok(Tick::Complete);
            }
        }
    }

    /// Whether the operation has run to completion.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// The diagnostics accumulated so far.
    #[inline]
    pub fn report(&self) -> &Report {
        &self.ctx.report
    }

    /// The produced node tree of a completed serialize operation.
    pub fn into_node(self) -> Result<Node, TraverseError> {
        match self.result {
            Some(Completed::Node(node)) => Ok(node),
            _ => Err(TraverseError::Incomplete),
        }
    }

    /// The produced root value of a completed deserialize operation.
    pub fn into_value<T: Any>(self) -> Result<T, TraverseError> {
        match self.result {
            Some(Completed::Value(value)) => Ok(take_typed::<T>(value)?),
            _ => Err(TraverseError::Incomplete),
        }
    }

    /// Advances the top cursor by one phase-step and applies the outcome.
    fn step(&mut self) -> Result<(), TraverseError> {
        let frame = self.stack.len() - 1;
        let advance = {
            let Some(cursor) = self.stack.top_mut() else {
                return Ok(());
            };
            let advanced = match self.op {
                Operation::Serialize => {
                    serializer::advance(frame, cursor, &mut self.ctx, self.registry)
                }
                Operation::Deserialize => {
                    deserializer::advance(frame, cursor, &mut self.ctx, self.registry)
                }
            };
            match advanced {
                Ok(advance) => advance,
                Err(err) => {
                    let path = self.stack.path();
                    self.ctx.note_error(format!("{err}"));
                    self.ctx.flush_notes(&path);
                    return Err(err);
                }
            }
        };
        let path = self.stack.path();
        self.ctx.flush_notes(&path);
        match advance {
            Advance::Continue => {}
            Advance::Push(child) => self.stack.push(child),
            Advance::Finished => {
                if let Some(completed) = self.stack.finish_top(self.op, &mut self.ctx)? {
                    self.result = Some(completed);
                }
            }
            Advance::DeferConstruction => self.stack.defer_top(&mut self.ctx),
        }
        let path = self.stack.path();
        self.ctx.flush_notes(&path);
        Ok(())
    }

    /// Retries one deferred operation.
    ///
    /// Retries run in passes over the queue: resolving one item can make
    /// others resolvable only within the same overall retry phase, so the
    /// queue is redrained until a pass makes no progress or it empties. A
    /// no-progress pass with items remaining is a fixed point that no future
    /// pass can break.
    fn retry_one(&mut self) -> Result<(), TraverseError> {
        if self.pass_remaining == 0 {
            if core::mem::replace(&mut self.ctx.progress, false) {
                self.pass_remaining = self.ctx.queue.len();
            } else {
                return Err(TraverseError::UnresolvedDeferrals {
                    pending: self.ctx.queue.len(),
                });
            }
        }
        let Some(op) = self.ctx.queue.pop_front() else {
            self.pass_remaining = 0;
            return Ok(());
        };
        self.pass_remaining -= 1;

        match op {
            DeferredOp::Member { mut owner, member, id } => {
                match self.ctx.forward.get(id) {
                    Some(value) => {
                        match attach_member(self.registry, &member, &mut owner, value) {
                            Ok(()) => self.ctx.progress = true,
                            Err(err) => self.ctx.note_warn(format!(
                                "could not attach deferred member `{}`: {err}",
                                member.key,
                            )),
                        }
                        self.ctx.flush_notes("$(deferred)");
                    }
                    None => {
                        // Still not instantiated; the identity is known to
                        // exist, so leave it for the next pass.
                        self.ctx
                            .queue
                            .push_back(DeferredOp::Member { owner, member, id });
                    }
                }
            }
            DeferredOp::Construction {
                descriptor,
                node,
                buffer,
                resume,
                attach,
            } => {
                let construction_steps = descriptor
                    .kind()
                    .composite()
                    .map_or(0, |composite| composite.construction_step_count());
                let dest = match attach {
                    Attach::Root => Dest::Root,
                    Attach::Into { owner, member } => Dest::Detached { owner, member },
                };
                self.stack.push(Cursor::de_resumed(
                    descriptor,
                    node,
                    buffer,
                    resume,
                    construction_steps,
                    dest,
                ));
            }
        }
        Ok(())
    }
}

/// Adopts a now-available reference into the declared member type and sets
/// it through the retained owner handle.
fn attach_member(
    registry: &DescriptorRegistry,
    member: &Member,
    owner: &mut Box<dyn Instance>,
    value: Box<dyn Instance>,
) -> Result<(), TraverseError> {
    let ty = member.ty.ok_or(TraverseError::Incomplete)?;
    let declared = registry.resolve(&ty)?;
    let adopted = declared.adopt_reference(value)?;
    member.accessor.set(&mut **owner, adopted)?;
    Ok(())
}

// -----------------------------------------------------------------------------
// One-shot entry points

/// Serializes an object graph into a node tree in one unbounded run.
///
/// Local failures are logged and leave null slots; use a [`Driver`] to
/// inspect the structured report.
pub fn serialize<T>(registry: &DescriptorRegistry, value: &T) -> Result<Node, TraverseError>
where
    T: Describe + Instance,
{
    let mut driver = Driver::serializer(registry, value)?;
    driver.tick(Budget::Unlimited)?;
    driver.into_node()
}

/// Rebuilds an object graph from a node tree in one unbounded run.
pub fn deserialize<T>(registry: &DescriptorRegistry, node: &Node) -> Result<T, TraverseError>
where
    T: Describe + Any,
{
    let mut driver = Driver::deserializer::<T>(registry, node.clone())?;
    driver.tick(Budget::Unlimited)?;
    driver.into_value::<T>()
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    fn registry() -> DescriptorRegistry {
        let mut registry = DescriptorRegistry::new();
        registry.register::<Vec<i32>>();
        registry
    }

    #[test]
    fn scalar_round_trip() {
        let registry = registry();
        let node = serialize(&registry, &41_i32).unwrap();
        let back: i32 = deserialize(&registry, &node).unwrap();
        assert_eq!(back, 41);
    }

    #[test]
    fn vec_round_trip() {
        let registry = registry();
        let values = vec![3_i32, 1, 4, 1, 5];
        let node = serialize(&registry, &values).unwrap();
        assert_eq!(node.element_count(), Some(5));
        let back: Vec<i32> = deserialize(&registry, &node).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn completed_drivers_stay_complete() {
        let registry = registry();
        let mut driver = Driver::serializer(&registry, &7_i32).unwrap();
        assert_eq!(driver.tick(Budget::Unlimited).unwrap(), Tick::Complete);
        assert_eq!(driver.tick(Budget::Steps(1)).unwrap(), Tick::Complete);
        assert!(driver.is_complete());
    }

    #[test]
    fn zero_step_budget_makes_no_progress() {
        let registry = registry();
        let mut driver = Driver::serializer(&registry, &7_i32).unwrap();
        assert_eq!(driver.tick(Budget::Steps(0)).unwrap(), Tick::Pending);
        assert_eq!(driver.tick(Budget::Unlimited).unwrap(), Tick::Complete);
        assert_eq!(driver.into_node().unwrap().kind_name(), "integer");
    }
}
