//! The execution stack.
//!
//! An explicit, index-addressable stack of [`Cursor`]s replaces native
//! call-stack recursion. Index addressing matters for write-back: a popped
//! value-semantics child is set into its owner frame's target, and when that
//! write produces a *replacement* owner (the copy-on-write re-boxing case)
//! the owner frame's target is swapped for the new instance, so the
//! replacement propagates further when the ancestor itself pops. The rule
//! composes over arbitrarily deep chains of nested value-semantics
//! containers, one frame hop at a time.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use crate::descriptor::{Accessor as _, Descriptor as _, Instance, MemberKey, Written};
use crate::node::Node;

use super::context::OpContext;
use super::cursor::{Cursor, Dest, Operation, Phase};
use super::refs::{Attach, DeferredOp};

// -----------------------------------------------------------------------------
// Completed

/// The result of the frame that carried the operation's root.
pub(crate) enum Completed {
    Node(Node),
    Value(Box<dyn Instance>),
}

// -----------------------------------------------------------------------------
// ExecStack

#[derive(Default)]
pub(crate) struct ExecStack {
    frames: Vec<Cursor>,
}

impl ExecStack {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn push(&mut self, cursor: Cursor) {
        self.frames.push(cursor);
    }

    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut Cursor> {
        self.frames.last_mut()
    }

    /// Renders the owner/member chain of the live stack as a path, for
    /// diagnostics.
    pub fn path(&self) -> String {
        let mut path = String::from("$");
        for frame in &self.frames {
            if matches!(frame.dest, Dest::Detached { .. }) {
                path.push_str("(deferred)");
            }
            match frame.dest.key() {
                Some(MemberKey::Name(name)) => {
                    let _ = write!(path, ".{name}");
                }
                Some(MemberKey::Index(index)) => {
                    let _ = write!(path, "[{index}]");
                }
                None => {}
            }
        }
        path
    }

    /// Pops the finished top cursor and writes its result back to its
    /// destination. Returns the operation result when the popped frame
    /// carried it.
    pub fn finish_top(
        &mut self,
        op: Operation,
        ctx: &mut OpContext,
    ) -> Result<Option<Completed>, crate::error::TraverseError> {
        let Some(cursor) = self.frames.pop() else {
            return Ok(None);
        };
        match op {
            Operation::Serialize => self.finish_serialized(cursor),
            Operation::Deserialize => self.finish_deserialized(cursor, ctx),
        }
    }

    fn finish_serialized(
        &mut self,
        cursor: Cursor,
    ) -> Result<Option<Completed>, crate::error::TraverseError> {
        match cursor.dest {
            Dest::Root => Ok(Some(Completed::Node(cursor.node))),
            Dest::MemberOf { frame, member } => {
                if let Some(owner) = self.frames.get_mut(frame) {
                    owner.node.attach(&member.key, cursor.node);
                }
                Ok(None)
            }
            // Serialization reads members in place; these destinations only
            // arise while deserializing.
            Dest::SlotOf { .. } | Dest::Detached { .. } => Ok(None),
        }
    }

    fn finish_deserialized(
        &mut self,
        cursor: Cursor,
        ctx: &mut OpContext,
    ) -> Result<Option<Completed>, crate::error::TraverseError> {
        let value = match (cursor.write_back, cursor.target) {
            (true, Some(value)) => value,
            _ => {
                return match cursor.dest {
                    Dest::Root => Err(crate::error::TraverseError::Construct {
                        type_path: cursor.descriptor.type_path().into(),
                        message: "the root object could not be produced".into(),
                    }),
                    _ => Ok(None),
                };
            }
        };
        match cursor.dest {
            Dest::Root => Ok(Some(Completed::Value(value))),
            Dest::MemberOf { frame, member } => {
                let Some(owner) = self.frames.get_mut(frame) else {
                    return Ok(None);
                };
                let Some(owner_target) = owner.target.as_deref_mut() else {
                    return Ok(None);
                };
                match member.accessor.set(owner_target, value) {
                    Ok(Written::InPlace) => {}
                    Ok(Written::Replaced(replacement)) => {
                        owner.target = Some(replacement);
                    }
                    Err(err) => {
                        ctx.note_warn(format!("could not write member `{}`: {err}", member.key));
                    }
                }
                Ok(None)
            }
            Dest::SlotOf { frame, slot, .. } => {
                if let Some(owner) = self.frames.get_mut(frame) {
                    owner.buffer.fill(slot, value);
                    if owner.resumed {
                        ctx.progress = true;
                    }
                }
                Ok(None)
            }
            Dest::Detached { mut owner, member } => {
                match member.accessor.set(&mut *owner, value) {
                    Ok(_) => ctx.progress = true,
                    Err(err) => {
                        ctx.note_warn(format!("could not write member `{}`: {err}", member.key));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Discards the top cursor, queuing its construction for a later retry.
    ///
    /// A discarded construction whose destination was a constructor slot
    /// converts its constructing ancestors too: the child's node is restored
    /// into the parent's and the *outermost* enclosing construction is queued
    /// with its own buffer, resuming at the slot that failed. Population
    /// owners keep running; the queued construction re-attaches through a
    /// live owner handle once it completes.
    pub fn defer_top(&mut self, ctx: &mut OpContext) {
        let Some(cursor) = self.frames.pop() else {
            return;
        };
        debug_assert_eq!(cursor.phase, Phase::Construction);

        let mut descriptor = cursor.descriptor;
        let mut node = cursor.node;
        let mut buffer = cursor.buffer;
        let mut resume = cursor.step;
        let mut dest = cursor.dest;

        let attach = loop {
            match dest {
                Dest::SlotOf { slot, key, .. } => {
                    let Some(parent) = self.frames.pop() else {
                        return;
                    };
                    let mut parent_node = parent.node;
                    parent_node.restore_member(&key, node);
                    descriptor = parent.descriptor;
                    node = parent_node;
                    buffer = parent.buffer;
                    resume = slot;
                    dest = parent.dest;
                }
                Dest::MemberOf { frame, member } => {
                    let owner = self
                        .frames
                        .get(frame)
                        .and_then(|owner| owner.target.as_deref());
                    match owner {
                        Some(target)
                            if self.frames[frame].descriptor.reference_key(target).is_some() =>
                        {
                            break Attach::Into {
                                owner: target.clone_instance(),
                                member,
                            };
                        }
                        _ => {
                            ctx.note_warn(format!(
                                "deferred construction under member `{}` dropped: its owner passes by value",
                                member.key,
                            ));
                            return;
                        }
                    }
                }
                Dest::Detached { owner, member } => break Attach::Into { owner, member },
                Dest::Root => break Attach::Root,
            }
        };

        ctx.queue.push_back(DeferredOp::Construction {
            descriptor,
            node,
            buffer,
            resume,
            attach,
        });
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::*;
    use crate::descriptor::{Accessor, Member};
    use crate::error::AccessError;
    use crate::node::Scalar;
    use crate::registry::{Describe, DescriptorRegistry};

    fn registry() -> DescriptorRegistry {
        DescriptorRegistry::new()
    }

    struct PushHalf;

    impl Accessor for PushHalf {
        fn get(&self, _owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
            Err(AccessError::ReadOnly {
                member: "half".into(),
            })
        }

        fn set(
            &self,
            owner: &mut dyn Instance,
            value: Box<dyn Instance>,
        ) -> Result<Written, AccessError> {
            // rebuild the owner as (old + new) / 2 to exercise replacement
            let old = *owner.downcast_ref::<i32>().unwrap();
            let new = *value.downcast_ref::<i32>().unwrap();
            Ok(Written::Replaced(Box::new((old + new) / 2)))
        }
    }

    #[test]
    fn replacement_owners_land_in_their_frame() {
        let registry = registry();
        let descriptor = registry.resolve(&<i32 as Describe>::type_ref()).unwrap();
        let mut ctx = OpContext::new();
        let mut stack = ExecStack::default();

        let member = Member::new(
            MemberKey::Name("half".into()),
            Some(<i32 as Describe>::type_ref()),
            Arc::new(PushHalf),
        );

        let mut owner = Cursor::de_root(descriptor.clone(), Node::null());
        owner.target = Some(Box::new(10_i32));
        stack.push(owner);

        let mut child = Cursor::de_child(
            descriptor,
            Node::Primitive(Scalar::I64(30)),
            Dest::MemberOf { frame: 0, member },
        );
        child.target = Some(Box::new(30_i32));
        stack.push(child);

        stack
            .finish_top(Operation::Deserialize, &mut ctx)
            .unwrap();
        let owner = stack.top_mut().unwrap();
        assert_eq!(
            owner.target.as_ref().unwrap().downcast_ref::<i32>(),
            Some(&20)
        );
    }

    #[test]
    fn paths_follow_the_member_chain() {
        let registry = registry();
        let descriptor = registry.resolve(&<i32 as Describe>::type_ref()).unwrap();
        let mut stack = ExecStack::default();
        stack.push(Cursor::de_root(descriptor.clone(), Node::null()));

        let member = Member::new(
            MemberKey::Name("items".into()),
            Some(<i32 as Describe>::type_ref()),
            Arc::new(PushHalf),
        );
        stack.push(Cursor::de_child(
            descriptor.clone(),
            Node::null(),
            Dest::MemberOf { frame: 0, member },
        ));
        stack.push(Cursor::de_child(
            descriptor,
            Node::null(),
            Dest::SlotOf {
                frame: 1,
                slot: 3,
                key: MemberKey::Index(3),
            },
        ));

        assert_eq!(stack.path(), "$.items[3]");
    }
}
