//! Identity bookkeeping: the forward and reverse identity maps, the
//! lookahead index, and the deferred-operation queue's item types.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::descriptor::{ConstructionBuffer, DescriptorHandle, Instance, Member};
use crate::node::{Node, ObjectId};
use crate::util::{HashMap, HashSet};

// -----------------------------------------------------------------------------
// Identity maps

/// id → live object, filled as identities are instantiated during
/// deserialization.
#[derive(Default)]
pub(crate) struct ForwardMap {
    entries: HashMap<ObjectId, Box<dyn Instance>>,
}

impl ForwardMap {
    pub fn register(&mut self, id: ObjectId, handle: Box<dyn Instance>) {
        self.entries.insert(id, handle);
    }

    /// Returns a fresh handle aliasing the registered object.
    pub fn get(&self, id: ObjectId) -> Option<Box<dyn Instance>> {
        self.entries.get(&id).map(|handle| (**handle).clone_instance())
    }
}

/// reference key → id, assigning each distinct object one identity during
/// serialization.
#[derive(Default)]
pub(crate) struct ReverseMap {
    ids: HashMap<u64, ObjectId>,
    next: u64,
}

impl ReverseMap {
    pub fn get(&self, key: u64) -> Option<ObjectId> {
        self.ids.get(&key).copied()
    }

    pub fn assign(&mut self, key: u64) -> ObjectId {
        self.next += 1;
        let id = ObjectId(self.next);
        self.ids.insert(key, id);
        id
    }
}

// -----------------------------------------------------------------------------
// LookaheadIndex

/// The identities present anywhere in a node tree, collected in one upfront
/// walk before deserialization starts.
///
/// Distinguishes "not yet instantiated" (defer and retry) from "does not
/// exist" (fail immediately).
#[derive(Default)]
pub(crate) struct LookaheadIndex {
    ids: HashSet<ObjectId>,
}

impl LookaheadIndex {
    pub fn build(root: &Node) -> Self {
        let mut ids = HashSet::default();
        let mut pending: Vec<&Node> = alloc::vec![root];
        while let Some(node) = pending.pop() {
            match node {
                Node::Primitive(_) => {}
                Node::Object(object) => {
                    if let Some(id) = object.id {
                        ids.insert(id);
                    }
                    pending.extend(object.entries.iter().map(|(_, child)| child));
                }
                Node::Array(values) => pending.extend(values.iter()),
            }
        }
        Self { ids }
    }

    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.ids.contains(&id)
    }
}

// -----------------------------------------------------------------------------
// Deferred operations

/// Where a retried construction's result is attached once it completes.
pub(crate) enum Attach {
    /// The construction is the operation's root.
    Root,
    /// Set through a live owner handle.
    Into {
        owner: Box<dyn Instance>,
        member: Member,
    },
}

/// A suspended unit of work waiting on an identity that was not yet
/// available.
pub(crate) enum DeferredOp {
    /// A single member retry: the rest of the owner proceeded without it.
    Member {
        owner: Box<dyn Instance>,
        member: Member,
        id: ObjectId,
    },
    /// A suspended constructor: an immutable target cannot be finalized with
    /// a missing argument, so the partially filled buffer is queued whole and
    /// resumes exactly at the recorded step.
    Construction {
        descriptor: DescriptorHandle,
        node: Node,
        buffer: ConstructionBuffer,
        resume: usize,
        attach: Attach,
    },
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::node::ObjectNode;

    #[test]
    fn reverse_ids_are_stable_per_key() {
        let mut reverse = ReverseMap::default();
        let first = reverse.assign(0xA0);
        let second = reverse.assign(0xB0);
        assert_ne!(first, second);
        assert_eq!(reverse.get(0xA0), Some(first));
        assert_eq!(reverse.get(0xC0), None);
    }

    #[test]
    fn lookahead_sees_nested_identities() {
        let mut inner = ObjectNode {
            id: Some(ObjectId(2)),
            ..ObjectNode::default()
        };
        inner.insert("x", Node::null());
        let mut outer = ObjectNode {
            id: Some(ObjectId(1)),
            ..ObjectNode::default()
        };
        outer.insert("child", Node::Array(vec![Node::Object(inner)]));

        let index = LookaheadIndex::build(&Node::Object(outer));
        assert!(index.contains(ObjectId(1)));
        assert!(index.contains(ObjectId(2)));
        assert!(!index.contains(ObjectId(3)));
    }

    #[test]
    fn forward_handles_alias_the_registered_object() {
        use crate::impls::Shared;

        let mut forward = ForwardMap::default();
        let shared = Shared::new(1_i32);
        forward.register(ObjectId(1), Box::new(shared.clone()));

        let fetched = forward.get(ObjectId(1)).unwrap();
        let fetched = fetched.downcast_ref::<Shared<i32>>().unwrap();
        assert!(fetched.ptr_eq(&shared));
    }
}
