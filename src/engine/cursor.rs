//! Per-node traversal state.

use alloc::boxed::Box;

use crate::descriptor::{ConstructionBuffer, DescriptorHandle, Instance, Member, MemberKey};
use crate::node::{Node, ObjectId};

// -----------------------------------------------------------------------------
// Phase

/// The phases one cursor advances through, in order, terminal at
/// [`PostProcess`](Phase::PostProcess).
///
/// Serialization uses `PreProcess → Population → PostProcess`;
/// deserialization additionally passes through `Construction` (only when the
/// target does not exist yet and the descriptor has constructor steps) and
/// `Instantiation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Resolve the runtime descriptor and decide construction vs. direct
    /// population.
    PreProcess,
    /// Gather constructor arguments into the buffer, one member per step.
    Construction,
    /// Create the target and register its identity.
    Instantiation,
    /// Set remaining members on the now-existing target.
    Population,
    /// Invoke completion hooks.
    PostProcess,
}

// -----------------------------------------------------------------------------
// Dest

/// Where a cursor's result goes when it finishes.
///
/// On-stack owners are addressed by frame index: frames never move while
/// alive, so an index stays valid for the cursor's whole lifetime and owner
/// replacement is a direct slot assignment.
pub(crate) enum Dest {
    /// The cursor produces the operation's result.
    Root,
    /// Write back through a member of the owner frame's target.
    MemberOf { frame: usize, member: Member },
    /// Fill a constructor-buffer slot of the owner frame.
    SlotOf {
        frame: usize,
        slot: usize,
        key: MemberKey,
    },
    /// Set through a live owner handle that is no longer on the stack
    /// (retried deferred constructions).
    Detached {
        owner: Box<dyn Instance>,
        member: Member,
    },
}

impl Dest {
    /// The member key this destination writes through, if any.
    pub fn key(&self) -> Option<&MemberKey> {
        match self {
            Self::Root => None,
            Self::MemberOf { member, .. } | Self::Detached { member, .. } => Some(&member.key),
            Self::SlotOf { key, .. } => Some(key),
        }
    }
}

// -----------------------------------------------------------------------------
// Advance

/// The outcome of advancing a cursor by one step.
pub(crate) enum Advance {
    /// More steps remain in the current phase (or the next one).
    Continue,
    /// The cursor is done; pop it and write its result back.
    Finished,
    /// A dependency cursor was pushed; process it before resuming this one.
    Push(Cursor),
    /// The cursor's construction hit an unavailable identity; queue the
    /// partially filled buffer and discard the cursor without write-back.
    DeferConstruction,
}

// -----------------------------------------------------------------------------
// Cursor

/// The suspendable traversal state of one in-progress node.
///
/// Mutated step by step in place on the execution stack; suspension between
/// any two steps leaves it resumable as-is.
pub(crate) struct Cursor {
    pub descriptor: DescriptorHandle,
    pub phase: Phase,
    pub step: usize,
    pub construction_steps: usize,
    pub total_steps: usize,
    pub buffer: ConstructionBuffer,
    /// The node being built (serialize) or consumed (deserialize).
    pub node: Node,
    pub target: Option<Box<dyn Instance>>,
    pub dest: Dest,
    /// Cleared when the cursor aborts, so nothing is written back.
    pub write_back: bool,
    pub identity: Option<ObjectId>,
    /// Runtime type tag to place on the node being built.
    pub pending_tag: Option<&'static str>,
    /// Whether this cursor resumes a queued construction; slot fills and the
    /// eventual instantiation then count as retry-pass progress.
    pub resumed: bool,
}

impl Cursor {
    fn new(
        descriptor: DescriptorHandle,
        node: Node,
        target: Option<Box<dyn Instance>>,
        dest: Dest,
    ) -> Self {
        Self {
            descriptor,
            phase: Phase::PreProcess,
            step: 0,
            construction_steps: 0,
            total_steps: 0,
            buffer: ConstructionBuffer::default(),
            node,
            target,
            dest,
            write_back: true,
            identity: None,
            pending_tag: None,
            resumed: false,
        }
    }

    pub fn ser_root(descriptor: DescriptorHandle, target: Box<dyn Instance>) -> Self {
        Self::new(descriptor, Node::null(), Some(target), Dest::Root)
    }

    pub fn ser_child(
        descriptor: DescriptorHandle,
        target: Box<dyn Instance>,
        frame: usize,
        member: Member,
    ) -> Self {
        Self::new(
            descriptor,
            Node::null(),
            Some(target),
            Dest::MemberOf { frame, member },
        )
    }

    pub fn de_root(descriptor: DescriptorHandle, node: Node) -> Self {
        Self::new(descriptor, node, None, Dest::Root)
    }

    pub fn de_child(descriptor: DescriptorHandle, node: Node, dest: Dest) -> Self {
        Self::new(descriptor, node, None, dest)
    }

    /// Rebuilds the cursor of a queued construction, resuming exactly at the
    /// recorded step with the previously gathered arguments intact.
    pub fn de_resumed(
        descriptor: DescriptorHandle,
        node: Node,
        buffer: ConstructionBuffer,
        resume: usize,
        construction_steps: usize,
        dest: Dest,
    ) -> Self {
        let mut cursor = Self::new(descriptor, node, None, dest);
        cursor.phase = Phase::Construction;
        cursor.step = resume;
        cursor.construction_steps = construction_steps;
        cursor.buffer = buffer;
        cursor.resumed = true;
        cursor
    }
}

// -----------------------------------------------------------------------------
// Operation

/// Which strategy drives the cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Serialize,
    Deserialize,
}
