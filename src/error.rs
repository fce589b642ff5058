//! Error types raised by the traversal engine and by member accessors.

use alloc::borrow::Cow;
use alloc::string::String;
use core::{error, fmt};

use crate::node::ObjectId;

// -----------------------------------------------------------------------------
// AccessError

/// An enumeration of all error outcomes that might happen when reading or
/// writing a [`Member`](crate::descriptor::Member) through its accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The owner or the value had a different concrete type than the accessor expected.
    TypeMismatch {
        expected: &'static str,
        found: Cow<'static, str>,
    },
    /// Attempted to write through a constructor-argument member.
    ReadOnly { member: Cow<'static, str> },
    /// An index-based access fell outside the collection's bounds.
    OutOfBounds { index: usize, len: usize },
    /// A constructor argument slot was read before anything filled it.
    MissingSlot { slot: usize },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected a value of type `{expected}`, found `{found}`")
            }
            Self::ReadOnly { member } => {
                write!(f, "member `{member}` is a constructor argument and cannot be written")
            }
            Self::OutOfBounds { index, len } => {
                write!(f, "index {index} is out of bounds for a collection of length {len}")
            }
            Self::MissingSlot { slot } => {
                write!(f, "constructor argument {slot} was never produced")
            }
        }
    }
}

impl error::Error for AccessError {}

// -----------------------------------------------------------------------------
// TraverseError

/// An enumeration of the fatal outcomes of a serialize or deserialize
/// operation.
///
/// Local, recoverable failures (a single member that could not be produced)
/// are not raised as errors; they are recorded in the operation's
/// [`Report`](crate::engine::Report) and the affected slot keeps its
/// pre-step default. The variants here unwind the whole operation.
#[derive(Debug)]
pub enum TraverseError {
    /// A reference names an identity that appears neither among the already
    /// instantiated objects nor anywhere in the node tree. No future pass can
    /// resolve it, which indicates corrupt data rather than ordering.
    MissingReference { id: ObjectId },
    /// The deferred-operation queue reached a fixed point without draining.
    ///
    /// Every pending identity exists in the tree, but no retry pass can make
    /// progress; a cycle through constructor-only types is the usual cause.
    UnresolvedDeferrals { pending: usize },
    /// No descriptor is registered for the requested type and context.
    MissingDescriptor { type_path: Cow<'static, str> },
    /// A `$type` tag named a type path with no registered descriptor.
    UnknownTypeTag { tag: String },
    /// A node had a different shape than its descriptor called for.
    NodeShape {
        expected: &'static str,
        found: &'static str,
    },
    /// A descriptor failed to create or construct its target.
    Construct {
        type_path: Cow<'static, str>,
        message: Cow<'static, str>,
    },
    /// A member accessor rejected a read or write.
    Access(AccessError),
    /// The driver's result was requested before the operation completed.
    Incomplete,
}

impl TraverseError {
    /// Whether this error must unwind the whole operation.
    ///
    /// Everything else is recoverable at the member level: the engine records
    /// a warning, leaves the slot at its default, and advances.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingReference { .. } | Self::UnresolvedDeferrals { .. }
        )
    }
}

impl fmt::Display for TraverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingReference { id } => {
                write!(f, "reference to identity {id} which exists nowhere in the data")
            }
            Self::UnresolvedDeferrals { pending } => {
                write!(f, "{pending} deferred operation(s) could not be resolved by any retry pass")
            }
            Self::MissingDescriptor { type_path } => {
                write!(f, "no descriptor registered for type `{type_path}`")
            }
            Self::UnknownTypeTag { tag } => {
                write!(f, "no descriptor registered for type tag `{tag}`")
            }
            Self::NodeShape { expected, found } => {
                write!(f, "expected a {expected} node, found a {found} node")
            }
            Self::Construct { type_path, message } => {
                write!(f, "failed to construct `{type_path}`: {message}")
            }
            Self::Access(err) => write!(f, "member access failed: {err}"),
            Self::Incomplete => write!(f, "the operation has not run to completion"),
        }
    }
}

impl error::Error for TraverseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccessError> for TraverseError {
    #[inline]
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}
