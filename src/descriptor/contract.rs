use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use crate::descriptor::{Instance, Member};
use crate::error::{AccessError, TraverseError};
use crate::node::Node;

// -----------------------------------------------------------------------------
// TraversalContext

/// An integer discriminator selecting an alternate traversal strategy for the
/// same type.
///
/// A `(TypeId, TraversalContext)` pair maps to exactly one cached descriptor
/// in a [`DescriptorRegistry`](crate::registry::DescriptorRegistry), so one
/// type may be traversed by value, by shared reference, or as an opaque
/// handle depending on the context it was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraversalContext(pub u16);

impl TraversalContext {
    /// Traverse by value: the member is copied and written back.
    pub const VALUE: Self = Self(0);
    /// Traverse through a shared, identity-carrying handle.
    pub const SHARED: Self = Self(1);
    /// Traverse as an opaque handle resolved by the host.
    pub const HANDLE: Self = Self(2);
}

impl fmt::Display for TraversalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::VALUE => f.write_str("value"),
            Self::SHARED => f.write_str("shared"),
            Self::HANDLE => f.write_str("handle"),
            Self(raw) => write!(f, "context({raw})"),
        }
    }
}

// -----------------------------------------------------------------------------
// TypeRef

/// A declared member type: what a slot is typed as, before any runtime
/// re-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRef {
    pub id: TypeId,
    pub path: &'static str,
    pub context: TraversalContext,
    /// Whether values of the declared type are copied on assignment and thus
    /// require write-back after mutation.
    pub value_semantics: bool,
}

impl TypeRef {
    pub fn of<T: Any>(context: TraversalContext, value_semantics: bool) -> Self {
        Self {
            id: TypeId::of::<T>(),
            path: core::any::type_name::<T>(),
            context,
            value_semantics,
        }
    }

    /// A by-value declared type.
    #[inline]
    pub fn value_of<T: Any>() -> Self {
        Self::of::<T>(TraversalContext::VALUE, true)
    }

    /// A reference-semantics declared type.
    #[inline]
    pub fn reference_of<T: Any>() -> Self {
        Self::of::<T>(TraversalContext::SHARED, false)
    }
}

// -----------------------------------------------------------------------------
// ConstructionBuffer

/// The buffer of constructor arguments gathered before an immutable target
/// is instantiated.
///
/// Slots are filled in ascending step order, possibly across several passes
/// when a construction is deferred and later resumed.
#[derive(Debug, Default)]
pub struct ConstructionBuffer {
    slots: Vec<Option<Box<dyn Instance>>>,
}

impl ConstructionBuffer {
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_filled(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// Stores a gathered argument.
    pub fn fill(&mut self, slot: usize, value: Box<dyn Instance>) {
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(value);
    }

    /// Removes and downcasts the argument in `slot`.
    pub fn take<T: Any>(&mut self, slot: usize) -> Result<T, AccessError> {
        let value = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(AccessError::MissingSlot { slot })?;
        value.take::<T>().map_err(|value| AccessError::TypeMismatch {
            expected: core::any::type_name::<T>(),
            found: value.type_path().into(),
        })
    }
}

// -----------------------------------------------------------------------------
// Descriptor

/// A shared, cached descriptor instance.
pub type DescriptorHandle = Arc<dyn Descriptor>;

/// The kind-specific face of a [`Descriptor`], for dispatch.
#[derive(Clone, Copy)]
pub enum DescriptorKind<'a> {
    Primitive(&'a dyn PrimitiveDescriptor),
    Composite(&'a dyn CompositeDescriptor),
    Collection(&'a dyn CollectionDescriptor),
}

impl<'a> DescriptorKind<'a> {
    /// The composite face shared by composites and collections.
    pub fn composite(self) -> Option<&'a dyn CompositeDescriptor> {
        match self {
            Self::Primitive(_) => None,
            Self::Composite(composite) => Some(composite),
            Self::Collection(collection) => Some(collection as &dyn CompositeDescriptor),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Composite(_) => "composite",
            Self::Collection(_) => "collection",
        }
    }
}

/// Metadata teaching the engine how to traverse one `(type, context)` pair.
///
/// The base trait carries identity and policy; the actual decomposition
/// contract lives on the kind traits reached through [`kind`](Self::kind).
pub trait Descriptor: Send + Sync + 'static {
    /// The [`TypeId`] of the described type.
    fn type_id(&self) -> TypeId;

    /// The full path of the described type, also used as its `$type` tag.
    fn type_path(&self) -> &'static str;

    /// The context this descriptor was built for.
    fn context(&self) -> TraversalContext {
        TraversalContext::VALUE
    }

    /// Whether described values are copied on assignment.
    fn value_semantics(&self) -> bool {
        true
    }

    /// Whether the described type is closed for runtime substitution.
    ///
    /// Members declared with a sealed type never carry a `$type` tag.
    fn sealed(&self) -> bool {
        true
    }

    fn kind(&self) -> DescriptorKind<'_>;

    #[inline]
    fn is_primitive(&self) -> bool {
        matches!(self.kind(), DescriptorKind::Primitive(_))
    }

    /// The identity key of a reference-semantics value, or `None` for
    /// value-semantics types.
    ///
    /// Two values share a key exactly when they are the same object.
    fn reference_key(&self, _value: &dyn Instance) -> Option<u64> {
        None
    }

    /// Whether `value` is this type's explicit null.
    fn is_null(&self, _value: &dyn Instance) -> bool {
        false
    }

    /// This type's explicit null, for descriptors that have one.
    fn null_value(&self) -> Option<Box<dyn Instance>> {
        None
    }

    /// Strips a transparent wrapper layer, yielding the value whose runtime
    /// type drives descriptor re-resolution. The default is the identity.
    fn unwrap_value(&self, value: Box<dyn Instance>) -> Box<dyn Instance> {
        value
    }

    /// Converts a resolved reference (stored in its canonical handle form)
    /// into the declared member type. The default is the identity.
    fn adopt_reference(&self, value: Box<dyn Instance>) -> Result<Box<dyn Instance>, AccessError> {
        Ok(value)
    }
}

/// An atomic descriptor: encodes and decodes a node directly and never
/// pushes a traversal cursor.
pub trait PrimitiveDescriptor: Descriptor {
    fn encode(&self, value: &dyn Instance) -> Result<Node, TraverseError>;

    fn decode(&self, node: &Node) -> Result<Box<dyn Instance>, TraverseError>;
}

/// A descriptor with per-step members, optionally created through a
/// constructor-argument buffer.
pub trait CompositeDescriptor: Descriptor {
    /// The number of steps a traversal of `target` takes. `target` is absent
    /// while gathering constructor arguments.
    fn step_count(&self, target: Option<&dyn Instance>) -> usize;

    /// How many leading steps are constructor arguments. Zero for mutable
    /// types. Always at most [`step_count`](Self::step_count).
    fn construction_step_count(&self) -> usize {
        0
    }

    /// The member visited at `step`, or `None` for a skipped step.
    fn member_at(&self, step: usize, target: Option<&dyn Instance>) -> Option<Member>;

    /// Creates the initial target a population-only traversal fills in.
    fn create_initial(&self, node: &Node) -> Result<Box<dyn Instance>, TraverseError>;

    /// Creates the target from a filled constructor buffer.
    fn construct(&self, _buffer: &mut ConstructionBuffer) -> Result<Box<dyn Instance>, TraverseError> {
        Err(TraverseError::Construct {
            type_path: Cow::Borrowed(self.type_path()),
            message: Cow::Borrowed("type has no constructor steps"),
        })
    }

    /// Hook invoked before a target is written into the tree.
    fn before_write(&self, _target: &dyn Instance) {}

    /// Hook invoked after a target has been fully read from the tree.
    fn after_read(&self, _target: &mut dyn Instance) {}
}

/// A composite that can be resized to a target element count before its
/// indexed members are populated.
pub trait CollectionDescriptor: CompositeDescriptor {
    fn resize(&self, target: &mut dyn Instance, len: usize) -> Result<(), TraverseError>;
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_slots_fill_and_drain() {
        let mut buffer = ConstructionBuffer::new(2);
        assert!(!buffer.is_filled(0));

        buffer.fill(0, Box::new(4_i32));
        buffer.fill(1, Box::new(2.5_f64));
        assert!(buffer.is_filled(0));

        assert_eq!(buffer.take::<i32>(0).unwrap(), 4);
        assert_eq!(
            buffer.take::<i32>(0),
            Err(AccessError::MissingSlot { slot: 0 })
        );
        assert!(matches!(
            buffer.take::<i32>(1),
            Err(AccessError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn contexts_render_their_names() {
        use alloc::string::ToString;

        assert_eq!(TraversalContext::VALUE.to_string(), "value");
        assert_eq!(TraversalContext(9).to_string(), "context(9)");
    }
}
