//! The open-polymorphism slot.
//!
//! A [`Dynamic`] holds any erased value. Slots declared as `Dynamic` have no
//! useful static descriptor; the engine re-resolves the descriptor from the
//! held value's runtime type when writing, and from the node's `$type` tag
//! when reading. The held type must be registered for both directions to
//! succeed.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::{Any, TypeId};
use core::fmt;

use crate::descriptor::{
    CompositeDescriptor, Descriptor, DescriptorHandle, DescriptorKind, Instance, Member,
    TraversalContext, TypeRef,
};
use crate::error::TraverseError;
use crate::node::Node;
use crate::registry::Describe;

// -----------------------------------------------------------------------------
// Dynamic

/// A clonable box holding an arbitrary erased value.
pub struct Dynamic(Box<dyn Instance>);

impl Dynamic {
    pub fn new<T: Instance>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Wraps an already-erased value, flattening nested wrappers.
    pub fn from_boxed(value: Box<dyn Instance>) -> Self {
        match value.take::<Dynamic>() {
            Ok(dynamic) => dynamic,
            Err(value) => Self(value),
        }
    }

    #[inline]
    pub fn inner(&self) -> &dyn Instance {
        &*self.0
    }

    #[inline]
    pub fn into_inner(self) -> Box<dyn Instance> {
        self.0
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn take<T: Any>(self) -> Result<T, Dynamic> {
        self.0.take::<T>().map_err(Dynamic)
    }
}

impl Clone for Dynamic {
    fn clone(&self) -> Self {
        Self(self.0.clone_instance())
    }
}

impl Default for Dynamic {
    /// An empty slot, carried as a null leaf until something replaces it.
    fn default() -> Self {
        Self::new(())
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dynamic").field(&&*self.0).finish()
    }
}

// -----------------------------------------------------------------------------
// DynamicDescriptor

struct DynamicDescriptor;

impl Descriptor for DynamicDescriptor {
    fn type_id(&self) -> TypeId {
        TypeId::of::<Dynamic>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<Dynamic>()
    }

    fn context(&self) -> TraversalContext {
        TraversalContext::VALUE
    }

    fn value_semantics(&self) -> bool {
        false
    }

    fn sealed(&self) -> bool {
        false
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Composite(self)
    }

    fn unwrap_value(&self, value: Box<dyn Instance>) -> Box<dyn Instance> {
        match value.take::<Dynamic>() {
            Ok(dynamic) => dynamic.into_inner(),
            Err(value) => value,
        }
    }
}

impl CompositeDescriptor for DynamicDescriptor {
    fn step_count(&self, _target: Option<&dyn Instance>) -> usize {
        0
    }

    fn member_at(&self, _step: usize, _target: Option<&dyn Instance>) -> Option<Member> {
        None
    }

    /// A dynamic slot cannot be read without a `$type` tag naming the held
    /// type; reaching this means the tag was absent or unresolvable.
    fn create_initial(&self, _node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        Err(TraverseError::Construct {
            type_path: Cow::Borrowed(core::any::type_name::<Dynamic>()),
            message: Cow::Borrowed("a dynamic slot requires a `$type` tag"),
        })
    }
}

impl Describe for Dynamic {
    fn type_ref() -> TypeRef {
        TypeRef::of::<Dynamic>(TraversalContext::VALUE, false)
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(DynamicDescriptor)
    }
}

// -----------------------------------------------------------------------------
// Tests
