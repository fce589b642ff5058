//! The reference-semantics handle.
//!
//! [`Shared<T>`] is the crate's identity-carrying object handle: clones alias
//! one allocation, the allocation's address is the identity key, and the
//! engine serializes each identity's full body exactly once, emitting `$ref`
//! nodes for every later encounter.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::sync::Arc;
use core::any::TypeId;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;
use core::marker::PhantomData;

use crate::descriptor::{
    Accessor, CollectionDescriptor, CompositeDescriptor, ConstructionBuffer, Descriptor,
    DescriptorHandle, DescriptorKind, Instance, Member, MemberKey, TraversalContext, TypeRef,
    Written,
};
use crate::error::{AccessError, TraverseError};
use crate::impls::take_typed;
use crate::node::Node;
use crate::registry::{Describe, DescriptorRegistry};

// -----------------------------------------------------------------------------
// Shared

/// A shared, mutable, identity-carrying handle to a `T`.
///
/// ```
/// use trellis::Shared;
///
/// let first = Shared::new(10_i32);
/// let second = first.clone();
/// *second.borrow_mut() += 1;
///
/// assert_eq!(*first.borrow(), 11);
/// assert!(first.ptr_eq(&second));
/// ```
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    #[inline]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Whether two handles alias the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The allocation address, used as the handle's identity key.
    #[inline]
    pub fn identity_key(&self) -> u64 {
        Rc::as_ptr(&self.0) as usize as u64
    }
}

impl<T> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Default> Default for Shared<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(value) => f.debug_tuple("Shared").field(&&*value).finish(),
            Err(_) => f.write_str("Shared(<borrowed>)"),
        }
    }
}

// -----------------------------------------------------------------------------
// SharedDescriptor

struct SharedMemberAccessor<T> {
    inner: Arc<dyn Accessor>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Accessor for SharedMemberAccessor<T>
where
    T: Instance,
    Shared<T>: Instance,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner
            .downcast_ref::<Shared<T>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<Shared<T>>(),
                found: owner.type_path().into(),
            })?;
        let value = owner.borrow();
        self.inner.get(&*value)
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<Shared<T>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<Shared<T>>(),
                found: Cow::Borrowed(found),
            })?;
        let mut target = owner.borrow_mut();
        match self.inner.set(&mut *target, value)? {
            Written::InPlace => Ok(Written::InPlace),
            // A rebuilt body replaces the shared allocation's contents; the
            // handle itself keeps its identity.
            Written::Replaced(replacement) => {
                *target = take_typed::<T>(replacement)?;
                Ok(Written::InPlace)
            }
        }
    }
}

/// Accessor for the synthetic body member of a shared primitive.
struct SharedValueAccessor<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> Accessor for SharedValueAccessor<T>
where
    T: Instance + Clone,
    Shared<T>: Instance,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner
            .downcast_ref::<Shared<T>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<Shared<T>>(),
                found: owner.type_path().into(),
            })?;
        let value = owner.borrow();
        Ok(Box::new(value.clone()))
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<Shared<T>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<Shared<T>>(),
                found: Cow::Borrowed(found),
            })?;
        *owner.borrow_mut() = take_typed::<T>(value)?;
        Ok(Written::InPlace)
    }
}

struct SharedDescriptor<T> {
    inner: DescriptorHandle,
    marker: PhantomData<fn() -> T>,
}

impl<T> SharedDescriptor<T>
where
    T: Describe + Instance + Clone,
    Shared<T>: Instance,
{
    fn unwrap_ref<'a>(&self, value: &'a dyn Instance) -> Result<&'a Shared<T>, AccessError> {
        value
            .downcast_ref::<Shared<T>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<Shared<T>>(),
                found: value.type_path().into(),
            })
    }
}

impl<T> Descriptor for SharedDescriptor<T>
where
    T: Describe + Instance + Clone,
    Shared<T>: Instance,
{
    fn type_id(&self) -> TypeId {
        TypeId::of::<Shared<T>>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<Shared<T>>()
    }

    fn context(&self) -> TraversalContext {
        TraversalContext::SHARED
    }

    fn value_semantics(&self) -> bool {
        false
    }

    fn kind(&self) -> DescriptorKind<'_> {
        match self.inner.kind() {
            DescriptorKind::Collection(_) => DescriptorKind::Collection(self),
            _ => DescriptorKind::Composite(self),
        }
    }

    fn reference_key(&self, value: &dyn Instance) -> Option<u64> {
        value.downcast_ref::<Shared<T>>().map(Shared::identity_key)
    }
}

impl<T> CompositeDescriptor for SharedDescriptor<T>
where
    T: Describe + Instance + Clone,
    Shared<T>: Instance,
{
    fn step_count(&self, target: Option<&dyn Instance>) -> usize {
        match self.inner.kind().composite() {
            Some(composite) => match target.and_then(|target| target.downcast_ref::<Shared<T>>()) {
                Some(shared) => {
                    let value = shared.borrow();
                    composite.step_count(Some(&*value))
                }
                None => composite.step_count(None),
            },
            // A shared primitive exposes one synthetic body member.
            None => 1,
        }
    }

    fn construction_step_count(&self) -> usize {
        self.inner
            .kind()
            .composite()
            .map_or(0, CompositeDescriptor::construction_step_count)
    }

    fn member_at(&self, step: usize, target: Option<&dyn Instance>) -> Option<Member> {
        let composite = match self.inner.kind().composite() {
            Some(composite) => composite,
            None => {
                return (step == 0).then(|| {
                    Member::new(
                        MemberKey::Name("value".into()),
                        Some(T::type_ref()),
                        Arc::new(SharedValueAccessor::<T> {
                            marker: PhantomData,
                        }),
                    )
                });
            }
        };
        let member = match target.and_then(|target| target.downcast_ref::<Shared<T>>()) {
            Some(shared) => {
                let value = shared.borrow();
                composite.member_at(step, Some(&*value))?
            }
            None => composite.member_at(step, None)?,
        };
        Some(Member {
            accessor: Arc::new(SharedMemberAccessor::<T> {
                inner: member.accessor.clone(),
                marker: PhantomData,
            }),
            ..member
        })
    }

    fn create_initial(&self, node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        let value = match self.inner.kind() {
            DescriptorKind::Primitive(primitive) => {
                let body = node.member(&MemberKey::Name("value".into())).unwrap_or(node);
                take_typed::<T>(primitive.decode(body)?)?
            }
            DescriptorKind::Composite(composite) => take_typed::<T>(composite.create_initial(node)?)?,
            DescriptorKind::Collection(collection) => {
                take_typed::<T>(collection.create_initial(node)?)?
            }
        };
        Ok(Box::new(Shared::new(value)))
    }

    fn construct(&self, buffer: &mut ConstructionBuffer) -> Result<Box<dyn Instance>, TraverseError> {
        let composite = self.inner.kind().composite().ok_or(TraverseError::NodeShape {
            expected: "composite",
            found: "primitive",
        })?;
        let value = take_typed::<T>(composite.construct(buffer)?)?;
        Ok(Box::new(Shared::new(value)))
    }

    fn before_write(&self, target: &dyn Instance) {
        if let (Some(composite), Ok(shared)) = (self.inner.kind().composite(), self.unwrap_ref(target))
        {
            let value = shared.borrow();
            composite.before_write(&*value);
        }
    }

    fn after_read(&self, target: &mut dyn Instance) {
        if let (Some(composite), Some(shared)) = (
            self.inner.kind().composite(),
            target.downcast_ref::<Shared<T>>(),
        ) {
            let mut value = shared.borrow_mut();
            composite.after_read(&mut *value);
        }
    }
}

impl<T> CollectionDescriptor for SharedDescriptor<T>
where
    T: Describe + Instance + Clone,
    Shared<T>: Instance,
{
    fn resize(&self, target: &mut dyn Instance, len: usize) -> Result<(), TraverseError> {
        let collection = match self.inner.kind() {
            DescriptorKind::Collection(collection) => collection,
            other => {
                return Err(TraverseError::NodeShape {
                    expected: "collection",
                    found: other.name(),
                });
            }
        };
        let found = target.type_path();
        let shared = target
            .downcast_ref::<Shared<T>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<Shared<T>>(),
                found: Cow::Borrowed(found),
            })?;
        let mut value = shared.borrow_mut();
        collection.resize(&mut *value, len)
    }
}

impl<T> Describe for Shared<T>
where
    T: Describe + Instance + Clone,
    Shared<T>: Instance,
{
    fn type_ref() -> TypeRef {
        TypeRef::reference_of::<Shared<T>>()
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(SharedDescriptor::<T> {
            inner: T::descriptor(),
            marker: PhantomData,
        })
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<T>();
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn handles_share_identity() {
        let first = Shared::new(5_i32);
        let second = first.clone();
        let third = Shared::new(5_i32);

        assert_eq!(first.identity_key(), second.identity_key());
        assert_ne!(first.identity_key(), third.identity_key());
    }

    #[test]
    fn shared_descriptors_report_reference_keys() {
        let descriptor = <Shared<Vec<i32>> as Describe>::descriptor();
        let shared = Shared::new(vec![1_i32]);
        assert_eq!(
            descriptor.reference_key(&shared),
            Some(shared.identity_key())
        );
        assert!(!descriptor.value_semantics());
    }

    #[test]
    fn shared_members_reach_through_the_handle() {
        let descriptor = <Shared<Vec<i32>> as Describe>::descriptor();
        let collection = match descriptor.kind() {
            DescriptorKind::Collection(collection) => collection,
            _ => panic!("expected a collection"),
        };

        let mut shared = Shared::new(vec![1_i32, 2]);
        assert_eq!(collection.step_count(Some(&shared)), 2);

        let member = collection.member_at(1, Some(&shared)).unwrap();
        member.accessor.set(&mut shared, Box::new(9_i32)).unwrap();
        assert_eq!(*shared.borrow(), vec![1, 9]);
    }

    #[test]
    fn shared_primitive_exposes_a_body_member() {
        let descriptor = <Shared<i32> as Describe>::descriptor();
        let composite = match descriptor.kind() {
            DescriptorKind::Composite(composite) => composite,
            _ => panic!("expected a composite"),
        };
        assert_eq!(composite.step_count(None), 1);

        let shared = Shared::new(3_i32);
        let member = composite.member_at(0, Some(&shared)).unwrap();
        assert_eq!(member.key, MemberKey::Name("value".into()));
        let body = member.accessor.get(&shared).unwrap();
        assert_eq!(body.downcast_ref::<i32>(), Some(&3));
    }
}
