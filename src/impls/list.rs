//! Descriptors for sequence collections.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::marker::PhantomData;

use crate::descriptor::{
    Accessor, CollectionDescriptor, CompositeDescriptor, Descriptor, DescriptorHandle,
    DescriptorKind, Instance, Member, MemberKey, Written,
};
use crate::error::{AccessError, TraverseError};
use crate::impls::take_typed;
use crate::node::Node;
use crate::registry::{Describe, DescriptorRegistry};

// -----------------------------------------------------------------------------
// Element access

struct VecElementAccessor<T> {
    index: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Accessor for VecElementAccessor<T>
where
    T: Instance + Clone,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner
            .downcast_ref::<Vec<T>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<Vec<T>>(),
                found: owner.type_path().into(),
            })?;
        let value = owner.get(self.index).ok_or(AccessError::OutOfBounds {
            index: self.index,
            len: owner.len(),
        })?;
        Ok(Box::new(value.clone()))
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<Vec<T>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<Vec<T>>(),
                found: Cow::Borrowed(found),
            })?;
        let len = owner.len();
        let slot = owner.get_mut(self.index).ok_or(AccessError::OutOfBounds {
            index: self.index,
            len,
        })?;
        *slot = take_typed::<T>(value)?;
        Ok(Written::InPlace)
    }
}

struct ArrayElementAccessor<T, const N: usize> {
    index: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T, const N: usize> Accessor for ArrayElementAccessor<T, N>
where
    T: Instance + Clone,
    [T; N]: Instance,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner
            .downcast_ref::<[T; N]>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<[T; N]>(),
                found: owner.type_path().into(),
            })?;
        let value = owner.get(self.index).ok_or(AccessError::OutOfBounds {
            index: self.index,
            len: N,
        })?;
        Ok(Box::new(value.clone()))
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<[T; N]>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<[T; N]>(),
                found: Cow::Borrowed(found),
            })?;
        let slot = owner.get_mut(self.index).ok_or(AccessError::OutOfBounds {
            index: self.index,
            len: N,
        })?;
        *slot = take_typed::<T>(value)?;
        Ok(Written::InPlace)
    }
}

// -----------------------------------------------------------------------------
// Vec<T>

struct VecDescriptor<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> Descriptor for VecDescriptor<T>
where
    T: Describe + Instance + Clone + Default,
    Vec<T>: Instance,
{
    fn type_id(&self) -> TypeId {
        TypeId::of::<Vec<T>>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<Vec<T>>()
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Collection(self)
    }
}

impl<T> CompositeDescriptor for VecDescriptor<T>
where
    T: Describe + Instance + Clone + Default,
    Vec<T>: Instance,
{
    fn step_count(&self, target: Option<&dyn Instance>) -> usize {
        target
            .and_then(|target| target.downcast_ref::<Vec<T>>())
            .map_or(0, Vec::len)
    }

    fn member_at(&self, step: usize, _target: Option<&dyn Instance>) -> Option<Member> {
        Some(Member::new(
            MemberKey::Index(step),
            Some(T::type_ref()),
            Arc::new(VecElementAccessor::<T> {
                index: step,
                marker: PhantomData,
            }),
        ))
    }

    fn create_initial(&self, _node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        Ok(Box::new(Vec::<T>::new()))
    }
}

impl<T> CollectionDescriptor for VecDescriptor<T>
where
    T: Describe + Instance + Clone + Default,
    Vec<T>: Instance,
{
    fn resize(&self, target: &mut dyn Instance, len: usize) -> Result<(), TraverseError> {
        let found = target.type_path();
        let target = target
            .downcast_mut::<Vec<T>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<Vec<T>>(),
                found: Cow::Borrowed(found),
            })?;
        target.resize_with(len, T::default);
        Ok(())
    }
}

impl<T> Describe for Vec<T>
where
    T: Describe + Instance + Clone + Default,
    Vec<T>: Instance,
{
    fn type_ref() -> crate::descriptor::TypeRef {
        crate::descriptor::TypeRef::value_of::<Vec<T>>()
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(VecDescriptor::<T> {
            marker: PhantomData,
        })
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<T>();
    }
}

// -----------------------------------------------------------------------------
// [T; N]

struct ArrayDescriptor<T, const N: usize> {
    marker: PhantomData<fn() -> T>,
}

impl<T, const N: usize> Descriptor for ArrayDescriptor<T, N>
where
    T: Describe + Instance + Clone + Default,
    [T; N]: Instance,
{
    fn type_id(&self) -> TypeId {
        TypeId::of::<[T; N]>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<[T; N]>()
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Collection(self)
    }
}

impl<T, const N: usize> CompositeDescriptor for ArrayDescriptor<T, N>
where
    T: Describe + Instance + Clone + Default,
    [T; N]: Instance,
{
    fn step_count(&self, _target: Option<&dyn Instance>) -> usize {
        N
    }

    fn member_at(&self, step: usize, _target: Option<&dyn Instance>) -> Option<Member> {
        Some(Member::new(
            MemberKey::Index(step),
            Some(T::type_ref()),
            Arc::new(ArrayElementAccessor::<T, N> {
                index: step,
                marker: PhantomData,
            }),
        ))
    }

    fn create_initial(&self, _node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        Ok(Box::new(core::array::from_fn::<T, N, _>(|_| T::default())))
    }
}

impl<T, const N: usize> CollectionDescriptor for ArrayDescriptor<T, N>
where
    T: Describe + Instance + Clone + Default,
    [T; N]: Instance,
{
    fn resize(&self, _target: &mut dyn Instance, len: usize) -> Result<(), TraverseError> {
        if len == N {
            Ok(())
        } else {
            Err(TraverseError::Construct {
                type_path: Cow::Borrowed(core::any::type_name::<[T; N]>()),
                message: Cow::Owned(format!("expected {N} elements, found {len}")),
            })
        }
    }
}

impl<T, const N: usize> Describe for [T; N]
where
    T: Describe + Instance + Clone + Default,
    [T; N]: Instance,
{
    fn type_ref() -> crate::descriptor::TypeRef {
        crate::descriptor::TypeRef::value_of::<[T; N]>()
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(ArrayDescriptor::<T, N> {
            marker: PhantomData,
        })
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<T>();
    }
}

// -----------------------------------------------------------------------------
// Tests
