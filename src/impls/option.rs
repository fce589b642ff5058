//! Transparent null wrappers.
//!
//! `Option<T>` traverses exactly as `T` does, with `None` carried as an
//! explicit null leaf. The wrapper delegates every kind-specific call to the
//! inner descriptor and adapts accessors and targets between `T` and
//! `Option<T>`, so options compose over primitives, composites, collections
//! and shared handles alike.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::TypeId;
use core::marker::PhantomData;

use crate::descriptor::{
    Accessor, CollectionDescriptor, CompositeDescriptor, ConstructionBuffer, Descriptor,
    DescriptorHandle, DescriptorKind, Instance, Member, PrimitiveDescriptor, TraversalContext,
    TypeRef, Written,
};
use crate::error::{AccessError, TraverseError};
use crate::impls::take_typed;
use crate::node::Node;
use crate::registry::{Describe, DescriptorRegistry};

// -----------------------------------------------------------------------------
// OptionDescriptor

struct OptionDescriptor<T> {
    inner: DescriptorHandle,
    marker: PhantomData<fn() -> T>,
}

impl<T> OptionDescriptor<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
{
    fn unwrap_ref<'a>(&self, value: &'a dyn Instance) -> Result<&'a T, AccessError> {
        let value = value
            .downcast_ref::<Option<T>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<Option<T>>(),
                found: value.type_path().into(),
            })?;
        value.as_ref().ok_or(AccessError::TypeMismatch {
            expected: core::any::type_name::<T>(),
            found: Cow::Borrowed("None"),
        })
    }
}

impl<T> Descriptor for OptionDescriptor<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
{
    fn type_id(&self) -> TypeId {
        TypeId::of::<Option<T>>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<Option<T>>()
    }

    fn context(&self) -> TraversalContext {
        self.inner.context()
    }

    fn value_semantics(&self) -> bool {
        self.inner.value_semantics()
    }

    fn sealed(&self) -> bool {
        self.inner.sealed()
    }

    fn kind(&self) -> DescriptorKind<'_> {
        match self.inner.kind() {
            DescriptorKind::Primitive(_) => DescriptorKind::Primitive(self),
            DescriptorKind::Composite(_) => DescriptorKind::Composite(self),
            DescriptorKind::Collection(_) => DescriptorKind::Collection(self),
        }
    }

    fn reference_key(&self, value: &dyn Instance) -> Option<u64> {
        let value = value.downcast_ref::<Option<T>>()?;
        value
            .as_ref()
            .and_then(|inner| self.inner.reference_key(inner))
    }

    fn is_null(&self, value: &dyn Instance) -> bool {
        value
            .downcast_ref::<Option<T>>()
            .is_some_and(Option::is_none)
    }

    fn null_value(&self) -> Option<Box<dyn Instance>> {
        Some(Box::new(None::<T>))
    }

    fn unwrap_value(&self, value: Box<dyn Instance>) -> Box<dyn Instance> {
        match value.take::<Option<T>>() {
            Ok(Some(inner)) => self.inner.unwrap_value(Box::new(inner)),
            Ok(None) => Box::new(None::<T>),
            Err(value) => value,
        }
    }

    fn adopt_reference(&self, value: Box<dyn Instance>) -> Result<Box<dyn Instance>, AccessError> {
        let value = self.inner.adopt_reference(value)?;
        Ok(Box::new(Some(take_typed::<T>(value)?)))
    }
}

impl<T> PrimitiveDescriptor for OptionDescriptor<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
{
    fn encode(&self, value: &dyn Instance) -> Result<Node, TraverseError> {
        if self.is_null(value) {
            return Ok(Node::null());
        }
        match self.inner.kind() {
            DescriptorKind::Primitive(primitive) => primitive.encode(self.unwrap_ref(value)?),
            other => Err(TraverseError::NodeShape {
                expected: "primitive",
                found: other.name(),
            }),
        }
    }

    fn decode(&self, node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        if node.is_null() {
            return Ok(Box::new(None::<T>));
        }
        match self.inner.kind() {
            DescriptorKind::Primitive(primitive) => {
                let inner = primitive.decode(node)?;
                Ok(Box::new(Some(take_typed::<T>(inner)?)))
            }
            other => Err(TraverseError::NodeShape {
                expected: "primitive",
                found: other.name(),
            }),
        }
    }
}

struct OptionMemberAccessor<T> {
    inner: Arc<dyn Accessor>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Accessor for OptionMemberAccessor<T>
where
    T: Instance + Clone,
    Option<T>: Instance,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner
            .downcast_ref::<Option<T>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<Option<T>>(),
                found: owner.type_path().into(),
            })?;
        let inner = owner.as_ref().ok_or(AccessError::TypeMismatch {
            expected: core::any::type_name::<T>(),
            found: Cow::Borrowed("None"),
        })?;
        self.inner.get(inner)
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<Option<T>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<Option<T>>(),
                found: Cow::Borrowed(found),
            })?;
        let inner = owner.as_mut().ok_or(AccessError::TypeMismatch {
            expected: core::any::type_name::<T>(),
            found: Cow::Borrowed("None"),
        })?;
        match self.inner.set(inner, value)? {
            Written::InPlace => Ok(Written::InPlace),
            Written::Replaced(replacement) => {
                *owner = Some(take_typed::<T>(replacement)?);
                Ok(Written::InPlace)
            }
        }
    }
}

impl<T> CompositeDescriptor for OptionDescriptor<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
{
    fn step_count(&self, target: Option<&dyn Instance>) -> usize {
        let inner_target = target
            .and_then(|target| target.downcast_ref::<Option<T>>())
            .and_then(Option::as_ref);
        match self.inner.kind().composite() {
            Some(composite) => {
                composite.step_count(inner_target.map(|inner| inner as &dyn Instance))
            }
            None => 0,
        }
    }

    fn construction_step_count(&self) -> usize {
        self.inner
            .kind()
            .composite()
            .map_or(0, CompositeDescriptor::construction_step_count)
    }

    fn member_at(&self, step: usize, target: Option<&dyn Instance>) -> Option<Member> {
        let inner_target = target
            .and_then(|target| target.downcast_ref::<Option<T>>())
            .and_then(Option::as_ref);
        let member = self
            .inner
            .kind()
            .composite()?
            .member_at(step, inner_target.map(|inner| inner as &dyn Instance))?;
        Some(Member {
            accessor: Arc::new(OptionMemberAccessor::<T> {
                inner: member.accessor.clone(),
                marker: PhantomData,
            }),
            ..member
        })
    }

    fn create_initial(&self, node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        let composite = self.require_composite()?;
        let inner = composite.create_initial(node)?;
        Ok(Box::new(Some(take_typed::<T>(inner)?)))
    }

    fn construct(&self, buffer: &mut ConstructionBuffer) -> Result<Box<dyn Instance>, TraverseError> {
        let composite = self.require_composite()?;
        let inner = composite.construct(buffer)?;
        Ok(Box::new(Some(take_typed::<T>(inner)?)))
    }

    fn before_write(&self, target: &dyn Instance) {
        if let (Some(composite), Ok(inner)) = (self.inner.kind().composite(), self.unwrap_ref(target))
        {
            composite.before_write(inner);
        }
    }

    fn after_read(&self, target: &mut dyn Instance) {
        let Some(inner) = target
            .downcast_mut::<Option<T>>()
            .and_then(Option::as_mut)
        else {
            return;
        };
        if let Some(composite) = self.inner.kind().composite() {
            composite.after_read(inner);
        }
    }
}

impl<T> OptionDescriptor<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
{
    fn require_composite(&self) -> Result<&dyn CompositeDescriptor, TraverseError> {
        self.inner
            .kind()
            .composite()
            .ok_or(TraverseError::NodeShape {
                expected: "composite",
                found: "primitive",
            })
    }
}

impl<T> CollectionDescriptor for OptionDescriptor<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
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
        let inner = target
            .downcast_mut::<Option<T>>()
            .and_then(Option::as_mut)
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<T>(),
                found: Cow::Borrowed(found),
            })?;
        collection.resize(inner, len)
    }
}

impl<T> Describe for Option<T>
where
    T: Describe + Instance + Clone,
    Option<T>: Instance,
{
    fn type_ref() -> TypeRef {
        let inner = T::type_ref();
        TypeRef {
            id: TypeId::of::<Option<T>>(),
            path: core::any::type_name::<Option<T>>(),
            context: inner.context,
            value_semantics: inner.value_semantics,
        }
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(OptionDescriptor::<T> {
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
    use super::*;
    use crate::node::Scalar;

    #[test]
    fn option_of_primitive_stays_primitive() {
        let descriptor = <Option<i32> as Describe>::descriptor();
        let primitive = match descriptor.kind() {
            DescriptorKind::Primitive(primitive) => primitive,
            _ => panic!("expected a primitive"),
        };

        assert_eq!(primitive.encode(&None::<i32>).unwrap(), Node::null());
        assert_eq!(
            primitive.encode(&Some(4_i32)).unwrap(),
            Node::Primitive(Scalar::I64(4))
        );

        let decoded = primitive.decode(&Node::null()).unwrap();
        assert_eq!(decoded.downcast_ref::<Option<i32>>(), Some(&None));
    }

    #[test]
    fn null_checks_see_through_the_wrapper() {
        let descriptor = <Option<i32> as Describe>::descriptor();
        assert!(descriptor.is_null(&None::<i32>));
        assert!(!descriptor.is_null(&Some(1_i32)));
        let null = descriptor.null_value().unwrap();
        assert_eq!(null.downcast_ref::<Option<i32>>(), Some(&None));
    }

    #[test]
    fn option_of_collection_delegates_steps() {
        use alloc::vec;
        use alloc::vec::Vec;

        let descriptor = <Option<Vec<i32>> as Describe>::descriptor();
        let collection = match descriptor.kind() {
            DescriptorKind::Collection(collection) => collection,
            _ => panic!("expected a collection"),
        };

        let mut target: Option<Vec<i32>> = Some(vec![1, 2]);
        assert_eq!(collection.step_count(Some(&target)), 2);
        collection.resize(&mut target, 4).unwrap();
        assert_eq!(target.as_ref().map(Vec::len), Some(4));

        let member = collection.member_at(0, Some(&target)).unwrap();
        let element = member.accessor.get(&target).unwrap();
        assert_eq!(element.downcast_ref::<i32>(), Some(&1));
    }
}
