//! Descriptors for ordered maps.
//!
//! A `BTreeMap<K, V>` traverses as a collection of [`MapEntry`] elements, so
//! arbitrary (non-string) key types round-trip and iteration order stays
//! deterministic. Each entry is built through a two-argument constructor,
//! since an entry without its key is meaningless.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::any::TypeId;
use core::marker::PhantomData;

use crate::descriptor::{
    Accessor, CollectionDescriptor, CompositeDescriptor, ConstructionBuffer, Descriptor,
    DescriptorHandle, DescriptorKind, Instance, Member, MemberKey, TypeRef, Written,
};
use crate::error::{AccessError, TraverseError};
use crate::impls::take_typed;
use crate::node::Node;
use crate::registry::{Describe, DescriptorRegistry};

// -----------------------------------------------------------------------------
// MapEntry

/// One key/value pair of a map traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry<K, V> {
    pub key: K,
    pub value: V,
}

struct EntryDescriptor<K, V> {
    marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Descriptor for EntryDescriptor<K, V>
where
    K: Describe + Instance + Clone,
    V: Describe + Instance + Clone,
    MapEntry<K, V>: Instance,
{
    fn type_id(&self) -> TypeId {
        TypeId::of::<MapEntry<K, V>>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<MapEntry<K, V>>()
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Composite(self)
    }
}

impl<K, V> CompositeDescriptor for EntryDescriptor<K, V>
where
    K: Describe + Instance + Clone,
    V: Describe + Instance + Clone,
    MapEntry<K, V>: Instance,
{
    fn step_count(&self, _target: Option<&dyn Instance>) -> usize {
        2
    }

    fn construction_step_count(&self) -> usize {
        2
    }

    fn member_at(&self, step: usize, _target: Option<&dyn Instance>) -> Option<Member> {
        match step {
            0 => Some(Member::constructor_arg("key", |entry: &MapEntry<K, V>| {
                entry.key.clone()
            })),
            1 => Some(Member::constructor_arg("value", |entry: &MapEntry<K, V>| {
                entry.value.clone()
            })),
            _ => None,
        }
    }

    fn create_initial(&self, _node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        Err(TraverseError::Construct {
            type_path: Cow::Borrowed(core::any::type_name::<MapEntry<K, V>>()),
            message: Cow::Borrowed("map entries are constructor-built"),
        })
    }

    fn construct(&self, buffer: &mut ConstructionBuffer) -> Result<Box<dyn Instance>, TraverseError> {
        Ok(Box::new(MapEntry {
            key: buffer.take::<K>(0)?,
            value: buffer.take::<V>(1)?,
        }))
    }
}

impl<K, V> Describe for MapEntry<K, V>
where
    K: Describe + Instance + Clone,
    V: Describe + Instance + Clone,
    MapEntry<K, V>: Instance,
{
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<MapEntry<K, V>>()
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(EntryDescriptor::<K, V> {
            marker: PhantomData,
        })
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<K>();
        registry.register::<V>();
    }
}

// -----------------------------------------------------------------------------
// BTreeMap<K, V>

struct MapEntryAccessor<K, V> {
    index: usize,
    marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Accessor for MapEntryAccessor<K, V>
where
    K: Instance + Clone + Ord,
    V: Instance + Clone,
    MapEntry<K, V>: Instance,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner
            .downcast_ref::<BTreeMap<K, V>>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<BTreeMap<K, V>>(),
                found: owner.type_path().into(),
            })?;
        let (key, value) = owner.iter().nth(self.index).ok_or(AccessError::OutOfBounds {
            index: self.index,
            len: owner.len(),
        })?;
        Ok(Box::new(MapEntry {
            key: key.clone(),
            value: value.clone(),
        }))
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<BTreeMap<K, V>>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<BTreeMap<K, V>>(),
                found: Cow::Borrowed(found),
            })?;
        let entry = take_typed::<MapEntry<K, V>>(value)?;
        owner.insert(entry.key, entry.value);
        Ok(Written::InPlace)
    }
}

struct MapDescriptor<K, V> {
    marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Descriptor for MapDescriptor<K, V>
where
    K: Describe + Instance + Clone + Ord,
    V: Describe + Instance + Clone,
    BTreeMap<K, V>: Instance,
    MapEntry<K, V>: Instance,
{
    fn type_id(&self) -> TypeId {
        TypeId::of::<BTreeMap<K, V>>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<BTreeMap<K, V>>()
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Collection(self)
    }
}

impl<K, V> CompositeDescriptor for MapDescriptor<K, V>
where
    K: Describe + Instance + Clone + Ord,
    V: Describe + Instance + Clone,
    BTreeMap<K, V>: Instance,
    MapEntry<K, V>: Instance,
{
    fn step_count(&self, target: Option<&dyn Instance>) -> usize {
        target
            .and_then(|target| target.downcast_ref::<BTreeMap<K, V>>())
            .map_or(0, BTreeMap::len)
    }

    fn member_at(&self, step: usize, _target: Option<&dyn Instance>) -> Option<Member> {
        Some(Member::new(
            MemberKey::Index(step),
            Some(MapEntry::<K, V>::type_ref()),
            Arc::new(MapEntryAccessor::<K, V> {
                index: step,
                marker: PhantomData,
            }),
        ))
    }

    fn create_initial(&self, _node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        Ok(Box::new(BTreeMap::<K, V>::new()))
    }
}

impl<K, V> CollectionDescriptor for MapDescriptor<K, V>
where
    K: Describe + Instance + Clone + Ord,
    V: Describe + Instance + Clone,
    BTreeMap<K, V>: Instance,
    MapEntry<K, V>: Instance,
{
    /// Maps grow by entry insertion; the element count needs no preparation.
    fn resize(&self, _target: &mut dyn Instance, _len: usize) -> Result<(), TraverseError> {
        Ok(())
    }
}

impl<K, V> Describe for BTreeMap<K, V>
where
    K: Describe + Instance + Clone + Ord,
    V: Describe + Instance + Clone,
    BTreeMap<K, V>: Instance,
    MapEntry<K, V>: Instance,
{
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<BTreeMap<K, V>>()
    }

    fn descriptor() -> DescriptorHandle {
        Arc::new(MapDescriptor::<K, V> {
            marker: PhantomData,
        })
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<MapEntry<K, V>>();
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;

    #[test]
    fn entries_come_back_in_key_order() {
        let descriptor = <BTreeMap<String, i32> as Describe>::descriptor();
        let collection = match descriptor.kind() {
            DescriptorKind::Collection(collection) => collection,
            _ => panic!("expected a collection"),
        };

        let mut map = BTreeMap::new();
        map.insert(String::from("b"), 2);
        map.insert(String::from("a"), 1);

        assert_eq!(collection.step_count(Some(&map)), 2);
        let member = collection.member_at(0, Some(&map)).unwrap();
        let entry = member.accessor.get(&map).unwrap();
        let entry = entry.downcast_ref::<MapEntry<String, i32>>().unwrap();
        assert_eq!(entry.key, "a");
        assert_eq!(entry.value, 1);
    }

    #[test]
    fn setting_an_entry_inserts_it() {
        let descriptor = <BTreeMap<String, i32> as Describe>::descriptor();
        let collection = match descriptor.kind() {
            DescriptorKind::Collection(collection) => collection,
            _ => panic!("expected a collection"),
        };

        let mut map = BTreeMap::<String, i32>::new();
        let member = collection.member_at(0, None).unwrap();
        member
            .accessor
            .set(
                &mut map,
                Box::new(MapEntry {
                    key: String::from("k"),
                    value: 9,
                }),
            )
            .unwrap();
        assert_eq!(map.get("k"), Some(&9));
    }

    #[test]
    fn entry_construction_consumes_both_slots() {
        let descriptor = <MapEntry<String, i32> as Describe>::descriptor();
        let composite = match descriptor.kind() {
            DescriptorKind::Composite(composite) => composite,
            _ => panic!("expected a composite"),
        };

        let mut buffer = ConstructionBuffer::new(2);
        buffer.fill(0, Box::new(String::from("k")));
        buffer.fill(1, Box::new(3_i32));
        let entry = composite.construct(&mut buffer).unwrap();
        let entry = entry.downcast_ref::<MapEntry<String, i32>>().unwrap();
        assert_eq!(entry.key, "k");
        assert_eq!(entry.value, 3);
    }
}
