//! Value-semantics write-back, including replacement owners propagating
//! through nested containers to the root.

mod common;

use common::registry;
use trellis::{
    Describe, DescriptorHandle, DescriptorRegistry, RecordBuilder, TypeRef, deserialize, serialize,
};

// Three levels of value-semantics nesting. Every write rebuilds its owner
// instead of mutating it, so each level exercises the stack's
// owner-replacement rule: the rebuilt owner must land in its frame and
// propagate further when that frame pops.

#[derive(Debug, Clone, PartialEq, Default)]
struct Inner {
    value: i32,
}

impl Describe for Inner {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Inner>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Inner>::new("demo::Inner")
            .rebuilding_field("value", |i: &Inner| i.value, |_, value| Inner { value })
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<i32>();
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Middle {
    inner: Inner,
}

impl Describe for Middle {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Middle>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Middle>::new("demo::Middle")
            .rebuilding_field("inner", |m: &Middle| m.inner.clone(), |_, inner| Middle { inner })
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<Inner>();
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Outer {
    middle: Middle,
    label: String,
}

impl Describe for Outer {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Outer>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Outer>::new("demo::Outer")
            .rebuilding_field("middle", |o: &Outer| o.middle.clone(), |o, middle| Outer {
                middle,
                label: o.label.clone(),
            })
            .field("label", |o: &Outer| o.label.clone(), |o, v| o.label = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<Middle>();
        registry.register::<String>();
    }
}

fn writeback_registry() -> DescriptorRegistry {
    let mut registry = registry();
    registry.register::<Outer>();
    registry
}

#[test]
fn replacement_owners_propagate_three_levels() {
    let registry = writeback_registry();

    let outer = Outer {
        middle: Middle {
            inner: Inner { value: -42 },
        },
        label: "deep".into(),
    };

    let node = serialize(&registry, &outer).unwrap();
    let back: Outer = deserialize(&registry, &node).unwrap();
    assert_eq!(back, outer);
    assert_eq!(back.middle.inner.value, -42);
    assert_eq!(back.label, "deep");
}

#[test]
fn replacement_owners_compose_with_collections() {
    let mut registry = writeback_registry();
    registry.register::<Vec<Middle>>();

    let middles: Vec<Middle> = (0..5)
        .map(|i| Middle {
            inner: Inner { value: i * 11 },
        })
        .collect();

    let node = serialize(&registry, &middles).unwrap();
    let back: Vec<Middle> = deserialize(&registry, &node).unwrap();
    assert_eq!(back, middles);
}

#[test]
fn in_place_and_rebuilding_fields_coexist() {
    let registry = writeback_registry();

    // `label` writes in place after `middle` replaced the owner instance;
    // the engine must apply later writes to the replacement.
    let outer = Outer {
        middle: Middle {
            inner: Inner { value: 404 },
        },
        label: "after-replacement".into(),
    };

    let node = serialize(&registry, &outer).unwrap();
    let back: Outer = deserialize(&registry, &node).unwrap();
    assert_eq!(back, outer);
}
