//! Shared demo types used across the integration tests.
#![allow(dead_code)]

use trellis::{
    Describe, DescriptorHandle, DescriptorRegistry, Dynamic, RecordBuilder, Shared, TypeRef,
};

// -----------------------------------------------------------------------------
// Value records

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sensor {
    pub label: String,
    pub weight: f64,
}

impl Sensor {
    pub fn new(label: &str, weight: f64) -> Self {
        Self {
            label: label.into(),
            weight,
        }
    }
}

impl Describe for Sensor {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Sensor>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Sensor>::new("demo::Sensor")
            .field("label", |s: &Sensor| s.label.clone(), |s, v| s.label = v)
            .field("weight", |s: &Sensor| s.weight, |s, v| s.weight = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<String>();
        registry.register::<f64>();
    }
}

// -----------------------------------------------------------------------------
// Reference-carrying records

#[derive(Debug, Clone, Default)]
pub struct Device {
    pub name: String,
    pub primary: Option<Shared<Sensor>>,
    pub backup: Option<Shared<Sensor>>,
}

impl Describe for Device {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Device>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Device>::new("demo::Device")
            .field("name", |d: &Device| d.name.clone(), |d, v| d.name = v)
            .field("primary", |d: &Device| d.primary.clone(), |d, v| d.primary = v)
            .field("backup", |d: &Device| d.backup.clone(), |d, v| d.backup = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<String>();
        registry.register::<Option<Shared<Sensor>>>();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Person {
    pub name: String,
    pub partner: Option<Shared<Person>>,
}

impl Describe for Person {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Person>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Person>::new("demo::Person")
            .field("name", |p: &Person| p.name.clone(), |p, v| p.name = v)
            .field("partner", |p: &Person| p.partner.clone(), |p, v| p.partner = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<String>();
        registry.register::<Option<Shared<Person>>>();
    }
}

// -----------------------------------------------------------------------------
// Constructor-built records

#[derive(Debug, Clone, Default)]
pub struct Hub {
    pub label: String,
}

impl Describe for Hub {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Hub>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Hub>::new("demo::Hub")
            .field("label", |h: &Hub| h.label.clone(), |h, v| h.label = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<String>();
    }
}

/// Immutable: its target hub is a constructor argument.
#[derive(Debug, Clone)]
pub struct Link {
    pub to: Shared<Hub>,
}

impl Describe for Link {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Link>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Link>::new("demo::Link")
            .constructor_arg("to", |l: &Link| l.to.clone())
            .construct(|args| {
                Ok(Link {
                    to: args.take::<Shared<Hub>>(0)?,
                })
            })
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<Shared<Hub>>();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Depot {
    pub link: Option<Link>,
    pub hub: Option<Shared<Hub>>,
}

impl Describe for Depot {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Depot>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Depot>::new("demo::Depot")
            .field("link", |d: &Depot| d.link.clone(), |d, v| d.link = v)
            .field("hub", |d: &Depot| d.hub.clone(), |d, v| d.hub = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<Option<Link>>();
        registry.register::<Option<Shared<Hub>>>();
    }
}

/// Immutable and self-referential: a cycle of wires can never be
/// constructed, which the driver must detect rather than loop on.
#[derive(Debug, Clone)]
pub struct Wire {
    pub to: Option<Shared<Wire>>,
}

impl Describe for Wire {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Wire>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Wire>::new("demo::Wire")
            .constructor_arg("to", |w: &Wire| w.to.clone())
            .construct(|args| {
                Ok(Wire {
                    to: args.take::<Option<Shared<Wire>>>(0)?,
                })
            })
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<Option<Shared<Wire>>>();
    }
}

// -----------------------------------------------------------------------------
// Sibling references

#[derive(Debug, Clone, Default)]
pub struct PairBox {
    pub first: Option<Shared<Sensor>>,
    pub second: Option<Shared<Sensor>>,
}

impl Describe for PairBox {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<PairBox>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<PairBox>::new("demo::PairBox")
            .field("first", |p: &PairBox| p.first.clone(), |p, v| p.first = v)
            .field("second", |p: &PairBox| p.second.clone(), |p, v| p.second = v)
            .initial_default()
            .finish()
    }

    fn register_dependencies(registry: &mut DescriptorRegistry) {
        registry.register::<Option<Shared<Sensor>>>();
    }
}

// -----------------------------------------------------------------------------
// Open-polymorphism slot

#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub payload: Dynamic,
}

impl Describe for Slot {
    fn type_ref() -> TypeRef {
        TypeRef::value_of::<Slot>()
    }

    fn descriptor() -> DescriptorHandle {
        RecordBuilder::<Slot>::new("demo::Slot")
            .dynamic_field("payload", |s: &Slot| s.payload.clone(), |s, v| s.payload = v)
            .initial_default()
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Registry

pub fn registry() -> DescriptorRegistry {
    let mut registry = DescriptorRegistry::new();
    registry.register::<Sensor>();
    registry.register::<Shared<Sensor>>();
    registry.register::<Device>();
    registry.register::<Person>();
    registry.register::<Shared<Person>>();
    registry.register::<Hub>();
    registry.register::<Link>();
    registry.register::<Depot>();
    registry.register::<Shared<Depot>>();
    registry.register::<Wire>();
    registry.register::<Shared<Wire>>();
    registry.register::<PairBox>();
    registry.register::<Shared<PairBox>>();
    registry.register::<Slot>();
    registry
}
