#![doc = include_str!("../README.md")]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod impls;
pub mod node;
pub mod registry;

pub(crate) mod util;

// -----------------------------------------------------------------------------
// Top-level exports

pub use descriptor::{
    Accessor, CollectionDescriptor, CompositeDescriptor, ConstructionBuffer, Descriptor,
    DescriptorHandle, DescriptorKind, Instance, Member, MemberKey, PrimitiveDescriptor,
    TraversalContext, TypeRef, Written,
};
pub use engine::{Budget, Driver, Report, ReportEntry, ReportLevel, Tick, deserialize, serialize};
pub use error::{AccessError, TraverseError};
pub use impls::{Dynamic, MapEntry, RecordBuilder, Shared};
pub use node::{Node, ObjectId, ObjectNode, Scalar};
pub use registry::{Describe, DescriptorRegistry};
