//! The abstract contract between the traversal engine and a type universe.
//!
//! A [`Descriptor`] teaches the engine how to decompose and recompose one
//! `(type, context)` pair, without the type itself carrying any serialization
//! logic. Three kinds exist:
//!
//! - [`PrimitiveDescriptor`]: atomic; reads and writes a node directly and
//!   never pushes a traversal cursor.
//! - [`CompositeDescriptor`]: has a step count and exposes one [`Member`]
//!   per step; an optional constructor-argument prefix supports immutable
//!   types created from a [`ConstructionBuffer`].
//! - [`CollectionDescriptor`]: a composite that can additionally be resized
//!   to a target element count.
//!
//! Values flow through the engine as [`Box<dyn Instance>`](Instance), the
//! crate's erased-value handle.

mod contract;
mod instance;
mod member;

pub use contract::{
    CollectionDescriptor, CompositeDescriptor, ConstructionBuffer, Descriptor, DescriptorHandle,
    DescriptorKind, PrimitiveDescriptor, TraversalContext, TypeRef,
};
pub use instance::Instance;
pub use member::{Accessor, Member, MemberKey, Written};
