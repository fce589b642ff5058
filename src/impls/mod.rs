//! Built-in descriptors.
//!
//! Covers the scalar primitives, `Vec<T>` and `[T; N]` collections,
//! `BTreeMap<K, V>` (as a collection of constructor-built entries),
//! transparent `Option<T>` wrappers, the [`Shared`] reference handle, the
//! [`Dynamic`] open-polymorphism slot, and the [`RecordBuilder`] for user
//! composites.

mod dynamic;
mod list;
mod map;
mod option;
mod record;
mod scalar;
mod shared;

pub use dynamic::Dynamic;
pub use map::MapEntry;
pub use record::RecordBuilder;
pub use shared::Shared;

use alloc::boxed::Box;
use core::any::Any;

use crate::descriptor::Instance;
use crate::error::AccessError;

/// Unwraps an erased value into `T`, reporting a mismatch as an access error.
pub(crate) fn take_typed<T: Any>(value: Box<dyn Instance>) -> Result<T, AccessError> {
    value.take::<T>().map_err(|value| AccessError::TypeMismatch {
        expected: core::any::type_name::<T>(),
        found: value.type_path().into(),
    })
}
