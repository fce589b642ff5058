//! Descriptors for the scalar primitives.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::any::TypeId;
use core::marker::PhantomData;

use crate::descriptor::{
    Descriptor, DescriptorHandle, DescriptorKind, Instance, PrimitiveDescriptor, TypeRef,
};
use crate::error::{AccessError, TraverseError};
use crate::node::{Node, Scalar};
use crate::registry::Describe;

// -----------------------------------------------------------------------------
// ScalarCodec

/// Conversion between a Rust scalar type and the wire [`Scalar`].
///
/// Unsigned values that fit a signed 64-bit integer are canonicalized to
/// [`Scalar::I64`], matching what the node tree's wire bridge produces, so
/// trees compare equal across a wire round-trip.
trait ScalarCodec: Instance + Sized {
    fn to_scalar(&self) -> Scalar;

    fn from_scalar(scalar: &Scalar) -> Option<Self>;
}

fn canonical_unsigned(value: u64) -> Scalar {
    match i64::try_from(value) {
        Ok(signed) => Scalar::I64(signed),
        Err(_) => Scalar::U64(value),
    }
}

macro_rules! impl_signed_codec {
    ($($ty:ty),+) => {
        $(impl ScalarCodec for $ty {
            fn to_scalar(&self) -> Scalar {
                Scalar::I64(*self as i64)
            }

            fn from_scalar(scalar: &Scalar) -> Option<Self> {
                match scalar {
                    Scalar::I64(value) => Self::try_from(*value).ok(),
                    Scalar::U64(value) => Self::try_from(*value).ok(),
                    _ => None,
                }
            }
        })+
    };
}

macro_rules! impl_unsigned_codec {
    ($($ty:ty),+) => {
        $(impl ScalarCodec for $ty {
            fn to_scalar(&self) -> Scalar {
                canonical_unsigned(*self as u64)
            }

            fn from_scalar(scalar: &Scalar) -> Option<Self> {
                match scalar {
                    Scalar::I64(value) => Self::try_from(*value).ok(),
                    Scalar::U64(value) => Self::try_from(*value).ok(),
                    _ => None,
                }
            }
        })+
    };
}

impl_signed_codec!(i8, i16, i32, i64, isize);
impl_unsigned_codec!(u8, u16, u32, u64, usize);

impl ScalarCodec for bool {
    fn to_scalar(&self) -> Scalar {
        Scalar::Bool(*self)
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl ScalarCodec for f32 {
    fn to_scalar(&self) -> Scalar {
        Scalar::F64(f64::from(*self))
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::F64(value) => Some(*value as f32),
            Scalar::I64(value) => Some(*value as f32),
            Scalar::U64(value) => Some(*value as f32),
            _ => None,
        }
    }
}

impl ScalarCodec for f64 {
    fn to_scalar(&self) -> Scalar {
        Scalar::F64(*self)
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::F64(value) => Some(*value),
            Scalar::I64(value) => Some(*value as f64),
            Scalar::U64(value) => Some(*value as f64),
            _ => None,
        }
    }
}

impl ScalarCodec for char {
    fn to_scalar(&self) -> Scalar {
        Scalar::Str(self.to_string())
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Str(value) => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl ScalarCodec for String {
    fn to_scalar(&self) -> Scalar {
        Scalar::Str(self.clone())
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Str(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl ScalarCodec for () {
    fn to_scalar(&self) -> Scalar {
        Scalar::Null
    }

    fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Null => Some(()),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// ScalarDescriptor

struct ScalarDescriptor<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T: ScalarCodec> Descriptor for ScalarDescriptor<T> {
    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_path(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Primitive(self)
    }
}

impl<T: ScalarCodec> PrimitiveDescriptor for ScalarDescriptor<T> {
    fn encode(&self, value: &dyn Instance) -> Result<Node, TraverseError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| AccessError::TypeMismatch {
                expected: core::any::type_name::<T>(),
                found: value.type_path().into(),
            })?;
        Ok(Node::Primitive(value.to_scalar()))
    }

    fn decode(&self, node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        let scalar = match node {
            Node::Primitive(scalar) => scalar,
            other => {
                return Err(TraverseError::NodeShape {
                    expected: "primitive",
                    found: other.kind_name(),
                });
            }
        };
        let value = T::from_scalar(scalar).ok_or(TraverseError::NodeShape {
            expected: core::any::type_name::<T>(),
            found: scalar.kind_name(),
        })?;
        Ok(Box::new(value))
    }
}

macro_rules! impl_scalar_describe {
    ($($ty:ty),+) => {
        $(impl Describe for $ty {
            fn type_ref() -> TypeRef {
                TypeRef::value_of::<$ty>()
            }

            fn descriptor() -> DescriptorHandle {
                Arc::new(ScalarDescriptor::<$ty> {
                    marker: PhantomData,
                })
            }
        })+
    };
}

impl_scalar_describe!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    f32,
    f64,
    String
);

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorKind;

    fn round_trip<T: ScalarCodec + PartialEq + Clone>(value: T) -> T {
        let descriptor = ScalarDescriptor::<T> {
            marker: PhantomData,
        };
        let node = descriptor.encode(&value).unwrap();
        descriptor.decode(&node).unwrap().take::<T>().unwrap()
    }

    #[test]
    fn scalars_round_trip() {
        assert_eq!(round_trip(true), true);
        assert_eq!(round_trip(-40_i32), -40);
        assert_eq!(round_trip(u64::MAX), u64::MAX);
        assert_eq!(round_trip(2.5_f32), 2.5);
        assert_eq!(round_trip('x'), 'x');
        assert_eq!(round_trip(String::from("node")), "node");
    }

    #[test]
    fn unsigned_values_canonicalize_to_signed() {
        let descriptor = ScalarDescriptor::<u32> {
            marker: PhantomData,
        };
        let node = descriptor.encode(&7_u32).unwrap();
        assert_eq!(node, Node::Primitive(Scalar::I64(7)));
    }

    #[test]
    fn narrowing_out_of_range_fails() {
        let descriptor = ScalarDescriptor::<u8> {
            marker: PhantomData,
        };
        let node = Node::Primitive(Scalar::I64(300));
        assert!(descriptor.decode(&node).is_err());
    }

    #[test]
    fn scalar_descriptors_are_primitive() {
        let handle = <i32 as Describe>::descriptor();
        assert!(matches!(handle.kind(), DescriptorKind::Primitive(_)));
        assert!(handle.sealed());
        assert!(handle.value_semantics());
    }
}
