use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;

use crate::descriptor::{Instance, TypeRef};
use crate::error::AccessError;
use crate::impls::Dynamic;
use crate::registry::Describe;

// -----------------------------------------------------------------------------
// MemberKey

/// How one member of a composite is addressed: by name in keyed composites,
/// by position in indexed collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Name(Cow<'static, str>),
    Index(usize),
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

// -----------------------------------------------------------------------------
// Accessor

/// The result of writing a member back into its owner.
#[derive(Debug)]
pub enum Written {
    /// The owner was mutated in place.
    InPlace,
    /// Writing produced a replacement owner; the caller must substitute it
    /// wherever the old owner instance was held.
    Replaced(Box<dyn Instance>),
}

/// Reads and writes one member slot of an erased owner.
pub trait Accessor: Send + Sync {
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError>;

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError>;
}

fn owner_mismatch<O>(found: &dyn Instance) -> AccessError {
    AccessError::TypeMismatch {
        expected: core::any::type_name::<O>(),
        found: found.type_path().into(),
    }
}

fn value_mismatch<V>(found: Box<dyn Instance>) -> AccessError {
    AccessError::TypeMismatch {
        expected: core::any::type_name::<V>(),
        found: found.type_path().into(),
    }
}

struct FnAccessor<O, V, G, S> {
    get: G,
    set: S,
    marker: PhantomData<fn() -> (O, V)>,
}

impl<O, V, G, S> Accessor for FnAccessor<O, V, G, S>
where
    O: Any,
    V: Instance,
    G: Fn(&O) -> V + Send + Sync,
    S: Fn(&mut O, V) + Send + Sync,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner.downcast_ref::<O>().ok_or_else(|| owner_mismatch::<O>(owner))?;
        Ok(Box::new((self.get)(owner)))
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<O>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<O>(),
                found: Cow::Borrowed(found),
            })?;
        let value = value.take::<V>().map_err(value_mismatch::<V>)?;
        (self.set)(owner, value);
        Ok(Written::InPlace)
    }
}

struct RebuildAccessor<O, V, G, S> {
    get: G,
    rebuild: S,
    marker: PhantomData<fn() -> (O, V)>,
}

impl<O, V, G, S> Accessor for RebuildAccessor<O, V, G, S>
where
    O: Instance,
    V: Instance,
    G: Fn(&O) -> V + Send + Sync,
    S: Fn(&O, V) -> O + Send + Sync,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner.downcast_ref::<O>().ok_or_else(|| owner_mismatch::<O>(owner))?;
        Ok(Box::new((self.get)(owner)))
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let owner = match owner.downcast_ref::<O>() {
            Some(owner) => owner,
            None => return Err(owner_mismatch::<O>(owner)),
        };
        let value = value.take::<V>().map_err(value_mismatch::<V>)?;
        Ok(Written::Replaced(Box::new((self.rebuild)(owner, value))))
    }
}

struct GetOnlyAccessor<O, V, G> {
    name: Cow<'static, str>,
    get: G,
    marker: PhantomData<fn() -> (O, V)>,
}

impl<O, V, G> Accessor for GetOnlyAccessor<O, V, G>
where
    O: Any,
    V: Instance,
    G: Fn(&O) -> V + Send + Sync,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner.downcast_ref::<O>().ok_or_else(|| owner_mismatch::<O>(owner))?;
        Ok(Box::new((self.get)(owner)))
    }

    fn set(&self, _owner: &mut dyn Instance, _value: Box<dyn Instance>) -> Result<Written, AccessError> {
        Err(AccessError::ReadOnly {
            member: self.name.clone(),
        })
    }
}

struct DynamicAccessor<O, G, S> {
    get: G,
    set: S,
    marker: PhantomData<fn() -> O>,
}

impl<O, G, S> Accessor for DynamicAccessor<O, G, S>
where
    O: Any,
    G: Fn(&O) -> Dynamic + Send + Sync,
    S: Fn(&mut O, Dynamic) + Send + Sync,
{
    fn get(&self, owner: &dyn Instance) -> Result<Box<dyn Instance>, AccessError> {
        let owner = owner.downcast_ref::<O>().ok_or_else(|| owner_mismatch::<O>(owner))?;
        Ok((self.get)(owner).into_inner())
    }

    fn set(&self, owner: &mut dyn Instance, value: Box<dyn Instance>) -> Result<Written, AccessError> {
        let found = owner.type_path();
        let owner = owner
            .downcast_mut::<O>()
            .ok_or(AccessError::TypeMismatch {
                expected: core::any::type_name::<O>(),
                found: Cow::Borrowed(found),
            })?;
        (self.set)(owner, Dynamic::from_boxed(value));
        Ok(Written::InPlace)
    }
}

// -----------------------------------------------------------------------------
// Member

/// One step of a composite traversal: an addressable slot with its declared
/// type and the accessor that reads and writes it.
///
/// A member with `ty == None` is skipped without affecting the step indices
/// reported to the engine; descriptors use this for conditional members.
#[derive(Clone)]
pub struct Member {
    pub key: MemberKey,
    pub ty: Option<TypeRef>,
    pub value_semantics: bool,
    pub accessor: Arc<dyn Accessor>,
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("key", &self.key)
            .field("ty", &self.ty.map(|ty| ty.path))
            .field("value_semantics", &self.value_semantics)
            .finish_non_exhaustive()
    }
}

impl Member {
    /// A member from raw parts. The convenience constructors below cover the
    /// common shapes.
    pub fn new(key: MemberKey, ty: Option<TypeRef>, accessor: Arc<dyn Accessor>) -> Self {
        let value_semantics = ty.is_some_and(|ty| ty.value_semantics);
        Self {
            key,
            ty,
            value_semantics,
            accessor,
        }
    }

    /// A named field backed by a getter/setter pair.
    pub fn field<O, V>(
        name: impl Into<Cow<'static, str>>,
        get: impl Fn(&O) -> V + Send + Sync + 'static,
        set: impl Fn(&mut O, V) + Send + Sync + 'static,
    ) -> Self
    where
        O: Any,
        V: Describe + Instance,
    {
        Self::new(
            MemberKey::Name(name.into()),
            Some(V::type_ref()),
            Arc::new(FnAccessor {
                get,
                set,
                marker: PhantomData,
            }),
        )
    }

    /// An indexed element backed by a getter/setter pair.
    pub fn element<O, V>(
        index: usize,
        get: impl Fn(&O) -> V + Send + Sync + 'static,
        set: impl Fn(&mut O, V) + Send + Sync + 'static,
    ) -> Self
    where
        O: Any,
        V: Describe + Instance,
    {
        Self::new(
            MemberKey::Index(index),
            Some(V::type_ref()),
            Arc::new(FnAccessor {
                get,
                set,
                marker: PhantomData,
            }),
        )
    }

    /// A named field whose write rebuilds the owner instead of mutating it.
    ///
    /// The engine substitutes the rebuilt owner for the old one wherever the
    /// old instance is held on the execution stack.
    pub fn rebuilding_field<O, V>(
        name: impl Into<Cow<'static, str>>,
        get: impl Fn(&O) -> V + Send + Sync + 'static,
        rebuild: impl Fn(&O, V) -> O + Send + Sync + 'static,
    ) -> Self
    where
        O: Instance,
        V: Describe + Instance,
    {
        Self::new(
            MemberKey::Name(name.into()),
            Some(V::type_ref()),
            Arc::new(RebuildAccessor {
                get,
                rebuild,
                marker: PhantomData,
            }),
        )
    }

    /// A constructor argument: readable for serialization, never written.
    pub fn constructor_arg<O, V>(
        name: impl Into<Cow<'static, str>>,
        get: impl Fn(&O) -> V + Send + Sync + 'static,
    ) -> Self
    where
        O: Any,
        V: Describe + Instance,
    {
        let name = name.into();
        Self::new(
            MemberKey::Name(name.clone()),
            Some(V::type_ref()),
            Arc::new(GetOnlyAccessor {
                name,
                get,
                marker: PhantomData,
            }),
        )
    }

    /// A named field holding an arbitrary runtime type behind [`Dynamic`].
    pub fn dynamic_field<O>(
        name: impl Into<Cow<'static, str>>,
        get: impl Fn(&O) -> Dynamic + Send + Sync + 'static,
        set: impl Fn(&mut O, Dynamic) + Send + Sync + 'static,
    ) -> Self
    where
        O: Any,
    {
        Self::new(
            MemberKey::Name(name.into()),
            Some(Dynamic::type_ref()),
            Arc::new(DynamicAccessor {
                get,
                set,
                marker: PhantomData,
            }),
        )
    }

    /// A skipped step: holds a place in the step order without being visited.
    pub fn skipped(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        Self {
            key: MemberKey::Name(name.clone()),
            ty: None,
            value_semantics: false,
            accessor: Arc::new(GetOnlyAccessor::<(), (), fn(&()) -> ()> {
                name,
                get: |_| (),
                marker: PhantomData,
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
