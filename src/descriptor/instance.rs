use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

// -----------------------------------------------------------------------------
// Instance

/// An erased value travelling through the traversal engine.
///
/// Every value the engine reads from or writes into an object graph is a
/// `Box<dyn Instance>`. The trait is implemented automatically for any
/// `'static` type that is `Clone + Debug`, so graph types need no manual
/// implementation; descriptors downcast with the helpers on `dyn Instance`.
///
/// Note that [`Any::type_id`] on a `Box<dyn Instance>` names the box, not
/// the value inside; use [`Instance::as_any`] (or deref first) to reach the
/// inner value's type:
///
/// ```
/// use trellis::Instance;
/// use core::any::{Any, TypeId};
///
/// let value: Box<dyn Instance> = Box::new(7_i32);
/// assert_eq!(value.as_any().type_id(), TypeId::of::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&7));
/// ```
pub trait Instance: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// The full path of the concrete type, for diagnostics.
    fn type_path(&self) -> &'static str;

    /// Clones the value behind the erasure.
    fn clone_instance(&self) -> Box<dyn Instance>;

    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Any + Clone + fmt::Debug> Instance for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    #[inline]
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    #[inline]
    fn type_path(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    #[inline]
    fn clone_instance(&self) -> Box<dyn Instance> {
        Box::new(self.clone())
    }

    #[inline]
    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Debug for dyn Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_fmt(f)
    }
}

// -----------------------------------------------------------------------------
// Downcast helpers

impl dyn Instance {
    /// Whether the erased value is a `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// The [`TypeId`] of the erased value.
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Downcasts to a shared reference.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts to an exclusive reference.
    #[inline]
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Unwraps the boxed value, returning the box on type mismatch.
    pub fn take<T: Any>(self: Box<Self>) -> Result<T, Box<dyn Instance>> {
        if self.is::<T>() {
            match self.into_any().downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(_) => unreachable!(),
            }
        } else {
            Err(self)
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
