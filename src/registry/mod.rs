//! The descriptor registry.
//!
//! A [`DescriptorRegistry`] is the central store of [`Descriptor`]s for one
//! type universe. Registering a type generates its descriptor through the
//! type's [`Describe`] implementation and recursively registers its type
//! dependencies; each `(TypeId, TraversalContext)` pair maps to exactly one
//! cached descriptor instance.
//!
//! Registries are exclusively owned by one driver for the duration of one
//! operation; share one across operations by handing out `&DescriptorRegistry`
//! from a single owner.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::TypeId;
use core::cell::RefCell;

use crate::descriptor::{Descriptor, DescriptorHandle, TraversalContext, TypeRef};
use crate::error::TraverseError;
use crate::util::HashMap;

#[cfg(feature = "auto_register")]
pub use inventory;

// -----------------------------------------------------------------------------
// Describe

/// A type that can describe itself to a [`DescriptorRegistry`].
///
/// Implemented by the built-in scalar, list, map, option, shared and dynamic
/// types; user composites implement it with a
/// [`RecordBuilder`](crate::impls::RecordBuilder)-built descriptor:
///
/// ```
/// use trellis::{Describe, DescriptorHandle, DescriptorRegistry, RecordBuilder, TypeRef};
///
/// #[derive(Debug, Clone, PartialEq, Default)]
/// struct Probe {
///     label: String,
///     weight: f64,
/// }
///
/// impl Describe for Probe {
///     fn type_ref() -> TypeRef {
///         TypeRef::value_of::<Probe>()
///     }
///
///     fn descriptor() -> DescriptorHandle {
///         RecordBuilder::<Probe>::new("demo::Probe")
///             .field("label", |p: &Probe| p.label.clone(), |p, v| p.label = v)
///             .field("weight", |p: &Probe| p.weight, |p, v| p.weight = v)
///             .initial_default()
///             .finish()
///     }
///
///     fn register_dependencies(registry: &mut DescriptorRegistry) {
///         registry.register::<String>();
///         registry.register::<f64>();
///     }
/// }
///
/// let mut registry = DescriptorRegistry::new();
/// registry.register::<Probe>();
/// assert!(registry.lookup_path("demo::Probe").is_some());
/// ```
pub trait Describe: Sized + 'static {
    /// The declared type this descriptor is registered under.
    fn type_ref() -> TypeRef;

    /// Builds the descriptor. Called at most once per registry.
    fn descriptor() -> DescriptorHandle;

    /// Registers the types this type's members are declared as.
    fn register_dependencies(_registry: &mut DescriptorRegistry) {}
}

// -----------------------------------------------------------------------------
// DescriptorRegistry

type FallbackFn = Box<dyn Fn(TypeId, TraversalContext) -> Option<DescriptorHandle> + Send + Sync>;

/// The central store of descriptors for one type universe.
pub struct DescriptorRegistry {
    table: HashMap<(TypeId, TraversalContext), DescriptorHandle>,
    /// First registration per type, used for runtime descriptor re-resolution.
    natural: HashMap<TypeId, DescriptorHandle>,
    path_index: HashMap<&'static str, DescriptorHandle>,
    fallbacks: Vec<FallbackFn>,
    /// Fallback-built descriptors, cached so each pair keeps one instance.
    synthesized: RefCell<HashMap<(TypeId, TraversalContext), DescriptorHandle>>,
}

impl Default for DescriptorRegistry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            table: HashMap::default(),
            natural: HashMap::default(),
            path_index: HashMap::default(),
            fallbacks: Vec::new(),
            synthesized: RefCell::new(HashMap::default()),
        }
    }

    /// Creates a registry with default registrations for the primitive types:
    ///
    /// - `()` `bool` `char`
    /// - `i8` - `i64`, `isize`
    /// - `u8` - `u64`, `usize`
    /// - `f32` `f64`
    /// - `String`
    /// - [`Dynamic`](crate::impls::Dynamic)
    pub fn new() -> Self {
        use alloc::string::String;

        let mut registry = Self::empty();
        registry.register::<()>();
        registry.register::<bool>();
        registry.register::<char>();
        registry.register::<u8>();
        registry.register::<u16>();
        registry.register::<u32>();
        registry.register::<u64>();
        registry.register::<usize>();
        registry.register::<i8>();
        registry.register::<i16>();
        registry.register::<i32>();
        registry.register::<i64>();
        registry.register::<isize>();
        registry.register::<f32>();
        registry.register::<f64>();
        registry.register::<String>();
        registry.register::<crate::impls::Dynamic>();
        registry
    }

    fn insert_handle(&mut self, key: (TypeId, TraversalContext), handle: DescriptorHandle) {
        self.path_index
            .entry(handle.type_path())
            .or_insert_with(|| handle.clone());
        self.natural.entry(key.0).or_insert_with(|| handle.clone());
        self.table.insert(key, handle);
    }

    /// Registers `T` if it has not been registered already, then recursively
    /// registers its type dependencies. Repeated calls are cheap.
    pub fn register<T: Describe>(&mut self) {
        let ty = T::type_ref();
        let key = (ty.id, ty.context);
        if self.table.contains_key(&key) {
            return;
        }
        self.insert_handle(key, T::descriptor());
        T::register_dependencies(self);
    }

    /// Registers a pre-built descriptor under its own type and context.
    ///
    /// Does nothing if the pair is already registered; dependencies are not
    /// registered. Use [`register`](Self::register) for that.
    pub fn register_descriptor(&mut self, handle: DescriptorHandle) {
        let key = (handle.type_id(), handle.context());
        if !self.table.contains_key(&key) {
            self.insert_handle(key, handle);
        }
    }

    /// Adds a fallback consulted on lookup misses, enabling on-demand
    /// descriptor synthesis for shapes with no explicit registration.
    ///
    /// Synthesized descriptors are cached, so a pair still resolves to one
    /// instance.
    pub fn add_fallback(
        &mut self,
        fallback: impl Fn(TypeId, TraversalContext) -> Option<DescriptorHandle> + Send + Sync + 'static,
    ) {
        self.fallbacks.push(Box::new(fallback));
    }

    /// Whether the pair has been registered (fallbacks are not consulted).
    #[inline]
    pub fn contains(&self, type_id: TypeId, context: TraversalContext) -> bool {
        self.table.contains_key(&(type_id, context))
    }

    /// Returns the descriptor for the pair, consulting registrations first,
    /// then previously synthesized descriptors, then the fallbacks.
    pub fn lookup(&self, type_id: TypeId, context: TraversalContext) -> Option<DescriptorHandle> {
        let key = (type_id, context);
        if let Some(handle) = self.table.get(&key) {
            return Some(handle.clone());
        }
        if let Some(handle) = self.synthesized.borrow().get(&key) {
            return Some(handle.clone());
        }
        for fallback in &self.fallbacks {
            if let Some(handle) = fallback(type_id, context) {
                self.synthesized.borrow_mut().insert(key, handle.clone());
                return Some(handle);
            }
        }
        None
    }

    /// Resolves a declared type to its descriptor.
    pub fn resolve(&self, ty: &TypeRef) -> Result<DescriptorHandle, TraverseError> {
        self.lookup(ty.id, ty.context)
            .ok_or(TraverseError::MissingDescriptor {
                type_path: ty.path.into(),
            })
    }

    /// Returns the descriptor a runtime value of `type_id` naturally
    /// traverses under: the first descriptor registered for the type,
    /// regardless of context.
    pub fn lookup_natural(&self, type_id: TypeId) -> Option<DescriptorHandle> {
        self.natural.get(&type_id).cloned()
    }

    /// Returns the descriptor whose type path matches a `$type` tag.
    pub fn lookup_path(&self, path: &str) -> Option<DescriptorHandle> {
        self.path_index.get(path).cloned()
    }

    /// Returns an iterator over all registered descriptors.
    pub fn iter(&self) -> impl Iterator<Item = &DescriptorHandle> {
        self.table.values()
    }

    /// Registers every descriptor submitted through
    /// [`submit_descriptors!`](crate::submit_descriptors).
    ///
    /// Requires the `auto_register` feature; without it this does nothing
    /// and returns `false`. Repeated calls are cheap and will not insert
    /// duplicates.
    pub fn auto_register(&mut self) -> bool {
        #[cfg(feature = "auto_register")]
        {
            for submission in inventory::iter::<DescriptorSubmission> {
                (submission.register)(self);
            }
            true
        }
        #[cfg(not(feature = "auto_register"))]
        {
            false
        }
    }
}

// -----------------------------------------------------------------------------
// Link-time submission

/// A descriptor registration submitted at link time, collected by
/// [`DescriptorRegistry::auto_register`].
#[cfg(feature = "auto_register")]
pub struct DescriptorSubmission {
    pub register: fn(&mut DescriptorRegistry),
}

#[cfg(feature = "auto_register")]
inventory::collect!(DescriptorSubmission);

/// Submits types for automatic registration:
///
/// ```ignore
/// trellis::submit_descriptors!(Probe, Sensor);
/// ```
#[cfg(feature = "auto_register")]
#[macro_export]
macro_rules! submit_descriptors {
    ($($ty:ty),+ $(,)?) => {
        $crate::registry::inventory::submit! {
            $crate::registry::DescriptorSubmission {
                register: |registry: &mut $crate::registry::DescriptorRegistry| {
                    $($crate::registry::DescriptorRegistry::register::<$ty>(registry);)+
                },
            }
        }
    };
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn scalar_registrations_are_present() {
        let registry = DescriptorRegistry::new();
        assert!(registry.contains(TypeId::of::<i32>(), TraversalContext::VALUE));
        assert!(registry.contains(TypeId::of::<alloc::string::String>(), TraversalContext::VALUE));
        assert!(!registry.contains(TypeId::of::<Vec<i32>>(), TraversalContext::VALUE));
    }

    #[test]
    fn pairs_cache_one_descriptor_instance() {
        let mut registry = DescriptorRegistry::new();
        registry.register::<Vec<i32>>();
        let first = registry
            .lookup(TypeId::of::<Vec<i32>>(), TraversalContext::VALUE)
            .unwrap();
        let second = registry
            .lookup(TypeId::of::<Vec<i32>>(), TraversalContext::VALUE)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn fallbacks_synthesize_once() {
        let mut registry = DescriptorRegistry::new();
        registry.add_fallback(|type_id, context| {
            (type_id == TypeId::of::<Vec<u8>>() && context == TraversalContext::VALUE)
                .then(<Vec<u8> as Describe>::descriptor)
        });

        let first = registry
            .lookup(TypeId::of::<Vec<u8>>(), TraversalContext::VALUE)
            .unwrap();
        let second = registry
            .lookup(TypeId::of::<Vec<u8>>(), TraversalContext::VALUE)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn natural_lookup_prefers_first_registration() {
        let mut registry = DescriptorRegistry::new();
        registry.register::<Vec<i64>>();
        let natural = registry.lookup_natural(TypeId::of::<Vec<i64>>()).unwrap();
        assert_eq!(natural.context(), TraversalContext::VALUE);
    }

    #[cfg(feature = "auto_register")]
    mod submissions {
        use super::*;

        crate::submit_descriptors!(Vec<u16>);

        #[test]
        fn auto_register_collects_submissions() {
            let mut registry = DescriptorRegistry::new();
            assert!(registry.auto_register());
            assert!(registry.contains(TypeId::of::<Vec<u16>>(), TraversalContext::VALUE));
        }
    }
}
