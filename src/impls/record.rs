//! Runtime-built descriptors for user composites.
//!
//! A [`RecordBuilder`] assembles the explicit member table of one struct-like
//! type: named fields with getter/setter closures, an optional
//! constructor-argument prefix for immutable types, and lifecycle hooks. The
//! table is built once at registration and shared behind a descriptor handle.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::marker::PhantomData;

use crate::descriptor::{
    CompositeDescriptor, ConstructionBuffer, Descriptor, DescriptorHandle, DescriptorKind,
    Instance, Member, TraversalContext,
};
use crate::error::TraverseError;
use crate::impls::Dynamic;
use crate::node::Node;
use crate::registry::Describe;

type ConstructFn<T> = Box<dyn Fn(&mut ConstructionBuffer) -> Result<T, TraverseError> + Send + Sync>;
type InitialFn<T> = Box<dyn Fn() -> T + Send + Sync>;
type BeforeWriteFn<T> = Box<dyn Fn(&T) + Send + Sync>;
type AfterReadFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;

// -----------------------------------------------------------------------------
// RecordBuilder

/// Builds the descriptor of one struct-like type.
///
/// Constructor arguments, if any, must be added before ordinary fields; the
/// finished descriptor visits members in the order they were added.
///
/// ```
/// use trellis::{Descriptor, DescriptorHandle, RecordBuilder};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Span {
///     start: u32,
///     len: u32,
/// }
///
/// let descriptor: DescriptorHandle = RecordBuilder::<Span>::new("demo::Span")
///     .constructor_arg("start", |span: &Span| span.start)
///     .constructor_arg("len", |span: &Span| span.len)
///     .construct(|args| {
///         Ok(Span {
///             start: args.take::<u32>(0)?,
///             len: args.take::<u32>(1)?,
///         })
///     })
///     .finish();
/// assert_eq!(descriptor.type_path(), "demo::Span");
/// ```
pub struct RecordBuilder<T> {
    path: &'static str,
    context: TraversalContext,
    sealed: bool,
    members: Vec<Member>,
    construction_len: usize,
    construct: Option<ConstructFn<T>>,
    initial: Option<InitialFn<T>>,
    before_write: Option<BeforeWriteFn<T>>,
    after_read: Option<AfterReadFn<T>>,
}

impl<T: Instance> RecordBuilder<T> {
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            context: TraversalContext::VALUE,
            sealed: true,
            members: Vec::new(),
            construction_len: 0,
            construct: None,
            initial: None,
            before_write: None,
            after_read: None,
        }
    }

    /// Registers the descriptor under a non-default context.
    pub fn context(mut self, context: TraversalContext) -> Self {
        self.context = context;
        self
    }

    /// Marks the type open for runtime substitution, so members declared with
    /// it may carry a `$type` tag.
    pub fn open(mut self) -> Self {
        self.sealed = false;
        self
    }

    /// Adds a constructor argument. Must precede every ordinary field.
    pub fn constructor_arg<V>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self
    where
        V: Describe + Instance,
    {
        assert_eq!(
            self.members.len(),
            self.construction_len,
            "constructor arguments must precede ordinary fields",
        );
        self.members.push(Member::constructor_arg(name, get));
        self.construction_len += 1;
        self
    }

    /// Adds a named field backed by a getter/setter pair.
    pub fn field<V>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Describe + Instance,
    {
        self.members.push(Member::field(name, get, set));
        self
    }

    /// Adds a field whose write rebuilds the owner instead of mutating it.
    pub fn rebuilding_field<V>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        rebuild: impl Fn(&T, V) -> T + Send + Sync + 'static,
    ) -> Self
    where
        V: Describe + Instance,
    {
        self.members.push(Member::rebuilding_field(name, get, rebuild));
        self
    }

    /// Adds a field holding an arbitrary runtime type behind [`Dynamic`].
    pub fn dynamic_field(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> Dynamic + Send + Sync + 'static,
        set: impl Fn(&mut T, Dynamic) + Send + Sync + 'static,
    ) -> Self {
        self.members.push(Member::dynamic_field(name, get, set));
        self
    }

    /// Adds a skipped step: present in the step order, never visited.
    pub fn skipped(mut self, name: &'static str) -> Self {
        self.members.push(Member::skipped(name));
        self
    }

    /// Supplies the constructor invoked once every argument is gathered.
    pub fn construct(
        mut self,
        construct: impl Fn(&mut ConstructionBuffer) -> Result<T, TraverseError> + Send + Sync + 'static,
    ) -> Self {
        self.construct = Some(Box::new(construct));
        self
    }

    /// Supplies the initial value a population-only traversal fills in.
    pub fn initial_with(mut self, initial: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.initial = Some(Box::new(initial));
        self
    }

    /// Uses `T::default()` as the initial value.
    pub fn initial_default(self) -> Self
    where
        T: Default,
    {
        self.initial_with(T::default)
    }

    /// Hook invoked before an instance is written into the tree.
    pub fn on_before_write(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.before_write = Some(Box::new(hook));
        self
    }

    /// Hook invoked after an instance has been fully read from the tree.
    pub fn on_after_read(mut self, hook: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.after_read = Some(Box::new(hook));
        self
    }

    pub fn finish(self) -> DescriptorHandle {
        assert!(
            self.construction_len == 0 || self.construct.is_some(),
            "`{}` declares constructor arguments but no constructor",
            self.path,
        );
        Arc::new(RecordDescriptor {
            path: self.path,
            context: self.context,
            sealed: self.sealed,
            members: self.members,
            construction_len: self.construction_len,
            construct: self.construct,
            initial: self.initial,
            before_write: self.before_write,
            after_read: self.after_read,
            marker: PhantomData,
        })
    }
}

// -----------------------------------------------------------------------------
// RecordDescriptor

struct RecordDescriptor<T> {
    path: &'static str,
    context: TraversalContext,
    sealed: bool,
    members: Vec<Member>,
    construction_len: usize,
    construct: Option<ConstructFn<T>>,
    initial: Option<InitialFn<T>>,
    before_write: Option<BeforeWriteFn<T>>,
    after_read: Option<AfterReadFn<T>>,
    marker: PhantomData<fn() -> T>,
}

impl<T: Instance> Descriptor for RecordDescriptor<T> {
    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_path(&self) -> &'static str {
        self.path
    }

    fn context(&self) -> TraversalContext {
        self.context
    }

    fn sealed(&self) -> bool {
        self.sealed
    }

    fn kind(&self) -> DescriptorKind<'_> {
        DescriptorKind::Composite(self)
    }
}

impl<T: Instance> CompositeDescriptor for RecordDescriptor<T> {
    fn step_count(&self, _target: Option<&dyn Instance>) -> usize {
        self.members.len()
    }

    fn construction_step_count(&self) -> usize {
        self.construction_len
    }

    fn member_at(&self, step: usize, _target: Option<&dyn Instance>) -> Option<Member> {
        self.members.get(step).cloned()
    }

    fn create_initial(&self, _node: &Node) -> Result<Box<dyn Instance>, TraverseError> {
        match &self.initial {
            Some(initial) => Ok(Box::new(initial())),
            None => Err(TraverseError::Construct {
                type_path: Cow::Borrowed(self.path),
                message: Cow::Borrowed("no initial value factory was supplied"),
            }),
        }
    }

    fn construct(&self, buffer: &mut ConstructionBuffer) -> Result<Box<dyn Instance>, TraverseError> {
        match &self.construct {
            Some(construct) => Ok(Box::new(construct(buffer)?)),
            None => Err(TraverseError::Construct {
                type_path: Cow::Borrowed(self.path),
                message: Cow::Borrowed("type has no constructor steps"),
            }),
        }
    }

    fn before_write(&self, target: &dyn Instance) {
        if let (Some(hook), Some(target)) = (&self.before_write, target.downcast_ref::<T>()) {
            hook(target);
        }
    }

    fn after_read(&self, target: &mut dyn Instance) {
        if let (Some(hook), Some(target)) = (&self.after_read, target.downcast_mut::<T>()) {
            hook(target);
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MemberKey;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Pair {
        left: i32,
        right: i32,
    }

    fn pair_descriptor() -> DescriptorHandle {
        RecordBuilder::<Pair>::new("demo::Pair")
            .field("left", |pair: &Pair| pair.left, |pair, value| pair.left = value)
            .field("right", |pair: &Pair| pair.right, |pair, value| pair.right = value)
            .initial_default()
            .finish()
    }

    #[test]
    fn members_come_back_in_declaration_order() {
        let descriptor = pair_descriptor();
        let composite = match descriptor.kind() {
            DescriptorKind::Composite(composite) => composite,
            _ => panic!("expected a composite"),
        };
        assert_eq!(composite.step_count(None), 2);
        assert_eq!(
            composite.member_at(0, None).unwrap().key,
            MemberKey::Name("left".into())
        );
        assert_eq!(
            composite.member_at(1, None).unwrap().key,
            MemberKey::Name("right".into())
        );
        assert!(composite.member_at(2, None).is_none());
    }

    #[test]
    fn constructor_records_build_from_the_buffer() {
        #[derive(Debug, Clone, PartialEq)]
        struct Frozen {
            value: i32,
        }

        let descriptor = RecordBuilder::<Frozen>::new("demo::Frozen")
            .constructor_arg("value", |frozen: &Frozen| frozen.value)
            .construct(|args| Ok(Frozen { value: args.take::<i32>(0)? }))
            .finish();
        let composite = match descriptor.kind() {
            DescriptorKind::Composite(composite) => composite,
            _ => panic!("expected a composite"),
        };
        assert_eq!(composite.construction_step_count(), 1);

        let mut buffer = ConstructionBuffer::new(1);
        buffer.fill(0, Box::new(11_i32));
        let built = composite.construct(&mut buffer).unwrap();
        assert_eq!(built.downcast_ref::<Frozen>(), Some(&Frozen { value: 11 }));
    }

    #[test]
    fn skipped_members_hold_their_step() {
        let descriptor = RecordBuilder::<Pair>::new("demo::PairSkipped")
            .field("left", |pair: &Pair| pair.left, |pair, value| pair.left = value)
            .skipped("legacy")
            .field("right", |pair: &Pair| pair.right, |pair, value| pair.right = value)
            .initial_default()
            .finish();
        let composite = match descriptor.kind() {
            DescriptorKind::Composite(composite) => composite,
            _ => panic!("expected a composite"),
        };
        assert_eq!(composite.step_count(None), 3);
        assert!(composite.member_at(1, None).unwrap().ty.is_none());
    }
}
