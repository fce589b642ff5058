//! The serialize strategy: walks a live object graph and builds the node
//! tree, one member step at a time.

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;

use crate::descriptor::{
    Accessor as _, CompositeDescriptor as _, Descriptor as _, DescriptorHandle, DescriptorKind,
    Instance, PrimitiveDescriptor as _,
};
use crate::error::TraverseError;
use crate::node::{Node, ObjectNode, VALUES_KEY};
use crate::registry::DescriptorRegistry;

use super::context::OpContext;
use super::cursor::{Advance, Cursor, Phase};

pub(crate) fn advance(
    frame: usize,
    cursor: &mut Cursor,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Advance, TraverseError> {
    match cursor.phase {
        Phase::PreProcess => pre_process(cursor, ctx, registry),
        Phase::Population => populate_step(frame, cursor, ctx, registry),
        Phase::PostProcess => Ok(Advance::Finished),
        // Writing never constructs; these phases belong to deserialization.
        Phase::Construction | Phase::Instantiation => Ok(Advance::Finished),
    }
}

/// Resolves the runtime descriptor, assigns identity, and allocates the node
/// shape, or finishes immediately for nulls, primitives, and references to
/// already-written objects.
fn pre_process(
    cursor: &mut Cursor,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Advance, TraverseError> {
    let Some(target) = cursor.target.take() else {
        cursor.node = Node::null();
        cursor.write_back = false;
        return Ok(Advance::Finished);
    };
    let mut descriptor = cursor.descriptor.clone();

    if descriptor.is_null(&*target) {
        cursor.node = Node::null();
        return Ok(Advance::Finished);
    }

    let target = descriptor.unwrap_value(target);

    // Re-resolve against the value's actual runtime type. The declared
    // descriptor only decides whether a `$type` tag is warranted.
    let actual = target.value_type_id();
    if actual != descriptor.type_id() {
        match registry.lookup_natural(actual) {
            Some(resolved) => {
                if !descriptor.value_semantics()
                    && !descriptor.sealed()
                    && !resolved.is_primitive()
                {
                    cursor.pending_tag = Some(resolved.type_path());
                }
                descriptor = resolved;
            }
            None => {
                ctx.note_warn(format!(
                    "no descriptor registered for runtime type `{}`; writing null",
                    target.type_path(),
                ));
                cursor.node = Node::null();
                return Ok(Advance::Finished);
            }
        }
    }

    if let Some(key) = descriptor.reference_key(&*target) {
        if let Some(id) = ctx.reverse.get(key) {
            cursor.node = Node::reference(id);
            cursor.target = Some(target);
            return Ok(Advance::Finished);
        }
        cursor.identity = Some(ctx.reverse.assign(key));
    }

    match descriptor.kind() {
        DescriptorKind::Primitive(primitive) => {
            match primitive.encode(&*target) {
                Ok(node) => cursor.node = node,
                Err(err) => {
                    ctx.note_warn(format!("could not encode value: {err}"));
                    cursor.node = Node::null();
                }
            }
            cursor.target = Some(target);
            Ok(Advance::Finished)
        }
        DescriptorKind::Composite(composite) => {
            composite.before_write(&*target);
            cursor.node = Node::Object(ObjectNode {
                id: cursor.identity,
                type_tag: cursor.pending_tag.map(Into::into),
                ..ObjectNode::default()
            });
            cursor.total_steps = composite.step_count(Some(&*target));
            enter_population(cursor, descriptor, target);
            Ok(Advance::Continue)
        }
        DescriptorKind::Collection(collection) => {
            collection.before_write(&*target);
            cursor.total_steps = collection.step_count(Some(&*target));
            // A referenceable (or tagged) collection wraps its elements in an
            // Object node; a plain one is a bare Array.
            cursor.node = if cursor.identity.is_some() || cursor.pending_tag.is_some() {
                let mut object = ObjectNode {
                    id: cursor.identity,
                    type_tag: cursor.pending_tag.map(Into::into),
                    ..ObjectNode::default()
                };
                object.insert(VALUES_KEY, Node::Array(Vec::new()));
                Node::Object(object)
            } else {
                Node::Array(Vec::new())
            };
            enter_population(cursor, descriptor, target);
            Ok(Advance::Continue)
        }
    }
}

fn enter_population(cursor: &mut Cursor, descriptor: DescriptorHandle, target: Box<dyn Instance>) {
    cursor.descriptor = descriptor;
    cursor.target = Some(target);
    cursor.step = 0;
    cursor.phase = Phase::Population;
}

/// Reads one member and either encodes it inline (nulls and primitives) or
/// pushes a child cursor for composite values.
fn populate_step(
    frame: usize,
    cursor: &mut Cursor,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Advance, TraverseError> {
    if cursor.step >= cursor.total_steps {
        cursor.phase = Phase::PostProcess;
        return Ok(Advance::Continue);
    }
    let step = cursor.step;
    cursor.step += 1;

    let descriptor = cursor.descriptor.clone();
    let Some(composite) = descriptor.kind().composite() else {
        return Ok(Advance::Continue);
    };
    let Some(target) = cursor.target.as_deref() else {
        return Ok(Advance::Continue);
    };

    let Some(member) = composite.member_at(step, Some(target)) else {
        return Ok(Advance::Continue);
    };
    let Some(ty) = member.ty else {
        return Ok(Advance::Continue);
    };

    let value = match member.accessor.get(target) {
        Ok(value) => value,
        Err(err) => {
            ctx.note_warn(format!("could not read member `{}`: {err}", member.key));
            cursor.node.attach(&member.key, Node::null());
            return Ok(Advance::Continue);
        }
    };

    let declared = match registry.resolve(&ty) {
        Ok(declared) => declared,
        Err(err) => {
            ctx.note_warn(format!("member `{}` left null: {err}", member.key));
            cursor.node.attach(&member.key, Node::null());
            return Ok(Advance::Continue);
        }
    };

    if declared.is_null(&*value) {
        cursor.node.attach(&member.key, Node::null());
        return Ok(Advance::Continue);
    }

    // Primitives encode inline; they never push a cursor.
    if let DescriptorKind::Primitive(primitive) = declared.kind() {
        match primitive.encode(&*value) {
            Ok(node) => cursor.node.attach(&member.key, node),
            Err(err) => {
                ctx.note_warn(format!("could not encode member `{}`: {err}", member.key));
                cursor.node.attach(&member.key, Node::null());
            }
        }
        return Ok(Advance::Continue);
    }

    Ok(Advance::Push(Cursor::ser_child(declared, value, frame, member)))
}
