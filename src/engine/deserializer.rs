//! The deserialize strategy: consumes a node tree and rebuilds the object
//! graph, resolving identity references across passes.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;

use crate::descriptor::{
    Accessor as _, CollectionDescriptor as _, CompositeDescriptor as _, ConstructionBuffer,
    Descriptor as _, DescriptorHandle, DescriptorKind, Instance, PrimitiveDescriptor as _,
    TypeRef, Written,
};
use crate::error::TraverseError;
use crate::node::{Node, ObjectId};
use crate::registry::DescriptorRegistry;

use super::context::OpContext;
use super::cursor::{Advance, Cursor, Dest, Phase};
use super::refs::DeferredOp;

// -----------------------------------------------------------------------------
// Member resolution

/// The three-outcome contract for resolving one non-primitive member.
pub(crate) enum Resolution {
    /// The value is ready now: an already-instantiated identity, an explicit
    /// null, or an inline primitive.
    Resolved(Box<dyn Instance>),
    /// A fresh composite body; push a child cursor for it.
    RequiresPush(DescriptorHandle),
    /// A reference to an identity that exists in the tree but has not been
    /// instantiated yet; retry once it is.
    Deferred(ObjectId),
}

/// Resolves one member entry against its declared type.
///
/// An identity absent from both the forward map and the lookahead index is a
/// hard failure: no future pass can produce it.
pub(crate) fn resolve_entry(
    entry: &Node,
    ty: &TypeRef,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Resolution, TraverseError> {
    let declared = registry.resolve(ty)?;

    if let Some(id) = entry.reference_id() {
        if let Some(value) = ctx.forward.get(id) {
            return Ok(Resolution::Resolved(declared.adopt_reference(value)?));
        }
        if ctx.lookahead.contains(id) {
            return Ok(Resolution::Deferred(id));
        }
        return Err(TraverseError::MissingReference { id });
    }

    if entry.is_null() {
        if let Some(null) = declared.null_value() {
            return Ok(Resolution::Resolved(null));
        }
    }

    if let DescriptorKind::Primitive(primitive) = declared.kind() {
        return Ok(Resolution::Resolved(primitive.decode(entry)?));
    }

    Ok(Resolution::RequiresPush(declared))
}

// -----------------------------------------------------------------------------
// Phase handlers

pub(crate) fn advance(
    frame: usize,
    cursor: &mut Cursor,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Advance, TraverseError> {
    match cursor.phase {
        Phase::PreProcess => pre_process(cursor, ctx, registry),
        Phase::Construction => construction_step(frame, cursor, ctx, registry),
        Phase::Instantiation => instantiate(cursor, ctx),
        Phase::Population => populate_step(frame, cursor, ctx, registry),
        Phase::PostProcess => post_process(cursor),
    }
}

/// Aborts the cursor: the report notes why, nothing is written back, and the
/// destination slot keeps its pre-step default.
fn abort(cursor: &mut Cursor, ctx: &mut OpContext, message: String) -> Advance {
    ctx.note_warn(message);
    cursor.target = None;
    cursor.write_back = false;
    Advance::Finished
}

/// Re-resolves the descriptor from the node's `$type` tag and decides
/// between construction and direct population.
fn pre_process(
    cursor: &mut Cursor,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Advance, TraverseError> {
    let mut descriptor = cursor.descriptor.clone();

    if cursor.node.is_null() {
        if let Some(null) = descriptor.null_value() {
            cursor.target = Some(null);
            return Ok(Advance::Finished);
        }
    }

    if let Some(tag) = cursor.node.type_tag() {
        if tag != descriptor.type_path() {
            match registry.lookup_path(tag) {
                Some(resolved) => descriptor = resolved,
                None => {
                    let message = format!("no descriptor registered for type tag `{tag}`");
                    return Ok(abort(cursor, ctx, message));
                }
            }
        }
    }

    // Covers genuine primitives and the composite-to-primitive downgrade
    // after tag re-resolution: the node is consumed directly either way.
    if let DescriptorKind::Primitive(primitive) = descriptor.kind() {
        let advance = match primitive.decode(&cursor.node) {
            Ok(value) => {
                cursor.target = Some(value);
                Advance::Finished
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => abort(cursor, ctx, format!("could not decode value: {err}")),
        };
        cursor.descriptor = descriptor;
        return Ok(advance);
    }

    let construction_steps = descriptor
        .kind()
        .composite()
        .map_or(0, crate::descriptor::CompositeDescriptor::construction_step_count);
    cursor.construction_steps = construction_steps;
    if construction_steps > 0 {
        cursor.buffer = ConstructionBuffer::new(construction_steps);
        cursor.phase = Phase::Construction;
        cursor.step = 0;
    } else {
        cursor.phase = Phase::Instantiation;
    }
    cursor.descriptor = descriptor;
    Ok(Advance::Continue)
}

/// Gathers one constructor argument into the buffer.
///
/// A deferred dependency here queues the entire partially filled
/// construction: an immutable target cannot be finalized with a missing
/// argument.
fn construction_step(
    frame: usize,
    cursor: &mut Cursor,
    ctx: &mut OpContext,
    registry: &DescriptorRegistry,
) -> Result<Advance, TraverseError> {
    if cursor.step >= cursor.construction_steps {
        cursor.phase = Phase::Instantiation;
        return Ok(Advance::Continue);
    }
    let step = cursor.step;

    // Resumed constructions skip the slots they already gathered.
    if cursor.buffer.is_filled(step) {
        cursor.step += 1;
        return Ok(Advance::Continue);
    }

    let descriptor = cursor.descriptor.clone();
    let Some(composite) = descriptor.kind().composite() else {
        cursor.step += 1;
        return Ok(Advance::Continue);
    };
    let Some(member) = composite.member_at(step, None) else {
        cursor.step += 1;
        return Ok(Advance::Continue);
    };
    let Some(ty) = member.ty else {
        cursor.step += 1;
        return Ok(Advance::Continue);
    };
    let Some(entry) = cursor.node.member(&member.key) else {
        ctx.note_warn(format!("missing constructor argument `{}`", member.key));
        cursor.step += 1;
        return Ok(Advance::Continue);
    };

    match resolve_entry(entry, &ty, ctx, registry) {
        Ok(Resolution::Resolved(value)) => {
            cursor.buffer.fill(step, value);
            if cursor.resumed {
                ctx.progress = true;
            }
            cursor.step += 1;
            Ok(Advance::Continue)
        }
        Ok(Resolution::RequiresPush(declared)) => {
            let Some(node) = cursor.node.take_member(&member.key) else {
                cursor.step += 1;
                return Ok(Advance::Continue);
            };
            cursor.step += 1;
            Ok(Advance::Push(Cursor::de_child(
                declared,
                node,
                Dest::SlotOf {
                    frame,
                    slot: step,
                    key: member.key,
                },
            )))
        }
        Ok(Resolution::Deferred(id)) => {
            log::debug!(
                "constructor argument `{}` waits on {id}; queuing the construction",
                member.key,
            );
            Ok(Advance::DeferConstruction)
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            ctx.note_warn(format!("constructor argument `{}` failed: {err}", member.key));
            cursor.step += 1;
            Ok(Advance::Continue)
        }
    }
}

/// Creates the target, sizes collections, and registers the node's identity
/// so later references (even ones appearing earlier in the tree) resolve.
fn instantiate(cursor: &mut Cursor, ctx: &mut OpContext) -> Result<Advance, TraverseError> {
    let descriptor = cursor.descriptor.clone();
    let Some(composite) = descriptor.kind().composite() else {
        return Ok(abort(
            cursor,
            ctx,
            format!("`{}` is not a composite", descriptor.type_path()),
        ));
    };

    let created = if cursor.construction_steps > 0 {
        composite.construct(&mut cursor.buffer)
    } else {
        composite.create_initial(&cursor.node)
    };
    let mut target = match created {
        Ok(target) => target,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            return Ok(abort(
                cursor,
                ctx,
                format!("could not create `{}`: {err}", descriptor.type_path()),
            ));
        }
    };
    if cursor.resumed && cursor.construction_steps > 0 {
        ctx.progress = true;
    }

    if let DescriptorKind::Collection(collection) = descriptor.kind() {
        match cursor.node.element_count() {
            Some(count) => {
                if let Err(err) = collection.resize(&mut *target, count) {
                    ctx.note_warn(format!(
                        "could not size `{}` to {count} elements: {err}",
                        descriptor.type_path(),
                    ));
                }
            }
            None => {
                let message = format!(
                    "expected an array node for `{}`, found {}",
                    descriptor.type_path(),
                    cursor.node.kind_name(),
                );
                return Ok(abort(cursor, ctx, message));
            }
        }
    }

    if let Some(id) = cursor.node.identity() {
        if descriptor.reference_key(&*target).is_some() {
            ctx.forward
                .register(id, descriptor.unwrap_value(target.clone_instance()));
            ctx.progress = true;
            cursor.identity = Some(id);
        }
    }

    // Collections that grow by insertion (maps) are still empty here, so
    // their population length comes from the node, not the target.
    cursor.total_steps = match descriptor.kind() {
        DescriptorKind::Collection(_) => cursor.node.element_count().unwrap_or(0),
        _ => composite.step_count(Some(&*target)),
    };
    cursor.target = Some(target);
    cursor.step = cursor.construction_steps;
    cursor.phase = Phase::Population;
    Ok(Advance::Continue)
}

/// Sets one member on the existing target.
///
/// A deferred dependency here queues only this member; the rest of the
/// object proceeds, and other members still resolve independently.
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
    let Some(entry) = cursor.node.member(&member.key) else {
        log::debug!("no entry for member `{}`; leaving its default", member.key);
        return Ok(Advance::Continue);
    };

    match resolve_entry(entry, &ty, ctx, registry) {
        Ok(Resolution::Resolved(value)) => {
            let Some(target) = cursor.target.as_deref_mut() else {
                return Ok(Advance::Continue);
            };
            match member.accessor.set(target, value) {
                Ok(Written::InPlace) => {}
                Ok(Written::Replaced(replacement)) => {
                    cursor.target = Some(replacement);
                }
                Err(err) => {
                    ctx.note_warn(format!("could not write member `{}`: {err}", member.key));
                }
            }
            Ok(Advance::Continue)
        }
        Ok(Resolution::RequiresPush(declared)) => {
            let Some(node) = cursor.node.take_member(&member.key) else {
                return Ok(Advance::Continue);
            };
            Ok(Advance::Push(Cursor::de_child(
                declared,
                node,
                Dest::MemberOf { frame, member },
            )))
        }
        Ok(Resolution::Deferred(id)) => {
            if descriptor.reference_key(target).is_some() {
                let owner = target.clone_instance();
                log::debug!("member `{}` waits on {id}; queued for retry", member.key);
                ctx.queue.push_back(DeferredOp::Member { owner, member, id });
            } else {
                ctx.note_warn(format!(
                    "deferred reference {id} under member `{}` dropped: its owner passes by value",
                    member.key,
                ));
            }
            Ok(Advance::Continue)
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            ctx.note_warn(format!("member `{}` failed: {err}", member.key));
            Ok(Advance::Continue)
        }
    }
}

fn post_process(cursor: &mut Cursor) -> Result<Advance, TraverseError> {
    let descriptor = cursor.descriptor.clone();
    if let (Some(composite), Some(target)) =
        (descriptor.kind().composite(), cursor.target.as_deref_mut())
    {
        composite.after_read(target);
    }
    Ok(Advance::Finished)
}
