//! # Partial & Mixin Merging
//!
//! Folds the fragments queued by the extractor into their base definitions.
//! Categories run in a fixed order: partial dictionaries, partial
//! interfaces, partial mixins, then `includes` edges. Mixins are completed
//! before any includes edge copies them, so an interface always receives
//! the full mixin body.

use tracing::{debug, info};

use crate::context::Context;
use crate::diagnostic::{CompileError, Issue, SourceRef};
use crate::model::{Entity, EntityId, EntityKind};
use crate::symbols::Symbol;

pub fn merge(ctx: &mut Context) -> Result<(), CompileError> {
    let pending = std::mem::take(&mut ctx.pending);
    info!(
        dictionaries = pending.partial_dictionaries.len(),
        interfaces = pending.partial_interfaces.len(),
        mixins = pending.partial_mixins.len(),
        includes = pending.includes.len(),
        "merging partial definitions"
    );

    for partial in pending.partial_dictionaries {
        let source = partial.basic.source.clone();
        let Some(id) = base_type(ctx, &partial.basic.idl, EntityKind::Dictionary, &source) else {
            ctx.diagnostics.check_limit()?;
            continue;
        };
        if let Entity::Dictionary(base) = ctx.table.entity_mut(id) {
            debug!(name = %base.basic.idl, "merging partial dictionary");
            base.members.extend(partial.members);
        }
    }

    for partial in pending.partial_interfaces {
        let source = partial.basic.source.clone();
        let Some(id) = base_type(ctx, &partial.basic.idl, EntityKind::Interface, &source) else {
            ctx.diagnostics.check_limit()?;
            continue;
        };
        if let Entity::Interface(base) = ctx.table.entity_mut(id) {
            debug!(name = %base.basic.idl, "merging partial interface");
            base.members.append(partial.members);
            base.global |= partial.global;
            if base.constructor.is_none() {
                base.constructor = partial.constructor;
            }
        }
    }

    for partial in pending.partial_mixins {
        let name = partial.basic.idl.clone();
        match ctx.table.lookup(&name) {
            Some(Symbol::Mixin(index)) => {
                debug!(%name, "merging partial mixin");
                ctx.table.mixin_mut(index).members.append(partial.members);
            }
            Some(other) => {
                let found = symbol_kind(ctx, other);
                ctx.diagnostics.report(
                    Issue::KindMismatch {
                        name,
                        expected: "mixin",
                        found,
                    },
                    &partial.basic.source,
                );
            }
            None => ctx.diagnostics.report(
                Issue::UnknownBase {
                    kind: "mixin",
                    name,
                },
                &partial.basic.source,
            ),
        }
        ctx.diagnostics.check_limit()?;
    }

    for include in pending.includes {
        let target = match ctx.table.lookup_type(&include.target) {
            Some(id) if ctx.table.kind(id) == EntityKind::Interface => id,
            _ => {
                ctx.diagnostics.report(
                    Issue::UnknownTarget {
                        name: include.target.clone(),
                    },
                    &include.source,
                );
                ctx.diagnostics.check_limit()?;
                continue;
            }
        };
        let Some(Symbol::Mixin(index)) = ctx.table.lookup(&include.mixin) else {
            ctx.diagnostics.report(
                Issue::UnknownMixin {
                    name: include.mixin.clone(),
                },
                &include.source,
            );
            ctx.diagnostics.check_limit()?;
            continue;
        };
        let members = ctx.table.mixin(index).members.clone();
        if let Some(iface) = ctx.table.entity_mut(target).as_interface_mut() {
            debug!(target = %include.target, mixin = %include.mixin, "including mixin");
            iface.members.append(members);
        }
    }

    Ok(())
}

/// Finds the base entity of a partial fragment, reporting when it is missing
/// or of another kind.
fn base_type(ctx: &mut Context, name: &str, expected: EntityKind, at: &SourceRef) -> Option<EntityId> {
    match ctx.table.lookup(name) {
        Some(Symbol::Type(id)) if ctx.table.kind(id) == expected => Some(id),
        Some(other) => {
            let found = symbol_kind(ctx, other);
            ctx.diagnostics.report(
                Issue::KindMismatch {
                    name: name.to_string(),
                    expected: expected.as_str(),
                    found,
                },
                at,
            );
            None
        }
        None => {
            ctx.diagnostics.report(
                Issue::UnknownBase {
                    kind: expected.as_str(),
                    name: name.to_string(),
                },
                at,
            );
            None
        }
    }
}

fn symbol_kind(ctx: &Context, symbol: Symbol) -> &'static str {
    match symbol {
        Symbol::Type(id) => ctx.table.kind(id).as_str(),
        Symbol::Mixin(_) => "mixin",
        Symbol::Typedef(_) => "typedef",
    }
}
