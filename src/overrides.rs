//! # Override Resolution
//!
//! The generated code flattens inheritance, so a method redeclared by a
//! derived interface (or overloaded within one) would collide with the
//! inherited name. Colliding display names get a numeric suffix:
//!
//! ```text
//! interface A     { void foo(); };   // Foo
//! interface B : A { void foo(); };   // Foo2
//! interface C : B { void foo(); };   // Foo3
//! ```
//!
//! Suffix counters are kept per base name, so an explicit `foo2` that
//! collides with a generated `Foo2` becomes `Foo22`.
//!
//! Every interface is resolved after its parent, and each interface is
//! resolved once.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::context::Context;
use crate::diagnostic::CompileError;
use crate::model::{EntityId, EntityKind, TypeRef};

/// Display name -> last suffix handed out for it.
type NameCounters = IndexMap<String, usize>;

pub fn resolve_overrides(ctx: &mut Context) -> Result<(), CompileError> {
    let mut resolver = OverrideResolver::default();
    for id in ctx.table.ids_of(EntityKind::Interface) {
        if ctx.table.is_in_use(id) {
            resolver.resolve(ctx, id);
        }
    }
    info!(interfaces = resolver.resolved.len(), renamed = resolver.renamed, "resolved overrides");
    ctx.diagnostics.check_limit()
}

#[derive(Default)]
struct OverrideResolver {
    resolved: HashMap<EntityId, NameCounters>,
    visiting: Vec<EntityId>,
    renamed: usize,
}

impl OverrideResolver {
    /// Returns the method names visible in `id`, including inherited ones.
    fn resolve(&mut self, ctx: &mut Context, id: EntityId) -> NameCounters {
        if let Some(names) = self.resolved.get(&id) {
            return names.clone();
        }
        let Some(iface) = ctx.table.entity(id).as_interface() else {
            return NameCounters::new();
        };
        if self.visiting.contains(&id) {
            return NameCounters::new();
        }
        let parent = match iface.parent {
            Some(TypeRef::Interface(parent)) => Some(parent),
            _ => None,
        };

        self.visiting.push(id);
        let mut names = match parent {
            Some(parent) => self.resolve(ctx, parent),
            None => NameCounters::new(),
        };
        self.visiting.pop();

        if let Some(iface) = ctx.table.entity_mut(id).as_interface_mut() {
            let members = &mut iface.members;
            for method in members.methods.iter_mut().chain(members.static_methods.iter_mut()) {
                let Some(counter) = names.get(&method.name).copied() else {
                    names.insert(method.name.clone(), 1);
                    continue;
                };
                let mut n = counter + 1;
                while names.contains_key(&format!("{}{}", method.name, n)) {
                    n += 1;
                }
                names.insert(method.name.clone(), n);
                let renamed = format!("{}{}", method.name, n);
                debug!(interface = %iface.basic.idl, from = %method.name, to = %renamed, "renaming override");
                method.name = renamed.clone();
                names.insert(renamed, 1);
                self.renamed += 1;
            }
        }

        self.resolved.insert(id, names.clone());
        names
    }
}
