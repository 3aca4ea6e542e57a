//! # Reference Linking
//!
//! Replaces unresolved [`TypeRef::Name`]s with handles to concrete entities
//! and marks everything reachable from a root interface as in use.
//!
//! Linking is lazy: an entity is linked the first time something reaches
//! it, and linking it again is a no-op. Entities nothing reaches are never
//! linked, so they neither produce diagnostics nor end up in the output.
//!
//! Each entity is linked in two phases. The parent phase resolves the
//! `inherits` reference and, for dictionaries, copies every ancestor member
//! into `inherited`; it works on the table directly so that entities linked
//! later always see a finished parent reference. The member phase resolves
//! member types on a working copy that is written back afterwards, since
//! resolving a member can link other entities.

use tracing::{info, trace};

use crate::context::Context;
use crate::diagnostic::{CompileError, Diagnostic, Issue, SourceRef};
use crate::model::{DictionaryMember, Entity, EntityId, EntityKind, TypeRef};
use crate::symbols::Symbol;

/// Generic types the generator knows how to express.
pub const KNOWN_GENERICS: &[&str] = &["Promise", "FrozenArray", "ObservableArray"];

/// Links every interface and everything reachable from one.
pub fn link(ctx: &mut Context) -> Result<(), CompileError> {
    let mut linker = Linker::new(ctx);
    linker.link_roots()?;
    let visits = linker.visits();
    let in_use = ctx.table.ids().filter(|id| ctx.table.is_in_use(*id)).count();
    info!(visits, in_use, total = ctx.table.len(), "linked");
    Ok(())
}

pub struct Linker<'a> {
    ctx: &'a mut Context,
    visits: usize,
}

impl<'a> Linker<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self { ctx, visits: 0 }
    }

    /// Number of entities linked so far.
    pub fn visits(&self) -> usize {
        self.visits
    }

    /// Links every interface in insertion order.
    pub fn link_roots(&mut self) -> Result<(), CompileError> {
        for id in self.ctx.table.ids_of(EntityKind::Interface) {
            self.link(id)?;
        }
        Ok(())
    }

    /// Links one entity and everything it references.
    pub fn link(&mut self, id: EntityId) -> Result<(), CompileError> {
        self.visit(id);
        self.ctx.diagnostics.check_limit()
    }

    fn visit(&mut self, id: EntityId) {
        if self.ctx.diagnostics.should_stop() || !self.ctx.table.mark_in_use(id) {
            return;
        }
        self.visits += 1;
        trace!(name = %self.ctx.table.entity(id).key(), "linking");

        let parent = self.link_parent(id);

        let mut entity = self.ctx.table.entity(id).clone();
        entity.for_each_type_mut(&mut |ty, at| self.resolve(ty, at, &mut Vec::new()));
        *self.ctx.table.entity_mut(id) = entity;

        if let Some(parent) = parent {
            self.visit(parent);
        }
    }

    /// Resolves the parent reference of `id` and returns the parent handle.
    fn link_parent(&mut self, id: EntityId) -> Option<EntityId> {
        let entity = self.ctx.table.entity(id);
        let kind = entity.kind();
        let parent_ref = match entity {
            Entity::Interface(iface) => iface.parent.clone(),
            Entity::Dictionary(dict) => dict.parent.clone(),
            _ => None,
        }?;
        let name = entity.key().to_string();
        let source = entity.basic().source.clone();

        let parent = match parent_ref {
            TypeRef::Name(parent_name) => self.resolve_parent(&name, kind, &parent_name, &source),
            other => other.entity(),
        };

        let parent = match parent {
            Some(pid) if self.ancestors(pid).contains(&id) || pid == id => {
                self.ctx
                    .diagnostics
                    .report(Issue::InheritanceCycle { name }, &source);
                None
            }
            other => other,
        };

        let inherited = match (kind, parent) {
            (EntityKind::Dictionary, Some(pid)) => self.inherited_members(pid),
            _ => Vec::new(),
        };
        match self.ctx.table.entity_mut(id) {
            Entity::Interface(iface) => iface.parent = parent.map(TypeRef::Interface),
            Entity::Dictionary(dict) => {
                dict.parent = parent.map(TypeRef::Dictionary);
                dict.inherited = inherited;
            }
            _ => {}
        }
        parent
    }

    fn resolve_parent(
        &mut self,
        name: &str,
        kind: EntityKind,
        parent: &str,
        at: &SourceRef,
    ) -> Option<EntityId> {
        match self.ctx.table.lookup(parent) {
            Some(Symbol::Type(pid)) if self.ctx.table.kind(pid) == kind => Some(pid),
            Some(Symbol::Type(_)) | Some(Symbol::Mixin(_)) | Some(Symbol::Typedef(_)) => {
                let issue = if kind == EntityKind::Dictionary {
                    Issue::InheritsNonDictionary {
                        name: name.to_string(),
                        parent: parent.to_string(),
                    }
                } else {
                    Issue::InheritsNonInterface {
                        name: name.to_string(),
                        parent: parent.to_string(),
                    }
                };
                self.ctx.diagnostics.report(issue, at);
                None
            }
            None => {
                self.unresolved(parent, at);
                None
            }
        }
    }

    /// Reports `name` as unresolved, suggesting a close match when one exists.
    fn unresolved(&mut self, name: &str, at: &SourceRef) {
        let mut diagnostic = Diagnostic::new(Issue::UnresolvedType {
            name: name.to_string(),
        })
        .at(at.clone());
        if let Some(Symbol::Mixin(_)) = self.ctx.table.lookup(name) {
            diagnostic = diagnostic.with_note(format!("`{}` is a mixin, which can only be included", name));
        } else if let Some(similar) = self.ctx.table.similar_name(name) {
            diagnostic = diagnostic.with_help(format!("did you mean `{}`?", similar));
        }
        self.ctx.diagnostics.add(diagnostic);
    }

    fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        let entity = self.ctx.table.entity(id);
        let parent = match entity {
            Entity::Interface(iface) => iface.parent.as_ref(),
            Entity::Dictionary(dict) => dict.parent.as_ref(),
            _ => None,
        }?;
        match parent {
            TypeRef::Name(name) => self
                .ctx
                .table
                .lookup_type(name)
                .filter(|pid| self.ctx.table.kind(*pid) == entity.kind()),
            other => other.entity(),
        }
    }

    /// The inheritance chain above `id`, nearest first.
    fn ancestors(&self, id: EntityId) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if parent == id || chain.contains(&parent) {
                chain.push(parent);
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Members of `parent` and all of its ancestors, root ancestor first.
    fn inherited_members(&self, parent: EntityId) -> Vec<DictionaryMember> {
        let mut chain = vec![parent];
        for ancestor in self.ancestors(parent) {
            if chain.contains(&ancestor) {
                break;
            }
            chain.push(ancestor);
        }
        chain
            .iter()
            .rev()
            .filter_map(|id| self.ctx.table.entity(*id).as_dictionary())
            .flat_map(|dict| dict.members.iter().cloned())
            .collect()
    }

    /// Resolves `ty` in place. `typedefs` holds the typedefs being expanded.
    fn resolve(&mut self, ty: &mut TypeRef, at: &SourceRef, typedefs: &mut Vec<String>) {
        match ty {
            TypeRef::Name(name) => {
                let name = name.clone();
                if let Some(resolved) = self.resolve_name(&name, at, typedefs) {
                    *ty = resolved;
                }
            }
            TypeRef::Sequence(inner) | TypeRef::Nullable(inner) => self.resolve(inner, at, typedefs),
            TypeRef::Record(key, value) => {
                self.resolve(key, at, typedefs);
                self.resolve(value, at, typedefs);
            }
            TypeRef::Parametrized { name, args } => {
                if !KNOWN_GENERICS.contains(&name.as_str()) {
                    self.ctx
                        .diagnostics
                        .report(Issue::UnknownGeneric { name: name.clone() }, at);
                }
                for arg in args {
                    self.resolve(arg, at, typedefs);
                }
            }
            TypeRef::Union(members) => {
                for member in members {
                    self.resolve(member, at, typedefs);
                }
            }
            TypeRef::Interface(id) | TypeRef::Dictionary(id) | TypeRef::Enum(id) | TypeRef::Callback(id) => {
                let id = *id;
                self.visit(id);
            }
            TypeRef::Primitive(_) | TypeRef::Void | TypeRef::Any | TypeRef::Placeholder(_) => {}
        }
    }

    fn resolve_name(&mut self, name: &str, at: &SourceRef, typedefs: &mut Vec<String>) -> Option<TypeRef> {
        match self.ctx.table.lookup(name) {
            Some(Symbol::Type(id)) => {
                self.visit(id);
                Some(self.ctx.table.entity(id).type_ref(id))
            }
            Some(Symbol::Typedef(index)) => {
                let typedef = self.ctx.table.typedef(index);
                if typedefs.iter().any(|t| t == name) {
                    let source = typedef.source.clone();
                    self.ctx.diagnostics.report(
                        Issue::TypedefCycle {
                            name: name.to_string(),
                        },
                        &source,
                    );
                    return None;
                }
                let mut expanded = typedef.ty.clone();
                typedefs.push(name.to_string());
                self.resolve(&mut expanded, at, typedefs);
                typedefs.pop();
                if !contains_name(&expanded) {
                    self.ctx.table.typedef_mut(index).ty = expanded.clone();
                }
                Some(expanded)
            }
            Some(Symbol::Mixin(_)) | None => {
                self.unresolved(name, at);
                None
            }
        }
    }
}

fn contains_name(ty: &TypeRef) -> bool {
    let mut found = false;
    let mut ty = ty.clone();
    ty.visit_mut(&mut |t| found |= matches!(t, TypeRef::Name(_)));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, CallbackDecl, DictionaryDecl, InterfaceDecl, Member, SyntaxType, TypedefDecl};
    use crate::extract::extract_file;
    use crate::model::Primitive;
    use pretty_assertions::assert_eq;

    fn context(file: ast::File) -> Context {
        let mut ctx = Context::default();
        extract_file(&mut ctx, &file).unwrap();
        crate::merge::merge(&mut ctx).unwrap();
        ctx
    }

    fn attr(name: &str, ty: &str) -> Member {
        Member::attribute(name, SyntaxType::parse(ty).unwrap())
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(InterfaceDecl::new("Node").member(attr("parent", "Node?")))
            .with(InterfaceDecl::new("Element").inherits("Node")));
        let element = ctx.table.lookup_type("Element").unwrap();
        let mut linker = Linker::new(&mut ctx);
        linker.link(element).unwrap();
        let visits = linker.visits();
        assert_eq!(visits, 2);
        linker.link(element).unwrap();
        assert_eq!(linker.visits(), visits);
    }

    #[test]
    fn test_unreachable_entities_stay_unlinked() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(InterfaceDecl::new("Node"))
            .with(DictionaryDecl::new("Orphan").member("x", SyntaxType::named("Missing"))));
        link(&mut ctx).unwrap();
        let orphan = ctx.table.lookup_type("Orphan").unwrap();
        assert!(!ctx.table.is_in_use(orphan));
        assert!(!ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_typedefs_expand() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(TypedefDecl::new("Count", SyntaxType::named("unsigned long")))
            .with(TypedefDecl::new("Counts", SyntaxType::parse("sequence<Count>").unwrap()))
            .with(InterfaceDecl::new("Stats").member(attr("all", "Counts"))));
        link(&mut ctx).unwrap();
        let id = ctx.table.lookup_type("Stats").unwrap();
        let iface = ctx.table.entity(id).as_interface().unwrap();
        assert_eq!(
            iface.members.vars[0].ty,
            TypeRef::Sequence(Box::new(TypeRef::Primitive(Primitive::UnsignedLong)))
        );
    }

    #[test]
    fn test_typedef_cycle_is_reported() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(TypedefDecl::new("A", SyntaxType::named("B")))
            .with(TypedefDecl::new("B", SyntaxType::parse("sequence<A>").unwrap()))
            .with(InterfaceDecl::new("Uses").member(attr("a", "A"))));
        link(&mut ctx).unwrap();
        assert_eq!(ctx.diagnostics.count_code("E010"), 1);
    }

    #[test]
    fn test_inheritance_errors() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(InterfaceDecl::new("A").inherits("B"))
            .with(InterfaceDecl::new("B").inherits("A"))
            .with(InterfaceDecl::new("C").inherits("Init"))
            .with(DictionaryDecl::new("Init")));
        link(&mut ctx).unwrap();
        assert_eq!(ctx.diagnostics.count_code("E009"), 1);
        assert_eq!(ctx.diagnostics.count_code("E007"), 1);
    }

    #[test]
    fn test_dictionary_inheriting_an_interface() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(InterfaceDecl::new("Node"))
            .with(DictionaryDecl::new("Options").inherits("Node"))
            .with(InterfaceDecl::new("Api").member(attr("options", "Options"))));
        link(&mut ctx).unwrap();
        assert_eq!(ctx.diagnostics.count_code("E008"), 1);
        let id = ctx.table.lookup_type("Options").unwrap();
        let dict = ctx.table.entity(id).as_dictionary().unwrap();
        assert_eq!(dict.parent, None);
        assert!(dict.inherited.is_empty());
    }

    #[test]
    fn test_dictionary_inherits_ancestor_members_in_order() {
        let long = || SyntaxType::named("long");
        let mut ctx = context(ast::File::new("dom.idl")
            .with(DictionaryDecl::new("Base").member("a", long()))
            .with(DictionaryDecl::new("Mid").inherits("Base").member("b", long()))
            .with(DictionaryDecl::new("Leaf").inherits("Mid").member("c", long()))
            .with(InterfaceDecl::new("Api").member(Member::operation(
                "run",
                SyntaxType::named("void"),
                vec![ast::Argument::new("init", SyntaxType::named("Leaf"))],
            ))));
        link(&mut ctx).unwrap();
        let leaf = ctx.table.lookup_type("Leaf").unwrap();
        let dict = ctx.table.entity(leaf).as_dictionary().unwrap();
        let names: Vec<_> = dict.inherited.iter().map(|m| m.idl.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let base = ctx.table.lookup_type("Base").unwrap();
        assert!(ctx.table.is_in_use(base));
    }

    #[test]
    fn test_unknown_generic_and_mixin_as_type() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(ast::MixinDecl::new("Mixed"))
            .with(CallbackDecl::new("Cb", SyntaxType::parse("Weird<long>").unwrap(), vec![]))
            .with(InterfaceDecl::new("Api").member(attr("cb", "Cb")).member(attr("m", "Mixed"))));
        link(&mut ctx).unwrap();
        assert_eq!(ctx.diagnostics.count_code("E011"), 1);
        assert_eq!(ctx.diagnostics.count_code("E006"), 1);
        let unresolved = &ctx.diagnostics.diagnostics()[1];
        assert_eq!(unresolved.notes, vec!["`Mixed` is a mixin, which can only be included"]);
        assert!(unresolved.help.is_empty());
    }

    #[test]
    fn test_unresolved_type_suggests_close_name() {
        let mut ctx = context(ast::File::new("dom.idl")
            .with(InterfaceDecl::new("Node").member(attr("parent", "Nod")))
            .with(InterfaceDecl::new("Element").inherits("Nodes")));
        link(&mut ctx).unwrap();
        let help: Vec<_> = ctx.diagnostics.diagnostics().iter().map(|d| d.help.clone()).collect();
        assert_eq!(
            help,
            vec![vec!["did you mean `Node`?".to_string()], vec!["did you mean `Node`?".to_string()]]
        );
        let rendered = ctx.diagnostics.render(crate::diagnostic::RenderConfig::no_colors());
        assert!(rendered.contains(" = help: did you mean `Node`?"));
    }
}
