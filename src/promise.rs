//! # Promise Monomorphization
//!
//! Every `Promise<T>` reachable from an in-use entity is replaced by a
//! concrete interface synthesized from [`PromiseTemplate`], together with
//! its two callback types. Instantiations are shared: all usages with the
//! same instantiation key resolve to the same handle, and `DOMString` and
//! `USVString` elements share one instantiation.
//!
//! Names are derived from the element: `Promise<sequence<DOMString>?>`
//! becomes `PromiseNilSequenceString` with the callbacks
//! `PromiseNilSequenceStringOnFulfilled` and
//! `PromiseNilSequenceStringOnRejected`.

use tracing::{debug, info};

use crate::ast::{self, Argument, CallbackDecl, InterfaceDecl, Member, SyntaxType};
use crate::context::Context;
use crate::diagnostic::{CompileError, Issue, SourceRef};
use crate::extract::extract_file;
use crate::model::{
    BasicInfo, Callback, Entity, EntityId, Interface, Placeholder, TemplateMarker, TypeRef,
};
use crate::symbols::{PromiseInstance, SymbolTable};

const TEMPLATE_FILE: &str = "<builtin promise>";
const TEMPLATE_PROMISE: &str = "PromiseTemplate";
const TEMPLATE_ON_FULFILLED: &str = "PromiseTemplateOnFulfilled";
const TEMPLATE_ON_REJECTED: &str = "PromiseTemplateOnRejected";
const TEMPLATE_ELEMENT: &str = "PromiseTemplateElement";

/// The generic Promise interface and its callbacks, with placeholders where
/// the instantiation substitutes concrete types.
#[derive(Debug, Clone)]
pub struct PromiseTemplate {
    pub interface: Interface,
    pub on_fulfilled: Callback,
    pub on_rejected: Callback,
}

impl PromiseTemplate {
    /// Builds the template from its IDL definitions.
    ///
    /// The definitions go through the regular extractor in a scratch context,
    /// then the marker names are swapped for placeholders.
    pub fn builtin() -> Result<Self, CompileError> {
        let mut scratch = Context::default();
        extract_file(&mut scratch, &template_file())?;
        if scratch.diagnostics.has_errors() {
            return Err(CompileError::Fatal(
                "the builtin Promise template does not extract cleanly".to_string(),
            ));
        }

        let take = |name: &str| -> Result<Entity, CompileError> {
            let id = scratch.table.lookup_type(name).ok_or_else(|| {
                CompileError::Fatal(format!("the builtin Promise template lacks `{}`", name))
            })?;
            let mut entity = scratch.table.entity(id).clone();
            entity.basic_mut().template = Some(TemplateMarker::PromiseTemplate);
            entity.for_each_type_mut(&mut |ty, _| ty.visit_mut(&mut insert_placeholder));
            Ok(entity)
        };

        match (take(TEMPLATE_PROMISE)?, take(TEMPLATE_ON_FULFILLED)?, take(TEMPLATE_ON_REJECTED)?) {
            (Entity::Interface(interface), Entity::Callback(on_fulfilled), Entity::Callback(on_rejected)) => {
                Ok(Self {
                    interface,
                    on_fulfilled,
                    on_rejected,
                })
            }
            _ => Err(CompileError::Fatal(
                "the builtin Promise template has unexpected kinds".to_string(),
            )),
        }
    }
}

fn template_file() -> ast::File {
    let named = SyntaxType::named;
    ast::File::new(TEMPLATE_FILE)
        .with(
            InterfaceDecl::new(TEMPLATE_PROMISE)
                .member(Member::operation(
                    "then",
                    named(TEMPLATE_PROMISE),
                    vec![
                        Argument::new("onFulfilled", named(TEMPLATE_ON_FULFILLED)),
                        Argument::new("onRejected", named(TEMPLATE_ON_REJECTED)).optional(),
                    ],
                ))
                .member(Member::operation(
                    "catch",
                    named(TEMPLATE_PROMISE),
                    vec![Argument::new("onRejected", named(TEMPLATE_ON_REJECTED))],
                )),
        )
        .with(CallbackDecl::new(
            TEMPLATE_ON_FULFILLED,
            named("void"),
            vec![Argument::new("value", named(TEMPLATE_ELEMENT))],
        ))
        .with(CallbackDecl::new(
            TEMPLATE_ON_REJECTED,
            named("void"),
            vec![Argument::new("reason", named("any"))],
        ))
}

fn insert_placeholder(ty: &mut TypeRef) {
    let placeholder = match ty {
        TypeRef::Name(name) => match name.as_str() {
            TEMPLATE_PROMISE => Placeholder::Promise,
            TEMPLATE_ON_FULFILLED => Placeholder::OnFulfilled,
            TEMPLATE_ON_REJECTED => Placeholder::OnRejected,
            TEMPLATE_ELEMENT => Placeholder::Element,
            _ => return,
        },
        _ => return,
    };
    *ty = TypeRef::Placeholder(placeholder);
}

/// Replaces every reachable `Promise<T>` with its instantiation.
pub fn monomorphize(ctx: &mut Context) -> Result<(), CompileError> {
    let template = ctx.promise_template()?;
    let roots: Vec<EntityId> = ctx.table.ids().filter(|id| ctx.table.is_in_use(*id)).collect();

    for id in roots {
        let mut entity = ctx.table.entity(id).clone();
        let package = entity.basic().package.clone();
        let mut monomorphizer = Monomorphizer {
            ctx: &mut *ctx,
            template: &template,
            package,
        };
        entity.for_each_type_mut(&mut |ty, at| monomorphizer.rewrite(ty, at));
        *ctx.table.entity_mut(id) = entity;
        ctx.diagnostics.check_limit()?;
    }

    info!(instantiations = ctx.table.promises().count(), "monomorphized promises");
    Ok(())
}

struct Monomorphizer<'a> {
    ctx: &'a mut Context,
    template: &'a PromiseTemplate,
    /// Package of the entity whose types are being rewritten
    package: String,
}

impl Monomorphizer<'_> {
    fn rewrite(&mut self, ty: &mut TypeRef, at: &SourceRef) {
        match ty {
            TypeRef::Sequence(inner) | TypeRef::Nullable(inner) => self.rewrite(inner, at),
            TypeRef::Record(key, value) => {
                self.rewrite(key, at);
                self.rewrite(value, at);
            }
            TypeRef::Union(members) => members.iter_mut().for_each(|m| self.rewrite(m, at)),
            TypeRef::Parametrized { args, .. } => args.iter_mut().for_each(|a| self.rewrite(a, at)),
            _ => {}
        }

        if let TypeRef::Parametrized { name, args } = ty {
            if name != "Promise" {
                return;
            }
            if args.len() != 1 {
                self.ctx
                    .diagnostics
                    .report(Issue::PromiseArity { count: args.len() }, at);
                return;
            }
            if let Some(instance) = self.instance(&args[0], at) {
                *ty = TypeRef::Interface(instance);
            }
        }
    }

    fn instance(&mut self, element: &TypeRef, at: &SourceRef) -> Option<EntityId> {
        let key = idl_spelling(&self.ctx.table, element);
        if let Some(existing) = self.ctx.table.promise(&key) {
            self.ctx.table.mark_in_use(existing.interface);
            return Some(existing.interface);
        }

        let innermost = innermost_element(element);
        if matches!(innermost, TypeRef::Void | TypeRef::Any) {
            self.ctx
                .diagnostics
                .report(Issue::UnsupportedPromiseElement { element: key }, at);
            return None;
        }
        let package = match innermost {
            TypeRef::Primitive(_) => self.ctx.config.primitive_package.clone(),
            _ => self.package.clone(),
        };
        let name = format!("Promise{}", element_name(&self.ctx.table, element));
        debug!(%key, %name, %package, "instantiating promise");

        let instance = self.instantiate(&key, &name, &package, element, at);
        self.ctx.table.register_promise(key.clone(), instance);
        let alias = alias_of(element);
        if alias != *element {
            let alias_key = idl_spelling(&self.ctx.table, &alias);
            self.ctx.table.register_promise(alias_key, instance);
        }
        Some(instance.interface)
    }

    fn instantiate(
        &mut self,
        key: &str,
        name: &str,
        package: &str,
        element: &TypeRef,
        at: &SourceRef,
    ) -> PromiseInstance {
        let basic = |name: String| {
            let mut basic = BasicInfo::new(name, package, at.clone());
            basic.template = Some(TemplateMarker::Promise(key.to_string()));
            basic
        };

        let mut interface = self.template.interface.clone();
        interface.basic = basic(name.to_string());
        let mut on_fulfilled = self.template.on_fulfilled.clone();
        on_fulfilled.basic = basic(format!("{}OnFulfilled", name));
        let mut on_rejected = self.template.on_rejected.clone();
        on_rejected.basic = basic(format!("{}OnRejected", name));

        let table = &mut self.ctx.table;
        let instance = PromiseInstance {
            interface: table.push(Entity::Interface(interface)),
            on_fulfilled: table.push(Entity::Callback(on_fulfilled)),
            on_rejected: table.push(Entity::Callback(on_rejected)),
        };
        for id in [instance.interface, instance.on_fulfilled, instance.on_rejected] {
            table.entity_mut(id).for_each_type_mut(&mut |ty, _| {
                ty.visit_mut(&mut |t| {
                    if let TypeRef::Placeholder(placeholder) = t {
                        *t = match placeholder {
                            Placeholder::Element => element.clone(),
                            Placeholder::Promise => TypeRef::Interface(instance.interface),
                            Placeholder::OnFulfilled => TypeRef::Callback(instance.on_fulfilled),
                            Placeholder::OnRejected => TypeRef::Callback(instance.on_rejected),
                        };
                    }
                })
            });
            table.mark_in_use(id);
        }
        instance
    }
}

/// The element with nullable and sequence wrappers removed.
fn innermost_element(ty: &TypeRef) -> &TypeRef {
    match ty {
        TypeRef::Nullable(inner) | TypeRef::Sequence(inner) => innermost_element(inner),
        other => other,
    }
}

/// `ty` with `DOMString` and `USVString` swapped.
fn alias_of(ty: &TypeRef) -> TypeRef {
    let mut alias = ty.clone();
    alias.visit_mut(&mut |t| {
        if let TypeRef::Primitive(p) = t {
            if let Some(other) = p.alias() {
                *p = other;
            }
        }
    });
    alias
}

/// How `ty` is spelled in IDL; the instantiation key.
pub fn idl_spelling(table: &SymbolTable, ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(p) => p.idl_name().to_string(),
        TypeRef::Void => "void".to_string(),
        TypeRef::Any => "any".to_string(),
        TypeRef::Sequence(inner) => format!("sequence<{}>", idl_spelling(table, inner)),
        TypeRef::Record(key, value) => format!(
            "record<{}, {}>",
            idl_spelling(table, key),
            idl_spelling(table, value)
        ),
        TypeRef::Parametrized { name, args } => {
            let args: Vec<String> = args.iter().map(|a| idl_spelling(table, a)).collect();
            format!("{}<{}>", name, args.join(", "))
        }
        TypeRef::Union(members) => {
            let members: Vec<String> = members.iter().map(|m| idl_spelling(table, m)).collect();
            format!("({})", members.join(" or "))
        }
        TypeRef::Nullable(inner) => format!("{}?", idl_spelling(table, inner)),
        TypeRef::Interface(id) | TypeRef::Dictionary(id) | TypeRef::Enum(id) | TypeRef::Callback(id) => {
            match table.entity(*id).basic().template {
                // An instantiated Promise spells as the generic it replaced.
                Some(TemplateMarker::Promise(ref key)) => format!("Promise<{}>", key),
                _ => table.entity(*id).key().to_string(),
            }
        }
        TypeRef::Name(name) => name.clone(),
        TypeRef::Placeholder(p) => format!("{:?}", p),
    }
}

fn element_name(table: &SymbolTable, ty: &TypeRef) -> String {
    match ty {
        TypeRef::Nullable(inner) => format!("Nil{}", element_name(table, inner)),
        TypeRef::Sequence(inner) => format!("Sequence{}", element_name(table, inner)),
        TypeRef::Primitive(p) => p.display_name().to_string(),
        TypeRef::Void => "Void".to_string(),
        TypeRef::Any => "Any".to_string(),
        TypeRef::Record(key, value) => format!(
            "Record{}{}",
            element_name(table, key),
            element_name(table, value)
        ),
        TypeRef::Parametrized { name, args } => {
            let mut out = crate::naming::display_name(name);
            for arg in args {
                out.push_str(&element_name(table, arg));
            }
            out
        }
        TypeRef::Union(members) => {
            let names: Vec<String> = members.iter().map(|m| element_name(table, m)).collect();
            format!("Union{}", names.join("Or"))
        }
        TypeRef::Interface(id) | TypeRef::Dictionary(id) | TypeRef::Enum(id) | TypeRef::Callback(id) => {
            table.entity(*id).basic().name.clone()
        }
        TypeRef::Name(name) => crate::naming::display_name(name),
        TypeRef::Placeholder(p) => format!("{:?}", p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Primitive;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_has_placeholders() {
        let template = PromiseTemplate::builtin().unwrap();
        let then = &template.interface.members.methods[0];
        assert_eq!(then.idl, "then");
        assert_eq!(then.ret, TypeRef::Placeholder(Placeholder::Promise));
        assert_eq!(then.params[0].ty, TypeRef::Placeholder(Placeholder::OnFulfilled));
        assert!(then.params[1].optional);
        assert_eq!(
            template.on_fulfilled.params[0].ty,
            TypeRef::Placeholder(Placeholder::Element)
        );
        assert_eq!(template.on_rejected.params[0].ty, TypeRef::Any);
        assert_eq!(
            template.interface.basic.template,
            Some(TemplateMarker::PromiseTemplate)
        );
    }

    #[test]
    fn test_element_naming() {
        let table = SymbolTable::new();
        let string = TypeRef::Primitive(Primitive::DomString);
        let ty = TypeRef::Nullable(Box::new(TypeRef::Sequence(Box::new(string))));
        assert_eq!(element_name(&table, &ty), "NilSequenceString");
        assert_eq!(idl_spelling(&table, &ty), "sequence<DOMString>?");
        assert_eq!(idl_spelling(&table, &alias_of(&ty)), "sequence<USVString>?");
    }
}
