//! # Entity Extraction
//!
//! Walks the syntax tree of each file and registers typed entities in the
//! symbol table. Partial fragments, partial mixins and `includes` edges are
//! queued in [`Pending`] because their base may be declared later; the
//! merger consumes that queue.
//!
//! Declarations are processed in file order, so the first declaration of a
//! name wins and later ones are reported as duplicates.

use tracing::{debug, trace};

use crate::ast::{self, Argument, ExtendedAttribute, Member, Visitor};
use crate::context::Context;
use crate::diagnostic::{CompileError, Issue, SourceRef};
use crate::model::{
    Attribute, BasicInfo, Callback, Const, Dictionary, DictionaryMember, Entity, Enum, Includes,
    Interface, Members, Method, Mixin, Parameter, TypeRef, Typedef,
};
use crate::naming;

/// Extended attributes that are understood and need no action.
const ACCEPTED_ANNOTATIONS: &[&str] = &[
    "Exposed",
    "SecureContext",
    "LegacyNoInterfaceObject",
    "LegacyUnforgeable",
    "NewObject",
    "SameObject",
    "Replaceable",
    "PutForwards",
    "CEReactions",
    "HTMLConstructor",
    "LegacyWindowAlias",
    "LegacyFactoryFunction",
    "EnforceRange",
    "Clamp",
    "AllowShared",
    "LegacyNullToEmptyString",
    "Default",
    "LegacyLenientThis",
    "LegacyOverrideBuiltIns",
    "Serializable",
    "Transferable",
];

/// Work queued for the merger.
#[derive(Debug, Default)]
pub struct Pending {
    pub partial_interfaces: Vec<Interface>,
    pub partial_dictionaries: Vec<Dictionary>,
    pub partial_mixins: Vec<Mixin>,
    pub includes: Vec<Includes>,
}

/// Extracts every definition of `file` into the context.
pub fn extract_file(ctx: &mut Context, file: &ast::File) -> Result<(), CompileError> {
    debug!(file = %file.name, definitions = file.definitions.len(), "extracting");
    ast::walk(file, &mut Extractor { ctx })
}

struct Extractor<'a> {
    ctx: &'a mut Context,
}

#[derive(Default)]
struct AnnotationFlags {
    global: bool,
    constructor: Option<Vec<Argument>>,
}

impl Extractor<'_> {
    fn package(&self, file: &ast::File) -> String {
        self.ctx
            .config
            .default_package
            .clone()
            .unwrap_or_else(|| naming::package_from_file(&file.name))
    }

    fn report(&mut self, issue: Issue, at: &SourceRef) {
        self.ctx.diagnostics.report(issue, at);
    }

    fn register(&mut self, entity: Entity) {
        let source = entity.basic().source.clone();
        let name = entity.key().to_string();
        trace!(%name, kind = entity.kind().as_str(), "registering");
        if let Err(previous) = self.ctx.table.insert(entity) {
            self.report(Issue::DuplicateName { name, previous }, &source);
        }
    }

    fn check_annotations(&mut self, annotations: &[ExtendedAttribute], at: &SourceRef) -> AnnotationFlags {
        let mut flags = AnnotationFlags::default();
        for annotation in annotations {
            match annotation.name.as_str() {
                "Global" => flags.global = true,
                "Constructor" => {
                    self.report(
                        Issue::DeprecatedConstruct {
                            construct: "[Constructor]".to_string(),
                            replacement: "constructor(...)",
                        },
                        at,
                    );
                    flags.constructor = Some(annotation.args.clone());
                }
                "NoInterfaceObject" => self.report(
                    Issue::DeprecatedConstruct {
                        construct: "[NoInterfaceObject]".to_string(),
                        replacement: "[LegacyNoInterfaceObject]",
                    },
                    at,
                ),
                name if ACCEPTED_ANNOTATIONS.contains(&name) => {}
                name => self.report(
                    Issue::UnknownAnnotation {
                        name: name.to_string(),
                    },
                    at,
                ),
            }
        }
        flags
    }

    fn members(
        &mut self,
        file: &ast::File,
        owner: &str,
        members: &[Member],
    ) -> (Members, Option<Method>) {
        let mut out = Members::default();
        let mut constructor = None;
        for member in members {
            let at = SourceRef::new(&file.name, member.line());
            match member {
                Member::Const(c) => out.consts.push(Const {
                    idl: c.name.clone(),
                    name: naming::display_name(&c.name),
                    ty: TypeRef::from_syntax(&c.ty),
                    value: c.value.clone(),
                    source: at,
                }),
                Member::Attribute(a) => {
                    self.check_annotations(&a.annotations, &at);
                    let attr = Attribute {
                        idl: a.name.clone(),
                        name: naming::display_name(&a.name),
                        ty: TypeRef::from_syntax(&a.ty),
                        readonly: a.readonly,
                        source: at,
                        type_override: None,
                    };
                    if a.is_static {
                        out.static_vars.push(attr);
                    } else {
                        out.vars.push(attr);
                    }
                }
                Member::Operation(op) => {
                    self.check_annotations(&op.annotations, &at);
                    let Some(name) = &op.name else {
                        self.report(
                            Issue::UnsupportedMember {
                                construct: format!("unnamed special operation in `{}`", owner),
                            },
                            &at,
                        );
                        continue;
                    };
                    let method = Method {
                        idl: name.clone(),
                        name: naming::display_name(name),
                        ret: TypeRef::from_syntax(&op.return_type),
                        params: parameters(&op.args),
                        source: at,
                        type_override: None,
                    };
                    if op.is_static {
                        out.static_methods.push(method);
                    } else {
                        out.methods.push(method);
                    }
                }
                Member::Constructor(ctor) => {
                    if constructor.is_some() {
                        self.report(
                            Issue::UnsupportedMember {
                                construct: format!("overloaded constructor of `{}`", owner),
                            },
                            &at,
                        );
                        continue;
                    }
                    constructor = Some(constructor_method(owner, &ctor.args, at));
                }
                Member::Iterable { .. } => self.unsupported("iterable<...>", owner, &at),
                Member::Maplike { .. } => self.unsupported("maplike<...>", owner, &at),
                Member::Setlike { .. } => self.unsupported("setlike<...>", owner, &at),
                Member::Stringifier { .. } => self.unsupported("stringifier", owner, &at),
            }
        }
        (out, constructor)
    }

    fn unsupported(&mut self, construct: &str, owner: &str, at: &SourceRef) {
        self.report(
            Issue::UnsupportedMember {
                construct: format!("`{}` in `{}`", construct, owner),
            },
            at,
        );
    }

    /// Returns the first violated callback interface rule, if any.
    fn callback_violation(iface: &Interface) -> Option<Issue> {
        let name = iface.basic.idl.clone();
        if iface.parent.is_some() {
            Some(Issue::CallbackInterfaceParent { name })
        } else if iface.global {
            Some(Issue::CallbackInterfaceGlobal { name })
        } else if iface.constructor.is_some() {
            Some(Issue::CallbackInterfaceConstructor { name })
        } else if !iface.members.vars.is_empty() || !iface.members.static_vars.is_empty() {
            Some(Issue::CallbackInterfaceAttribute { name })
        } else if !iface.members.static_methods.is_empty() {
            Some(Issue::CallbackInterfaceStaticMethod { name })
        } else {
            None
        }
    }
}

fn parameters(args: &[Argument]) -> Vec<Parameter> {
    args.iter()
        .map(|arg| Parameter {
            name: arg.name.clone(),
            ty: TypeRef::from_syntax(&arg.ty),
            optional: arg.optional,
            variadic: arg.variadic,
            type_override: None,
        })
        .collect()
}

fn constructor_method(owner: &str, args: &[Argument], source: SourceRef) -> Method {
    Method {
        idl: "constructor".to_string(),
        name: format!("New{}", naming::display_name(owner)),
        ret: TypeRef::Name(owner.to_string()),
        params: parameters(args),
        source,
        type_override: None,
    }
}

impl Visitor for Extractor<'_> {
    type Error = CompileError;

    fn visit_enum(&mut self, file: &ast::File, decl: &ast::EnumDecl) -> Result<(), CompileError> {
        let at = SourceRef::new(&file.name, decl.line);
        self.check_annotations(&decl.annotations, &at);
        let mut values: Vec<String> = Vec::with_capacity(decl.values.len());
        for value in &decl.values {
            if values.contains(value) {
                self.report(
                    Issue::DuplicateEnumValue {
                        enum_name: decl.name.clone(),
                        value: value.clone(),
                    },
                    &at,
                );
                continue;
            }
            values.push(value.clone());
        }
        let entity = Entity::Enum(Enum {
            basic: BasicInfo::new(&decl.name, self.package(file), at),
            values,
            prefix: String::new(),
            suffix: String::new(),
        });
        self.register(entity);
        self.ctx.diagnostics.check_limit()
    }

    fn visit_interface(&mut self, file: &ast::File, decl: &ast::InterfaceDecl) -> Result<(), CompileError> {
        let at = SourceRef::new(&file.name, decl.line);
        let flags = self.check_annotations(&decl.annotations, &at);
        let (members, mut constructor) = self.members(file, &decl.name, &decl.members);
        if constructor.is_none() {
            constructor = flags
                .constructor
                .map(|args| constructor_method(&decl.name, &args, at.clone()));
        }
        let iface = Interface {
            basic: BasicInfo::new(&decl.name, self.package(file), at.clone()),
            members,
            constructor,
            parent: decl.inherits.clone().map(TypeRef::Name),
            global: flags.global,
            callback: decl.callback,
            events: Vec::new(),
        };

        if iface.callback {
            if let Some(issue) = Self::callback_violation(&iface) {
                self.report(issue, &at);
                return self.ctx.diagnostics.check_limit();
            }
        }

        if decl.partial {
            self.ctx.pending.partial_interfaces.push(iface);
        } else {
            self.register(Entity::Interface(iface));
        }
        self.ctx.diagnostics.check_limit()
    }

    fn visit_mixin(&mut self, file: &ast::File, decl: &ast::MixinDecl) -> Result<(), CompileError> {
        let at = SourceRef::new(&file.name, decl.line);
        self.check_annotations(&decl.annotations, &at);
        let (members, constructor) = self.members(file, &decl.name, &decl.members);
        if constructor.is_some() {
            self.unsupported("constructor", &decl.name, &at);
        }
        let mixin = Mixin {
            basic: BasicInfo::new(&decl.name, self.package(file), at.clone()),
            members,
        };
        if decl.partial {
            self.ctx.pending.partial_mixins.push(mixin);
        } else if let Err(previous) = self.ctx.table.insert_mixin(mixin) {
            self.report(
                Issue::DuplicateName {
                    name: decl.name.clone(),
                    previous,
                },
                &at,
            );
        }
        self.ctx.diagnostics.check_limit()
    }

    fn visit_dictionary(&mut self, file: &ast::File, decl: &ast::DictionaryDecl) -> Result<(), CompileError> {
        let at = SourceRef::new(&file.name, decl.line);
        self.check_annotations(&decl.annotations, &at);
        let members = decl
            .members
            .iter()
            .map(|m| DictionaryMember {
                idl: m.name.clone(),
                name: naming::display_name(&m.name),
                ty: TypeRef::from_syntax(&m.ty),
                required: m.required,
                default: m.default.clone(),
                source: SourceRef::new(&file.name, m.line),
                type_override: None,
            })
            .collect();
        let dict = Dictionary {
            basic: BasicInfo::new(&decl.name, self.package(file), at),
            members,
            inherited: Vec::new(),
            parent: decl.inherits.clone().map(TypeRef::Name),
        };
        if decl.partial {
            self.ctx.pending.partial_dictionaries.push(dict);
        } else {
            self.register(Entity::Dictionary(dict));
        }
        self.ctx.diagnostics.check_limit()
    }

    fn visit_includes(&mut self, file: &ast::File, decl: &ast::IncludesDecl) -> Result<(), CompileError> {
        self.ctx.pending.includes.push(Includes {
            target: decl.target.clone(),
            mixin: decl.mixin.clone(),
            source: SourceRef::new(&file.name, decl.line),
        });
        Ok(())
    }

    fn visit_callback(&mut self, file: &ast::File, decl: &ast::CallbackDecl) -> Result<(), CompileError> {
        let at = SourceRef::new(&file.name, decl.line);
        self.check_annotations(&decl.annotations, &at);
        let callback = Callback {
            basic: BasicInfo::new(&decl.name, self.package(file), at),
            ret: TypeRef::from_syntax(&decl.return_type),
            params: parameters(&decl.args),
        };
        self.register(Entity::Callback(callback));
        self.ctx.diagnostics.check_limit()
    }

    fn visit_typedef(&mut self, file: &ast::File, decl: &ast::TypedefDecl) -> Result<(), CompileError> {
        let at = SourceRef::new(&file.name, decl.line);
        let typedef = Typedef {
            idl: decl.name.clone(),
            ty: TypeRef::from_syntax(&decl.ty),
            source: at.clone(),
        };
        if let Err(previous) = self.ctx.table.insert_typedef(typedef) {
            self.report(
                Issue::DuplicateName {
                    name: decl.name.clone(),
                    previous,
                },
                &at,
            );
        }
        self.ctx.diagnostics.check_limit()
    }

    fn visit_implementation(
        &mut self,
        file: &ast::File,
        decl: &ast::ImplementationDecl,
    ) -> Result<(), CompileError> {
        let issue = Issue::UnsupportedImplementation {
            name: decl.name.clone(),
            implements: decl.implements.clone(),
        };
        let message = issue.to_string();
        self.report(issue, &SourceRef::new(&file.name, decl.line));
        Err(CompileError::Fatal(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EnumDecl, InterfaceDecl, SyntaxType};

    #[test]
    fn test_duplicate_enum_values_are_dropped_with_warning() {
        let mut ctx = Context::default();
        let file = ast::File::new("dom.idl").with(EnumDecl::new("Mode", ["a", "b", "a"]));
        extract_file(&mut ctx, &file).unwrap();

        let id = ctx.table.lookup_type("Mode").unwrap();
        let values = &ctx.table.entity(id).as_enum().unwrap().values;
        assert_eq!(values, &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.diagnostics.count_code("W004"), 1);
        assert!(!ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_constructor_annotation_becomes_constructor() {
        let mut ctx = Context::default();
        let mut ctor = ExtendedAttribute::new("Constructor");
        ctor.args.push(Argument::new("x", SyntaxType::named("long")));
        let file = ast::File::new("dom.idl").with(InterfaceDecl::new("Point").annotate(ctor));
        extract_file(&mut ctx, &file).unwrap();

        let id = ctx.table.lookup_type("Point").unwrap();
        let iface = ctx.table.entity(id).as_interface().unwrap();
        let ctor = iface.constructor.as_ref().unwrap();
        assert_eq!(ctor.name, "NewPoint");
        assert_eq!(ctor.params.len(), 1);
        assert_eq!(ctx.diagnostics.count_code("W002"), 1);
    }

    #[test]
    fn test_package_follows_file_name_unless_configured() {
        let mut ctx = Context::default();
        let file = ast::File::new("specs/fetch.idl").with(InterfaceDecl::new("Request"));
        extract_file(&mut ctx, &file).unwrap();
        let id = ctx.table.lookup_type("Request").unwrap();
        assert_eq!(ctx.table.entity(id).basic().package, "fetch");

        let mut ctx = Context::new(crate::config::Config {
            default_package: Some("webapi".to_string()),
            ..Default::default()
        });
        extract_file(&mut ctx, &file).unwrap();
        let id = ctx.table.lookup_type("Request").unwrap();
        assert_eq!(ctx.table.entity(id).basic().package, "webapi");
    }
}
