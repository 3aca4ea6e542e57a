//! # Type Model
//!
//! The resolved, cross-referenced model built from the syntax tree.
//!
//! Entities (interfaces, dictionaries, enums, callbacks) live in the arena of
//! [`crate::symbols::SymbolTable`] and refer to each other through
//! [`EntityId`] handles. Type references start out as unresolved
//! [`TypeRef::Name`]s and are replaced by concrete variants during linking.

use serde::Serialize;

use crate::ast::SyntaxType;
use crate::diagnostic::SourceRef;
use crate::naming;

/// Stable handle of an entity in the symbol table arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Marks entities that belong to, or were produced from, a generic template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "template", content = "key", rename_all = "snake_case")]
pub enum TemplateMarker {
    /// Part of the generic Promise template itself
    PromiseTemplate,
    /// A Promise instantiation for the given instantiation key
    Promise(String),
}

/// Identity shared by every named entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicInfo {
    /// Name as written in the IDL, the unique key
    pub idl: String,
    /// Name exposed by the generated code
    pub name: String,
    /// Hidden name for generated helpers
    pub internal: String,
    pub package: String,
    pub template: Option<TemplateMarker>,
    pub source: SourceRef,
}

impl BasicInfo {
    pub fn new(idl: impl Into<String>, package: impl Into<String>, source: SourceRef) -> Self {
        let idl = idl.into();
        Self {
            name: naming::display_name(&idl),
            internal: naming::internal_name(&idl),
            idl,
            package: package.into(),
            template: None,
            source,
        }
    }
}

/// Builtin WebIDL types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Primitive {
    Boolean,
    Byte,
    Octet,
    Short,
    UnsignedShort,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    UnrestrictedFloat,
    Double,
    UnrestrictedDouble,
    BigInt,
    DomString,
    ByteString,
    UsvString,
    Object,
    Symbol,
    ArrayBuffer,
    ArrayBufferView,
    BufferSource,
    DataView,
    Int8Array,
    Int16Array,
    Int32Array,
    Uint8Array,
    Uint16Array,
    Uint32Array,
    Uint8ClampedArray,
    Float32Array,
    Float64Array,
    BigInt64Array,
    BigUint64Array,
}

/// (primitive, IDL spelling, display name)
const PRIMITIVES: &[(Primitive, &str, &str)] = &[
    (Primitive::Boolean, "boolean", "Bool"),
    (Primitive::Byte, "byte", "Int8"),
    (Primitive::Octet, "octet", "Uint8"),
    (Primitive::Short, "short", "Int16"),
    (Primitive::UnsignedShort, "unsigned short", "Uint16"),
    (Primitive::Long, "long", "Int"),
    (Primitive::UnsignedLong, "unsigned long", "Uint"),
    (Primitive::LongLong, "long long", "Int64"),
    (Primitive::UnsignedLongLong, "unsigned long long", "Uint64"),
    (Primitive::Float, "float", "Float32"),
    (Primitive::UnrestrictedFloat, "unrestricted float", "Float32"),
    (Primitive::Double, "double", "Float64"),
    (Primitive::UnrestrictedDouble, "unrestricted double", "Float64"),
    (Primitive::BigInt, "bigint", "BigInt"),
    (Primitive::DomString, "DOMString", "String"),
    (Primitive::ByteString, "ByteString", "ByteString"),
    (Primitive::UsvString, "USVString", "String"),
    (Primitive::Object, "object", "Object"),
    (Primitive::Symbol, "symbol", "Symbol"),
    (Primitive::ArrayBuffer, "ArrayBuffer", "ArrayBuffer"),
    (Primitive::ArrayBufferView, "ArrayBufferView", "ArrayBufferView"),
    (Primitive::BufferSource, "BufferSource", "BufferSource"),
    (Primitive::DataView, "DataView", "DataView"),
    (Primitive::Int8Array, "Int8Array", "Int8Array"),
    (Primitive::Int16Array, "Int16Array", "Int16Array"),
    (Primitive::Int32Array, "Int32Array", "Int32Array"),
    (Primitive::Uint8Array, "Uint8Array", "Uint8Array"),
    (Primitive::Uint16Array, "Uint16Array", "Uint16Array"),
    (Primitive::Uint32Array, "Uint32Array", "Uint32Array"),
    (Primitive::Uint8ClampedArray, "Uint8ClampedArray", "Uint8ClampedArray"),
    (Primitive::Float32Array, "Float32Array", "Float32Array"),
    (Primitive::Float64Array, "Float64Array", "Float64Array"),
    (Primitive::BigInt64Array, "BigInt64Array", "BigInt64Array"),
    (Primitive::BigUint64Array, "BigUint64Array", "BigUint64Array"),
];

impl Primitive {
    pub fn from_idl(name: &str) -> Option<Primitive> {
        PRIMITIVES
            .iter()
            .find(|(_, idl, _)| *idl == name)
            .map(|(p, _, _)| *p)
    }

    fn entry(self) -> Option<&'static (Primitive, &'static str, &'static str)> {
        PRIMITIVES.iter().find(|(p, _, _)| *p == self)
    }

    pub fn idl_name(self) -> &'static str {
        self.entry().map_or("", |e| e.1)
    }

    pub fn display_name(self) -> &'static str {
        self.entry().map_or("", |e| e.2)
    }

    /// The interchangeable string representation, if any.
    pub fn alias(self) -> Option<Primitive> {
        match self {
            Primitive::DomString => Some(Primitive::UsvString),
            Primitive::UsvString => Some(Primitive::DomString),
            _ => None,
        }
    }
}

/// Marker types that only occur inside the Promise template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Placeholder {
    /// The `T` of `Promise<T>`
    Element,
    /// The Promise interface itself
    Promise,
    OnFulfilled,
    OnRejected,
}

/// A reference to a type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(Primitive),
    Void,
    Any,
    Sequence(Box<TypeRef>),
    Record(Box<TypeRef>, Box<TypeRef>),
    /// `Promise<T>`, `FrozenArray<T>`, `ObservableArray<T>`
    Parametrized { name: String, args: Vec<TypeRef> },
    Union(Vec<TypeRef>),
    Nullable(Box<TypeRef>),
    Interface(EntityId),
    Dictionary(EntityId),
    Enum(EntityId),
    Callback(EntityId),
    /// Not yet linked
    Name(String),
    Placeholder(Placeholder),
}

impl TypeRef {
    /// Converts a syntax type; names that are not builtin stay unresolved.
    pub fn from_syntax(ty: &SyntaxType) -> TypeRef {
        match ty {
            SyntaxType::Named(name) => match name.as_str() {
                "void" | "undefined" => TypeRef::Void,
                "any" => TypeRef::Any,
                _ => match Primitive::from_idl(name) {
                    Some(p) => TypeRef::Primitive(p),
                    None => TypeRef::Name(name.clone()),
                },
            },
            SyntaxType::Sequence(elem) => TypeRef::Sequence(Box::new(TypeRef::from_syntax(elem))),
            SyntaxType::Record(key, value) => TypeRef::Record(
                Box::new(TypeRef::from_syntax(key)),
                Box::new(TypeRef::from_syntax(value)),
            ),
            SyntaxType::Generic { name, args } => TypeRef::Parametrized {
                name: name.clone(),
                args: args.iter().map(TypeRef::from_syntax).collect(),
            },
            SyntaxType::Union(members) => {
                TypeRef::Union(members.iter().map(TypeRef::from_syntax).collect())
            }
            SyntaxType::Nullable(inner) => TypeRef::Nullable(Box::new(TypeRef::from_syntax(inner))),
        }
    }

    /// Returns the entity handle for entity references.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            TypeRef::Interface(id)
            | TypeRef::Dictionary(id)
            | TypeRef::Enum(id)
            | TypeRef::Callback(id) => Some(*id),
            _ => None,
        }
    }

    /// True when `self` is `Promise<...>`.
    pub fn is_promise(&self) -> bool {
        matches!(self, TypeRef::Parametrized { name, .. } if name == "Promise")
    }

    /// Visits `self` and every nested type, parents before children.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut TypeRef)) {
        f(self);
        match self {
            TypeRef::Sequence(inner) | TypeRef::Nullable(inner) => inner.visit_mut(f),
            TypeRef::Record(key, value) => {
                key.visit_mut(f);
                value.visit_mut(f);
            }
            TypeRef::Parametrized { args, .. } => args.iter_mut().for_each(|a| a.visit_mut(f)),
            TypeRef::Union(members) => members.iter_mut().for_each(|m| m.visit_mut(f)),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Const {
    pub idl: String,
    pub name: String,
    pub ty: TypeRef,
    pub value: String,
    pub source: SourceRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub idl: String,
    pub name: String,
    pub ty: TypeRef,
    pub readonly: bool,
    pub source: SourceRef,
    /// Raw target type set by `@changetype`
    pub type_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    pub optional: bool,
    pub variadic: bool,
    pub type_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Method {
    pub idl: String,
    pub name: String,
    pub ret: TypeRef,
    pub params: Vec<Parameter>,
    pub source: SourceRef,
    pub type_override: Option<String>,
}

/// The member lists shared by interfaces, mixins and partial fragments.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Members {
    pub consts: Vec<Const>,
    pub vars: Vec<Attribute>,
    pub static_vars: Vec<Attribute>,
    pub methods: Vec<Method>,
    pub static_methods: Vec<Method>,
}

impl Members {
    /// Moves all of `other`'s members to the end of `self`.
    pub fn append(&mut self, mut other: Members) {
        self.consts.append(&mut other.consts);
        self.vars.append(&mut other.vars);
        self.static_vars.append(&mut other.static_vars);
        self.methods.append(&mut other.methods);
        self.static_methods.append(&mut other.static_methods);
    }

    pub fn is_empty(&self) -> bool {
        self.consts.is_empty()
            && self.vars.is_empty()
            && self.static_vars.is_empty()
            && self.methods.is_empty()
            && self.static_methods.is_empty()
    }

    fn for_each_type_mut(&mut self, f: &mut dyn FnMut(&mut TypeRef, &SourceRef)) {
        for c in &mut self.consts {
            f(&mut c.ty, &c.source);
        }
        for a in self.vars.iter_mut().chain(self.static_vars.iter_mut()) {
            f(&mut a.ty, &a.source);
        }
        for m in self.methods.iter_mut().chain(self.static_methods.iter_mut()) {
            method_types_mut(m, f);
        }
    }
}

fn method_types_mut(method: &mut Method, f: &mut dyn FnMut(&mut TypeRef, &SourceRef)) {
    f(&mut method.ret, &method.source);
    for p in &mut method.params {
        f(&mut p.ty, &method.source);
    }
}

/// An event declared by `@event name = Type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAdapter {
    pub name: String,
    pub event: EntityId,
    /// The `on<name>` attribute of the interface, when it has one
    pub handler: Option<String>,
    pub source: SourceRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interface {
    pub basic: BasicInfo,
    pub members: Members,
    pub constructor: Option<Method>,
    /// `Name` until linked, then `Interface(id)`
    pub parent: Option<TypeRef>,
    pub global: bool,
    pub callback: bool,
    pub events: Vec<EventAdapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryMember {
    pub idl: String,
    pub name: String,
    pub ty: TypeRef,
    pub required: bool,
    pub default: Option<String>,
    pub source: SourceRef,
    pub type_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dictionary {
    pub basic: BasicInfo,
    pub members: Vec<DictionaryMember>,
    /// Copies of every ancestor member, filled in by the linker
    pub inherited: Vec<DictionaryMember>,
    pub parent: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    pub basic: BasicInfo,
    pub values: Vec<String>,
    pub prefix: String,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Callback {
    pub basic: BasicInfo,
    pub ret: TypeRef,
    pub params: Vec<Parameter>,
}

/// Not a type: its members are copied into interfaces that include it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mixin {
    pub basic: BasicInfo,
    pub members: Members,
}

/// `target includes mixin;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Includes {
    pub target: String,
    pub mixin: String,
    pub source: SourceRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Typedef {
    pub idl: String,
    pub ty: TypeRef,
    pub source: SourceRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Interface,
    Dictionary,
    Enum,
    Callback,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Interface => "interface",
            EntityKind::Dictionary => "dictionary",
            EntityKind::Enum => "enum",
            EntityKind::Callback => "callback",
        }
    }
}

/// A type-level entity stored in the arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Interface(Interface),
    Dictionary(Dictionary),
    Enum(Enum),
    Callback(Callback),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Interface(_) => EntityKind::Interface,
            Entity::Dictionary(_) => EntityKind::Dictionary,
            Entity::Enum(_) => EntityKind::Enum,
            Entity::Callback(_) => EntityKind::Callback,
        }
    }

    pub fn basic(&self) -> &BasicInfo {
        match self {
            Entity::Interface(e) => &e.basic,
            Entity::Dictionary(e) => &e.basic,
            Entity::Enum(e) => &e.basic,
            Entity::Callback(e) => &e.basic,
        }
    }

    pub fn basic_mut(&mut self) -> &mut BasicInfo {
        match self {
            Entity::Interface(e) => &mut e.basic,
            Entity::Dictionary(e) => &mut e.basic,
            Entity::Enum(e) => &mut e.basic,
            Entity::Callback(e) => &mut e.basic,
        }
    }

    /// The IDL name, unique within a compilation.
    pub fn key(&self) -> &str {
        &self.basic().idl
    }

    /// A type reference pointing at this entity.
    pub fn type_ref(&self, id: EntityId) -> TypeRef {
        match self.kind() {
            EntityKind::Interface => TypeRef::Interface(id),
            EntityKind::Dictionary => TypeRef::Dictionary(id),
            EntityKind::Enum => TypeRef::Enum(id),
            EntityKind::Callback => TypeRef::Callback(id),
        }
    }

    pub fn as_interface(&self) -> Option<&Interface> {
        match self {
            Entity::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_interface_mut(&mut self) -> Option<&mut Interface> {
        match self {
            Entity::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Entity::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Entity::Callback(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Enum> {
        match self {
            Entity::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Visits every member-level type reference with the member's source.
    ///
    /// Parent references are not visited; they are resolved separately
    /// because their kind is constrained.
    pub fn for_each_type_mut(&mut self, f: &mut dyn FnMut(&mut TypeRef, &SourceRef)) {
        match self {
            Entity::Interface(iface) => {
                iface.members.for_each_type_mut(f);
                if let Some(ctor) = &mut iface.constructor {
                    method_types_mut(ctor, f);
                }
            }
            Entity::Dictionary(dict) => {
                for m in dict.members.iter_mut().chain(dict.inherited.iter_mut()) {
                    f(&mut m.ty, &m.source);
                }
            }
            Entity::Enum(_) => {}
            Entity::Callback(cb) => {
                f(&mut cb.ret, &cb.basic.source);
                for p in &mut cb.params {
                    f(&mut p.ty, &cb.basic.source);
                }
            }
        }
    }
}
