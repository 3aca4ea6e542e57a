//! # Syntax Tree
//!
//! The declarations produced by the external WebIDL parser. This is the input
//! contract of the compiler: a file is an ordered list of definitions, and
//! every node carries the source line it came from so diagnostics can point
//! back at the IDL.
//!
//! The tree is deserializable from JSON, which is how the CLI receives it.
//! Builders are provided for the builtin definitions and for tests.
//!
//! ## Example
//!
//! ```rust
//! use webidl_bind::ast::{File, InterfaceDecl, Member, SyntaxType};
//!
//! let file = File::new("dom.idl").with(
//!     InterfaceDecl::new("Node")
//!         .member(Member::attribute("nodeName", SyntaxType::named("DOMString")).readonly()),
//! );
//! assert_eq!(file.definitions.len(), 1);
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, space0, space1},
    combinator::{all_consuming, opt, recognize},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde::{Deserialize, Serialize};

/// One IDL source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct File {
    /// Path or name of the file, used in diagnostics and for the default package
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

impl File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: Vec::new(),
        }
    }

    /// Appends a definition.
    pub fn with(mut self, definition: impl Into<Definition>) -> Self {
        self.definitions.push(definition.into());
        self
    }
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    Enum(EnumDecl),
    Interface(InterfaceDecl),
    Mixin(MixinDecl),
    Dictionary(DictionaryDecl),
    Includes(IncludesDecl),
    Callback(CallbackDecl),
    Typedef(TypedefDecl),
    /// Legacy `A implements B;`
    Implementation(ImplementationDecl),
}

/// An extended attribute such as `[Exposed=Window]` or `[Constructor(long x)]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtendedAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub args: Vec<Argument>,
}

impl ExtendedAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub callback: bool,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub line: usize,
}

/// `interface mixin Name { ... };`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MixinDecl {
    pub name: String,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DictionaryDecl {
    pub name: String,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub members: Vec<DictionaryMember>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SyntaxType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub line: usize,
}

/// `callback Name = ReturnType (args);`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackDecl {
    pub name: String,
    pub return_type: SyntaxType,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedefDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SyntaxType,
    #[serde(default)]
    pub line: usize,
}

/// `Target includes Mixin;`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncludesDecl {
    pub target: String,
    pub mixin: String,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImplementationDecl {
    pub name: String,
    pub implements: String,
    #[serde(default)]
    pub line: usize,
}

/// Interface and mixin members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Member {
    Const(ConstMember),
    Attribute(AttributeMember),
    Operation(OperationMember),
    Constructor(ConstructorMember),
    Iterable {
        #[serde(default)]
        line: usize,
    },
    Maplike {
        #[serde(default)]
        line: usize,
    },
    Setlike {
        #[serde(default)]
        line: usize,
    },
    Stringifier {
        #[serde(default)]
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SyntaxType,
    pub value: String,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMember {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SyntaxType,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub line: usize,
}

/// Special operation keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Special {
    Getter,
    Setter,
    Deleter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMember {
    /// `None` for unnamed special operations
    #[serde(default)]
    pub name: Option<String>,
    pub return_type: SyntaxType,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub special: Option<Special>,
    #[serde(default)]
    pub annotations: Vec<ExtendedAttribute>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstructorMember {
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SyntaxType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub default: Option<String>,
}

/// A type as written in the IDL, before any name resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxType {
    /// `DOMString`, `unsigned long`, `Node`, ...
    Named(String),
    Sequence(Box<SyntaxType>),
    Record(Box<SyntaxType>, Box<SyntaxType>),
    /// `Promise<T>`, `FrozenArray<T>`, ...
    Generic { name: String, args: Vec<SyntaxType> },
    Union(Vec<SyntaxType>),
    Nullable(Box<SyntaxType>),
}

impl SyntaxType {
    pub fn named(name: impl Into<String>) -> Self {
        SyntaxType::Named(name.into())
    }

    pub fn sequence(element: SyntaxType) -> Self {
        SyntaxType::Sequence(Box::new(element))
    }

    pub fn generic(name: impl Into<String>, args: Vec<SyntaxType>) -> Self {
        SyntaxType::Generic {
            name: name.into(),
            args,
        }
    }

    pub fn nullable(self) -> Self {
        SyntaxType::Nullable(Box::new(self))
    }

    /// Parses an IDL type spelling such as `sequence<DOMString>?` or
    /// `(Node or unsigned long long)`.
    pub fn parse(input: &str) -> Option<SyntaxType> {
        all_consuming(delimited(space0, syntax_type, space0))(input)
            .ok()
            .map(|(_, ty)| ty)
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Type names, including the multi-word primitives.
fn type_name(input: &str) -> IResult<&str, String> {
    let (mut input, first) = identifier(input)?;
    let mut name = first.to_string();
    let mut last = first;
    while matches!(last, "unsigned" | "unrestricted" | "long") {
        let Ok((rest, next)) = preceded(space1, identifier)(input) else {
            break;
        };
        if last == "long" && next != "long" {
            break;
        }
        name.push(' ');
        name.push_str(next);
        input = rest;
        if last == "long" {
            break;
        }
        last = next;
    }
    Ok((input, name))
}

fn union_type(input: &str) -> IResult<&str, SyntaxType> {
    let (input, members) = delimited(
        char('('),
        separated_list1(delimited(space1, tag("or"), space1), syntax_type),
        preceded(space0, char(')')),
    )(input)?;
    Ok((input, SyntaxType::Union(members)))
}

fn single_type(input: &str) -> IResult<&str, SyntaxType> {
    let (input, name) = type_name(input)?;
    let (input, args) = opt(delimited(
        preceded(space0, char('<')),
        separated_list1(preceded(space0, char(',')), syntax_type),
        preceded(space0, char('>')),
    ))(input)?;

    let ty = match args {
        None => SyntaxType::Named(name),
        Some(mut args) => match (name.as_str(), args.len()) {
            ("sequence", 1) => SyntaxType::Sequence(Box::new(args.remove(0))),
            ("record", 2) => {
                let value = args.remove(1);
                let key = args.remove(0);
                SyntaxType::Record(Box::new(key), Box::new(value))
            }
            _ => SyntaxType::Generic { name, args },
        },
    };
    Ok((input, ty))
}

fn syntax_type(input: &str) -> IResult<&str, SyntaxType> {
    let (input, _) = space0(input)?;
    let (input, base) = alt((union_type, single_type))(input)?;
    let (input, question) = opt(preceded(space0, char('?')))(input)?;
    let ty = if question.is_some() {
        SyntaxType::Nullable(Box::new(base))
    } else {
        base
    };
    Ok((input, ty))
}

/// Receives one callback per declaration kind, in file order.
pub trait Visitor {
    type Error;

    fn visit_enum(&mut self, file: &File, decl: &EnumDecl) -> Result<(), Self::Error>;
    fn visit_interface(&mut self, file: &File, decl: &InterfaceDecl) -> Result<(), Self::Error>;
    fn visit_mixin(&mut self, file: &File, decl: &MixinDecl) -> Result<(), Self::Error>;
    fn visit_dictionary(&mut self, file: &File, decl: &DictionaryDecl) -> Result<(), Self::Error>;
    fn visit_includes(&mut self, file: &File, decl: &IncludesDecl) -> Result<(), Self::Error>;
    fn visit_callback(&mut self, file: &File, decl: &CallbackDecl) -> Result<(), Self::Error>;
    fn visit_typedef(&mut self, file: &File, decl: &TypedefDecl) -> Result<(), Self::Error>;
    fn visit_implementation(
        &mut self,
        file: &File,
        decl: &ImplementationDecl,
    ) -> Result<(), Self::Error>;
}

/// Feeds every definition of `file` to `visitor`, stopping at the first error.
pub fn walk<V: Visitor>(file: &File, visitor: &mut V) -> Result<(), V::Error> {
    for definition in &file.definitions {
        match definition {
            Definition::Enum(decl) => visitor.visit_enum(file, decl)?,
            Definition::Interface(decl) => visitor.visit_interface(file, decl)?,
            Definition::Mixin(decl) => visitor.visit_mixin(file, decl)?,
            Definition::Dictionary(decl) => visitor.visit_dictionary(file, decl)?,
            Definition::Includes(decl) => visitor.visit_includes(file, decl)?,
            Definition::Callback(decl) => visitor.visit_callback(file, decl)?,
            Definition::Typedef(decl) => visitor.visit_typedef(file, decl)?,
            Definition::Implementation(decl) => visitor.visit_implementation(file, decl)?,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl InterfaceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits = Some(parent.into());
        self
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn callback(mut self) -> Self {
        self.callback = true;
        self
    }

    pub fn annotate(mut self, annotation: ExtendedAttribute) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl MixinDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl DictionaryDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits = Some(parent.into());
        self
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn member(mut self, name: impl Into<String>, ty: SyntaxType) -> Self {
        self.members.push(DictionaryMember {
            name: name.into(),
            ty,
            required: false,
            default: None,
            line: self.line,
        });
        self
    }

    pub fn required(mut self, name: impl Into<String>, ty: SyntaxType) -> Self {
        self.members.push(DictionaryMember {
            name: name.into(),
            ty,
            required: true,
            default: None,
            line: self.line,
        });
        self
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl EnumDecl {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl CallbackDecl {
    pub fn new(name: impl Into<String>, return_type: SyntaxType, args: Vec<Argument>) -> Self {
        Self {
            name: name.into(),
            return_type,
            args,
            annotations: Vec::new(),
            line: 0,
        }
    }

    pub fn at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl TypedefDecl {
    pub fn new(name: impl Into<String>, ty: SyntaxType) -> Self {
        Self {
            name: name.into(),
            ty,
            line: 0,
        }
    }
}

impl IncludesDecl {
    pub fn new(target: impl Into<String>, mixin: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            mixin: mixin.into(),
            line: 0,
        }
    }
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: SyntaxType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            variadic: false,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

impl Member {
    pub fn constant(name: impl Into<String>, ty: SyntaxType, value: impl Into<String>) -> Self {
        Member::Const(ConstMember {
            name: name.into(),
            ty,
            value: value.into(),
            line: 0,
        })
    }

    pub fn attribute(name: impl Into<String>, ty: SyntaxType) -> Self {
        Member::Attribute(AttributeMember {
            name: name.into(),
            ty,
            readonly: false,
            is_static: false,
            annotations: Vec::new(),
            line: 0,
        })
    }

    pub fn operation(name: impl Into<String>, return_type: SyntaxType, args: Vec<Argument>) -> Self {
        Member::Operation(OperationMember {
            name: Some(name.into()),
            return_type,
            args,
            is_static: false,
            special: None,
            annotations: Vec::new(),
            line: 0,
        })
    }

    pub fn constructor(args: Vec<Argument>) -> Self {
        Member::Constructor(ConstructorMember { args, line: 0 })
    }

    /// Marks an attribute read-only.
    pub fn readonly(mut self) -> Self {
        if let Member::Attribute(attr) = &mut self {
            attr.readonly = true;
        }
        self
    }

    /// Marks an attribute or operation static.
    pub fn static_member(mut self) -> Self {
        match &mut self {
            Member::Attribute(attr) => attr.is_static = true,
            Member::Operation(op) => op.is_static = true,
            _ => {}
        }
        self
    }

    pub fn at(mut self, at: usize) -> Self {
        match &mut self {
            Member::Const(c) => c.line = at,
            Member::Attribute(a) => a.line = at,
            Member::Operation(o) => o.line = at,
            Member::Constructor(c) => c.line = at,
            Member::Iterable { line }
            | Member::Maplike { line }
            | Member::Setlike { line }
            | Member::Stringifier { line } => *line = at,
        }
        self
    }

    pub fn line(&self) -> usize {
        match self {
            Member::Const(c) => c.line,
            Member::Attribute(a) => a.line,
            Member::Operation(o) => o.line,
            Member::Constructor(c) => c.line,
            Member::Iterable { line }
            | Member::Maplike { line }
            | Member::Setlike { line }
            | Member::Stringifier { line } => *line,
        }
    }
}

macro_rules! into_definition {
    ($($decl:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$decl> for Definition {
                fn from(decl: $decl) -> Self {
                    Definition::$variant(decl)
                }
            }
        )*
    };
}

into_definition! {
    EnumDecl => Enum,
    InterfaceDecl => Interface,
    MixinDecl => Mixin,
    DictionaryDecl => Dictionary,
    IncludesDecl => Includes,
    CallbackDecl => Callback,
    TypedefDecl => Typedef,
    ImplementationDecl => Implementation,
}
