//! Compiled form of a transformation script.

use regex::Regex;

use crate::model::EntityKind;

/// One model mutation.
#[derive(Debug, Clone)]
pub enum ActionKind {
    /// `.name = value`
    SetProperty { name: String, value: String },
    /// `member = NewName`
    Rename { member: String, to: String },
    /// `@changetype member = raw`
    ChangeType { member: String, raw: String },
    /// `@patch`
    Patch,
    /// `@replace property from to`
    Replace {
        property: String,
        from: String,
        to: String,
    },
    /// `@event name = Type`
    Event { name: String, event_type: String },
    /// `@on kind pattern nested...`
    On {
        filter: KindFilter,
        pattern: Regex,
        nested: Box<ActionKind>,
    },
}

impl ActionKind {
    /// Short name used in logs.
    pub fn describe(&self) -> &'static str {
        match self {
            ActionKind::SetProperty { .. } => "property",
            ActionKind::Rename { .. } => "rename",
            ActionKind::ChangeType { .. } => "changetype",
            ActionKind::Patch => "patch",
            ActionKind::Replace { .. } => "replace",
            ActionKind::Event { .. } => "event",
            ActionKind::On { .. } => "on",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub line: usize,
}

/// Which entity kinds an `@on` command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Any,
    Only(EntityKind),
}

impl KindFilter {
    pub fn parse(word: &str) -> Option<KindFilter> {
        Some(match word {
            "any" => KindFilter::Any,
            "interface" => KindFilter::Only(EntityKind::Interface),
            "enum" => KindFilter::Only(EntityKind::Enum),
            "callback" => KindFilter::Only(EntityKind::Callback),
            "dictionary" => KindFilter::Only(EntityKind::Dictionary),
            _ => return None,
        })
    }

    pub fn matches(self, kind: EntityKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Only(only) => only == kind,
        }
    }
}

/// Actions applied to one named type, as a unit.
#[derive(Debug, Clone)]
pub struct TypeBlock {
    pub name: String,
    pub actions: Vec<Action>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum ScriptItem {
    Block(TypeBlock),
    /// An `@on` command outside any type block
    Global(Action),
}

#[derive(Debug, Clone)]
pub struct Script {
    /// File name, for diagnostics
    pub file: String,
    pub items: Vec<ScriptItem>,
}
