//! # Symbol Table
//!
//! Arena of entities addressed by [`EntityId`], plus the global name index.
//!
//! The name index covers types, mixins and typedefs together so that every
//! key is unique across all three. It is an [`IndexMap`], so iteration is in
//! declaration order and never depends on hashing.

use indexmap::IndexMap;
use serde::Serialize;

use crate::diagnostic::SourceRef;
use crate::model::{Entity, EntityId, EntityKind, Mixin, Typedef};
use crate::naming;

/// What a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Symbol {
    Type(EntityId),
    Mixin(usize),
    Typedef(usize),
}

/// The three entities synthesized for one `Promise<T>` instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromiseInstance {
    pub interface: EntityId,
    pub on_fulfilled: EntityId,
    pub on_rejected: EntityId,
}

#[derive(Debug, Default, Serialize)]
pub struct SymbolTable {
    entities: Vec<Entity>,
    #[serde(skip)]
    in_use: Vec<bool>,
    #[serde(skip)]
    names: IndexMap<String, Symbol>,
    mixins: Vec<Mixin>,
    typedefs: Vec<Typedef>,
    promises: IndexMap<String, PromiseInstance>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity under its key.
    ///
    /// On a collision nothing is inserted and the source of the first
    /// declaration is returned.
    pub fn insert(&mut self, entity: Entity) -> Result<EntityId, SourceRef> {
        if let Some(previous) = self.declared_at(entity.key()) {
            return Err(previous);
        }
        let key = entity.key().to_string();
        let id = self.push(entity);
        self.names.insert(key, Symbol::Type(id));
        Ok(id)
    }

    /// Adds an entity to the arena without giving it a name.
    ///
    /// Used for synthesized entities that are found through other indexes.
    pub fn push(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        self.in_use.push(false);
        id
    }

    pub fn insert_mixin(&mut self, mixin: Mixin) -> Result<(), SourceRef> {
        if let Some(previous) = self.declared_at(&mixin.basic.idl) {
            return Err(previous);
        }
        self.names
            .insert(mixin.basic.idl.clone(), Symbol::Mixin(self.mixins.len()));
        self.mixins.push(mixin);
        Ok(())
    }

    pub fn insert_typedef(&mut self, typedef: Typedef) -> Result<(), SourceRef> {
        if let Some(previous) = self.declared_at(&typedef.idl) {
            return Err(previous);
        }
        self.names
            .insert(typedef.idl.clone(), Symbol::Typedef(self.typedefs.len()));
        self.typedefs.push(typedef);
        Ok(())
    }

    /// Where `key` was first declared, if it is taken.
    pub fn declared_at(&self, key: &str) -> Option<SourceRef> {
        self.names.get(key).map(|symbol| match *symbol {
            Symbol::Type(id) => self.entity(id).basic().source.clone(),
            Symbol::Mixin(index) => self.mixins[index].basic.source.clone(),
            Symbol::Typedef(index) => self.typedefs[index].source.clone(),
        })
    }

    pub fn lookup(&self, key: &str) -> Option<Symbol> {
        self.names.get(key).copied()
    }

    /// Looks up a type entity by key.
    pub fn lookup_type(&self, key: &str) -> Option<EntityId> {
        match self.lookup(key) {
            Some(Symbol::Type(id)) => Some(id),
            _ => None,
        }
    }

    /// The closest declared type or typedef name to a misspelled `key`.
    ///
    /// Only names within two edits, and fewer edits than `key` has chars,
    /// are suggested; ties go to the earliest declaration.
    pub fn similar_name(&self, key: &str) -> Option<&str> {
        let limit = key.chars().count().saturating_sub(1).min(2);
        self.names
            .iter()
            .filter(|(_, symbol)| !matches!(symbol, Symbol::Mixin(_)))
            .map(|(name, _)| (naming::edit_distance(key, name), name.as_str()))
            .filter(|(distance, _)| *distance <= limit)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, name)| name)
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.index()]
    }

    pub fn kind(&self, id: EntityId) -> EntityKind {
        self.entity(id).kind()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entity handles in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> {
        (0..self.entities.len() as u32).map(EntityId)
    }

    /// Handles of one kind, in insertion order.
    pub fn ids_of(&self, kind: EntityKind) -> Vec<EntityId> {
        self.ids().filter(|id| self.kind(*id) == kind).collect()
    }

    pub fn mixin(&self, index: usize) -> &Mixin {
        &self.mixins[index]
    }

    pub fn mixin_mut(&mut self, index: usize) -> &mut Mixin {
        &mut self.mixins[index]
    }

    pub fn typedef(&self, index: usize) -> &Typedef {
        &self.typedefs[index]
    }

    pub fn typedef_mut(&mut self, index: usize) -> &mut Typedef {
        &mut self.typedefs[index]
    }

    pub fn typedef_count(&self) -> usize {
        self.typedefs.len()
    }

    pub fn is_in_use(&self, id: EntityId) -> bool {
        self.in_use[id.index()]
    }

    /// Marks `id` reachable. Returns false if it already was.
    pub fn mark_in_use(&mut self, id: EntityId) -> bool {
        !std::mem::replace(&mut self.in_use[id.index()], true)
    }

    pub fn promise(&self, key: &str) -> Option<PromiseInstance> {
        self.promises.get(key).copied()
    }

    pub fn register_promise(&mut self, key: impl Into<String>, instance: PromiseInstance) {
        self.promises.insert(key.into(), instance);
    }

    /// Instantiation keys in registration order.
    pub fn promises(&self) -> impl Iterator<Item = (&str, PromiseInstance)> {
        self.promises.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BasicInfo, Enum, Members};

    fn enum_entity(name: &str, line: usize) -> Entity {
        Entity::Enum(Enum {
            basic: BasicInfo::new(name, "dom", SourceRef::new("dom.idl", line)),
            values: vec!["a".to_string()],
            prefix: String::new(),
            suffix: String::new(),
        })
    }

    #[test]
    fn test_first_declaration_wins() {
        let mut table = SymbolTable::new();
        let id = table.insert(enum_entity("Mode", 1)).unwrap();
        let err = table.insert(enum_entity("Mode", 7)).unwrap_err();
        assert_eq!(err, SourceRef::new("dom.idl", 1));
        assert_eq!(table.lookup_type("Mode"), Some(id));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_mixins_share_the_key_space() {
        let mut table = SymbolTable::new();
        table.insert(enum_entity("Shared", 1)).unwrap();
        let mixin = Mixin {
            basic: BasicInfo::new("Shared", "dom", SourceRef::new("dom.idl", 5)),
            members: Members::default(),
        };
        assert!(table.insert_mixin(mixin).is_err());
    }

    #[test]
    fn test_similar_name_suggestions() {
        let mut table = SymbolTable::new();
        table.insert(enum_entity("Node", 1)).unwrap();
        table.insert(enum_entity("Mode", 2)).unwrap();
        assert_eq!(table.similar_name("Nod"), Some("Node"));
        assert_eq!(table.similar_name("Xode"), Some("Node"));
        assert_eq!(table.similar_name("Window"), None);
        assert_eq!(table.similar_name("N"), None);
    }

    #[test]
    fn test_mark_in_use_reports_first_visit() {
        let mut table = SymbolTable::new();
        let id = table.insert(enum_entity("Mode", 1)).unwrap();
        assert!(table.mark_in_use(id));
        assert!(!table.mark_in_use(id));
        assert!(table.is_in_use(id));
    }
}
