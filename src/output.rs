//! # Generator Input
//!
//! What the compiler hands to a code generator: every in-use entity grouped
//! by package and kind, sorted by IDL name, plus the symbol table the
//! handles point into.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Entity, EntityId, EntityKind};
use crate::symbols::SymbolTable;

/// In-use entities of one package, each list sorted by IDL name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageContents {
    pub enums: Vec<EntityId>,
    pub callbacks: Vec<EntityId>,
    pub dictionaries: Vec<EntityId>,
    pub interfaces: Vec<EntityId>,
}

impl PackageContents {
    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<EntityId> {
        match kind {
            EntityKind::Enum => &mut self.enums,
            EntityKind::Callback => &mut self.callbacks,
            EntityKind::Dictionary => &mut self.dictionaries,
            EntityKind::Interface => &mut self.interfaces,
        }
    }

    pub fn len(&self) -> usize {
        self.enums.len() + self.callbacks.len() + self.dictionaries.len() + self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct GeneratorInput {
    packages: BTreeMap<String, PackageContents>,
    table: SymbolTable,
}

impl GeneratorInput {
    /// Collects the in-use entities of a finished model.
    pub fn new(table: SymbolTable) -> Self {
        let mut packages: BTreeMap<String, PackageContents> = BTreeMap::new();
        for id in table.ids().filter(|id| table.is_in_use(*id)) {
            let entity = table.entity(id);
            packages
                .entry(entity.basic().package.clone())
                .or_default()
                .list_mut(entity.kind())
                .push(id);
        }
        for contents in packages.values_mut() {
            for list in [
                &mut contents.enums,
                &mut contents.callbacks,
                &mut contents.dictionaries,
                &mut contents.interfaces,
            ] {
                list.sort_by(|a, b| table.entity(*a).key().cmp(table.entity(*b).key()));
            }
        }
        Self { packages, table }
    }

    pub fn packages(&self) -> &BTreeMap<String, PackageContents> {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&PackageContents> {
        self.packages.get(name)
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        self.table.entity(id)
    }

    /// Number of entities handed to the generator.
    pub fn entity_count(&self) -> usize {
        self.packages.values().map(PackageContents::len).sum()
    }

    /// The package listing and the full model, as pretty-printed JSON.
    ///
    /// Entity handles in the listing are indexes into `model.entities`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            packages: &'a BTreeMap<String, PackageContents>,
            model: &'a SymbolTable,
        }
        serde_json::to_string_pretty(&Document {
            packages: &self.packages,
            model: &self.table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, EnumDecl, InterfaceDecl, Member, SyntaxType};
    use crate::context::Context;
    use crate::extract::extract_file;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_in_use_entities_sorted_by_name() {
        let mut ctx = Context::default();
        let file = ast::File::new("dom.idl")
            .with(InterfaceDecl::new("Window").member(Member::attribute("mode", SyntaxType::named("Mode"))))
            .with(InterfaceDecl::new("Document"))
            .with(EnumDecl::new("Mode", ["a"]))
            .with(EnumDecl::new("Unused", ["b"]));
        extract_file(&mut ctx, &file).unwrap();
        crate::link::link(&mut ctx).unwrap();

        let input = GeneratorInput::new(std::mem::take(&mut ctx.table));
        let dom = input.package("dom").unwrap();
        let names = |ids: &[EntityId]| -> Vec<String> {
            ids.iter().map(|id| input.entity(*id).key().to_string()).collect()
        };
        assert_eq!(names(&dom.interfaces), vec!["Document", "Window"]);
        assert_eq!(names(&dom.enums), vec!["Mode"]);
        assert_eq!(input.entity_count(), 3);

        let json: serde_json::Value = serde_json::from_str(&input.to_json().unwrap()).unwrap();
        assert_eq!(json["packages"]["dom"]["enums"].as_array().unwrap().len(), 1);
    }
}
