//! # Action Interpretation
//!
//! Applies compiled scripts to the linked model. The actions of one type
//! block run against a working copy of the entity, and the copy replaces the
//! original only when the whole block succeeded, so a block with an error
//! leaves its entity untouched. `@on` commits every matching entity on its
//! own; inside a block it runs after the block has been committed.

use tracing::{debug, trace};

use super::action::{Action, ActionKind, KindFilter, Script, ScriptItem, TypeBlock};
use crate::context::Context;
use crate::diagnostic::{CompileError, Issue, SourceRef};
use crate::model::{Entity, EntityId, EntityKind, EventAdapter};
use crate::naming;

/// Runs every item of `script` in order.
pub fn run_script(ctx: &mut Context, script: &Script) -> Result<(), CompileError> {
    for item in &script.items {
        ctx.diagnostics.check_limit()?;
        match item {
            ScriptItem::Block(block) => run_block(ctx, &script.file, block),
            ScriptItem::Global(action) => apply_global(ctx, &script.file, action),
        }
    }
    ctx.diagnostics.check_limit()
}

fn run_block(ctx: &mut Context, file: &str, block: &TypeBlock) {
    let Some(id) = ctx.table.lookup_type(&block.name) else {
        ctx.diagnostics.report(
            Issue::UnknownType {
                name: block.name.clone(),
            },
            &SourceRef::new(file, block.line),
        );
        return;
    };
    debug!(name = %block.name, actions = block.actions.len(), "applying block");

    let errors = ctx.diagnostics.error_count();
    let mut working = ctx.table.entity(id).clone();
    let mut deferred = Vec::new();
    for action in &block.actions {
        if ctx.diagnostics.should_stop() {
            return;
        }
        match &action.kind {
            ActionKind::On { .. } => deferred.push(action),
            kind => {
                if let Err(issue) = apply(ctx, &mut working, kind) {
                    ctx.diagnostics.report(issue, &SourceRef::new(file, action.line));
                }
            }
        }
    }
    if ctx.diagnostics.error_count() == errors {
        *ctx.table.entity_mut(id) = working;
    }
    // `@on` writes to the table, so it runs once the block's own entity is settled.
    for action in deferred {
        if ctx.diagnostics.should_stop() {
            return;
        }
        apply_global(ctx, file, action);
    }
}

fn apply_global(ctx: &mut Context, file: &str, action: &Action) {
    let ActionKind::On {
        filter,
        pattern,
        nested,
    } = &action.kind
    else {
        return;
    };
    let targets: Vec<EntityId> = ctx
        .table
        .ids()
        .filter(|id| matches(ctx, *id, *filter, pattern))
        .collect();
    debug!(pattern = %pattern, matches = targets.len(), "applying @on");

    for id in targets {
        if ctx.diagnostics.should_stop() {
            return;
        }
        let mut working = ctx.table.entity(id).clone();
        match apply(ctx, &mut working, nested) {
            Ok(()) => *ctx.table.entity_mut(id) = working,
            Err(issue) => ctx.diagnostics.report(issue, &SourceRef::new(file, action.line)),
        }
    }
}

fn matches(ctx: &Context, id: EntityId, filter: KindFilter, pattern: &regex::Regex) -> bool {
    let entity = ctx.table.entity(id);
    filter.matches(entity.kind()) && pattern.is_match(entity.key())
}

/// Applies one action to the working copy of an entity.
fn apply(ctx: &Context, entity: &mut Entity, action: &ActionKind) -> Result<(), Issue> {
    trace!(entity = %entity.key(), action = action.describe(), "applying");
    match action {
        ActionKind::SetProperty { name, value } => set_property(entity, name, value),
        ActionKind::Rename { member, to } => rename(entity, member, to),
        ActionKind::ChangeType { member, raw } => change_type(entity, member, raw),
        ActionKind::Patch => patch(entity),
        ActionKind::Replace { property, from, to } => {
            let value = property_value(entity, property)?;
            set_property(entity, property, &value.replace(from.as_str(), to))
        }
        ActionKind::Event { name, event_type } => add_event(ctx, entity, name, event_type),
        // Run by the callers, which own the table; the parser never nests them.
        ActionKind::On { .. } => Ok(()),
    }
}

fn property_slot<'e>(entity: &'e mut Entity, name: &str) -> Result<&'e mut String, Issue> {
    let kind = entity.kind();
    let unknown = || Issue::UnknownProperty {
        kind: kind.as_str(),
        name: name.to_string(),
    };
    match name {
        "name" => Ok(&mut entity.basic_mut().name),
        "package" => Ok(&mut entity.basic_mut().package),
        "internal" => Ok(&mut entity.basic_mut().internal),
        "prefix" | "suffix" => match entity {
            Entity::Enum(e) => Ok(if name == "prefix" { &mut e.prefix } else { &mut e.suffix }),
            _ => Err(unknown()),
        },
        _ => Err(unknown()),
    }
}

fn property_value(entity: &mut Entity, name: &str) -> Result<String, Issue> {
    property_slot(entity, name).map(|slot| slot.clone())
}

fn set_property(entity: &mut Entity, name: &str, value: &str) -> Result<(), Issue> {
    let slot = property_slot(entity, name)?;
    if value.trim().is_empty() {
        return Err(Issue::InvalidPropertyValue {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    *slot = value.to_string();
    Ok(())
}

/// Display names of every interface member declared as `member`.
///
/// Consts, attributes, static attributes, methods and static methods are
/// searched in that order; overloads come back in declaration order.
fn member_names<'e>(entity: &'e mut Entity, member: &str) -> Result<Vec<&'e mut String>, Issue> {
    let kind = entity.kind();
    let type_name = entity.key().to_string();
    let Entity::Interface(iface) = entity else {
        return Err(Issue::RenameNotSupported {
            kind: kind.as_str(),
            type_name,
        });
    };
    let members = &mut iface.members;
    let mut names: Vec<&mut String> = Vec::new();
    names.extend(members.consts.iter_mut().filter(|c| c.idl == member).map(|c| &mut c.name));
    names.extend(members.vars.iter_mut().filter(|a| a.idl == member).map(|a| &mut a.name));
    names.extend(members.static_vars.iter_mut().filter(|a| a.idl == member).map(|a| &mut a.name));
    names.extend(members.methods.iter_mut().filter(|m| m.idl == member).map(|m| &mut m.name));
    names.extend(members.static_methods.iter_mut().filter(|m| m.idl == member).map(|m| &mut m.name));
    if names.is_empty() {
        return Err(Issue::UnknownRenameTarget {
            type_name,
            name: member.to_string(),
        });
    }
    Ok(names)
}

fn rename(entity: &mut Entity, member: &str, to: &str) -> Result<(), Issue> {
    for (index, name) in member_names(entity, member)?.into_iter().enumerate() {
        *name = if index == 0 {
            to.to_string()
        } else {
            format!("{}{}", to, index + 1)
        };
    }
    Ok(())
}

fn change_type(entity: &mut Entity, member: &str, raw: &str) -> Result<(), Issue> {
    let kind = entity.kind();
    let type_name = entity.key().to_string();
    let mut slots: Vec<&mut Option<String>> = Vec::new();
    match entity {
        Entity::Interface(iface) => {
            let m = &mut iface.members;
            slots.extend(
                m.vars
                    .iter_mut()
                    .chain(m.static_vars.iter_mut())
                    .filter(|a| a.idl == member)
                    .map(|a| &mut a.type_override),
            );
            slots.extend(
                m.methods
                    .iter_mut()
                    .chain(m.static_methods.iter_mut())
                    .filter(|x| x.idl == member)
                    .map(|x| &mut x.type_override),
            );
        }
        Entity::Dictionary(dict) => slots.extend(
            dict.members
                .iter_mut()
                .filter(|d| d.idl == member)
                .map(|d| &mut d.type_override),
        ),
        Entity::Callback(cb) => slots.extend(
            cb.params
                .iter_mut()
                .filter(|p| p.name == member)
                .map(|p| &mut p.type_override),
        ),
        Entity::Enum(_) => {
            return Err(Issue::NotApplicable {
                command: "changetype",
                kind: kind.as_str(),
                type_name,
            })
        }
    }
    if slots.is_empty() {
        return Err(Issue::UnknownMember {
            type_name,
            name: member.to_string(),
        });
    }
    for slot in slots {
        *slot = Some(raw.to_string());
    }
    Ok(())
}

fn patch(entity: &mut Entity) -> Result<(), Issue> {
    let kind = entity.kind();
    match entity {
        Entity::Interface(iface) => {
            for c in &mut iface.members.consts {
                c.name = naming::const_name(&c.idl);
            }
            Ok(())
        }
        other => Err(Issue::NotApplicable {
            command: "patch",
            kind: kind.as_str(),
            type_name: other.key().to_string(),
        }),
    }
}

fn add_event(ctx: &Context, entity: &mut Entity, name: &str, event_type: &str) -> Result<(), Issue> {
    let kind = entity.kind();
    let type_name = entity.key().to_string();
    let source = entity.basic().source.clone();
    let Entity::Interface(iface) = entity else {
        return Err(Issue::NotApplicable {
            command: "event",
            kind: kind.as_str(),
            type_name,
        });
    };
    let event = ctx
        .table
        .lookup_type(event_type)
        .filter(|id| ctx.table.kind(*id) == EntityKind::Interface)
        .ok_or_else(|| Issue::UnknownEventType {
            name: event_type.to_string(),
        })?;
    let handler_idl = format!("on{}", name);
    let handler = iface
        .members
        .vars
        .iter()
        .find(|a| a.idl == handler_idl)
        .map(|a| a.name.clone());
    iface.events.push(EventAdapter {
        name: name.to_string(),
        event,
        handler,
        source,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, CallbackDecl, DictionaryDecl, EnumDecl, InterfaceDecl, Member, SyntaxType};
    use crate::extract::extract_file;
    use crate::transform::{parser::parse_script, ScriptSource};
    use pretty_assertions::assert_eq;

    fn context() -> Context {
        let long = || SyntaxType::named("long");
        let file = ast::File::new("dom.idl")
            .with(
                InterfaceDecl::new("Node")
                    .member(Member::constant("ELEMENT_NODE", SyntaxType::named("unsigned short"), "1"))
                    .member(Member::attribute("onclick", SyntaxType::named("EventHandler")))
                    .member(Member::operation("item", long(), vec![]))
                    .member(Member::operation("item", long(), vec![ast::Argument::new("i", long())])),
            )
            .with(InterfaceDecl::new("MouseEvent"))
            .with(EnumDecl::new("CanvasFillRule", ["nonzero", "evenodd"]))
            .with(DictionaryDecl::new("MouseEventInit").member("button", long()))
            .with(CallbackDecl::new(
                "FrameRequestCallback",
                SyntaxType::named("undefined"),
                vec![ast::Argument::new("time", SyntaxType::named("double"))],
            ));
        let mut ctx = Context::default();
        extract_file(&mut ctx, &file).unwrap();
        ctx
    }

    fn run(ctx: &mut Context, text: &str) {
        let script = parse_script(&ScriptSource::new("test.tr", text), &mut ctx.diagnostics).unwrap();
        run_script(ctx, &script).unwrap();
    }

    fn node(ctx: &Context) -> &crate::model::Interface {
        let id = ctx.table.lookup_type("Node").unwrap();
        ctx.table.entity(id).as_interface().unwrap()
    }

    #[test]
    fn test_overloads_are_numbered() {
        let mut ctx = context();
        run(&mut ctx, "## Node\nitem = Get\n");
        let names: Vec<_> = node(&ctx).members.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Get", "Get2"]);
    }

    #[test]
    fn test_patch_and_replace() {
        let mut ctx = context();
        run(&mut ctx, "## Node\n@patch\n@replace name No Dom\n");
        assert_eq!(node(&ctx).members.consts[0].name, "ElementNode");
        assert_eq!(node(&ctx).basic.name, "Domde");
    }

    #[test]
    fn test_event_records_handler() {
        let mut ctx = context();
        run(&mut ctx, "## Node\n@event click = MouseEvent\n");
        let events = &node(&ctx).events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].handler.as_deref(), Some("Onclick"));
    }

    #[test]
    fn test_enum_properties_and_on() {
        let mut ctx = context();
        run(&mut ctx, "@on enum ^Canvas .prefix = Canvas\n@on any . .package = web\n");
        let id = ctx.table.lookup_type("CanvasFillRule").unwrap();
        let e = ctx.table.entity(id).as_enum().unwrap();
        assert_eq!(e.prefix, "Canvas");
        assert_eq!(e.basic.package, "web");
        assert_eq!(node(&ctx).basic.package, "web");
    }

    #[test]
    fn test_enum_prefix_and_suffix_in_block() {
        let mut ctx = context();
        run(&mut ctx, "## CanvasFillRule\n.prefix = Canvas\n.suffix = Rule\n");
        let id = ctx.table.lookup_type("CanvasFillRule").unwrap();
        let e = ctx.table.entity(id).as_enum().unwrap();
        assert_eq!((e.prefix.as_str(), e.suffix.as_str()), ("Canvas", "Rule"));
        assert_eq!(ctx.diagnostics.error_count(), 0);
    }

    #[test]
    fn test_on_inside_block_keeps_its_changes() {
        let mut ctx = context();
        run(&mut ctx, "## Node\n.name = DomNode\n@on interface ^Node$ .package = web\n");
        assert_eq!(node(&ctx).basic.name, "DomNode");
        assert_eq!(node(&ctx).basic.package, "web");
    }

    #[test]
    fn test_changetype_on_members_and_params() {
        let mut ctx = context();
        run(
            &mut ctx,
            "## Node\n@changetype item = js.Value\n@changetype onclick = func()\n\
             ## MouseEventInit\n@changetype button = int\n\
             ## FrameRequestCallback\n@changetype time = float64\n",
        );
        assert_eq!(ctx.diagnostics.error_count(), 0);
        let overrides: Vec<_> = node(&ctx).members.methods.iter().map(|m| m.type_override.as_deref()).collect();
        assert_eq!(overrides, vec![Some("js.Value"), Some("js.Value")]);
        assert_eq!(node(&ctx).members.vars[0].type_override.as_deref(), Some("func()"));

        let id = ctx.table.lookup_type("MouseEventInit").unwrap();
        let dict = ctx.table.entity(id).as_dictionary().unwrap();
        assert_eq!(dict.members[0].type_override.as_deref(), Some("int"));

        let id = ctx.table.lookup_type("FrameRequestCallback").unwrap();
        let cb = ctx.table.entity(id).as_callback().unwrap();
        assert_eq!(cb.params[0].type_override.as_deref(), Some("float64"));
    }

    #[test]
    fn test_changetype_of_missing_member() {
        let mut ctx = context();
        run(&mut ctx, "## MouseEventInit\n@changetype buttons = int\n");
        assert_eq!(ctx.diagnostics.error_count(), 1);
        let id = ctx.table.lookup_type("MouseEventInit").unwrap();
        assert_eq!(ctx.table.entity(id).as_dictionary().unwrap().members[0].type_override, None);
    }

    #[test]
    fn test_failed_block_is_not_committed() {
        let mut ctx = context();
        let script = parse_script(
            &ScriptSource::new("test.tr", "## Node\n.name = Renamed\n.color = red\n## Missing\n.name = X\n"),
            &mut ctx.diagnostics,
        )
        .unwrap();
        run_script(&mut ctx, &script).unwrap();
        assert_eq!(ctx.diagnostics.count_code("E035"), 1);
        assert_eq!(ctx.diagnostics.count_code("E034"), 1);
        assert_eq!(node(&ctx).basic.name, "Node");
    }

    #[test]
    fn test_not_applicable_commands() {
        let mut ctx = context();
        let script = parse_script(
            &ScriptSource::new("test.tr", "## CanvasFillRule\n@patch\n@changetype x = int\nfoo = Bar\n"),
            &mut ctx.diagnostics,
        )
        .unwrap();
        run_script(&mut ctx, &script).unwrap();
        assert_eq!(ctx.diagnostics.count_code("E040"), 2);
        assert_eq!(ctx.diagnostics.count_code("E038"), 1);
    }
}
