//! # Script Parser
//!
//! Groups the token stream into lines and compiles each line into an
//! [`Action`]. Actions that follow a `## TypeName` header belong to that
//! type's block; a `# package` header makes every later block start with an
//! implicit `.package = package`.
//!
//! A malformed line is reported and skipped, and parsing continues with the
//! next line. A lexical error ends the script, because the lexer cannot
//! resynchronize.

use regex::Regex;
use tracing::debug;

use super::action::{Action, ActionKind, KindFilter, Script, ScriptItem, TypeBlock};
use super::lexer::{Lexer, LineToken, Token};
use super::ScriptSource;
use crate::diagnostic::{DiagnosticBag, Issue, SourceRef};

/// Parses a script, reporting problems to `diagnostics`.
///
/// Returns `None` when the script could not be lexed.
pub fn parse_script(source: &ScriptSource, diagnostics: &mut DiagnosticBag) -> Option<Script> {
    let mut parser = Parser {
        file: &source.file,
        diagnostics,
        package: None,
        current: None,
        items: Vec::new(),
    };
    let mut line: Vec<LineToken> = Vec::new();

    for result in Lexer::new(&source.text) {
        let token = match result {
            Ok(token) => token,
            Err(err) => {
                parser.diagnostics.report(
                    Issue::Lex {
                        message: err.message,
                    },
                    &SourceRef::new(&source.file, err.line),
                );
                return None;
            }
        };
        match token.token {
            Token::Newline | Token::Eof => {
                if !line.is_empty() {
                    parser.statement(std::mem::take(&mut line));
                }
            }
            _ => line.push(token),
        }
    }

    let script = parser.finish();
    debug!(file = %script.file, items = script.items.len(), "parsed script");
    Some(script)
}

struct Parser<'a> {
    file: &'a str,
    diagnostics: &'a mut DiagnosticBag,
    package: Option<String>,
    current: Option<TypeBlock>,
    items: Vec<ScriptItem>,
}

impl Parser<'_> {
    fn finish(mut self) -> Script {
        self.close_block();
        Script {
            file: self.file.to_string(),
            items: self.items,
        }
    }

    fn close_block(&mut self) {
        if let Some(block) = self.current.take() {
            self.items.push(ScriptItem::Block(block));
        }
    }

    fn statement(&mut self, tokens: Vec<LineToken>) {
        let line = tokens[0].line;
        match tokens[0].token.clone() {
            Token::FileHeader(package) => self.package = Some(package),
            Token::TypeHeader(name) => {
                self.close_block();
                let mut actions = Vec::new();
                if let Some(package) = &self.package {
                    actions.push(Action {
                        kind: ActionKind::SetProperty {
                            name: "package".to_string(),
                            value: package.clone(),
                        },
                        line,
                    });
                }
                self.current = Some(TypeBlock {
                    name,
                    actions,
                    line,
                });
            }
            _ => {
                let tokens: Vec<Token> = tokens.into_iter().map(|t| t.token).collect();
                match action(&tokens) {
                    Ok(kind) => self.push(Action { kind, line }),
                    Err(issue) => self.report(issue, line),
                }
            }
        }
    }

    fn push(&mut self, action: Action) {
        if let Some(block) = &mut self.current {
            block.actions.push(action);
        } else if matches!(action.kind, ActionKind::On { .. }) {
            self.items.push(ScriptItem::Global(action));
        } else {
            let message = format!("`{}` statement outside of a type block", action.kind.describe());
            self.report(Issue::Syntax { message }, action.line);
        }
    }

    fn report(&mut self, issue: Issue, line: usize) {
        self.diagnostics.report(issue, &SourceRef::new(self.file, line));
    }
}

fn syntax(message: impl Into<String>) -> Issue {
    Issue::Syntax {
        message: message.into(),
    }
}

/// The text of a value-like token.
fn text(token: Option<&Token>) -> Option<&str> {
    match token? {
        Token::Word(s) | Token::Value(s) | Token::Str(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Compiles one statement.
fn action(tokens: &[Token]) -> Result<ActionKind, Issue> {
    match tokens {
        [Token::Property(name), value] => match text(Some(value)) {
            Some(value) => Ok(ActionKind::SetProperty {
                name: name.clone(),
                value: value.to_string(),
            }),
            None => Err(syntax(format!("expected a value for `.{}`", name))),
        },
        [Token::Rename(member), value] => match text(Some(value)) {
            Some(to) => Ok(ActionKind::Rename {
                member: member.clone(),
                to: to.to_string(),
            }),
            None => Err(syntax(format!("expected a new name for `{}`", member))),
        },
        [Token::Command(name), args @ ..] => command(name, args),
        [first, ..] => Err(syntax(format!("unexpected `{}`", first))),
        [] => Err(syntax("empty statement")),
    }
}

/// `word = value` arguments.
fn assignment<'t>(command: &str, args: &'t [Token]) -> Result<(&'t str, &'t str), Issue> {
    match args {
        [Token::Word(left), Token::Assign, right] => match text(Some(right)) {
            Some(right) => Ok((left.as_str(), right)),
            None => Err(syntax(format!("`@{}` expects `name = value`", command))),
        },
        _ => Err(syntax(format!("`@{}` expects `name = value`", command))),
    }
}

fn command(name: &str, args: &[Token]) -> Result<ActionKind, Issue> {
    match name {
        "on" => {
            let filter_word = text(args.first()).ok_or_else(|| syntax("`@on` expects a kind"))?;
            let filter = KindFilter::parse(filter_word)
                .ok_or_else(|| syntax(format!("unknown kind `{}` for `@on`", filter_word)))?;
            let pattern = text(args.get(1)).ok_or_else(|| syntax("`@on` expects a pattern"))?;
            let pattern = Regex::new(pattern).map_err(|err| Issue::InvalidPattern {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })?;
            let nested = nested_statement(&args[2..])?;
            Ok(ActionKind::On {
                filter,
                pattern,
                nested: Box::new(nested),
            })
        }
        "changetype" => {
            let (member, raw) = assignment(name, args)?;
            Ok(ActionKind::ChangeType {
                member: member.to_string(),
                raw: raw.to_string(),
            })
        }
        "patch" => match args {
            [] => Ok(ActionKind::Patch),
            _ => Err(syntax("`@patch` takes no arguments")),
        },
        "replace" => match args {
            [property, from, to] => match (text(Some(property)), text(Some(from)), text(Some(to))) {
                (Some(property), Some(from), Some(to)) => Ok(ActionKind::Replace {
                    property: property.trim_start_matches('.').to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                }),
                _ => Err(syntax("`@replace` expects `property from to`")),
            },
            _ => Err(syntax("`@replace` expects `property from to`")),
        },
        "event" => {
            let (event, event_type) = assignment(name, args)?;
            Ok(ActionKind::Event {
                name: event.to_string(),
                event_type: event_type.to_string(),
            })
        }
        _ => Err(Issue::UnknownCommand {
            name: name.to_string(),
        }),
    }
}

/// Reinterprets the argument words after an `@on` pattern as a statement.
fn nested_statement(args: &[Token]) -> Result<ActionKind, Issue> {
    let Some(Token::Word(head)) = args.first() else {
        return Err(syntax("`@on` expects a statement after the pattern"));
    };
    if head == "@on" {
        return Err(syntax("`@on` cannot be nested"));
    }
    let rest = &args[1..];
    let mut tokens = Vec::with_capacity(args.len());
    if let Some(command) = head.strip_prefix('@') {
        tokens.push(Token::Command(command.to_string()));
        tokens.extend_from_slice(rest);
    } else {
        let head = match head.strip_prefix('.') {
            Some(property) => Token::Property(property.to_string()),
            None => Token::Rename(head.clone()),
        };
        let [Token::Assign, value] = rest else {
            return Err(syntax(format!("expected `{} = value`", head)));
        };
        tokens.push(head);
        tokens.push(value.clone());
    }
    action(&tokens)
}
