//! # Script Lexer
//!
//! Tokenizes transformation scripts. The language is line oriented, so the
//! lexer is a small state machine that looks at the first character of each
//! line and then scans the rest of the statement according to its kind.
//!
//! ## Token Categories
//!
//! - **Headers**: `# package` and `## TypeName`
//! - **Statements**: `.property = value`, `member = NewName`
//! - **Commands**: `@name` followed by argument words, quoted strings, and an
//!   optional `= value` tail
//! - **Comments**: any line starting with a space or a tab
//!
//! Tokens are produced on demand; the lexer is an iterator and stops after
//! the first error or after [`Token::Eof`].
//!
//! ## Example
//!
//! ```rust
//! use webidl_bind::transform::lexer::{Lexer, Token};
//!
//! let tokens: Vec<Token> = Lexer::new("## Node\n.name = DomNode\n")
//!     .map(|t| t.unwrap().token)
//!     .collect();
//! assert_eq!(tokens[0], Token::TypeHeader("Node".to_string()));
//! ```

use std::fmt;
use std::iter::FusedIterator;

use nom::{
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{line_ending, not_line_ending, space0},
    combinator::recognize,
    sequence::pair,
    IResult,
};
use thiserror::Error;

/// Token types of the script language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `# package`, the default package of the file
    FileHeader(String),
    /// `## TypeName`, opens a type block
    TypeHeader(String),
    /// `.name` at the start of a property assignment
    Property(String),
    /// `member` at the start of a rename statement
    Rename(String),
    /// `@name`
    Command(String),
    /// A bare command argument
    Word(String),
    /// A standalone `=` inside command arguments
    Assign,
    /// Unquoted text after `=`, up to the end of the line
    Value(String),
    /// A quoted string with escapes removed
    Str(String),
    Newline,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::FileHeader(s) => write!(f, "# {}", s),
            Token::TypeHeader(s) => write!(f, "## {}", s),
            Token::Property(s) => write!(f, ".{}", s),
            Token::Rename(s) | Token::Word(s) | Token::Value(s) => write!(f, "{}", s),
            Token::Command(s) => write!(f, "@{}", s),
            Token::Assign => write!(f, "="),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Newline => write!(f, "<newline>"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// A token and the line it starts on (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct LineToken {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Dispatch on the first character of a line
    LineStart,
    /// After `@`
    CommandStart,
    /// Between command arguments
    CommandArgs,
    /// After `.`
    PropertyStart,
    /// At the identifier of a rename statement
    RenameStmt,
    /// After `=`, expecting a value or a quoted string
    ValueOrString,
    /// Skipping a comment line
    CommentLine,
    /// Expecting the end of the line
    LineEnd,
}

pub struct Lexer<'a> {
    rest: &'a str,
    line: usize,
    state: State,
    done: bool,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    ))(input)
}

/// Everything up to the next space, tab or line break.
fn word(input: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r')(input)
}

fn at_line_end(input: &str) -> bool {
    input.is_empty() || input.starts_with('\n') || input.starts_with("\r\n")
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            line: 1,
            state: State::LineStart,
            done: false,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line,
            message: message.into(),
        }
    }

    fn token(&self, token: Token) -> Option<LineToken> {
        Some(LineToken {
            token,
            line: self.line,
        })
    }

    fn skip_spaces(&mut self) {
        if let Ok((rest, _)) = space0::<_, nom::error::Error<&str>>(self.rest) {
            self.rest = rest;
        }
    }

    /// Consumes the rest of the line, without the line break.
    fn line_tail(&mut self) -> &'a str {
        let (rest, tail) = not_line_ending::<_, nom::error::Error<&str>>(self.rest)
            .unwrap_or((self.rest, ""));
        self.rest = rest;
        tail
    }

    /// Consumes a line break if one follows.
    fn consume_line_ending(&mut self) -> bool {
        match line_ending::<_, nom::error::Error<&str>>(self.rest) {
            Ok((rest, _)) => {
                self.rest = rest;
                self.line += 1;
                true
            }
            Err(_) => false,
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<&'a str, LexError> {
        match identifier(self.rest) {
            Ok((rest, name)) => {
                self.rest = rest;
                Ok(name)
            }
            Err(_) if at_line_end(self.rest) => Err(self.error(format!("unterminated line: expected {}", what))),
            Err(_) => Err(self.error(format!("expected {}", what))),
        }
    }

    /// Consumes ` = ` after a statement head.
    fn assign(&mut self) -> Result<(), LexError> {
        self.skip_spaces();
        if at_line_end(self.rest) {
            return Err(self.error("unterminated line: expected `=`"));
        }
        match self.rest.strip_prefix('=') {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(self.error("expected `=`")),
        }
    }

    /// Scans a quoted string; the opening quote is next.
    fn string(&mut self) -> Result<String, LexError> {
        let input = self.rest;
        let mut out = String::new();
        let mut chars = input.char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.rest = &input[i + 1..];
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, escaped @ ('"' | '\\'))) => out.push(escaped),
                    Some((_, '\n')) | None => break,
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                '\n' => break,
                c => out.push(c),
            }
        }
        Err(self.error("unterminated string"))
    }

    fn header(&mut self, marker: &str) -> Result<&'a str, LexError> {
        self.rest = &self.rest[marker.len()..];
        self.skip_spaces();
        let name = self.line_tail().trim_end();
        if name.is_empty() {
            return Err(self.error(format!("`{}` without a name", marker)));
        }
        Ok(name)
    }

    /// Advances the state machine by one step. Steps that only skip input
    /// return `Ok(None)`.
    fn step(&mut self) -> Result<Option<LineToken>, LexError> {
        match self.state {
            State::LineStart => {
                let Some(first) = self.rest.chars().next() else {
                    return Ok(self.token(Token::Eof));
                };
                match first {
                    '\n' | '\r' => {
                        if !self.consume_line_ending() {
                            return Err(self.error("unexpected carriage return"));
                        }
                    }
                    ' ' | '\t' => self.state = State::CommentLine,
                    '#' if self.rest.starts_with("##") => {
                        let line = self.line;
                        let name = self.header("##")?;
                        self.state = State::LineEnd;
                        return Ok(Some(LineToken {
                            token: Token::TypeHeader(name.to_string()),
                            line,
                        }));
                    }
                    '#' => {
                        let line = self.line;
                        let package = self.header("#")?;
                        self.state = State::LineEnd;
                        return Ok(Some(LineToken {
                            token: Token::FileHeader(package.to_string()),
                            line,
                        }));
                    }
                    '.' => {
                        self.rest = &self.rest[1..];
                        self.state = State::PropertyStart;
                    }
                    '@' => {
                        self.rest = &self.rest[1..];
                        self.state = State::CommandStart;
                    }
                    c if is_ident_start(c) => self.state = State::RenameStmt,
                    c => return Err(self.error(format!("unexpected character `{}`", c))),
                }
                Ok(None)
            }
            State::CommentLine => {
                self.line_tail();
                self.consume_line_ending();
                self.state = State::LineStart;
                Ok(None)
            }
            State::PropertyStart => {
                let name = self.expect_identifier("a property name")?;
                self.assign()?;
                self.state = State::ValueOrString;
                Ok(self.token(Token::Property(name.to_string())))
            }
            State::RenameStmt => {
                let name = self.expect_identifier("a member name")?;
                self.assign()?;
                self.state = State::ValueOrString;
                Ok(self.token(Token::Rename(name.to_string())))
            }
            State::ValueOrString => {
                self.skip_spaces();
                if at_line_end(self.rest) {
                    return Err(self.error("unterminated line: expected a value"));
                }
                self.state = State::LineEnd;
                if self.rest.starts_with('"') {
                    let s = self.string()?;
                    Ok(self.token(Token::Str(s)))
                } else {
                    let value = self.line_tail().trim_end();
                    Ok(self.token(Token::Value(value.to_string())))
                }
            }
            State::CommandStart => {
                let name = self.expect_identifier("a command name")?;
                self.state = State::CommandArgs;
                Ok(self.token(Token::Command(name.to_string())))
            }
            State::CommandArgs => {
                self.skip_spaces();
                if at_line_end(self.rest) {
                    self.state = State::LineEnd;
                    return Ok(None);
                }
                if self.rest.starts_with('"') {
                    let s = self.string()?;
                    return Ok(self.token(Token::Str(s)));
                }
                if self.rest.starts_with('\r') {
                    return Err(self.error("unexpected carriage return"));
                }
                let (rest, w) = word(self.rest).map_err(|_| self.error("expected an argument"))?;
                if w.is_empty() {
                    return Err(self.error("expected an argument"));
                }
                self.rest = rest;
                if w == "=" {
                    self.state = State::ValueOrString;
                    return Ok(self.token(Token::Assign));
                }
                Ok(self.token(Token::Word(w.to_string())))
            }
            State::LineEnd => {
                self.skip_spaces();
                let line = self.line;
                if self.rest.is_empty() || self.consume_line_ending() {
                    self.state = State::LineStart;
                    return Ok(Some(LineToken {
                        token: Token::Newline,
                        line,
                    }));
                }
                let tail = self.line_tail().trim_end();
                Err(self.error(format!("unexpected input `{}`", tail)))
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<LineToken, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.step() {
                Ok(None) => continue,
                Ok(Some(token)) => {
                    if token.token == Token::Eof {
                        self.done = true;
                    }
                    return Some(Ok(token));
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl FusedIterator for Lexer<'_> {}

/// Lexes a whole script, stopping at the first error.
pub fn lex(input: &str) -> Result<Vec<LineToken>, LexError> {
    Lexer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_headers_and_statements() {
        assert_eq!(
            tokens("# dom\n## HTMLElement\n.package = pkg/html\nidName = TargetName\n"),
            vec![
                Token::FileHeader(s("dom")),
                Token::Newline,
                Token::TypeHeader(s("HTMLElement")),
                Token::Newline,
                Token::Property(s("package")),
                Token::Value(s("pkg/html")),
                Token::Newline,
                Token::Rename(s("idName")),
                Token::Value(s("TargetName")),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_empty_lines_are_skipped() {
        assert_eq!(
            tokens("\n  a comment\n\tanother\n\n.name = X"),
            vec![Token::Property(s("name")), Token::Value(s("X")), Token::Newline, Token::Eof]
        );
    }

    #[test]
    fn test_command_arguments() {
        assert_eq!(
            tokens("@on interface \"^HTML.*\" .package = html\n@changetype value = js.Value\n@patch"),
            vec![
                Token::Command(s("on")),
                Token::Word(s("interface")),
                Token::Str(s("^HTML.*")),
                Token::Word(s(".package")),
                Token::Assign,
                Token::Value(s("html")),
                Token::Newline,
                Token::Command(s("changetype")),
                Token::Word(s("value")),
                Token::Assign,
                Token::Value(s("js.Value")),
                Token::Newline,
                Token::Command(s("patch")),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#".name = "say \"hi\" \\ bye""#)[1],
            Token::Str(s(r#"say "hi" \ bye"#))
        );
    }

    #[test]
    fn test_line_numbers() {
        let lexed = lex("## A\n\n  comment\n.name = B\n").unwrap();
        assert_eq!(lexed[0].line, 1);
        assert_eq!(lexed[2].line, 4);
    }

    #[test]
    fn test_errors() {
        let err = lex(".name = \"open\n").unwrap_err();
        assert_eq!(err.message, "unterminated string");

        let err = lex("## A\n.name\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.starts_with("unterminated line"));

        let err = lex("idName = \n").unwrap_err();
        assert!(err.message.starts_with("unterminated line"));

        let err = lex("!oops").unwrap_err();
        assert_eq!(err.message, "unexpected character `!`");
    }

    #[test]
    fn test_lone_carriage_return_in_arguments() {
        let err = lex("@patch a\rb\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "unexpected carriage return");

        let err = lex("@replace name \rx\n").unwrap_err();
        assert_eq!(err.message, "unexpected carriage return");
        assert_eq!(tokens("@patch\r\n").len(), 3);
    }

    #[test]
    fn test_lexer_is_fused_after_error() {
        let mut lexer = Lexer::new("%\n.name = A\n");
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }
}
