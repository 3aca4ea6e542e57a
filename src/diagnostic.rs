//! # Diagnostic Module
//!
//! Structured error and warning reporting shared by every compilation stage.
//!
//! Every diagnostic carries:
//! - A typed [`Issue`] describing what went wrong (message and stable code)
//! - A severity derived from the issue
//! - An optional source reference (`file:line`) taken verbatim from the
//!   syntax tree or transformation script
//! - Notes and help suggestions
//!
//! The [`DiagnosticBag`] counts errors. Once the count exceeds the configured
//! limit, stages stop early and report [`CompileError::TooManyErrors`]
//! instead of flooding the user with follow-up errors.
//!
//! ## Example Output
//!
//! ```text
//! error[E006]: unresolved type `Nod`
//!   --> dom.idl:42
//!  = help: did you mean `Node`?
//! ```

use std::fmt;
use std::io::Write;

use serde::Serialize;
use thiserror::Error;

/// Default number of errors after which a stage gives up.
pub const DEFAULT_ERROR_LIMIT: usize = 10;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// An error that prevents code generation
    Error,
    /// A warning that doesn't block any stage
    Warning,
}

impl Severity {
    /// Returns the display name of this severity level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    /// Returns the ANSI color code for this severity level.
    pub fn color_code(&self) -> &'static str {
        match self {
            Severity::Error => "\x1b[1;31m",   // Bold red
            Severity::Warning => "\x1b[1;33m", // Bold yellow
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `file:line` reference into an IDL file or transformation script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceRef {
    pub file: String,
    pub line: usize,
}

impl SourceRef {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Everything a stage can complain about.
///
/// The `Display` output is the diagnostic message; [`Issue::code`] gives a
/// stable identifier and [`Issue::severity`] the default severity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Issue {
    // Extraction and merging
    #[error("duplicate name `{name}`, previously declared at {previous}")]
    DuplicateName { name: String, previous: SourceRef },

    #[error("partial {kind} `{name}` has no base definition")]
    UnknownBase { kind: &'static str, name: String },

    #[error("`{name}` is a {found}, but a partial {expected} was declared for it")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("includes statement targets unknown interface `{name}`")]
    UnknownTarget { name: String },

    #[error("includes statement references unknown mixin `{name}`")]
    UnknownMixin { name: String },

    #[error("legacy `{name} implements {implements}` statements are not supported")]
    UnsupportedImplementation { name: String, implements: String },

    #[error("callback interface `{name}` cannot inherit")]
    CallbackInterfaceParent { name: String },

    #[error("callback interface `{name}` cannot be a global scope")]
    CallbackInterfaceGlobal { name: String },

    #[error("callback interface `{name}` cannot have a constructor")]
    CallbackInterfaceConstructor { name: String },

    #[error("callback interface `{name}` cannot have attributes")]
    CallbackInterfaceAttribute { name: String },

    #[error("callback interface `{name}` cannot have static methods")]
    CallbackInterfaceStaticMethod { name: String },

    // Linking and monomorphization
    #[error("unresolved type `{name}`")]
    UnresolvedType { name: String },

    #[error("interface `{name}` inherits from `{parent}`, which is not an interface")]
    InheritsNonInterface { name: String, parent: String },

    #[error("dictionary `{name}` inherits from `{parent}`, which is not a dictionary")]
    InheritsNonDictionary { name: String, parent: String },

    #[error("inheritance cycle through `{name}`")]
    InheritanceCycle { name: String },

    #[error("typedef `{name}` refers to itself")]
    TypedefCycle { name: String },

    #[error("unknown generic type `{name}<...>`")]
    UnknownGeneric { name: String },

    #[error("Promise<{element}> is not supported")]
    UnsupportedPromiseElement { element: String },

    #[error("Promise takes exactly one type argument, found {count}")]
    PromiseArity { count: usize },

    // Transformation scripts
    #[error("{message}")]
    Lex { message: String },

    #[error("{message}")]
    Syntax { message: String },

    #[error("unknown command `@{name}`")]
    UnknownCommand { name: String },

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("{kind} has no property `{name}`")]
    UnknownProperty { kind: &'static str, name: String },

    #[error("invalid value `{value}` for property `{name}`")]
    InvalidPropertyValue { name: String, value: String },

    #[error("`{type_name}` has no member `{name}` to rename")]
    UnknownRenameTarget { type_name: String, name: String },

    #[error("{kind} `{type_name}` has no renameable members")]
    RenameNotSupported { kind: &'static str, type_name: String },

    #[error("`{type_name}` has no member `{name}`")]
    UnknownMember { type_name: String, name: String },

    #[error("`@{command}` cannot be applied to {kind} `{type_name}`")]
    NotApplicable {
        command: &'static str,
        kind: &'static str,
        type_name: String,
    },

    #[error("event type `{name}` is not an interface")]
    UnknownEventType { name: String },

    // Warnings
    #[error("unknown extended attribute `{name}`")]
    UnknownAnnotation { name: String },

    #[error("`{construct}` is deprecated, use `{replacement}` instead")]
    DeprecatedConstruct {
        construct: String,
        replacement: &'static str,
    },

    #[error("{construct} is not supported and was skipped")]
    UnsupportedMember { construct: String },

    #[error("enum `{enum_name}` repeats value \"{value}\"")]
    DuplicateEnumValue { enum_name: String, value: String },
}

impl Issue {
    /// Stable identifier for this kind of issue.
    pub fn code(&self) -> &'static str {
        match self {
            Issue::DuplicateName { .. } => "E001",
            Issue::UnknownBase { .. } => "E002",
            Issue::KindMismatch { .. } => "E003",
            Issue::UnknownTarget { .. } => "E004",
            Issue::UnknownMixin { .. } => "E005",
            Issue::UnresolvedType { .. } => "E006",
            Issue::InheritsNonInterface { .. } => "E007",
            Issue::InheritsNonDictionary { .. } => "E008",
            Issue::InheritanceCycle { .. } => "E009",
            Issue::TypedefCycle { .. } => "E010",
            Issue::UnknownGeneric { .. } => "E011",
            Issue::UnsupportedPromiseElement { .. } => "E012",
            Issue::CallbackInterfaceParent { .. } => "E013",
            Issue::CallbackInterfaceGlobal { .. } => "E014",
            Issue::CallbackInterfaceConstructor { .. } => "E015",
            Issue::CallbackInterfaceAttribute { .. } => "E016",
            Issue::CallbackInterfaceStaticMethod { .. } => "E017",
            Issue::UnsupportedImplementation { .. } => "E018",
            Issue::PromiseArity { .. } => "E019",
            Issue::Lex { .. } => "E030",
            Issue::Syntax { .. } => "E031",
            Issue::UnknownCommand { .. } => "E032",
            Issue::InvalidPattern { .. } => "E033",
            Issue::UnknownType { .. } => "E034",
            Issue::UnknownProperty { .. } => "E035",
            Issue::InvalidPropertyValue { .. } => "E036",
            Issue::UnknownRenameTarget { .. } => "E037",
            Issue::RenameNotSupported { .. } => "E038",
            Issue::UnknownMember { .. } => "E039",
            Issue::NotApplicable { .. } => "E040",
            Issue::UnknownEventType { .. } => "E041",
            Issue::UnknownAnnotation { .. } => "W001",
            Issue::DeprecatedConstruct { .. } => "W002",
            Issue::UnsupportedMember { .. } => "W003",
            Issue::DuplicateEnumValue { .. } => "W004",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Issue::UnknownAnnotation { .. }
            | Issue::DeprecatedConstruct { .. }
            | Issue::UnsupportedMember { .. }
            | Issue::DuplicateEnumValue { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A single reported problem.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// What went wrong
    pub issue: Issue,
    /// Where it went wrong, when known
    pub location: Option<SourceRef>,
    /// Additional notes
    pub notes: Vec<String>,
    /// Help suggestions
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic with the issue's default severity.
    pub fn new(issue: Issue) -> Self {
        Self {
            severity: issue.severity(),
            issue,
            location: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Sets the source location.
    pub fn at(mut self, location: SourceRef) -> Self {
        self.location = Some(location);
        self
    }

    /// Adds a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help suggestion.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.issue.code()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Failure returned by a stage or by the pipeline as a whole.
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    /// The error limit was exceeded while a stage was running.
    #[error("stop: too many errors")]
    TooManyErrors,

    /// A stage finished but reported errors, so later stages were skipped.
    #[error("{stage} failed with {errors} error(s)")]
    Aborted { stage: &'static str, errors: usize },

    /// A construct the compiler refuses to process at all.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// ANSI color codes for terminal output.
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD_BLUE: &'static str = "\x1b[1;34m";
    pub const BOLD_CYAN: &'static str = "\x1b[1;36m";
    pub const BOLD_GREEN: &'static str = "\x1b[1;32m";
    pub const BOLD_WHITE: &'static str = "\x1b[1;37m";
}

/// Configuration for diagnostic rendering.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Whether to use ANSI colors
    pub colors: bool,
    /// Whether warnings are rendered at all
    pub warnings: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colors: true,
            warnings: true,
        }
    }
}

impl RenderConfig {
    /// Creates a config without colors (for non-terminal output).
    pub fn no_colors() -> Self {
        Self {
            colors: false,
            ..Default::default()
        }
    }
}

/// Renders diagnostics to a string or writer.
pub struct DiagnosticRenderer {
    config: RenderConfig,
}

impl DiagnosticRenderer {
    /// Creates a new renderer with the given configuration.
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Creates a renderer without colors.
    pub fn plain() -> Self {
        Self::new(RenderConfig::no_colors())
    }

    /// Renders a diagnostic to a string.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();
        let _ = self.render_to(&mut output, diagnostic);
        output
    }

    fn render_to(&self, output: &mut dyn fmt::Write, diagnostic: &Diagnostic) -> fmt::Result {
        writeln!(
            output,
            "{}{}[{}]{}: {}{}{}",
            self.color(diagnostic.severity.color_code()),
            diagnostic.severity,
            diagnostic.code(),
            self.reset(),
            self.color(Colors::BOLD_WHITE),
            diagnostic.issue,
            self.reset()
        )?;
        if let Some(location) = &diagnostic.location {
            writeln!(
                output,
                "  {}-->{} {}",
                self.color(Colors::BOLD_BLUE),
                self.reset(),
                location
            )?;
        }
        for note in &diagnostic.notes {
            writeln!(
                output,
                " {}={} {}note{}: {}",
                self.color(Colors::BOLD_BLUE),
                self.reset(),
                self.color(Colors::BOLD_CYAN),
                self.reset(),
                note
            )?;
        }
        for help in &diagnostic.help {
            writeln!(
                output,
                " {}={} {}help{}: {}",
                self.color(Colors::BOLD_BLUE),
                self.reset(),
                self.color(Colors::BOLD_GREEN),
                self.reset(),
                help
            )?;
        }
        Ok(())
    }

    fn color<'a>(&self, code: &'a str) -> &'a str {
        if self.config.colors {
            code
        } else {
            ""
        }
    }

    fn reset(&self) -> &str {
        if self.config.colors {
            Colors::RESET
        } else {
            ""
        }
    }
}

/// The shared diagnostics sink.
///
/// Diagnostics are kept in report order, which is deterministic because
/// every stage walks the model in insertion order.
#[derive(Debug)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    limit: usize,
}

impl Default for DiagnosticBag {
    fn default() -> Self {
        Self::with_limit(DEFAULT_ERROR_LIMIT)
    }
}

impl DiagnosticBag {
    /// Creates a new empty diagnostic bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag that asks stages to stop after `limit` errors.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            errors: 0,
            limit,
        }
    }

    /// Adds a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
        }
        tracing::debug!(code = diagnostic.code(), "{}", diagnostic.issue);
        self.diagnostics.push(diagnostic);
    }

    /// Reports an issue at a source location.
    pub fn report(&mut self, issue: Issue, location: &SourceRef) {
        self.add(Diagnostic::new(issue).at(location.clone()));
    }

    /// True once the error count exceeds the limit.
    pub fn should_stop(&self) -> bool {
        self.errors > self.limit
    }

    /// Returns `Err(TooManyErrors)` once the limit is exceeded.
    pub fn check_limit(&self) -> Result<(), CompileError> {
        if self.should_stop() {
            Err(CompileError::TooManyErrors)
        } else {
            Ok(())
        }
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Returns the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Returns the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Counts diagnostics with the given code.
    pub fn count_code(&self, code: &str) -> usize {
        self.diagnostics.iter().filter(|d| d.code() == code).count()
    }

    /// Returns all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Renders all diagnostics followed by a summary line.
    pub fn render(&self, config: RenderConfig) -> String {
        let show_warnings = config.warnings;
        let renderer = DiagnosticRenderer::new(config);
        let mut output = String::new();
        for diagnostic in &self.diagnostics {
            if diagnostic.severity == Severity::Warning && !show_warnings {
                continue;
            }
            output.push_str(&renderer.render(diagnostic));
        }

        let errors = self.error_count();
        if errors > 0 {
            output.push_str(&format!(
                "error: aborting due to {} previous error{}\n",
                errors,
                if errors == 1 { "" } else { "s" }
            ));
        }
        let warnings = self.warning_count();
        if warnings > 0 && show_warnings {
            output.push_str(&format!(
                "warning: {} warning{} emitted\n",
                warnings,
                if warnings == 1 { "" } else { "s" }
            ));
        }
        output
    }

    /// Renders all diagnostics to stderr.
    pub fn emit_to_stderr(&self, config: RenderConfig) -> std::io::Result<()> {
        let output = self.render(config);
        std::io::stderr().write_all(output.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_builder() {
        let diag = Diagnostic::new(Issue::UnresolvedType {
            name: "Nod".to_string(),
        })
        .at(SourceRef::new("dom.idl", 42))
        .with_note("referenced from `Document.firstChild`")
        .with_help("did you mean `Node`?");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code(), "E006");
        assert_eq!(diag.issue.to_string(), "unresolved type `Nod`");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn test_render_plain() {
        let diag = Diagnostic::new(Issue::UnknownType {
            name: "HTMLFoo".to_string(),
        })
        .at(SourceRef::new("html.md", 3));

        let output = DiagnosticRenderer::plain().render(&diag);
        assert!(output.starts_with("error[E034]: unknown type `HTMLFoo`"));
        assert!(output.contains("--> html.md:3"));
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut bag = DiagnosticBag::new();
        let at = SourceRef::new("a.idl", 1);
        bag.report(Issue::UnknownAnnotation { name: "Foo".into() }, &at);
        bag.report(Issue::UnknownType { name: "Bar".into() }, &at);

        assert!(bag.has_errors());
        assert_eq!(bag.error_count(), 1);
        assert_eq!(bag.warning_count(), 1);
    }

    #[test]
    fn test_limit_is_exceeded_not_reached() {
        let mut bag = DiagnosticBag::with_limit(2);
        let at = SourceRef::new("a.idl", 1);
        for _ in 0..2 {
            bag.report(Issue::UnknownType { name: "X".into() }, &at);
        }
        assert!(bag.check_limit().is_ok());
        bag.report(Issue::UnknownType { name: "X".into() }, &at);
        assert_eq!(bag.check_limit(), Err(CompileError::TooManyErrors));
    }

    #[test]
    fn test_render_hides_warnings_when_disabled() {
        let mut bag = DiagnosticBag::new();
        bag.report(
            Issue::UnknownAnnotation { name: "Foo".into() },
            &SourceRef::new("a.idl", 1),
        );
        let config = RenderConfig {
            colors: false,
            warnings: false,
        };
        assert_eq!(bag.render(config), "");
    }
}
