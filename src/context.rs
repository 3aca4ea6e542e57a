//! The state threaded through every stage of one compilation run.

use crate::config::Config;
use crate::diagnostic::{CompileError, DiagnosticBag};
use crate::extract::Pending;
use crate::promise::PromiseTemplate;
use crate::symbols::SymbolTable;

/// One compilation run: settings, model, and diagnostics.
///
/// Nothing here is global; two contexts never share state.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub table: SymbolTable,
    pub diagnostics: DiagnosticBag,
    /// Partial fragments and includes waiting for the merger
    pub pending: Pending,
    promise_template: Option<PromiseTemplate>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self {
            diagnostics: DiagnosticBag::with_limit(config.error_limit),
            config,
            table: SymbolTable::new(),
            pending: Pending::default(),
            promise_template: None,
        }
    }

    /// The Promise template, built on first use.
    pub fn promise_template(&mut self) -> Result<PromiseTemplate, CompileError> {
        if let Some(template) = &self.promise_template {
            return Ok(template.clone());
        }
        let template = PromiseTemplate::builtin()?;
        self.promise_template = Some(template.clone());
        Ok(template)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
