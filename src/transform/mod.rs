//! # Transformation Scripts
//!
//! A small line-oriented language for adjusting the linked model before
//! generation: renaming types and members, moving types between packages,
//! overriding member types, and declaring events.
//!
//! ```text
//! # html
//! ## HTMLElement
//! .name = Element
//! idName = TargetName
//! @changetype style = CSSStyle
//! @event click = MouseEvent
//!
//! @on enum ^Canvas .prefix = Canvas
//! ```
//!
//! Scripts are lexed by [`lexer`], compiled into [`action`]s by [`parser`],
//! and applied by [`interpret`].

pub mod action;
pub mod interpret;
pub mod lexer;
pub mod parser;

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use tracing::info;

use crate::context::Context;
use crate::diagnostic::CompileError;

/// The text of one script and the name diagnostics refer to it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub file: String,
    pub text: String,
}

impl ScriptSource {
    pub fn new(file: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transformation script: {:?}", path))?;
        Ok(Self::new(path.display().to_string(), text))
    }
}

/// Parses and applies every script, in order.
///
/// A script that fails to lex is skipped entirely; other errors skip only
/// the line or type block they occur in.
pub fn apply_scripts(ctx: &mut Context, scripts: &[ScriptSource]) -> Result<(), CompileError> {
    for source in scripts {
        if let Some(script) = parser::parse_script(source, &mut ctx.diagnostics) {
            interpret::run_script(ctx, &script)?;
        }
        ctx.diagnostics.check_limit()?;
    }
    info!(scripts = scripts.len(), "applied transformations");
    Ok(())
}
