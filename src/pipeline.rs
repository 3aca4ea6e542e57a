//! # Compilation Pipeline
//!
//! Runs the stages in order on one [`Context`]:
//!
//! 1. extract every file
//! 2. merge partial fragments and mixins
//! 3. link from the root interfaces
//! 4. instantiate Promise types
//! 5. resolve method overrides
//! 6. apply transformation scripts
//!
//! A stage only runs if every earlier stage finished without errors.
//! Warnings never stop the pipeline.

use tracing::{info, info_span};

use crate::ast;
use crate::context::Context;
use crate::diagnostic::CompileError;
use crate::output::GeneratorInput;
use crate::transform::{self, ScriptSource};
use crate::{extract, link, merge, overrides, promise};

/// Compiles `files`, applies `scripts`, and returns the generator input.
///
/// Diagnostics stay in `ctx.diagnostics` whether or not compilation
/// succeeds; the model is moved into the returned [`GeneratorInput`].
pub fn compile(
    ctx: &mut Context,
    files: &[ast::File],
    scripts: &[ScriptSource],
) -> Result<GeneratorInput, CompileError> {
    run_stage(ctx, "extract", |ctx| {
        files.iter().try_for_each(|file| extract::extract_file(ctx, file))
    })?;
    run_stage(ctx, "merge", merge::merge)?;
    run_stage(ctx, "link", link::link)?;
    run_stage(ctx, "promise", promise::monomorphize)?;
    run_stage(ctx, "overrides", overrides::resolve_overrides)?;
    run_stage(ctx, "transform", |ctx| transform::apply_scripts(ctx, scripts))?;

    let input = GeneratorInput::new(std::mem::take(&mut ctx.table));
    info!(
        packages = input.packages().len(),
        entities = input.entity_count(),
        warnings = ctx.diagnostics.warning_count(),
        "compilation finished"
    );
    Ok(input)
}

fn run_stage<F>(ctx: &mut Context, stage: &'static str, run: F) -> Result<(), CompileError>
where
    F: FnOnce(&mut Context) -> Result<(), CompileError>,
{
    let span = info_span!("stage", stage);
    let _enter = span.enter();

    run(ctx)?;
    let errors = ctx.diagnostics.error_count();
    if errors > 0 {
        info!(errors, "stage reported errors, stopping");
        return Err(CompileError::Aborted { stage, errors });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{InterfaceDecl, Member, SyntaxType};

    #[test]
    fn test_link_errors_stop_before_transform() {
        let mut ctx = Context::default();
        let files = [ast::File::new("dom.idl")
            .with(InterfaceDecl::new("Node").member(Member::attribute("owner", SyntaxType::named("Nod"))))];
        let scripts = [ScriptSource::new("t.tr", "## Missing\n.name = X\n")];

        let err = compile(&mut ctx, &files, &scripts).unwrap_err();
        assert_eq!(err, CompileError::Aborted { stage: "link", errors: 1 });
        // The script never ran, so its unknown type was not reported.
        assert_eq!(ctx.diagnostics.count_code("E034"), 0);
    }

    #[test]
    fn test_clean_input_compiles() {
        let mut ctx = Context::default();
        let files = [ast::File::new("dom.idl").with(InterfaceDecl::new("Node"))];
        let input = compile(&mut ctx, &files, &[]).unwrap();
        assert_eq!(input.package("dom").map(|p| p.interfaces.len()), Some(1));
    }
}
