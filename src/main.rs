use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context as _, Result};
use clap::Parser;
use colored::*;
use tracing_subscriber::{fmt, EnvFilter};

use webidl_bind::ast;
use webidl_bind::diagnostic::RenderConfig;
use webidl_bind::{compile, Config, Context, ScriptSource};

#[derive(Parser)]
#[command(name = "webidl_bind")]
#[command(about = "Compiles WebIDL syntax trees into a linked type model for binding generators", long_about = None)]
#[command(version)]
struct Cli {
    /// Syntax tree files (JSON) produced by the WebIDL parser
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the resolved model here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print warnings
    #[arg(long)]
    log_warning: Option<bool>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transformation script, applied in the order given
    #[arg(short, long = "transform")]
    transforms: Vec<PathBuf>,

    /// Stop after this many errors
    #[arg(long)]
    error_limit: Option<usize>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(log_warning) = cli.log_warning {
        config.log_warnings = log_warning;
    }
    if let Some(limit) = cli.error_limit {
        config.error_limit = limit;
    }
    Ok(config)
}

fn load_syntax_tree(path: &Path) -> Result<ast::File> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read syntax tree: {:?}", path))?;
    let mut file: ast::File = serde_json::from_str(&text)
        .with_context(|| format!("Invalid syntax tree: {:?}", path))?;
    if file.name.is_empty() {
        file.name = path.display().to_string();
    }
    Ok(file)
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let render = RenderConfig {
        colors: std::io::stderr().is_terminal(),
        warnings: config.log_warnings,
    };
    let files = cli
        .inputs
        .iter()
        .map(|path| load_syntax_tree(path))
        .collect::<Result<Vec<_>>>()?;
    let scripts = cli
        .transforms
        .iter()
        .map(|path| ScriptSource::load(path))
        .collect::<Result<Vec<_>>>()?;

    let mut ctx = Context::new(config);
    let result = compile(&mut ctx, &files, &scripts);
    ctx.diagnostics
        .emit_to_stderr(render)
        .context("Failed to write diagnostics")?;

    let input = match result {
        Ok(input) => input,
        Err(err) => {
            eprintln!("{} {}", "✗".red().bold(), err);
            process::exit(1);
        }
    };

    let json = input.to_json().context("Failed to serialize the model")?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write output: {:?}", path))?;
            eprintln!(
                "{} {} entities in {} packages written to {}",
                "✓".green().bold(),
                input.entity_count(),
                input.packages().len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
