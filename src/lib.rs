pub mod ast;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod extract;
pub mod link;
pub mod merge;
pub mod model;
pub mod naming;
pub mod output;
pub mod overrides;
pub mod pipeline;
pub mod promise;
pub mod symbols;
pub mod transform;

pub use config::Config;
pub use context::Context;
pub use diagnostic::{CompileError, Diagnostic, DiagnosticBag, Issue, Severity, SourceRef};
pub use output::{GeneratorInput, PackageContents};
pub use pipeline::compile;
pub use transform::ScriptSource;
