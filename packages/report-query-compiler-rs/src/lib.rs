mod compiler;
pub mod model;
#[cfg(feature = "node")]
mod node_bindings;
pub mod value;

pub use compiler::{
    compile_count_json, compile_json, quote_identifier, quote_label, sanitize_alias,
    CompileOptions, CompiledQuery, CompilerError, CompilerResult, ParamGenerator, QueryCompiler,
};
