pub mod codegen;
pub mod diagnostics;
pub mod language;
pub mod lowering;
pub mod plan;
pub mod scenario;
