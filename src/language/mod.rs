pub mod abstraction;
pub mod errors;
pub mod parser;
pub mod span;
pub mod types;
