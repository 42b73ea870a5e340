pub mod generator;
pub mod scanner;

pub use generator::{BuiltDatabase, DatabaseGenerator, GenerationReport};
pub use scanner::LiteralScanner;
