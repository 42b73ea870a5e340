pub mod fs;
pub mod walk;
pub mod format;
pub mod reader;
