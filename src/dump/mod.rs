pub mod sink;
pub mod dumper;

pub use dumper::{dump_database, dump_path, dump_resolver};
pub use sink::{format_line, DumpSink, NoGate, PageGate, StdinGate, TextSink};
