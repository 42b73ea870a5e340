use std::io::{self, BufRead, Write};
use crate::core::error::Result;
use crate::core::types::format_hash;

/// `<16 hex digits> = '<string>'`
pub fn format_line(hash: u64, text: &str) -> String {
    format!("{} = '{}'", format_hash(hash), text)
}

/// Receives dumped entries in order
pub trait DumpSink {
    fn write_entry(&mut self, hash: u64, text: &str) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Blocks between pages until the operator acknowledges
pub trait PageGate {
    fn acknowledge(&mut self, shown: u64) -> Result<()>;
}

/// Waits for Enter on stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinGate;

impl PageGate for StdinGate {
    fn acknowledge(&mut self, shown: u64) -> Result<()> {
        eprint!("-- {} entries shown, press Enter to continue --", shown);
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}

/// Gate that never blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGate;

impl PageGate for NoGate {
    fn acknowledge(&mut self, _shown: u64) -> Result<()> {
        Ok(())
    }
}

/// Line-per-entry text output. With a non-zero `page_size` the gate is
/// consulted after every `page_size` entries.
pub struct TextSink<W: Write, G: PageGate = NoGate> {
    out: W,
    gate: G,
    page_size: u32,
    written: u64,
}

impl<W: Write> TextSink<W> {
    /// Unpaginated, e.g. a dump file
    pub fn new(out: W) -> Self {
        TextSink::paged(out, NoGate, 0)
    }
}

impl<W: Write, G: PageGate> TextSink<W, G> {
    pub fn paged(out: W, gate: G, page_size: u32) -> Self {
        TextSink {
            out,
            gate,
            page_size,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write, G: PageGate> DumpSink for TextSink<W, G> {
    fn write_entry(&mut self, hash: u64, text: &str) -> Result<()> {
        writeln!(self.out, "{}", format_line(hash, text))?;
        self.written += 1;

        if self.page_size > 0 && self.written % self.page_size as u64 == 0 {
            self.out.flush()?;
            self.gate.acknowledge(self.written)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
