//! Renders translation results, one line per query.

use std::fmt;
use std::io::{self, BufWriter, Write};

use paging::Translation;

/// Token written for a query that faulted.
pub const FAULT_TOKEN: &str = "fault";

/// Formats a translation the way it appears in the results file: the physical address in
/// decimal, or [`FAULT_TOKEN`].
pub struct Rendered<'a>(pub &'a Translation);

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.address() {
            Some(address) => write!(f, "{}", address.as_u64()),
            None => f.write_str(FAULT_TOKEN),
        }
    }
}

/// Buffered writer for result lines that flushes every `flush_every` results.
///
/// A `flush_every` of zero only flushes when the writer is finished.
pub struct ResultWriter<W: Write> {
    out: BufWriter<W>,
    flush_every: u64,
    written: u64,
}

impl<W: Write> ResultWriter<W> {
    /// Wraps `out`, flushing after every `flush_every` results.
    pub fn new(out: W, flush_every: u64) -> Self {
        Self {
            out: BufWriter::new(out),
            flush_every,
            written: 0,
        }
    }

    /// Writes the line for a single result.
    pub fn write(&mut self, translation: &Translation) -> io::Result<()> {
        writeln!(self.out, "{}", Rendered(translation))?;
        self.written += 1;

        if self.flush_every != 0 && self.written.is_multiple_of(self.flush_every) {
            self.out.flush()?;
        }
        Ok(())
    }

    /// Returns the number of results written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes any buffered lines and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        self.out.into_inner().map_err(|error| error.into_error())
    }
}
