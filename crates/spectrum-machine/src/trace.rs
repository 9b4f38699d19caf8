//! Instruction trace sink.
//!
//! One text line per executed instruction: PC, a disassembly tail, the
//! register file and the frame tick. The sink is a per-machine handle, not a
//! process-wide file; two machines can trace to different paths.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::MachineError;

/// File name used when the host does not pick one.
pub const DEFAULT_TRACE_PATH: &str = "zx_trace";

/// Buffered text sink for instruction traces.
pub struct TraceSink {
    out: BufWriter<File>,
}

impl TraceSink {
    /// Create (truncate) the trace file.
    ///
    /// # Errors
    ///
    /// Propagates the underlying file error.
    pub fn create(path: &Path) -> Result<Self, MachineError> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
        })
    }

    /// Append one line.
    pub fn record(&mut self, line: std::fmt::Arguments<'_>) -> std::io::Result<()> {
        self.out.write_fmt(line)?;
        self.out.write_all(b"\n")
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

impl Drop for TraceSink {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}
