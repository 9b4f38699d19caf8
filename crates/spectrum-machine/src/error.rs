//! Machine error type.
//!
//! The model itself has no recoverable errors; contract violations are
//! asserted. The fallible surfaces are the trace sink (file I/O), the packed
//! state decoder, and PNG capture.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("state image must be {expected} bytes, got {actual}")]
    StateSize { expected: usize, actual: usize },

    #[error("invalid index register pair kind {0:#04x} in state image")]
    StateIregpKind(u8),

    #[error("screenshot encode: {0}")]
    Capture(#[from] png::EncodingError),
}
