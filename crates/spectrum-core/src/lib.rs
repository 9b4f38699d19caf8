//! Coupling traits between a Z80 instruction decoder and the Spectrum
//! machine model.
//!
//! The coupling runs in both directions. The machine provides the bus
//! environment ([`Z80Bus`]): memory and port cycles with their contention and
//! tick accounting. The decoder provides the stepper ([`Z80Stepper`]):
//! instruction execution, interrupt acceptance, and the register file.
//! Either side can be swapped independently: the machine never assumes a
//! particular decoder implementation, and a decoder only ever talks to the
//! machine through `Z80Bus`.

mod bus;
mod stepper;

pub use bus::Z80Bus;
pub use stepper::{IregpKind, Z80Stepper};
