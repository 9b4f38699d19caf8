//! Packed machine state for embedding hosts.
//!
//! The embed boundary exposes processor and machine state as byte-exact
//! little-endian images so a host can snapshot them wholesale. The layouts
//! below are stable; extend only by appending.

use spectrum_core::IregpKind;

use crate::error::MachineError;
use crate::events::RunEvents;

/// Byte size of [`ProcessorState`].
pub const PROCESSOR_STATE_SIZE: usize = 32;

/// Byte size of [`MachineState`].
pub const MACHINE_STATE_SIZE: usize = PROCESSOR_STATE_SIZE + 16;

/// The Z80 register file, as installed into and retrieved from the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessorState {
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af: u16,
    pub ix: u16,
    pub iy: u16,

    pub alt_bc: u16,
    pub alt_de: u16,
    pub alt_hl: u16,
    pub alt_af: u16,

    pub pc: u16,
    pub sp: u16,
    pub ir: u16,
    pub wz: u16,

    pub iff1: bool,
    pub iff2: bool,
    pub int_mode: u8,
    pub iregp_kind: IregpKind,
}

impl ProcessorState {
    /// Encode as the 32-byte little-endian image.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PROCESSOR_STATE_SIZE] {
        let mut image = [0u8; PROCESSOR_STATE_SIZE];
        let words = [
            self.bc, self.de, self.hl, self.af, self.ix, self.iy, self.alt_bc, self.alt_de,
            self.alt_hl, self.alt_af, self.pc, self.sp, self.ir, self.wz,
        ];
        for (i, word) in words.iter().enumerate() {
            image[i * 2..i * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        image[28] = u8::from(self.iff1);
        image[29] = u8::from(self.iff2);
        image[30] = self.int_mode;
        image[31] = self.iregp_kind.to_u8();
        image
    }

    /// Decode a 32-byte image.
    ///
    /// # Errors
    ///
    /// Wrong image size, or an unknown index-register-pair encoding.
    pub fn from_bytes(image: &[u8]) -> Result<Self, MachineError> {
        if image.len() != PROCESSOR_STATE_SIZE {
            return Err(MachineError::StateSize {
                expected: PROCESSOR_STATE_SIZE,
                actual: image.len(),
            });
        }
        let word = |i: usize| u16::from_le_bytes([image[i * 2], image[i * 2 + 1]]);
        Ok(Self {
            bc: word(0),
            de: word(1),
            hl: word(2),
            af: word(3),
            ix: word(4),
            iy: word(5),
            alt_bc: word(6),
            alt_de: word(7),
            alt_hl: word(8),
            alt_af: word(9),
            pc: word(10),
            sp: word(11),
            ir: word(12),
            wz: word(13),
            iff1: image[28] != 0,
            iff2: image[29] != 0,
            int_mode: image[30],
            iregp_kind: IregpKind::from_u8(image[31])
                .ok_or(MachineError::StateIregpKind(image[31]))?,
        })
    }
}

/// Full machine state: the processor plus everything the event loop and the
/// bus carry across `run()` calls. Memory, marks and the journal are exposed
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineState {
    pub proc: ProcessorState,
    pub ticks_since_int: u32,
    pub fetches_to_stop: u32,
    pub events: RunEvents,
    pub int_suppressed: bool,
    pub int_after_ei_allowed: bool,
    pub border_color: u8,
    pub trace_enabled: bool,
}

impl MachineState {
    /// Encode as the 48-byte little-endian image.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; MACHINE_STATE_SIZE] {
        let mut image = [0u8; MACHINE_STATE_SIZE];
        image[..PROCESSOR_STATE_SIZE].copy_from_slice(&self.proc.to_bytes());
        image[32..36].copy_from_slice(&self.ticks_since_int.to_le_bytes());
        image[36..40].copy_from_slice(&self.fetches_to_stop.to_le_bytes());
        image[40..44].copy_from_slice(&self.events.bits().to_le_bytes());
        image[44] = u8::from(self.int_suppressed);
        image[45] = u8::from(self.int_after_ei_allowed);
        image[46] = self.border_color;
        image[47] = u8::from(self.trace_enabled);
        image
    }

    /// Decode a 48-byte image.
    ///
    /// # Errors
    ///
    /// Wrong image size, or an invalid embedded processor state.
    pub fn from_bytes(image: &[u8]) -> Result<Self, MachineError> {
        if image.len() != MACHINE_STATE_SIZE {
            return Err(MachineError::StateSize {
                expected: MACHINE_STATE_SIZE,
                actual: image.len(),
            });
        }
        let dword = |at: usize| u32::from_le_bytes([image[at], image[at + 1], image[at + 2], image[at + 3]]);
        Ok(Self {
            proc: ProcessorState::from_bytes(&image[..PROCESSOR_STATE_SIZE])?,
            ticks_since_int: dword(32),
            fetches_to_stop: dword(36),
            events: RunEvents::from_bits_truncate(dword(40)),
            int_suppressed: image[44] != 0,
            int_after_ei_allowed: image[45] != 0,
            border_color: image[46],
            trace_enabled: image[47] != 0,
        })
    }
}
