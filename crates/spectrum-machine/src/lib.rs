//! Tick-accurate ZX Spectrum 48K/128K machine model.
//!
//! The machine couples a Z80 instruction decoder (any
//! [`spectrum_core::Z80Stepper`]) to the ULA's side of the hardware: shared
//! DRAM with contention stalls, a beam-following screen renderer that
//! samples video memory at the exact cycle the hardware would, the maskable
//! interrupt window at the start of each frame, and the `$FE`/`$7FFD` port
//! decode for border colour and 128K paging.
//!
//! Hosts drive the machine through [`Spectrum::run`], which executes
//! instructions until the frame completes or an event latches (tick or
//! fetch budgets, breakpoints, an external stop). Between `run()` calls the
//! host may inspect and rewrite everything: memory, the rendered frame, the
//! port-write journal and the packed processor/machine state.

mod bus;
pub mod capture;
mod config;
pub mod disasm;
mod error;
mod events;
mod journal;
mod keyboard;
mod machine;
mod marks;
mod memory;
mod screen;
mod state;
mod trace;

pub use bus::{contention_delay, HostIo, MachineBus, DEFAULT_INPUT};
pub use config::{SpectrumConfig, SpectrumModel, Timings, MAX_TICKS_PER_FRAME};
pub use error::MachineError;
pub use events::RunEvents;
pub use journal::{PortWrite, PortWriteJournal, JOURNAL_CAPACITY};
pub use keyboard::KeyboardState;
pub use machine::Spectrum;
pub use marks::{AddressMarks, MARK_BREAKPOINT, MARK_VISITED_INSTRUCTION};
pub use memory::{MemoryImage, Page, ATTRS_OFFSET, IMAGE_SIZE, PAGE_SIZE};
pub use screen::{
    BeamRenderer, FrameChunks, BORDER_WIDTH, BOTTOM_BORDER_HEIGHT, CHUNKS_PER_FRAME_LINE,
    FRAME_HEIGHT, FRAME_WIDTH, PIXELS_PER_CHUNK, SCREEN_HEIGHT, SCREEN_WIDTH, TOP_BORDER_HEIGHT,
};
pub use state::{MachineState, ProcessorState, MACHINE_STATE_SIZE, PROCESSOR_STATE_SIZE};
pub use trace::{TraceSink, DEFAULT_TRACE_PATH};
