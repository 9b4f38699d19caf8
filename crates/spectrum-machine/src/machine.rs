//! The machine: event loop, frame bookkeeping and the embedding surface.

use std::path::Path;

use spectrum_core::Z80Stepper;
use tracing::trace;

use crate::bus::{HostIo, MachineBus};
use crate::config::{SpectrumConfig, SpectrumModel, Timings};
use crate::disasm;
use crate::error::MachineError;
use crate::events::RunEvents;
use crate::journal::PortWrite;
use crate::marks::{MARK_BREAKPOINT, MARK_VISITED_INSTRUCTION};
use crate::memory::MemoryImage;
use crate::screen::FrameChunks;
use crate::state::{MachineState, ProcessorState};
use crate::trace::TraceSink;

/// Frames between FLASH phase inversions.
const FLASH_PERIOD_FRAMES: u64 = 16;

/// A Spectrum machine driving the decoder `C`.
///
/// The machine owns the bus (memory, renderer, journal, marks, keyboard) and
/// the decoder; [`run`](Spectrum::run) is the only way the two meet. Hosts
/// inspect and mutate the machine between `run()` calls.
pub struct Spectrum<C> {
    cpu: C,
    bus: MachineBus,
    frame_counter: u64,
    trace_sink: Option<TraceSink>,
}

impl<C: Z80Stepper> Spectrum<C> {
    #[must_use]
    pub fn new(config: &SpectrumConfig, cpu: C) -> Self {
        Self {
            cpu,
            bus: MachineBus::new(config),
            frame_counter: 0,
            trace_sink: None,
        }
    }

    /// Run instructions until an event latches or the frame completes.
    ///
    /// Returns the events that ended the call; `END_OF_FRAME` is included
    /// whenever the frame boundary was reached, alone or together with other
    /// events.
    pub fn run(&mut self) -> RunEvents {
        let tpf = self.bus.timings.ticks_per_frame;
        if self.bus.ticks_since_int >= tpf {
            self.start_new_frame();
        }
        self.bus.events = RunEvents::empty();

        while self.bus.events.is_empty() && self.bus.ticks_since_int < tpf {
            // ~INT is sampled on the last tick of the previous instruction,
            // so the window reaches one tick past its nominal width.
            if !self.bus.int_suppressed
                && self.bus.ticks_since_int < self.bus.timings.ticks_per_active_int + 1
            {
                self.cpu.handle_active_int(&mut self.bus);
            }
            if self.bus.trace_enabled {
                self.trace_step();
            }
            self.cpu.step(&mut self.bus);
        }

        if self.bus.ticks_since_int >= tpf {
            self.bus.events |= RunEvents::END_OF_FRAME;
        }
        trace!(events = ?self.bus.events, ticks = self.bus.ticks_since_int, "run returned");
        self.bus.events
    }

    fn start_new_frame(&mut self) {
        self.bus.start_new_frame();
        self.frame_counter += 1;
        if self.frame_counter % FLASH_PERIOD_FRAMES == 0 {
            self.bus.renderer.toggle_flash();
        }
    }

    /// Write the trace line for the instruction about to execute and mark
    /// its address visited.
    fn trace_step(&mut self) {
        let pc = self.cpu.pc();
        let memory = &self.bus.memory;
        let mut read = |addr: u16| memory.read(addr);
        let (text, _) = disasm::disassemble(&mut read, pc);

        if let Some(sink) = self.trace_sink.as_mut() {
            let written = sink.record(format_args!(
                "{pc:04x} {text:<20} af:{af:04x} bc:{bc:04x} de:{de:04x} hl:{hl:04x} \
                 ix:{ix:04x} iy:{iy:04x} sp:{sp:04x} ir:{ir:04x} t:{tick}",
                af = self.cpu.af(),
                bc = self.cpu.bc(),
                de = self.cpu.de(),
                hl = self.cpu.hl(),
                ix = self.cpu.ix(),
                iy = self.cpu.iy(),
                sp = self.cpu.sp(),
                ir = self.cpu.ir(),
                tick = self.bus.ticks_since_int,
            ));
            if written.is_err() {
                self.trace_sink = None;
            }
        }

        self.bus.marks.mark_addr(pc, MARK_VISITED_INSTRUCTION);
    }

    /// Reset the machine: memory refilled with the power-on pattern, paging
    /// unlocked, CPU reset, frame state rewound. Marks persist.
    pub fn reset(&mut self) {
        self.bus.memory.reset();
        self.cpu.reset();
        self.bus.ticks_since_int = 0;
        self.bus.events = RunEvents::empty();
        self.bus.border_color = 7;
        self.bus.renderer.start_frame();
        self.bus.journal.clear();
    }

    // --- Embedding surface -------------------------------------------------

    /// Snapshot the processor and machine state.
    #[must_use]
    pub fn retrieve_state(&self) -> MachineState {
        MachineState {
            proc: ProcessorState {
                bc: self.cpu.bc(),
                de: self.cpu.de(),
                hl: self.cpu.hl(),
                af: self.cpu.af(),
                ix: self.cpu.ix(),
                iy: self.cpu.iy(),
                alt_bc: self.cpu.alt_bc(),
                alt_de: self.cpu.alt_de(),
                alt_hl: self.cpu.alt_hl(),
                alt_af: self.cpu.alt_af(),
                pc: self.cpu.pc(),
                sp: self.cpu.sp(),
                ir: self.cpu.ir(),
                wz: self.cpu.wz(),
                iff1: self.cpu.iff1(),
                iff2: self.cpu.iff2(),
                int_mode: self.cpu.int_mode(),
                iregp_kind: self.cpu.iregp_kind(),
            },
            ticks_since_int: self.bus.ticks_since_int,
            fetches_to_stop: self.bus.fetches_to_stop,
            events: self.bus.events,
            int_suppressed: self.bus.int_suppressed,
            int_after_ei_allowed: self.bus.int_after_ei_allowed,
            border_color: self.bus.border_color,
            trace_enabled: self.bus.trace_enabled,
        }
    }

    /// Install a previously retrieved state.
    pub fn install_state(&mut self, state: &MachineState) {
        let p = &state.proc;
        self.cpu.set_bc(p.bc);
        self.cpu.set_de(p.de);
        self.cpu.set_hl(p.hl);
        self.cpu.set_af(p.af);
        self.cpu.set_ix(p.ix);
        self.cpu.set_iy(p.iy);
        self.cpu.set_alt_bc(p.alt_bc);
        self.cpu.set_alt_de(p.alt_de);
        self.cpu.set_alt_hl(p.alt_hl);
        self.cpu.set_alt_af(p.alt_af);
        self.cpu.set_pc(p.pc);
        self.cpu.set_sp(p.sp);
        self.cpu.set_ir(p.ir);
        self.cpu.set_wz(p.wz);
        self.cpu.set_iff1(p.iff1);
        self.cpu.set_iff2(p.iff2);
        self.cpu.set_int_mode(p.int_mode);
        self.cpu.set_iregp_kind(p.iregp_kind);

        self.bus.ticks_since_int = state.ticks_since_int;
        self.bus.fetches_to_stop = state.fetches_to_stop;
        self.bus.events = state.events;
        self.bus.int_suppressed = state.int_suppressed;
        self.bus.int_after_ei_allowed = state.int_after_ei_allowed;
        self.bus.border_color = state.border_color;
        self.bus.trace_enabled = state.trace_enabled;
    }

    // --- Inspection --------------------------------------------------------

    /// Ticks elapsed since the start of the current frame.
    #[must_use]
    pub fn ticks(&self) -> u32 {
        self.bus.ticks_since_int
    }

    /// Events latched by the last `run()`.
    #[must_use]
    pub fn events(&self) -> RunEvents {
        self.bus.events
    }

    /// The rendered frame as packed chunks.
    #[must_use]
    pub fn screen_chunks(&self) -> &FrameChunks {
        self.bus.renderer.chunks()
    }

    /// Paint the rest of the frame from the current beam position.
    pub fn render_screen(&mut self) {
        self.bus.render_to_end();
    }

    /// Expand the chunk buffer into one RGB pixel per `u32`.
    pub fn frame_pixels(&self, buffer: &mut [u32]) {
        self.bus.renderer.frame_pixels(buffer);
    }

    /// Current FLASH phase, `0x0000` or `0xFFFF`.
    #[must_use]
    pub fn flash_mask(&self) -> u16 {
        self.bus.renderer.flash_mask()
    }

    #[must_use]
    pub fn memory(&self) -> &MemoryImage {
        &self.bus.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryImage {
        &mut self.bus.memory
    }

    /// Port writes journalled for the current frame.
    #[must_use]
    pub fn port_writes(&self) -> &[PortWrite] {
        self.bus.journal.entries()
    }

    /// Mark `size` consecutive addresses.
    pub fn mark_addrs(&mut self, addr: u16, size: usize, marks: u8) {
        self.bus.marks.mark_addrs(addr, size, marks);
    }

    #[must_use]
    pub fn is_breakpoint_addr(&self, addr: u16) -> bool {
        self.bus.marks.is_marked_addr(addr, MARK_BREAKPOINT)
    }

    #[must_use]
    pub fn is_marked_addr(&self, addr: u16, marks: u8) -> bool {
        self.bus.marks.is_marked_addr(addr, marks)
    }

    #[must_use]
    pub fn border_color(&self) -> u8 {
        self.bus.border_color
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.bus.model
    }

    #[must_use]
    pub fn timings(&self) -> Timings {
        self.bus.timings
    }

    #[must_use]
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    // --- Control -----------------------------------------------------------

    /// Stop `run()` no later than `ticks` ticks from now. Zero disables.
    pub fn set_ticks_to_stop(&mut self, ticks: u64) {
        self.bus.ticks_to_stop = ticks;
    }

    /// Stop `run()` after `fetches` M1 fetches. Zero disables.
    pub fn set_fetches_to_stop(&mut self, fetches: u32) {
        self.bus.fetches_to_stop = fetches;
    }

    /// Request termination after the current instruction.
    pub fn stop(&mut self) {
        self.bus.stop();
    }

    /// Suppress maskable interrupt delivery at frame starts.
    pub fn set_int_suppressed(&mut self, suppressed: bool) {
        self.bus.int_suppressed = suppressed;
    }

    /// Allow an interrupt immediately after `EI` (recorded-playback hosts).
    pub fn set_int_after_ei_allowed(&mut self, allowed: bool) {
        self.bus.int_after_ei_allowed = allowed;
    }

    /// Attach host port hooks, returning any previous ones.
    pub fn set_host(&mut self, host: Box<dyn HostIo>) -> Option<Box<dyn HostIo>> {
        self.bus.host.replace(host)
    }

    /// Start tracing to the given file.
    ///
    /// # Errors
    ///
    /// Propagates the file-creation error.
    pub fn enable_trace<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MachineError> {
        self.trace_sink = Some(TraceSink::create(path.as_ref())?);
        self.bus.trace_enabled = true;
        Ok(())
    }

    /// Stop tracing and close the sink.
    pub fn disable_trace(&mut self) {
        self.bus.trace_enabled = false;
        self.trace_sink = None;
    }

    // --- Component access --------------------------------------------------

    #[must_use]
    pub fn keyboard(&self) -> &crate::keyboard::KeyboardState {
        &self.bus.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut crate::keyboard::KeyboardState {
        &mut self.bus.keyboard
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &MachineBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MachineBus {
        &mut self.bus
    }
}
