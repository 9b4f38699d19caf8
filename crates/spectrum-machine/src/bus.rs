//! The CPU-facing bus: contention, rendering discipline, ports and budgets.
//!
//! `MachineBus` implements the [`Z80Bus`] environment the decoder executes
//! against. It owns everything the decoder can observe: the memory image,
//! the beam renderer, the port-write journal, the marks table and the
//! keyboard, plus the per-frame tick counter and the event latch the run
//! loop inspects.
//!
//! # Rendering discipline
//!
//! Before any change the beam could sample (a memory write or a border
//! port write), the renderer is advanced to the tick after the current one,
//! so the old value lands in every pixel up to the cycle of the change.
//!
//! # Contention
//!
//! The ULA stalls CPU accesses to `$4000-$7FFF` while it fetches the screen;
//! the delay depends only on the tick within the frame. Port accesses wrap
//! the same predicate in one of four patterns selected by the port's low bit
//! and whether its address falls in the contended window.

use spectrum_core::Z80Bus;
use tracing::trace;

use crate::config::{SpectrumConfig, SpectrumModel, Timings};
use crate::events::RunEvents;
use crate::journal::PortWriteJournal;
use crate::keyboard::KeyboardState;
use crate::marks::{AddressMarks, MARK_BREAKPOINT};
use crate::memory::MemoryImage;
use crate::screen::{BeamRenderer, SCREEN_HEIGHT};

/// Value seen on the data bus when nothing drives it; bit 6 is the EAR line.
pub const DEFAULT_INPUT: u8 = 0xBF;

/// Host-side port hooks.
///
/// The default implementation behaves like an unconnected Spectrum: inputs
/// read [`DEFAULT_INPUT`] and outputs disappear. A host that cannot produce
/// an input value may return `None`; the machine then latches
/// `MACHINE_STOPPED` and the cycle reads [`DEFAULT_INPUT`].
pub trait HostIo {
    fn on_input(&mut self, port: u16) -> Option<u8> {
        let _ = port;
        Some(DEFAULT_INPUT)
    }

    fn on_output(&mut self, port: u16, value: u8) {
        let _ = (port, value);
    }
}

/// ULA-induced delay for a memory access at `addr` during frame tick `tick`.
///
/// Zero outside `$4000-$7FFF`, outside the 192 screen lines, and during the
/// horizontal blanking part of each line. Within the fetch window the delay
/// walks the 6,5,4,3,2,1,0,0 ladder.
#[must_use]
pub fn contention_delay(timings: &Timings, addr: u16, tick: u32) -> u32 {
    if !(0x4000..0x8000).contains(&addr) {
        return 0;
    }
    let base = timings.contention_base;
    if tick < base {
        return 0;
    }
    if tick >= base + SCREEN_HEIGHT as u32 * timings.ticks_per_line {
        return 0;
    }
    let line_tick = (tick - base) % timings.ticks_per_line;
    if line_tick >= 128 {
        return 0;
    }
    let k = line_tick % 8;
    if k == 7 {
        0
    } else {
        6 - k
    }
}

/// The machine side of the decoder coupling.
pub struct MachineBus {
    pub(crate) model: SpectrumModel,
    pub(crate) timings: Timings,
    pub(crate) memory: MemoryImage,
    pub(crate) renderer: BeamRenderer,
    pub(crate) journal: PortWriteJournal,
    pub(crate) marks: AddressMarks,
    pub(crate) keyboard: KeyboardState,
    pub(crate) host: Option<Box<dyn HostIo>>,
    pub(crate) ticks_since_int: u32,
    pub(crate) ticks_to_stop: u64,
    pub(crate) fetches_to_stop: u32,
    pub(crate) events: RunEvents,
    pub(crate) int_suppressed: bool,
    pub(crate) int_after_ei_allowed: bool,
    pub(crate) border_color: u8,
    pub(crate) addr_bus: u16,
    pub(crate) trace_enabled: bool,
}

impl MachineBus {
    #[must_use]
    pub fn new(config: &SpectrumConfig) -> Self {
        let timings = config.model.timings();
        Self {
            model: config.model,
            timings,
            memory: MemoryImage::new(),
            renderer: BeamRenderer::new(&timings),
            journal: PortWriteJournal::new(),
            marks: AddressMarks::new(),
            keyboard: KeyboardState::new(),
            host: None,
            ticks_since_int: 0,
            ticks_to_stop: 0,
            fetches_to_stop: 0,
            events: RunEvents::empty(),
            int_suppressed: false,
            int_after_ei_allowed: false,
            border_color: 7,
            addr_bus: 0,
            trace_enabled: false,
        }
    }

    /// Advance the frame tick counter, driving the tick budget.
    pub fn tick(&mut self, t: u32) {
        self.ticks_since_int += t;
        if self.ticks_to_stop > 0 {
            if u64::from(t) >= self.ticks_to_stop {
                self.ticks_to_stop = 0;
                self.events |= RunEvents::TICKS_LIMIT_HIT;
            } else {
                self.ticks_to_stop -= u64::from(t);
            }
        }
    }

    /// Request termination after the current instruction.
    pub fn stop(&mut self) {
        self.events |= RunEvents::MACHINE_STOPPED;
    }

    /// Paint everything the beam has passed, up to and including the
    /// current tick. Called before observable changes so the prior value is
    /// sampled first.
    pub(crate) fn render_to_current(&mut self) {
        self.renderer.render_to_tick(
            self.ticks_since_int + 1,
            self.memory.screen_page(),
            self.border_color,
        );
    }

    /// Paint the rest of the frame.
    pub(crate) fn render_to_end(&mut self) {
        self.renderer.render_to_tick(
            self.timings.ticks_per_frame,
            self.memory.screen_page(),
            self.border_color,
        );
    }

    /// Reduce the tick counter by one frame and rewind the per-frame state.
    pub(crate) fn start_new_frame(&mut self) {
        debug_assert!(self.ticks_since_int >= self.timings.ticks_per_frame);
        self.ticks_since_int -= self.timings.ticks_per_frame;
        self.renderer.start_frame();
        self.journal.clear();
    }

    fn contend(&mut self, addr: u16) {
        let delay = contention_delay(&self.timings, addr, self.ticks_since_int);
        if delay > 0 {
            self.tick(delay);
        }
    }

    fn port_contention(&mut self, port: u16) {
        let contended = (0x4000..0x8000).contains(&port);
        if port & 1 == 0 {
            if contended {
                self.contend(port);
            }
            self.tick(1);
            self.contend(port);
            self.tick(3);
        } else if contended {
            for _ in 0..4 {
                self.contend(port);
                self.tick(1);
            }
        } else {
            self.tick(4);
        }
    }

    fn exec_cycles(&mut self, n: u32) {
        for _ in 0..n {
            self.contend(self.addr_bus);
            self.tick(1);
        }
    }

    fn input_value(&mut self, port: u16) -> u8 {
        match self.host.as_mut() {
            Some(host) => match host.on_input(port) {
                Some(value) => value,
                None => {
                    self.events |= RunEvents::MACHINE_STOPPED;
                    DEFAULT_INPUT
                }
            },
            None => self.default_input(port),
        }
    }

    /// Input value of a machine with nothing attached but the keyboard.
    fn default_input(&self, port: u16) -> u8 {
        if port & 1 == 0 {
            DEFAULT_INPUT & self.keyboard.read((port >> 8) as u8)
        } else {
            DEFAULT_INPUT
        }
    }
}

impl Z80Bus for MachineBus {
    fn on_fetch_cycle(&mut self, addr: u16) -> u8 {
        self.contend(addr);
        let value = self.memory.read(addr);
        self.tick(4);
        value
    }

    fn on_m1_fetch_cycle(&mut self, addr: u16) -> u8 {
        let value = self.on_fetch_cycle(addr);
        if self.fetches_to_stop > 0 {
            self.fetches_to_stop -= 1;
            if self.fetches_to_stop == 0 {
                self.events |= RunEvents::FETCHES_LIMIT_HIT;
            }
        }
        value
    }

    fn on_read_cycle(&mut self, addr: u16) -> u8 {
        self.contend(addr);
        let value = self.memory.read(addr);
        self.tick(3);
        value
    }

    fn on_write_cycle(&mut self, addr: u16, value: u8) {
        // Sample the old byte into any pixel the beam has reached first.
        self.render_to_current();
        self.contend(addr);
        self.memory.write(addr, value);
        self.tick(3);
    }

    fn on_input_cycle(&mut self, port: u16) -> u8 {
        self.port_contention(port);
        self.input_value(port)
    }

    fn on_output_cycle(&mut self, port: u16, value: u8) {
        if let Some(host) = self.host.as_mut() {
            host.on_output(port, value);
        }

        if port & 0xFF == 0xFE {
            self.render_to_current();
            self.border_color = value & 0x07;
        }

        if self.model == SpectrumModel::Spectrum128K && port & 0x8002 == 0 {
            self.memory.write_paging_register(value);
        }

        // Journal with the tick at the call site, before contention lands.
        self.journal
            .record(port, value, u64::from(self.ticks_since_int));

        self.port_contention(port);
    }

    fn on_set_addr_bus(&mut self, addr: u16) {
        self.addr_bus = addr;
    }

    fn on_3t_exec_cycle(&mut self) {
        self.exec_cycles(3);
    }

    fn on_4t_exec_cycle(&mut self) {
        self.exec_cycles(4);
    }

    fn on_5t_exec_cycle(&mut self) {
        self.exec_cycles(5);
    }

    fn on_set_pc(&mut self, pc: u16) {
        if self.marks.is_marked_addr(pc, MARK_BREAKPOINT) {
            trace!(pc, "breakpoint hit");
            self.events |= RunEvents::BREAKPOINT_HIT;
        }
    }

    fn int_after_ei_allowed(&self) -> bool {
        self.int_after_ei_allowed
    }
}
