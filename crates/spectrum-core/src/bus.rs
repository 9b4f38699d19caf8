//! The machine environment a Z80 decoder executes against.

/// Bus environment consumed by a Z80 instruction decoder.
///
/// Every method corresponds to one machine cycle of the Z80. The machine
/// implementation is responsible for tick accounting and for any wait states
/// (ULA contention) the cycle incurs; the decoder only reports what kind of
/// cycle it is performing and at which address.
///
/// Cycle timing contract:
/// - fetch cycles are 4 ticks, read/write cycles 3 ticks, I/O cycles 4 ticks,
///   all plus contention;
/// - contention delays are applied before the bus transaction they qualify.
pub trait Z80Bus {
    /// Opcode fetch at `addr` (non-M1 byte of a multi-byte instruction).
    fn on_fetch_cycle(&mut self, addr: u16) -> u8;

    /// M1 opcode fetch at `addr`. Also drives the machine's fetch budget.
    fn on_m1_fetch_cycle(&mut self, addr: u16) -> u8;

    /// Memory read cycle.
    fn on_read_cycle(&mut self, addr: u16) -> u8;

    /// Memory write cycle.
    fn on_write_cycle(&mut self, addr: u16, value: u8);

    /// Port input cycle. Returns the byte seen on the data bus.
    fn on_input_cycle(&mut self, port: u16) -> u8;

    /// Port output cycle.
    fn on_output_cycle(&mut self, port: u16, value: u8);

    /// Latch a value on the address bus. Extra execution cycles
    /// (`on_3t_exec_cycle` and friends) contend against the latched value.
    fn on_set_addr_bus(&mut self, addr: u16);

    /// Three internal execution ticks (e.g. 16-bit increment in `INC HL`).
    fn on_3t_exec_cycle(&mut self);

    /// Four internal execution ticks.
    fn on_4t_exec_cycle(&mut self);

    /// Five internal execution ticks (e.g. the branch part of `JR`).
    fn on_5t_exec_cycle(&mut self);

    /// The decoder is about to transfer control to `pc`.
    ///
    /// Called for every program-counter update, sequential or not. The
    /// machine uses this to latch breakpoint events; the decoder still
    /// performs its own register update.
    fn on_set_pc(&mut self, pc: u16);

    /// Whether an interrupt may be accepted immediately after `EI`.
    ///
    /// Normally false: the Z80 suppresses maskable interrupts for one
    /// instruction after `EI`. Recorded-playback hosts flip this on so a
    /// recorded interrupt can land where the recording says it did. The
    /// decoder consults this when executing `EI` and skips its one-instruction
    /// interrupt suppression when it returns true.
    fn int_after_ei_allowed(&self) -> bool {
        false
    }
}
