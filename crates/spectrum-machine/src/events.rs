//! Events that terminate a `run()` call.

use bitflags::bitflags;

bitflags! {
    /// Why `run()` returned.
    ///
    /// Several events can latch during the same instruction; the mask carries
    /// all of them. Bit positions are part of the packed machine state and
    /// must stay stable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RunEvents: u32 {
        /// The frame boundary was reached.
        const END_OF_FRAME = 1 << 1;
        /// The tick budget set by `set_ticks_to_stop` ran out.
        const TICKS_LIMIT_HIT = 1 << 2;
        /// The M1-fetch budget set by `set_fetches_to_stop` ran out.
        const FETCHES_LIMIT_HIT = 1 << 3;
        /// Control transferred to an address carrying the breakpoint mark.
        const BREAKPOINT_HIT = 1 << 4;
        /// `stop()` was requested, or the host refused an input.
        const MACHINE_STOPPED = 1 << 5;
        /// Reserved for host-defined conditions.
        const CUSTOM = 1 << 6;
    }
}
