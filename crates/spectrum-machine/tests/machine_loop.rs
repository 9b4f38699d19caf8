//! Event-loop behaviour: budgets, frame boundaries, breakpoints, interrupts.

mod common;

use common::{make_machine_48k, poke_code};
use spectrum_machine::{RunEvents, MARK_BREAKPOINT, MARK_VISITED_INSTRUCTION};

const TPF_48K: u32 = 69_888;

#[test]
fn nop_run_hits_tick_budget() {
    // Zeroed memory is NOP everywhere; each instruction is 4 ticks.
    let mut machine = make_machine_48k();
    machine.set_ticks_to_stop(1000);

    let events = machine.run();

    assert!(events.contains(RunEvents::TICKS_LIMIT_HIT));
    assert!(!events.contains(RunEvents::END_OF_FRAME));
    let ticks = machine.ticks();
    assert!((1000..=1011).contains(&ticks), "ticks = {ticks}");
    // PC advanced one address per 4 ticks.
    assert_eq!(u32::from(machine.cpu().pc), ticks / 4);
}

#[test]
fn nop_run_reaches_end_of_frame() {
    let mut machine = make_machine_48k();
    let events = machine.run();
    assert_eq!(events, RunEvents::END_OF_FRAME);
    // The frame length is a multiple of 4, so NOPs land exactly on it.
    assert_eq!(machine.ticks(), TPF_48K);
}

#[test]
fn tick_counter_wraps_at_frame_start() {
    let mut machine = make_machine_48k();
    machine.run();
    let events = machine.run();
    assert_eq!(events, RunEvents::END_OF_FRAME);
    // The counter was reduced by one frame, not accumulated.
    assert_eq!(machine.ticks(), TPF_48K);
    assert_eq!(machine.frame_counter(), 1);
}

#[test]
fn fetch_budget_counts_instructions() {
    let mut machine = make_machine_48k();
    machine.set_fetches_to_stop(10);

    let events = machine.run();

    assert!(events.contains(RunEvents::FETCHES_LIMIT_HIT));
    assert_eq!(machine.cpu().pc, 10);
    assert_eq!(machine.ticks(), 40);
}

#[test]
fn zero_budgets_disable_deadlines() {
    let mut machine = make_machine_48k();
    machine.set_ticks_to_stop(0);
    machine.set_fetches_to_stop(0);
    let events = machine.run();
    assert_eq!(events, RunEvents::END_OF_FRAME);
}

#[test]
fn flash_toggles_every_16_frames() {
    let mut machine = make_machine_48k();
    assert_eq!(machine.flash_mask(), 0x0000);

    // Frame bookkeeping runs when the next frame starts, so the toggle for
    // frame 16 lands at the start of the 17th run.
    for _ in 0..17 {
        machine.run();
    }
    assert_eq!(machine.flash_mask(), 0xFFFF);

    for _ in 0..16 {
        machine.run();
    }
    assert_eq!(machine.flash_mask(), 0x0000);
}

#[test]
fn breakpoint_latches_on_jump() {
    let mut machine = make_machine_48k();
    poke_code(&mut machine, 0x0000, &[0xC3, 0x34, 0x12]); // jp 0x1234
    machine.mark_addrs(0x1234, 1, MARK_BREAKPOINT);
    assert!(machine.is_breakpoint_addr(0x1234));

    let events = machine.run();

    assert!(events.contains(RunEvents::BREAKPOINT_HIT));
    assert_eq!(machine.cpu().pc, 0x1234);
}

#[test]
fn breakpoint_on_sequential_flow() {
    let mut machine = make_machine_48k();
    machine.mark_addrs(0x0005, 1, MARK_BREAKPOINT);
    let events = machine.run();
    assert!(events.contains(RunEvents::BREAKPOINT_HIT));
    assert_eq!(machine.cpu().pc, 0x0005);
}

#[test]
fn interrupt_delivered_in_window() {
    let mut machine = make_machine_48k();
    let mut state = machine.retrieve_state();
    state.proc.iff1 = true;
    state.proc.sp = 0x8000;
    state.proc.int_mode = 1;
    machine.install_state(&state);
    machine.set_fetches_to_stop(1);

    machine.run();

    // The interrupt fired before the first instruction: PC pushed, control
    // at the IM 1 vector.
    let pc = machine.cpu().pc;
    assert!(pc >= 0x38, "pc = {pc:#06x}");
    assert_eq!(machine.cpu().sp, 0x7FFE);
    assert!(!machine.cpu().iff1);
}

#[test]
fn interrupt_suppressed_when_asked() {
    let mut machine = make_machine_48k();
    let mut state = machine.retrieve_state();
    state.proc.iff1 = true;
    state.proc.sp = 0x8000;
    state.int_suppressed = true;
    machine.install_state(&state);
    machine.set_fetches_to_stop(1);

    machine.run();

    assert_eq!(machine.cpu().sp, 0x8000);
    assert!(machine.cpu().iff1);
}

#[test]
fn no_interrupt_outside_window() {
    let mut machine = make_machine_48k();
    let mut state = machine.retrieve_state();
    state.proc.iff1 = true;
    state.proc.sp = 0x8000;
    state.ticks_since_int = 100; // past the 32-tick window
    machine.install_state(&state);
    machine.set_fetches_to_stop(1);

    machine.run();

    assert_eq!(machine.cpu().sp, 0x8000);
    assert!(machine.cpu().iff1);
}

#[test]
fn ei_shields_the_next_instruction() {
    let mut machine = make_machine_48k();
    // di; ei; then NOPs. After EI the interrupt must wait one instruction.
    poke_code(&mut machine, 0x0000, &[0xF3, 0xFB]);
    let mut state = machine.retrieve_state();
    state.proc.sp = 0x8000;
    machine.install_state(&state);
    machine.set_fetches_to_stop(2); // execute di, ei

    machine.run();
    assert!(machine.cpu().iff1);
    assert!(machine.cpu().int_disabled);

    // The next step clears the shield and the pending interrupt lands
    // (still inside the 33-tick window: only 12 ticks have passed).
    machine.set_fetches_to_stop(2);
    machine.run();
    assert!(!machine.cpu().iff1, "interrupt should have been accepted");
    assert_eq!(machine.cpu().sp, 0x7FFE);
}

#[test]
fn stop_latches_machine_stopped() {
    let mut machine = make_machine_48k();
    machine.stop();
    assert!(machine.events().contains(RunEvents::MACHINE_STOPPED));
}

#[test]
fn state_install_retrieve_is_identity() {
    let mut machine = make_machine_48k();
    let mut state = machine.retrieve_state();
    state.proc.bc = 0x1234;
    state.proc.alt_hl = 0xBEEF;
    state.proc.pc = 0x8000;
    state.proc.iff2 = true;
    state.ticks_since_int = 5000;
    state.border_color = 3;
    state.int_after_ei_allowed = true;

    machine.install_state(&state);
    assert_eq!(machine.retrieve_state(), state);
}

#[test]
fn trace_writes_lines_and_marks_visited() {
    let path = std::env::temp_dir().join("spectrum_machine_loop_trace");
    let mut machine = make_machine_48k();
    poke_code(&mut machine, 0x0000, &[0x3E, 0x07, 0xC3, 0x00, 0x80]);
    machine.enable_trace(&path).unwrap();
    machine.set_fetches_to_stop(3);

    machine.run();
    machine.disable_trace(); // flush

    assert!(machine.is_marked_addr(0x0000, MARK_VISITED_INSTRUCTION));
    assert!(machine.is_marked_addr(0x0002, MARK_VISITED_INSTRUCTION));
    assert!(!machine.is_marked_addr(0x0001, MARK_VISITED_INSTRUCTION));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("0000 ld a, 0x07"));
    assert!(lines[1].starts_with("0002 jp 0x8000"));
    assert!(lines[1].contains("af:0700"));
    let _ = std::fs::remove_file(&path);
}
