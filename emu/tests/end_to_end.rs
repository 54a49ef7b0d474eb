//! Exercises the full assemble → HEX → load → run pipeline, covering the
//! end-to-end scenarios documented for this machine: arithmetic overflow,
//! branch resolution, stack discipline, branch-and-link, and the `PRINT`
//! syscall's eager string capture.

use std::sync::mpsc::sync_channel;
use vcpu16::{Core, Syscall, SyscallRequest, TickResult};

/// Assembles `source`, writes it to a real HEX file and reads it back, then
/// loads it into a fresh `Core` with its program counter set to the loaded
/// slot. Exercising the file round-trip (not just in-memory structures) is
/// the point: it is what the HEX writer/reader boundary actually promises.
fn load_program(source: &str) -> (Core, std::sync::mpsc::Receiver<SyscallRequest>) {
    let program = asm::assemble(source).expect("assembly failed");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.hex");
    hexfile::write_file(&path, &program).unwrap();
    let read_back = hexfile::read_file(&path).unwrap();
    assert_eq!(program, read_back, "HEX file round-trip changed the program");

    let (tx, rx) = sync_channel(64);
    let mut core = Core::new(tx);
    let slot = emu::loader::load(&mut core.memory, &read_back).unwrap();
    core.registers.pc = slot;
    (core, rx)
}

fn run_to_halt(core: &mut Core) {
    core.start();
    loop {
        match core.tick() {
            Ok(TickResult::Halted) => break,
            Ok(TickResult::Running) => continue,
            Err(err) => panic!("unexpected CPU error: {}", err),
        }
    }
}

#[test]
fn add_then_halt_via_syscall_exit() {
    let (mut core, rx) = load_program(
        "\
.text
li r0, #5
li r1, #3
add r0, r1
syscall 0
",
    );
    run_to_halt(&mut core);
    assert_eq!(core.registers.get(vcpu16::RegisterId::R0), 8);
    assert!(!core.flags.zero);
    assert!(!core.flags.carry);
    assert_eq!(rx.try_recv().unwrap().syscall, Syscall::Exit);
}

#[test]
fn add_wraps_and_sets_zero_and_carry() {
    let (mut core, _rx) = load_program(
        "\
.text
li r0, #255
li r1, #1
add r0, r1
syscall 0
",
    );
    run_to_halt(&mut core);
    assert_eq!(core.registers.get(vcpu16::RegisterId::R0), 0);
    assert!(core.flags.zero);
    assert!(core.flags.carry);
}

#[test]
fn beq_taken_on_equal_comparison() {
    let (mut core, _rx) = load_program(
        "\
.text
li r0, #10
cmp r0, #10
beq eq
li r0, #0
eq:
syscall 0
",
    );
    run_to_halt(&mut core);
    assert_eq!(core.registers.get(vcpu16::RegisterId::R0), 10);
}

#[test]
fn stack_discipline_round_trips_registers() {
    let (mut core, _rx) = load_program(
        "\
.text
li r0, #7
li r1, #9
push {r0, r1}
li r0, #0
li r1, #0
pop {r0, r1}
syscall 0
",
    );
    run_to_halt(&mut core);
    assert_eq!(core.registers.get(vcpu16::RegisterId::R0), 7);
    assert_eq!(core.registers.get(vcpu16::RegisterId::R1), 9);
}

#[test]
fn jump_and_link_returns_through_pop_lr() {
    let (mut core, _rx) = load_program(
        "\
.text
jmp sub
li r1, #99
syscall 0
sub:
li r2, #1
push {lr}
pop {lr}
",
    );
    run_to_halt(&mut core);
    // sub: returns to the instruction right after `jmp sub` (address 1),
    // which sets r1 = 99 before halting via syscall 0.
    assert_eq!(core.registers.get(vcpu16::RegisterId::R1), 99);
    assert_eq!(core.registers.get(vcpu16::RegisterId::R2), 1);
}

#[test]
fn print_syscall_captures_string_eagerly() {
    let (mut core, rx) = load_program(
        "\
.data
msg: .asciz \"hi\\n\"
.text
li r0, =msg
syscall 1
syscall 0
",
    );
    run_to_halt(&mut core);

    let first = rx.recv().unwrap();
    assert_eq!(first.syscall, Syscall::Print);
    assert_eq!(first.args.string.as_deref(), Some("hi\n"));

    let second = rx.recv().unwrap();
    assert_eq!(second.syscall, Syscall::Exit);
}

#[test]
fn reserved_syscall_is_logged_and_non_fatal() {
    let (mut core, rx) = load_program(
        "\
.text
syscall 4
syscall 0
",
    );
    run_to_halt(&mut core);
    assert_eq!(rx.recv().unwrap().syscall, Syscall::Reserved(4));
    assert_eq!(rx.recv().unwrap().syscall, Syscall::Exit);
}
