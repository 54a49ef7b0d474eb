use crate::constants::{IRC_BIT, STACK_TOP};
use crate::error::CoreError;
use crate::flags::Flags;
use crate::isa::{decode, OpCode};
use crate::memory::Memory;
use crate::register::{RegisterFile, RegisterId};
use crate::syscall::{Syscall, SyscallArgs, SyscallRequest};
use std::sync::mpsc::SyncSender;
use tracing::{trace, warn};

pub const END_MARKER: u16 = 0xFF;

/// Whether `and`/`or`/`xor` write their result into `R[Rd]` (the documented
/// behavior) or into `R0` regardless of `Rd` (the legacy bug a bit-exact
/// reimplementation must be able to reproduce).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicWriteMode {
    Legacy,
    Rd,
}

impl Default for LogicWriteMode {
    fn default() -> Self {
        LogicWriteMode::Legacy
    }
}

/// What happened during one `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Running,
    Halted,
}

/// The fetch/decode/execute core. Owns registers, flags and memory; emits
/// syscall requests onto a bounded channel rather than blocking on them.
pub struct Core {
    pub registers: RegisterFile,
    pub flags: Flags,
    pub memory: Memory,
    logic_mode: LogicWriteMode,
    syscalls: SyncSender<SyscallRequest>,
}

impl Core {
    pub fn new(syscalls: SyncSender<SyscallRequest>) -> Core {
        Core::with_logic_mode(syscalls, LogicWriteMode::default())
    }

    pub fn with_logic_mode(syscalls: SyncSender<SyscallRequest>, logic_mode: LogicWriteMode) -> Core {
        let mut flags = Flags::new();
        flags.halted = true;
        Core {
            registers: RegisterFile::new(),
            flags,
            memory: Memory::new(),
            logic_mode,
            syscalls,
        }
    }

    pub fn start(&mut self) {
        self.flags.halted = false;
    }

    /// Runs one fetch/decode/execute step. A no-op while halted.
    pub fn tick(&mut self) -> Result<TickResult, CoreError> {
        if self.flags.halted {
            return Ok(TickResult::Halted);
        }

        let pc = self.registers.pc;
        let word = self.memory.read_word(pc);
        let decoded = match decode(word) {
            Ok(decoded) => decoded,
            Err(err) => {
                // An unhandled exception in the CPU worker halts it rather
                // than propagating a panic across the syscall channel.
                self.flags.halted = true;
                warn!(pc, word, error = %err, "invalid opcode, halting");
                return Err(err);
            }
        };
        trace!(pc, word, op = ?decoded.op, "tick");

        match decoded.op {
            OpCode::Ld => {
                let address = self.effective_address(decoded.rn, decoded.imm);
                let value = self.memory.read_byte(address);
                self.registers.set(decoded.rd, value);
                self.flags.zero = value == 0;
            }
            OpCode::Li => {
                self.registers.set(decoded.rd, decoded.imm);
            }
            OpCode::St => {
                let address = self.effective_address(decoded.rn, decoded.imm);
                let value = self.registers.get(decoded.rd);
                crate::memory::checked_write(&mut self.memory, address, value);
            }
            OpCode::Add => {
                // Immediate present: base is R[Rn], not R[Rd] — matches the
                // register-mode/immediate-mode asymmetry of the reference
                // implementation.
                let raw = if decoded.imm != 0 {
                    self.registers.get(decoded.rn) as i32 + decoded.imm as i32
                } else {
                    self.registers.get(decoded.rd) as i32 + self.registers.get(decoded.rn) as i32
                };
                self.finish_arith(decoded.rd, raw);
            }
            OpCode::Sub => {
                let rn_value = self.registers.get(decoded.rn);
                let raw = if decoded.imm != 0 {
                    rn_value as i32 - decoded.imm as i32
                } else {
                    self.registers.get(decoded.rd) as i32 - rn_value as i32
                };
                let result = (raw & 0xFF) as u8;
                self.registers.set(decoded.rd, result);
                self.flags.zero = result == 0;
                self.flags.overflow = !(-128..=127).contains(&raw);
                // Documented quirk: carry is evaluated against the
                // post-write destination, not the pre-write operand.
                self.flags.carry = result < rn_value;
            }
            OpCode::Jmp => {
                self.registers.lr = (pc & 0xFF) as u8;
                self.registers.pc = decoded.imm as u16;
            }
            OpCode::Beq => {
                if self.flags.zero {
                    self.registers.pc = decoded.imm as u16;
                }
            }
            OpCode::Bne => {
                if !self.flags.zero {
                    self.registers.pc = decoded.imm as u16;
                }
            }
            OpCode::Cmp => {
                // Immediate form encodes both Rd_b and Rn_b as zero, so an
                // all-zero register pair selects the immediate operand.
                let immediate_form = decoded.rd == RegisterId::R0 && decoded.rn == RegisterId::R0;
                let raw = if immediate_form {
                    self.registers.get(decoded.rd) as i32 - decoded.imm as i32
                } else {
                    self.registers.get(decoded.rd) as i32 - self.registers.get(decoded.rn) as i32
                };
                self.flags.zero = raw == 0;
                self.flags.overflow = !(-32768..=32767).contains(&raw);
                self.flags.carry = raw < 0;
            }
            OpCode::And | OpCode::Or | OpCode::Xor => {
                let rd = self.registers.get(decoded.rd);
                let operand = if decoded.rn == RegisterId::R0 {
                    decoded.imm
                } else {
                    self.registers.get(decoded.rn)
                };
                let result = match decoded.op {
                    OpCode::And => rd & operand,
                    OpCode::Or => rd | operand,
                    OpCode::Xor => rd ^ operand,
                    _ => unreachable!(),
                };
                let target = match self.logic_mode {
                    LogicWriteMode::Legacy => RegisterId::R0,
                    LogicWriteMode::Rd => decoded.rd,
                };
                self.registers.set(target, result);
                self.flags.zero = result == 0;
            }
            OpCode::Shl | OpCode::Shr => {
                let amount = (decoded.imm & 0xF) as u32;
                let source = self.registers.get(decoded.rn) as u16;
                let (result, displaced) = match decoded.op {
                    OpCode::Shl => {
                        let shifted = source << amount;
                        ((shifted & 0xFF) as u8, shifted > 0xFF)
                    }
                    // Overflow tracks the source's sign bit, not the bits
                    // actually shifted out — matches the reference shifter.
                    OpCode::Shr => ((source >> amount) as u8, source & 0x80 != 0),
                    _ => unreachable!(),
                };
                self.registers.set(decoded.rd, result);
                self.flags.overflow = displaced;
                self.flags.carry = false;
                self.flags.zero = result == 0;
            }
            OpCode::Push => {
                self.push_mask(decoded.imm);
            }
            OpCode::Pop => {
                if decoded.imm & IRC_BIT != 0 {
                    self.dispatch_syscall(decoded.imm & !IRC_BIT);
                } else if self.pop_mask(decoded.imm) {
                    self.registers.pc = self.registers.lr as u16;
                }
            }
        }

        // Every instruction advances PC by one after it runs, taken
        // branches included: a branch target is encoded as (true address
        // - 1) by the assembler's label pre-pass, so this advance is what
        // lands the fetch on the labeled instruction rather than the one
        // before it.
        self.registers.pc = self.registers.pc.wrapping_add(1);

        if self.registers.pc > END_MARKER {
            self.flags.halted = true;
            return Ok(TickResult::Halted);
        }

        Ok(TickResult::Running)
    }

    /// `ld`/`st`'s `[Rn]`/`[#addr]` addressing modes collapse to the same
    /// decode: when `Rn` is `R0` and an immediate was given, the immediate
    /// *is* the address; otherwise the address is `R[Rn]` — the same
    /// zero-register-means-immediate convention `and`/`or`/`xor`/`cmp` use.
    fn effective_address(&self, rn: RegisterId, imm: u8) -> u16 {
        if rn == RegisterId::R0 && imm != 0 {
            imm as u16
        } else {
            self.registers.get(rn) as u16
        }
    }

    fn finish_arith(&mut self, rd: RegisterId, raw: i32) {
        let result = (raw & 0xFF) as u8;
        self.registers.set(rd, result);
        self.flags.set_arith(result, raw > 255, !(-128..=127).contains(&raw));
    }

    /// Register order for `push`/`pop` masks: `R0, R1, R2, R3, LR` at bits
    /// 0..4. `push` walks low-to-high, predecrementing `SP` before each
    /// write; `pop` walks high-to-low to undo that in LIFO order.
    fn push_mask(&mut self, mask: u8) {
        for bit in 0..5u8 {
            if mask & (1 << bit) == 0 {
                continue;
            }
            let value = if bit == 4 {
                self.registers.lr
            } else {
                self.registers.get(RegisterId::from_index(bit as u16))
            };
            self.registers.sp = self.registers.sp.wrapping_sub(1);
            crate::memory::checked_write(&mut self.memory, self.registers.sp, value);
        }
    }

    /// Returns `true` if bit 4 (`LR`) was restored, so the caller can honor
    /// the "pop {LR} returns" convention.
    fn pop_mask(&mut self, mask: u8) -> bool {
        let mut restored_lr = false;
        for bit in (0..5u8).rev() {
            if mask & (1 << bit) == 0 {
                continue;
            }
            let value = self.memory.read_byte(self.registers.sp);
            self.registers.sp = self.registers.sp.wrapping_add(1);
            if bit == 4 {
                self.registers.lr = value;
                restored_lr = true;
            } else {
                self.registers.set(RegisterId::from_index(bit as u16), value);
            }
        }
        restored_lr
    }

    fn dispatch_syscall(&mut self, number: u8) {
        let syscall = Syscall::from_number(number);
        let args = match syscall {
            Syscall::Print => SyscallArgs {
                string: Some(self.read_c_string(self.registers.get(RegisterId::R0) as u16)),
                registers: self.registers.r,
            },
            _ => SyscallArgs {
                string: None,
                registers: self.registers.r,
            },
        };

        if let Syscall::Reserved(n) = syscall {
            warn!(number = n, name = Syscall::reserved_name(n), "unsupported syscall");
        }

        if self.syscalls.send(SyscallRequest { syscall, args }).is_err() {
            warn!("syscall drainer disconnected, request dropped");
        }
    }

    fn read_c_string(&self, mut address: u16) -> String {
        let mut bytes = Vec::new();
        loop {
            let byte = self.memory.read_byte(address);
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            if address == u16::MAX {
                break;
            }
            address += 1;
        }
        String::from_utf8_lossy(&bytes).replace("\\n", "\n").replace("\\t", "\t")
    }

    pub fn reset_stack(&mut self) {
        self.registers.sp = STACK_TOP;
    }
}
