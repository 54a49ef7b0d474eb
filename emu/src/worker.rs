//! The CPU worker: a background thread that owns the `Core` (registers,
//! flags, memory) exclusively once spawned. Every other thread — the REPL
//! on the main thread, the syscall drainer — only ever touches CPU state by
//! sending a `Command` and, where an answer is needed, waiting on a reply
//! channel. This is what lets `start`/`run` return to the prompt
//! immediately instead of blocking it: the worker loop keeps ticking on its
//! own after the halt gate is cleared, exactly the way the reference
//! emulator runs its CPU loop on a dedicated thread separate from the
//! command prompt.

use crate::error::{Error, Result};
use crate::loader;
use hexfile::Program;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::error;
use vcpu16::{Core, Flags, RegisterFile};

/// How long the worker sleeps between ticks while halted, so a quiescent
/// CPU doesn't spin the core it's pinned to.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// A consistent point-in-time copy of the register file and flags, handed
/// back to the REPL for `registers`/`sysinfo`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub registers: RegisterFile,
    pub flags: Flags,
}

pub enum Command {
    Start,
    SetPc(u16),
    Load {
        program: Program,
        reply: Sender<Result<u16>>,
    },
    Store {
        address: u16,
        bytes: Vec<u8>,
    },
    ReadRange {
        start: u16,
        end: u16,
        reply: Sender<Vec<u8>>,
    },
    Snapshot {
        reply: Sender<Snapshot>,
    },
}

/// A handle the REPL holds onto; the real `Core` lives only on the worker
/// thread this was spawned from.
#[derive(Clone)]
pub struct Handle {
    commands: SyncSender<Command>,
}

impl Handle {
    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn set_pc(&self, pc: u16) {
        self.send(Command::SetPc(pc));
    }

    pub fn load(&self, program: Program) -> Result<u16> {
        let (reply, rx) = std::sync::mpsc::channel();
        self.send(Command::Load { program, reply });
        rx.recv().unwrap_or_else(|_| {
            Err(Error::LoadFailure {
                path: std::path::PathBuf::from("<worker>"),
                reason: "CPU worker is gone".into(),
            })
        })
    }

    pub fn store(&self, address: u16, bytes: Vec<u8>) {
        self.send(Command::Store { address, bytes });
    }

    pub fn read_range(&self, start: u16, end: u16) -> Vec<u8> {
        let (reply, rx) = std::sync::mpsc::channel();
        self.send(Command::ReadRange { start, end, reply });
        rx.recv().unwrap_or_default()
    }

    pub fn snapshot(&self) -> Snapshot {
        let (reply, rx) = std::sync::mpsc::channel();
        self.send(Command::Snapshot { reply });
        rx.recv().unwrap_or(Snapshot {
            registers: RegisterFile::new(),
            flags: Flags::new(),
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            error!("CPU worker has shut down, command dropped");
        }
    }
}

/// Spawns the CPU worker thread. It runs until `shutdown` is observed,
/// ticking freely whenever the core isn't halted and draining queued
/// commands in between ticks — the only two things this thread ever does.
pub fn spawn(mut core: Core, shutdown: Arc<AtomicBool>) -> (Handle, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::sync_channel(64);
    let handle = Handle { commands: tx };

    let join = thread::spawn(move || loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }

        loop {
            match rx.try_recv() {
                Ok(command) => apply(&mut core, command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if core.flags.halted {
            thread::sleep(IDLE_POLL);
        } else if let Err(err) = core.tick() {
            error!(%err, "CPU worker halted on decode error");
        }
    });

    (handle, join)
}

fn apply(core: &mut Core, command: Command) {
    match command {
        Command::Start => core.start(),
        Command::SetPc(pc) => core.registers.pc = pc,
        Command::Load { program, reply } => {
            let result = loader::load(&mut core.memory, &program);
            let _ = reply.send(result);
        }
        Command::Store { address, bytes } => {
            let mut addr = address;
            for byte in bytes {
                vcpu16::memory::checked_write(&mut core.memory, addr, byte);
                addr = addr.wrapping_add(1);
            }
        }
        Command::ReadRange { start, end, reply } => {
            // Matches `start..=end`'s behavior: empty when `start > end`,
            // rather than always emitting at least the first byte.
            let mut bytes = Vec::new();
            if start <= end {
                let mut addr = start;
                loop {
                    bytes.push(core.memory.read_byte(addr));
                    if addr == end || addr == u16::MAX {
                        break;
                    }
                    addr += 1;
                }
            }
            let _ = reply.send(bytes);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(Snapshot {
                registers: core.registers.clone(),
                flags: core.flags,
            });
        }
    }
}
