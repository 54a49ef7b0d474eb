//! Loads and runs vcpu16 Intel HEX images.
//!
//! Three threads: the CPU worker (`worker`), which owns the `Core` exclusively
//! and ticks it freely whenever the halt gate is clear; the syscall drainer
//! (`syscall_host`); and the interactive command loop (`repl`, running on the
//! main thread), which only ever reaches CPU state through the worker's
//! `Handle`. `start`/`run` clears the halt gate and returns immediately — the
//! worker makes progress on its own afterwards, it is never ticked inline by
//! a REPL command. A `std::sync::mpsc::sync_channel` carries syscall requests
//! from the worker to the drainer, which holds its own `worker::Handle` so an
//! `EXIT` syscall can force `PC` past `END_MARKER` instead of merely flipping
//! the shutdown flag; an `Arc<AtomicBool>` exit flag is that shutdown signal,
//! polled by all three sides.

pub mod error;
pub mod loader;
pub mod repl;
pub mod sandbox;
pub mod syscall_host;
pub mod worker;

pub use error::{Error, Result};
pub use repl::{LogHandle, Outcome, Repl};

use sandbox::Sandbox;
use std::io::{self, BufRead, Write};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;
use vcpu16::Core;

const SYSCALL_QUEUE_DEPTH: usize = 64;

/// Wires up the CPU worker thread, the syscall drainer thread and the REPL
/// (main thread), then drives the REPL from `stdin` until a `shutdown`/
/// `exit` command or a disconnected input stream. A single `Arc<AtomicBool>`
/// exit event is the only thing both background threads share.
pub fn run(initial_program: Option<&str>, log: Option<LogHandle>) -> Result<()> {
    let (tx, rx) = sync_channel(SYSCALL_QUEUE_DEPTH);
    let shutdown = Arc::new(AtomicBool::new(false));

    let core = Core::new(tx);
    let (cpu, cpu_join) = worker::spawn(core, Arc::clone(&shutdown));

    let drainer = {
        let shutdown = Arc::clone(&shutdown);
        let cpu = cpu.clone();
        thread::spawn(move || syscall_host::run(rx, cpu, shutdown))
    };

    let sandbox = Sandbox::open()?;
    let mut repl = Repl::new(cpu, sandbox, log, Arc::clone(&shutdown));

    if let Some(path) = initial_program {
        repl.dispatch(&format!("load {}", path));
    }

    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if matches!(repl.dispatch(&line), Outcome::Exit) {
            break;
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    cpu_join.join().ok();
    drainer.join().ok();
    Ok(())
}
