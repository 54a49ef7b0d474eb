//! The command loop: a plain `match` over `command.split_whitespace()`, as
//! specified for the interactive shell prompt (an external collaborator
//! whose behavior is pinned only at this boundary). The REPL never touches
//! CPU state directly — every register/memory operation goes through the
//! [`worker::Handle`] it was given, since the `Core` itself lives
//! exclusively on the CPU worker thread.

use crate::sandbox::Sandbox;
use crate::worker;
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::reload;
use tracing_subscriber::Registry;

pub type LogHandle = reload::Handle<LevelFilter, Registry>;

pub enum Outcome {
    Continue,
    Exit,
}

pub struct Repl {
    cpu: worker::Handle,
    auto: bool,
    sandbox: Sandbox,
    log: Option<LogHandle>,
    shutdown: Arc<AtomicBool>,
}

fn parse_hex(token: &str) -> Option<u16> {
    u16::from_str_radix(token.trim_start_matches("0x"), 16).ok()
}

impl Repl {
    pub fn new(cpu: worker::Handle, sandbox: Sandbox, log: Option<LogHandle>, shutdown: Arc<AtomicBool>) -> Repl {
        Repl {
            cpu,
            auto: false,
            sandbox,
            log,
            shutdown,
        }
    }

    pub fn dispatch(&mut self, line: &str) -> Outcome {
        let mut tokens = line.split_whitespace();
        let command = match tokens.next() {
            Some(command) => command,
            None => return Outcome::Continue,
        };
        let args: Vec<&str> = tokens.collect();

        match command {
            // Clearing the halt gate is the whole of `start`/`run`: the CPU
            // worker picks the cleared flag up on its own and keeps ticking
            // in the background, so the prompt returns immediately instead
            // of blocking until the program halts.
            "start" | "run" => self.cpu.start(),
            "auto" => {
                self.auto = !self.auto;
                println!("auto-run: {}", self.auto);
            }
            "log" | "l" => self.toggle_log(),
            "mem" => self.dump_mem(&args),
            "store" => self.store(&args),
            "registers" => self.dump_registers(),
            "sysinfo" => self.sysinfo(),
            "load" => self.load(&args),
            "cd" => self.cd(&args),
            "ls" => self.ls(),
            "help" | "?" => print_help(),
            "shutdown" | "exit" => {
                self.shutdown.store(true, Ordering::Relaxed);
                return Outcome::Exit;
            }
            other => println!("unknown command: {:?} (try `help`)", other),
        }

        Outcome::Continue
    }

    fn toggle_log(&mut self) {
        let log = match &self.log {
            Some(log) => log,
            None => {
                println!("log toggling unavailable");
                return;
            }
        };
        let mut now_verbose = false;
        let _ = log.modify(|filter| {
            now_verbose = *filter == LevelFilter::WARN;
            *filter = if now_verbose {
                LevelFilter::TRACE
            } else {
                LevelFilter::WARN
            };
        });
        println!("log level: {}", if now_verbose { "trace" } else { "warn" });
    }

    fn dump_mem(&self, args: &[&str]) {
        let (start, end) = match (args.first().and_then(|a| parse_hex(a)), args.get(1).and_then(|a| parse_hex(a))) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                println!("usage: mem <hex-start> <hex-end>");
                return;
            }
        };
        for (offset, byte) in self.cpu.read_range(start, end).into_iter().enumerate() {
            println!("{:04X}: {:02X}", start.wrapping_add(offset as u16), byte);
        }
    }

    fn store(&mut self, args: &[&str]) {
        let mut iter = args.iter();
        let start = match iter.next().and_then(|a| parse_hex(a)) {
            Some(address) => address,
            None => {
                println!("usage: store <hex-address> <hex-byte>...");
                return;
            }
        };
        let mut bytes = Vec::with_capacity(iter.len());
        for token in iter {
            match parse_hex(token) {
                Some(value) => bytes.push(value as u8),
                None => {
                    println!("not a hex byte: {:?}", token);
                    return;
                }
            }
        }
        self.cpu.store(start, bytes);
    }

    fn dump_registers(&self) {
        let snapshot = self.cpu.snapshot();
        let registers = &snapshot.registers;
        println!(
            "R0={:02X} R1={:02X} R2={:02X} R3={:02X} LR={:02X} SP={:04X} PC={:04X}",
            registers.r[0], registers.r[1], registers.r[2], registers.r[3], registers.lr, registers.sp, registers.pc
        );
        println!(
            "Z={} V={} C={} I={}",
            snapshot.flags.zero, snapshot.flags.overflow, snapshot.flags.carry, snapshot.flags.halted
        );
    }

    fn sysinfo(&self) {
        self.dump_registers();
        println!("time: {}", Local::now().to_rfc3339());
    }

    fn load(&mut self, args: &[&str]) {
        let path = match args.first() {
            Some(path) => path,
            None => {
                println!("usage: load <path>");
                return;
            }
        };
        let resolved = match self.sandbox.resolve(path) {
            Ok(path) => path,
            Err(err) => {
                println!("{}", err);
                return;
            }
        };
        let program = match hexfile::read_file(&resolved) {
            Ok(program) => program,
            Err(err) => {
                println!("loading {}: {}", resolved.display(), err);
                return;
            }
        };
        match self.cpu.load(program) {
            Ok(slot) => {
                self.cpu.set_pc(slot);
                println!("loaded at {:04X}", slot);
                if self.auto {
                    self.cpu.start();
                }
            }
            Err(err) => println!("{}", err),
        }
    }

    fn cd(&mut self, args: &[&str]) {
        match args.first() {
            Some(dir) => match self.sandbox.cd(dir) {
                Ok(()) => println!("{}", self.sandbox.cwd().display()),
                Err(err) => println!("{}", err),
            },
            None => println!("usage: cd <dir>"),
        }
    }

    fn ls(&self) {
        match self.sandbox.ls() {
            Ok(names) => names.iter().for_each(|name| println!("{}", name)),
            Err(err) => println!("{}", err),
        }
    }
}

fn print_help() {
    println!("start/run       clear the halt gate; the CPU worker runs in the background");
    println!("auto            toggle auto-run after load");
    println!("log/l           toggle trace-level logging");
    println!("mem A B         dump memory from A to B (hex, inclusive)");
    println!("store A B...    write bytes B... starting at address A (hex)");
    println!("registers       dump registers and flags");
    println!("sysinfo         dump registers and the current time");
    println!("load PATH       load a HEX file from ./harddrive");
    println!("cd DIR / ls     navigate the harddrive sandbox");
    println!("help/?          print this message");
    println!("shutdown/exit   signal the exit event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;
    use vcpu16::Core;

    fn repl() -> (Repl, Arc<AtomicBool>) {
        let dir = tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let (tx, _rx) = sync_channel(8);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (cpu, _join) = worker::spawn(Core::new(tx), Arc::clone(&shutdown));
        (
            Repl::new(cpu, Sandbox::open().unwrap(), None, Arc::clone(&shutdown)),
            shutdown,
        )
    }

    fn eventually(mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while !check() {
            if Instant::now() > deadline {
                panic!("condition never became true");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn store_then_mem_round_trips_a_byte() {
        let (mut r, shutdown) = repl();
        r.dispatch("store ad 2a");
        eventually(|| r.cpu.read_range(0xAD, 0xAD) == vec![0x2A]);
        shutdown.store(true, Ordering::Relaxed);
    }

    #[test]
    fn exit_signals_shutdown() {
        let (mut r, shutdown) = repl();
        assert!(matches!(r.dispatch("exit"), Outcome::Exit));
        assert!(shutdown.load(Ordering::Relaxed));
    }

    #[test]
    fn auto_toggles() {
        let (mut r, shutdown) = repl();
        assert!(!r.auto);
        r.dispatch("auto");
        assert!(r.auto);
        shutdown.store(true, Ordering::Relaxed);
    }

    #[test]
    fn unknown_command_does_not_exit() {
        let (mut r, shutdown) = repl();
        assert!(matches!(r.dispatch("frobnicate"), Outcome::Continue));
        shutdown.store(true, Ordering::Relaxed);
    }
}
