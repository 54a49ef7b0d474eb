//! The syscall drainer: a dedicated thread that receives `SyscallRequest`s
//! from the CPU worker and performs their host-side effect. Syscalls are
//! observed in program order (the channel is a FIFO) and the drainer never
//! blocks the CPU worker — it only ever waits on its own receive.

use crate::worker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use vcpu16::{Syscall, SyscallRequest, END_MARKER};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drains `requests` until `shutdown` is set, performing each syscall's
/// host-side effect. `cpu` is how `Exit` forces `PC` past `END_MARKER`, the
/// only CPU state this thread ever touches. Returns once the channel is
/// disconnected or shutdown is observed.
pub fn run(requests: Receiver<SyscallRequest>, cpu: worker::Handle, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        match requests.recv_timeout(POLL_INTERVAL) {
            Ok(request) => handle(request, &cpu, &shutdown),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn handle(request: SyscallRequest, cpu: &worker::Handle, shutdown: &Arc<AtomicBool>) {
    match request.syscall {
        Syscall::Exit => {
            cpu.set_pc(END_MARKER.wrapping_add(1));
            shutdown.store(true, Ordering::Relaxed);
        }
        Syscall::Print => {
            if let Some(text) = request.args.string {
                print!("{}", text);
            }
        }
        Syscall::Uname => {
            println!("vcpu16 {}", env!("CARGO_PKG_VERSION"));
        }
        Syscall::Reserved(number) => {
            warn!(
                number,
                name = vcpu16::Syscall::reserved_name(number),
                "unsupported syscall, dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{channel, sync_channel};
    use std::time::{Duration as StdDuration, Instant};
    use vcpu16::{Core, SyscallArgs};

    fn idle_cpu() -> worker::Handle {
        let (tx, _rx) = sync_channel(8);
        let (handle, _join) = worker::spawn(Core::new(tx), Arc::new(AtomicBool::new(false)));
        handle
    }

    #[test]
    fn exit_syscall_sets_shutdown_and_forces_pc_past_end_marker() {
        let cpu = idle_cpu();
        let shutdown = Arc::new(AtomicBool::new(false));
        handle(
            SyscallRequest {
                syscall: Syscall::Exit,
                args: SyscallArgs {
                    string: None,
                    registers: [0; 4],
                },
            },
            &cpu,
            &shutdown,
        );
        assert!(shutdown.load(Ordering::Relaxed));

        let deadline = Instant::now() + StdDuration::from_secs(1);
        loop {
            let pc = cpu.snapshot().registers.pc;
            if pc == END_MARKER.wrapping_add(1) || Instant::now() > deadline {
                assert_eq!(pc, END_MARKER.wrapping_add(1));
                break;
            }
        }
    }

    #[test]
    fn run_returns_when_channel_disconnects() {
        let (tx, rx) = channel();
        drop(tx);
        let cpu = idle_cpu();
        let shutdown = Arc::new(AtomicBool::new(false));
        run(rx, cpu, shutdown);
    }
}
