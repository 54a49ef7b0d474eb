#[macro_use]
extern crate clap;

use clap::Arg;
use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload};

/// Name of the emulator's log file, truncated fresh on every run.
const LOG_FILE: &str = "emlog.log";

/// A cloneable handle onto the (truncated-once) log file, so `fmt::layer`
/// can hand out a fresh `Write` impl per event without reopening the file.
#[derive(Clone)]
struct SharedLogFile(Arc<Mutex<File>>);

impl io::Write for SharedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("PROGRAM")
                .help("HEX file under ./harddrive to load on startup")
                .index(1),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Start with trace-level logging instead of warn-level"),
        )
        .get_matches();

    let initial_level = if matches.is_present("verbose") {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let (filter, log_handle) = reload::Layer::new(initial_level);
    let log_file = File::create(LOG_FILE)
        .unwrap_or_else(|err| panic!("could not create {}: {}", LOG_FILE, err));
    let log_file = SharedLogFile(Arc::new(Mutex::new(log_file)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(move || log_file.clone()).with_ansi(false))
        .init();

    let program = matches.value_of("PROGRAM");

    if let Err(err) = emu::run(program, Some(log_handle)) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
