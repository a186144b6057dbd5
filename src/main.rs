use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, warn};

use sicsim::monitor::Monitor;
use sicsim::Emulator;

#[derive(Parser)]
#[command(name = "sicsim", version, about = "SIC/XE virtual machine")]
struct Args {
    /// Path to the assembled object program.
    obj_file: PathBuf,
    /// Front-end mode: "tui" for the stepping shell, "none" for headless
    /// execution.
    mode: Option<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut emulator = match Emulator::new(&args.obj_file) {
        Ok(emulator) => emulator,
        Err(err) => {
            error!("cannot load {}: {}", args.obj_file.display(), err);
            process::exit(1);
        }
    };

    let headless = match args.mode.as_deref() {
        Some("none") => true,
        Some("tui") | None => false,
        Some(other) => {
            warn!("front-end {:?} is not built in, falling back to the stepping shell", other);
            false
        }
    };

    if headless {
        emulator.run();
    } else if let Err(err) = Monitor::new().run(&mut emulator) {
        error!("cannot reload {}: {}", args.obj_file.display(), err);
        process::exit(1);
    }
}
