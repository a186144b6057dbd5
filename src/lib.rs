use std::path::{Path, PathBuf};

pub mod conversions;
pub mod devices;
pub mod fields;
mod instructions;
pub mod loader;
pub mod machine;
pub mod monitor;
pub mod opcodes;

use loader::LoadError;
use machine::Machine;

/// A machine bound to the object program it was loaded from, so that it can
/// be reset from scratch.
pub struct Emulator {
    pub machine: Machine,
    program: PathBuf,
}

impl Emulator {
    pub fn new<P: AsRef<Path>>(program: P) -> Result<Emulator, LoadError> {
        let mut machine = Machine::new();
        loader::load_file(&program, &mut machine)?;
        machine.set_pc(machine.prog_start());
        Ok(Emulator { machine, program: program.as_ref().to_path_buf() })
    }

    /// Rebuild the machine from scratch, run the loader again and seed PC
    /// from the recorded entry point. The clock period survives the reset.
    pub fn reset(&mut self) -> Result<(), LoadError> {
        let clock_period = self.machine.clock_period();
        let mut machine = Machine::new();
        loader::load_file(&self.program, &mut machine)?;
        machine.set_pc(machine.prog_start());
        machine.set_clock_period(clock_period);
        self.machine = machine;
        Ok(())
    }

    /// Run headless until the halt condition, honouring the clock period.
    pub fn run(&mut self) {
        while monitor::step_timed(&mut self.machine) {}
    }
}
