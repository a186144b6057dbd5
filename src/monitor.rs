// The plain-text stepping shell: a termion rendering of the machine state
// between cycles, line commands, breakpoints and clock pacing. State is only
// ever read at cycle boundaries.

use std::collections::HashSet;
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use termion::{clear, color, cursor};

use crate::conversions::frequency_to_period;
use crate::loader::LoadError;
use crate::machine::{Machine, MAX_ADDRESS};
use crate::Emulator;

/// Execute one cycle and sleep out the remainder of the machine's clock
/// period. Returns whether the machine still runs.
pub fn step_timed(machine: &mut Machine) -> bool {
    let started = Instant::now();
    let running = machine.step();
    let remaining = machine.clock_period() - started.elapsed().as_secs_f64();
    if remaining > 0.0 {
        thread::sleep(Duration::from_secs_f64(remaining));
    }
    running
}

#[derive(Clone, PartialEq)]
enum Command {
    Quit,
    Step,
    Continue,
    Reset,
    SetBreakpoint(Option<String>),
    DeleteBreakpoint(Option<String>),
    MemoryWindow(Option<String>),
    Frequency(Option<String>),
}

pub struct Monitor {
    breakpoints: HashSet<u32>,
    last_cmd: Command,
    mem_window: u32,
    mem_rows: usize,
    status: String,
}

impl Monitor {
    pub fn new() -> Monitor {
        Monitor {
            breakpoints: HashSet::new(),
            last_cmd: Command::Step,
            mem_window: 0,
            mem_rows: 10,
            status: String::new(),
        }
    }

    pub fn run(&mut self, emulator: &mut Emulator) -> Result<(), LoadError> {
        loop {
            self.draw(&emulator.machine);
            match self.get_command() {
                Command::Quit => return Ok(()),
                Command::Step => {
                    if emulator.machine.is_running() {
                        step_timed(&mut emulator.machine);
                    }
                }
                Command::Continue => {
                    while emulator.machine.is_running() && step_timed(&mut emulator.machine) {
                        if self.breakpoints.contains(&emulator.machine.pc()) {
                            self.status = format!("Breakpoint at {:05X}.", emulator.machine.pc());
                            break;
                        }
                    }
                }
                Command::Reset => {
                    emulator.reset()?;
                    self.status = String::from("Machine reset.");
                }
                Command::SetBreakpoint(address) => self.set_breakpoint(&address, false),
                Command::DeleteBreakpoint(address) => self.set_breakpoint(&address, true),
                Command::MemoryWindow(address) => match parse_address(&address) {
                    Some(address) if address <= MAX_ADDRESS => self.mem_window = address,
                    _ => self.status = String::from("Invalid address!"),
                },
                Command::Frequency(value) => {
                    let frequency = value.as_ref().and_then(|v| v.parse::<f64>().ok());
                    match frequency {
                        Some(frequency) => {
                            let period =
                                frequency_to_period(frequency, emulator.machine.clock_period());
                            emulator.machine.set_clock_period(period);
                            self.status = format!("Clock period set to {}s.", period);
                        }
                        None => self.status = String::from("Invalid frequency!"),
                    }
                }
            }
        }
    }

    fn set_breakpoint(&mut self, address: &Option<String>, delete: bool) {
        match parse_address(address) {
            Some(address) if address <= MAX_ADDRESS => {
                if delete {
                    self.breakpoints.remove(&address);
                    self.status = String::from("Breakpoint deleted.");
                } else {
                    self.breakpoints.insert(address);
                    self.status = String::from("Breakpoint created.");
                }
            }
            _ => self.status = String::from("Invalid address!"),
        }
    }

    fn get_command(&mut self) -> Command {
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return Command::Quit;
        }
        let mut cmd = input.split_whitespace();
        let command = match cmd.next() {
            Some("q") => Command::Quit,
            Some("s") | Some("n") => Command::Step,
            Some("c") => Command::Continue,
            Some("r") => Command::Reset,
            Some("b") => Command::SetBreakpoint(cmd.next().map(String::from)),
            Some("d") => Command::DeleteBreakpoint(cmd.next().map(String::from)),
            Some("m") => Command::MemoryWindow(cmd.next().map(String::from)),
            Some("f") => Command::Frequency(cmd.next().map(String::from)),
            _ => self.last_cmd.clone(),
        };
        self.last_cmd = command.clone();
        command
    }

    fn draw(&mut self, machine: &Machine) {
        print!("{c}{tl}", c = clear::All, tl = cursor::Goto(1, 1));
        println!("{}", machine.render_registers());
        println!("{}", machine.render_instructions());
        println!("{}", machine.render_memory(self.mem_window, self.mem_rows));
        if !machine.is_running() {
            println!("{r}Machine halted.{n}", r = color::Fg(color::Red), n = color::Fg(color::Reset));
        }
        if !self.breakpoints.is_empty() {
            let mut sorted: Vec<u32> = self.breakpoints.iter().copied().collect();
            sorted.sort();
            let rendered: Vec<String> = sorted.iter().map(|b| format!("{:05X}", b)).collect();
            println!("Breakpoints: {}", rendered.join(" "));
        }
        if !self.status.is_empty() {
            println!("{}", self.status);
            self.status.clear();
        }
        println!(
            "Enter s to single step, c to continue, b/d <addr> to set/delete a breakpoint at addr, \
             m <addr> to move the memory window, f <hz> to set the clock frequency, r to reset, q to quit."
        );
        print!("> ");
        io::stdout().flush().expect("");
    }
}

fn parse_address(address: &Option<String>) -> Option<u32> {
    match address {
        Some(address) => u32::from_str_radix(address, 16).ok(),
        None => None,
    }
}
