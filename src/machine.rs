// The machine proper: memory, the register file, the device bank and the
// fetch/decode/execute engine with its addressing-mode resolution. In-cycle
// errors are reported and recovered; only the loader may abort the process.

use std::collections::VecDeque;
use std::fmt;

use log::{debug, error, info};

use crate::conversions::{bytes_to_float, float_to_bytes, sign_extend, u32_to_word, word_to_u32, FLOAT_BYTES};
use crate::devices::{device_file_name, Device, FileDevice, RandomDevice, StreamDevice, TimerDevice};
use crate::fields::Nixbpe;
use crate::instructions;
use crate::opcodes::{Format, Opcode};

pub use crate::fields::Cc;

pub const MIN_ADDRESS: u32 = 0x00000;
pub const MAX_ADDRESS: u32 = 0xFFFFF;
pub const MEMORY_SIZE: usize = (MAX_ADDRESS as usize) + 1;
pub const REGISTER_MASK: u32 = 0xFFFFFF;
pub const DEVICE_COUNT: usize = 256;

// A, X, L, B, S, T, reserved, reserved, PC, SW.
const REGISTER_COUNT: usize = 10;
const HISTORY_DEPTH: usize = 10;
const HISTORY_WIDTH: usize = 40;

pub struct Machine {
    mem: Vec<u8>,
    registers: [u32; REGISTER_COUNT],
    reg_f: f64,
    devices: Vec<Option<Box<dyn Device>>>,
    prog_name: String,
    code_address: u32,
    prog_length: u32,
    prog_start: u32,
    running: bool,
    clock_period: f64,
    history: VecDeque<String>,
}

impl Machine {
    pub fn new() -> Machine {
        let mut devices: Vec<Option<Box<dyn Device>>> = (0..DEVICE_COUNT).map(|_| None).collect();
        devices[0] = Some(Box::new(StreamDevice::Stdin));
        devices[1] = Some(Box::new(StreamDevice::Stdout));
        devices[2] = Some(Box::new(StreamDevice::Stderr));
        devices[3] = Some(Box::new(RandomDevice));
        devices[4] = Some(Box::new(TimerDevice::new()));
        Machine {
            mem: vec![0; MEMORY_SIZE],
            registers: [0; REGISTER_COUNT],
            reg_f: 0.0,
            devices,
            prog_name: String::new(),
            code_address: 0,
            prog_length: 0,
            prog_start: 0,
            running: true,
            clock_period: 0.0,
            history: VecDeque::with_capacity(HISTORY_DEPTH),
        }
    }

    // Program metadata, set by the loader and consumed on reset.

    pub fn prog_name(&self) -> &str {
        &self.prog_name
    }
    pub fn code_address(&self) -> u32 {
        self.code_address
    }
    pub fn prog_length(&self) -> u32 {
        self.prog_length
    }
    pub fn prog_start(&self) -> u32 {
        self.prog_start
    }
    pub fn set_prog_name(&mut self, name: &str) {
        self.prog_name = name.to_string();
    }
    pub fn set_code_address(&mut self, address: u32) {
        self.code_address = address;
    }
    pub fn set_prog_length(&mut self, length: u32) {
        self.prog_length = length;
    }
    pub fn set_prog_start(&mut self, entry: u32) {
        self.prog_start = entry;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }
    pub fn clock_period(&self) -> f64 {
        self.clock_period
    }
    pub fn set_clock_period(&mut self, period: f64) {
        self.clock_period = period;
    }

    // Named register accessors. All writes wrap modulo 2^24.

    pub fn a(&self) -> u32 {
        self.registers[0]
    }
    pub fn x(&self) -> u32 {
        self.registers[1]
    }
    pub fn l(&self) -> u32 {
        self.registers[2]
    }
    pub fn b(&self) -> u32 {
        self.registers[3]
    }
    pub fn s(&self) -> u32 {
        self.registers[4]
    }
    pub fn t(&self) -> u32 {
        self.registers[5]
    }
    pub fn f(&self) -> f64 {
        self.reg_f
    }
    pub fn pc(&self) -> u32 {
        self.registers[8]
    }
    pub fn sw(&self) -> u32 {
        self.registers[9]
    }

    pub fn set_a(&mut self, value: u32) {
        self.registers[0] = value & REGISTER_MASK;
    }
    pub fn set_x(&mut self, value: u32) {
        self.registers[1] = value & REGISTER_MASK;
    }
    pub fn set_l(&mut self, value: u32) {
        self.registers[2] = value & REGISTER_MASK;
    }
    pub fn set_b(&mut self, value: u32) {
        self.registers[3] = value & REGISTER_MASK;
    }
    pub fn set_s(&mut self, value: u32) {
        self.registers[4] = value & REGISTER_MASK;
    }
    pub fn set_t(&mut self, value: u32) {
        self.registers[5] = value & REGISTER_MASK;
    }
    pub fn set_f(&mut self, value: f64) {
        self.reg_f = value;
    }
    pub fn set_pc(&mut self, value: u32) {
        self.registers[8] = value & REGISTER_MASK;
    }
    pub fn set_sw(&mut self, value: u32) {
        self.registers[9] = value & REGISTER_MASK;
    }

    /// Indexed register access, as used by the format 2 instructions. The
    /// indices 0..=5 name A, X, L, B, S, T; 8 is PC and 9 is SW. F is not
    /// reachable by index.
    pub fn reg(&self, index: usize) -> u32 {
        if index < REGISTER_COUNT {
            self.registers[index]
        } else {
            error!("invalid register index ({})", index);
            0
        }
    }

    pub fn set_reg(&mut self, index: usize, value: u32) {
        if index < REGISTER_COUNT {
            self.registers[index] = value & REGISTER_MASK;
        } else {
            error!("invalid register index ({})", index);
        }
    }

    pub fn cc(&self) -> Cc {
        Cc::from_bits(self.sw())
    }

    pub fn set_cc(&mut self, cc: Cc) {
        self.set_sw((self.sw() & !0x3) | cc.bits());
    }

    // Memory accessors. Out-of-range accesses are reported; reads yield
    // zeros and writes are dropped.

    pub fn get_byte(&self, address: u32) -> u8 {
        if address <= MAX_ADDRESS {
            self.mem[address as usize]
        } else {
            error!("invalid address ({:#x})", address);
            0x00
        }
    }

    pub fn set_byte(&mut self, address: u32, value: u8) {
        if address <= MAX_ADDRESS {
            self.mem[address as usize] = value;
        } else {
            error!("invalid address ({:#x})", address);
        }
    }

    /// Three consecutive bytes, big-endian, as an unsigned 24-bit value.
    pub fn get_word(&self, address: u32) -> u32 {
        if address > MAX_ADDRESS - 2 {
            error!("invalid address ({:#x})", address);
            return 0;
        }
        let base = address as usize;
        word_to_u32([self.mem[base], self.mem[base + 1], self.mem[base + 2]])
    }

    pub fn set_word(&mut self, address: u32, value: u32) {
        if address > MAX_ADDRESS - 2 {
            error!("invalid address ({:#x})", address);
            return;
        }
        let word = u32_to_word(value);
        let base = address as usize;
        self.mem[base..base + 3].copy_from_slice(&word);
    }

    pub fn get_float(&self, address: u32) -> f64 {
        if address > MAX_ADDRESS - (FLOAT_BYTES as u32 - 1) {
            error!("invalid address ({:#x})", address);
            return 0.0;
        }
        let base = address as usize;
        let mut bytes = [0u8; FLOAT_BYTES];
        bytes.copy_from_slice(&self.mem[base..base + FLOAT_BYTES]);
        bytes_to_float(&bytes)
    }

    pub fn set_float(&mut self, address: u32, value: f64) {
        if address > MAX_ADDRESS - (FLOAT_BYTES as u32 - 1) {
            error!("invalid address ({:#x})", address);
            return;
        }
        let bytes = float_to_bytes(value);
        let base = address as usize;
        self.mem[base..base + FLOAT_BYTES].copy_from_slice(&bytes);
    }

    // Device bank. Slots 0..=4 are pre-bound; any other slot is instantiated
    // as a file-backed device on first reference.

    pub fn device(&mut self, id: u8) -> Option<&mut dyn Device> {
        match self.devices[id as usize].as_mut() {
            Some(device) => Some(device.as_mut()),
            None => None,
        }
    }

    pub fn set_device(&mut self, id: u8, device: Box<dyn Device>) {
        self.devices[id as usize] = Some(device);
    }

    pub fn ensure_device(&mut self, id: u8) -> &mut dyn Device {
        self.devices[id as usize]
            .get_or_insert_with(|| Box::new(FileDevice::open(device_file_name(id))))
            .as_mut()
    }

    // Instruction history ring, consumed by the front-ends.

    pub fn add_instruction_line(&mut self, line: String) {
        if self.history.len() >= HISTORY_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back(format!("{:<width$}", line, width = HISTORY_WIDTH));
    }

    pub fn render_instructions(&self) -> String {
        let mut out = String::new();
        for line in &self.history {
            out.push_str(line);
            out.push('\n');
        }
        out.to_uppercase()
    }

    pub fn render_registers(&self) -> String {
        let line_width = 30;
        let float_bytes = float_to_bytes(self.f());
        let mut float_hex = String::new();
        for byte in &float_bytes {
            float_hex.push_str(&format!("{:02x}", byte));
        }
        let lines = [
            format!("A:  {:06x} X: {:06x} L: {:06x}", self.a(), self.x(), self.l()),
            format!("S:  {:06x} T: {:06x} B: {:06x}", self.s(), self.t(), self.b()),
            format!("SW: {:06x} F: {}", self.sw(), float_hex),
            format!("PC: {:06x} F: {:+12.3}", self.pc(), self.f()),
        ];
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(&format!("{:<width$}\n", line, width = line_width));
        }
        out.to_uppercase()
    }

    /// Hex dump of `rows` rows of sixteen bytes starting at `start`. An
    /// invalid span is reported and yields an empty string.
    pub fn render_memory(&self, start: u32, rows: usize) -> String {
        let row_width = 16;
        if rows < 1 {
            error!("number of rows is not a positive integer ({})", rows);
            return String::new();
        }
        let end = start as u64 + rows as u64 * row_width as u64 - 1;
        if start > MAX_ADDRESS || end > MAX_ADDRESS as u64 {
            error!("invalid memory span: start={:#x}, end={:#x}", start, end);
            return String::new();
        }
        let mut out = String::new();
        for row in 0..rows {
            let address = start + (row * row_width) as u32;
            out.push_str(&format!("{:05x} ", address));
            let bytes: Vec<String> =
                (0..row_width).map(|j| format!("{:02x}", self.get_byte(address + j as u32))).collect();
            out.push_str(&bytes.join(" "));
            out.push('\n');
        }
        out.to_uppercase()
    }

    // The fetch/decode/execute engine.

    fn fetch(&mut self) -> u8 {
        let pc = self.pc();
        let byte = self.get_byte(pc);
        self.set_pc(pc.wrapping_add(1));
        byte
    }

    /// One full cycle: fetch, classify the format, decode the addressing
    /// bits and operand, resolve the parameter and dispatch. Decode errors
    /// abort the cycle with PC left after the consumed bytes.
    pub fn execute(&mut self) {
        let byte1 = self.fetch();
        debug!("byte1: {:#04x}", byte1);

        let opcode = match Opcode::from_u8(byte1 & 0xFC) {
            Some(opcode) => opcode,
            None => {
                error!("invalid opcode ({:#04x})", byte1);
                return;
            }
        };

        match opcode.format() {
            Format::F1 => {
                info!("instruction format: F1");
                self.add_instruction_line(format!("{:3}: {:6}", "F1", opcode));
                instructions::exec_f1(self, opcode);
            }
            Format::F2 => {
                info!("instruction format: F2");
                let byte2 = self.fetch();
                debug!("byte2: {:#04x}", byte2);
                let r1 = (byte2 >> 4) as usize;
                let r2 = (byte2 & 0x0F) as usize;
                self.add_instruction_line(format!("{:3}: {:6} r1={:1} r2={:1}", "F2", opcode, r1, r2));
                instructions::exec_f2(self, opcode, r1, r2);
            }
            Format::SicF3F4 => self.execute_sic_f3_f4(byte1, opcode),
        }
    }

    fn execute_sic_f3_f4(&mut self, byte1: u8, opcode: Opcode) {
        let mut nixbpe = Nixbpe::new();
        let operand;
        let signed_operand;

        if byte1 & 0x03 == 0 {
            // Legacy SIC: a 15-bit operand, the top bit of byte 2 is x.
            info!("instruction format: SIC");
            let byte2 = self.fetch();
            debug!("byte2: {:#04x}", byte2);
            nixbpe.set_x(byte2 & 0x80 != 0);
            let byte3 = self.fetch();
            debug!("byte3: {:#04x}", byte3);
            operand = (((byte2 & 0x7F) as u32) << 8) | byte3 as u32;
            signed_operand = sign_extend(operand, 15);
        } else {
            nixbpe.set_i(byte1 & 0x01 != 0);
            nixbpe.set_n(byte1 & 0x02 != 0);
            let byte2 = self.fetch();
            debug!("byte2: {:#04x}", byte2);
            nixbpe.set_x(byte2 & 0x80 != 0);
            nixbpe.set_b(byte2 & 0x40 != 0);
            nixbpe.set_p(byte2 & 0x20 != 0);
            nixbpe.set_e(byte2 & 0x10 != 0);
            let byte3 = self.fetch();
            debug!("byte3: {:#04x}", byte3);
            if nixbpe.e() {
                info!("instruction format: F4");
                let byte4 = self.fetch();
                debug!("byte4: {:#04x}", byte4);
                operand = (((byte2 & 0x0F) as u32) << 16) | ((byte3 as u32) << 8) | byte4 as u32;
                signed_operand = sign_extend(operand, 20);
            } else {
                info!("instruction format: F3");
                operand = (((byte2 & 0x0F) as u32) << 8) | byte3 as u32;
                signed_operand = sign_extend(operand, 12);
            }
        }

        // Indexing combined with immediate or indirect addressing is
        // rejected before anything is resolved.
        if nixbpe.x() && nixbpe.n() != nixbpe.i() {
            error!("indexing cannot be used with immediate or indirect addressing modes");
            return;
        }

        debug!("operand: {:#x} (signed {})", operand, signed_operand);

        let target_address = match self.target_address(&nixbpe, operand, signed_operand) {
            Some(target_address) => target_address,
            None => return,
        };
        debug!("target address: {:#x}", target_address);

        let parameter = self.finalised_parameter(opcode, &nixbpe, target_address);
        debug!("finalised parameter: {:02x?}", parameter);

        self.add_instruction_line(describe_instruction(&nixbpe, opcode, operand));
        instructions::exec_sic_f3_f4(self, opcode, nixbpe, parameter);
    }

    /// Base-, PC- or direct-mode target address, reduced modulo 2^20 after
    /// optional indexing. PC has already advanced past the instruction.
    fn target_address(&self, nixbpe: &Nixbpe, operand: u32, signed_operand: i32) -> Option<u32> {
        let base = match nixbpe.tuple() {
            (0, 0, _, _, _, _) => {
                info!("using direct addressing (legacy SIC)");
                operand as i64
            }
            (_, _, _, 1, 0, _) => {
                info!("using base-relative addressing");
                self.b() as i64 + operand as i64
            }
            (_, _, _, 0, 1, _) => {
                info!("using PC-relative addressing");
                self.pc() as i64 + signed_operand as i64
            }
            (_, _, _, 0, 0, _) => {
                info!("using direct addressing");
                operand as i64
            }
            _ => {
                error!("invalid combination of b and p bits (b={}, p={})", nixbpe.b() as u8, nixbpe.p() as u8);
                return None;
            }
        };
        let indexed = if nixbpe.x() { base + self.x() as i64 } else { base };
        Some(indexed.rem_euclid(1 << 20) as u32)
    }

    /// The three-byte value handed to the instruction semantics. Store and
    /// jump instructions, and the instructions whose operand is a float in
    /// memory, want the address itself: for them only the indirect tuple
    /// dereferences, everything else passes the target address through.
    fn finalised_parameter(&self, opcode: Opcode, nixbpe: &Nixbpe, target_address: u32) -> [u8; 3] {
        if opcode.is_store_or_jump() || opcode.has_float_operand() {
            info!("address-operand instruction -> implicit level of indirection");
            return match nixbpe.tuple() {
                (1, 0, _, _, _, _) => {
                    info!("using simple addressing");
                    u32_to_word(self.get_word(target_address))
                }
                _ => {
                    info!("using immediate addressing");
                    u32_to_word(target_address)
                }
            };
        }
        match nixbpe.tuple() {
            (1, 0, _, _, _, _) => {
                info!("using indirect addressing");
                let dereferenced = self.get_word(target_address);
                if dereferenced > MAX_ADDRESS {
                    error!("value after single dereference is over 20 bits ({:#x})", dereferenced);
                    [0; 3]
                } else {
                    u32_to_word(self.get_word(dereferenced))
                }
            }
            (0, 1, _, _, _, _) => {
                info!("using immediate addressing");
                u32_to_word(target_address)
            }
            _ => {
                info!("using simple addressing");
                u32_to_word(self.get_word(target_address))
            }
        }
    }

    /// One driver step: execute a cycle and detect the halt condition (PC
    /// unchanged across the cycle). Returns whether the machine still runs.
    pub fn step(&mut self) -> bool {
        let before = self.pc();
        self.execute();
        if self.pc() == before {
            info!("infinite loop -> halt");
            self.running = false;
        }
        self.running
    }
}

/// Disassembly-like line for the instruction history ring.
fn describe_instruction(nixbpe: &Nixbpe, opcode: Opcode, operand: u32) -> String {
    let format = match nixbpe.tuple() {
        (0, 0, _, _, _, _) => "SIC",
        (_, _, _, _, _, 1) => "F4",
        _ => "F3",
    };
    let relative = match (nixbpe.b(), nixbpe.p()) {
        (true, false) => "B +",
        (false, true) => "PC +",
        (false, false) => "Abs:",
        _ => "",
    };
    let mode = match (nixbpe.n(), nixbpe.i()) {
        (true, false) => "@Indirect",
        (false, true) => "#Immediate",
        (true, true) => " Simple",
        (false, false) => " SIC",
    };
    let index = if nixbpe.x() { ",X" } else { "" };
    format!("{:3}: {:6} {} {:06x}{}, {}", format, opcode, relative, operand, index, mode)
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}\n{}", self.render_registers(), self.render_instructions(), self.render_memory(0, 10))
    }
}
