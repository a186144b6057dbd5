// The closed catalogue of SIC/XE operations. Every opcode byte carries its
// format class with it, so dispatch is a compile-time-complete match instead
// of a run-time handler table.

use std::fmt;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    ADD = 0x18,
    ADDF = 0x58,
    ADDR = 0x90,
    AND = 0x40,
    CLEAR = 0xB4,
    COMP = 0x28,
    COMPF = 0x88,
    COMPR = 0xA0,
    DIV = 0x24,
    DIVF = 0x64,
    DIVR = 0x9C,
    FIX = 0xC4,
    FLOAT = 0xC0,
    HIO = 0xF4,
    J = 0x3C,
    JEQ = 0x30,
    JGT = 0x34,
    JLT = 0x38,
    JSUB = 0x48,
    LDA = 0x00,
    LDB = 0x68,
    LDCH = 0x50,
    LDF = 0x70,
    LDL = 0x08,
    LDS = 0x6C,
    LDT = 0x74,
    LDX = 0x04,
    LPS = 0xD0,
    MUL = 0x20,
    MULF = 0x60,
    MULR = 0x98,
    NORM = 0xC8,
    OR = 0x44,
    RD = 0xD8,
    RMO = 0xAC,
    RSUB = 0x4C,
    SHIFTL = 0xA4,
    SHIFTR = 0xA8,
    SIO = 0xF0,
    SSK = 0xEC,
    STA = 0x0C,
    STB = 0x78,
    STCH = 0x54,
    STF = 0x80,
    STI = 0xD4,
    STL = 0x14,
    STS = 0x7C,
    STSW = 0xE8,
    STT = 0x84,
    STX = 0x10,
    SUB = 0x1C,
    SUBF = 0x5C,
    SUBR = 0x94,
    SVC = 0xB0,
    TD = 0xE0,
    TIO = 0xF8,
    TIX = 0x2C,
    TIXR = 0xB8,
    WD = 0xDC,
}

/// Instruction format classes. SIC, F3 and F4 share one class because they
/// are distinguished only after the nixbpe bits have been read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    F1,
    F2,
    SicF3F4,
}

impl Opcode {
    /// Look up the opcode for an already masked byte (the two lowest bits of
    /// SIC/F3/F4 codes carry n and i and must be cleared by the caller).
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        match byte {
            0x18 => Some(Opcode::ADD),
            0x58 => Some(Opcode::ADDF),
            0x90 => Some(Opcode::ADDR),
            0x40 => Some(Opcode::AND),
            0xB4 => Some(Opcode::CLEAR),
            0x28 => Some(Opcode::COMP),
            0x88 => Some(Opcode::COMPF),
            0xA0 => Some(Opcode::COMPR),
            0x24 => Some(Opcode::DIV),
            0x64 => Some(Opcode::DIVF),
            0x9C => Some(Opcode::DIVR),
            0xC4 => Some(Opcode::FIX),
            0xC0 => Some(Opcode::FLOAT),
            0xF4 => Some(Opcode::HIO),
            0x3C => Some(Opcode::J),
            0x30 => Some(Opcode::JEQ),
            0x34 => Some(Opcode::JGT),
            0x38 => Some(Opcode::JLT),
            0x48 => Some(Opcode::JSUB),
            0x00 => Some(Opcode::LDA),
            0x68 => Some(Opcode::LDB),
            0x50 => Some(Opcode::LDCH),
            0x70 => Some(Opcode::LDF),
            0x08 => Some(Opcode::LDL),
            0x6C => Some(Opcode::LDS),
            0x74 => Some(Opcode::LDT),
            0x04 => Some(Opcode::LDX),
            0xD0 => Some(Opcode::LPS),
            0x20 => Some(Opcode::MUL),
            0x60 => Some(Opcode::MULF),
            0x98 => Some(Opcode::MULR),
            0xC8 => Some(Opcode::NORM),
            0x44 => Some(Opcode::OR),
            0xD8 => Some(Opcode::RD),
            0xAC => Some(Opcode::RMO),
            0x4C => Some(Opcode::RSUB),
            0xA4 => Some(Opcode::SHIFTL),
            0xA8 => Some(Opcode::SHIFTR),
            0xF0 => Some(Opcode::SIO),
            0xEC => Some(Opcode::SSK),
            0x0C => Some(Opcode::STA),
            0x78 => Some(Opcode::STB),
            0x54 => Some(Opcode::STCH),
            0x80 => Some(Opcode::STF),
            0xD4 => Some(Opcode::STI),
            0x14 => Some(Opcode::STL),
            0x7C => Some(Opcode::STS),
            0xE8 => Some(Opcode::STSW),
            0x84 => Some(Opcode::STT),
            0x10 => Some(Opcode::STX),
            0x1C => Some(Opcode::SUB),
            0x5C => Some(Opcode::SUBF),
            0x94 => Some(Opcode::SUBR),
            0xB0 => Some(Opcode::SVC),
            0xE0 => Some(Opcode::TD),
            0xF8 => Some(Opcode::TIO),
            0x2C => Some(Opcode::TIX),
            0xB8 => Some(Opcode::TIXR),
            0xDC => Some(Opcode::WD),
            _ => None,
        }
    }

    pub fn format(&self) -> Format {
        match *self {
            Opcode::FIX | Opcode::FLOAT | Opcode::HIO | Opcode::NORM | Opcode::SIO | Opcode::TIO => Format::F1,
            Opcode::ADDR
            | Opcode::CLEAR
            | Opcode::COMPR
            | Opcode::DIVR
            | Opcode::MULR
            | Opcode::RMO
            | Opcode::SHIFTL
            | Opcode::SHIFTR
            | Opcode::SUBR
            | Opcode::SVC
            | Opcode::TIXR => Format::F2,
            _ => Format::SicF3F4,
        }
    }

    /// Store and jump instructions want to operate on the target address
    /// itself, which changes how their parameter is resolved.
    pub fn is_store_or_jump(&self) -> bool {
        match *self {
            Opcode::STA
            | Opcode::STB
            | Opcode::STCH
            | Opcode::STF
            | Opcode::STL
            | Opcode::STS
            | Opcode::STSW
            | Opcode::STT
            | Opcode::STX
            | Opcode::J
            | Opcode::JEQ
            | Opcode::JGT
            | Opcode::JLT
            | Opcode::JSUB => true,
            _ => false,
        }
    }

    /// Instructions whose operand is a 48-bit float in memory. The three-byte
    /// parameter cannot hold the operand, so these resolve to its address and
    /// read the six bytes themselves.
    pub fn has_float_operand(&self) -> bool {
        match *self {
            Opcode::ADDF | Opcode::COMPF | Opcode::DIVF | Opcode::LDF | Opcode::MULF | Opcode::SUBF => true,
            _ => false,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:?}", self))
    }
}
