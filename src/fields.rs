// Here reside the small field types decoded out of the instruction stream;
// rather than pass raw bit masks around, we keep them behind rich types and
// let the engine pattern match on them.

use std::cmp::Ordering;
use std::fmt;

/// The six addressing-mode flag bits n, i, x, b, p, e. A default-constructed
/// record is all zero, which is also the legacy-SIC encoding.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Nixbpe {
    n: bool,
    i: bool,
    x: bool,
    b: bool,
    p: bool,
    e: bool,
}

impl Nixbpe {
    pub fn new() -> Nixbpe {
        Nixbpe::default()
    }

    /// Whole-tuple view, used for pattern matching mode decisions.
    pub fn tuple(&self) -> (u8, u8, u8, u8, u8, u8) {
        (self.n as u8, self.i as u8, self.x as u8, self.b as u8, self.p as u8, self.e as u8)
    }

    pub fn n(&self) -> bool {
        self.n
    }
    pub fn i(&self) -> bool {
        self.i
    }
    pub fn x(&self) -> bool {
        self.x
    }
    pub fn b(&self) -> bool {
        self.b
    }
    pub fn p(&self) -> bool {
        self.p
    }
    pub fn e(&self) -> bool {
        self.e
    }

    pub fn set_n(&mut self, value: bool) {
        self.n = value;
    }
    pub fn set_i(&mut self, value: bool) {
        self.i = value;
    }
    pub fn set_x(&mut self, value: bool) {
        self.x = value;
    }
    pub fn set_b(&mut self, value: bool) {
        self.b = value;
    }
    pub fn set_p(&mut self, value: bool) {
        self.p = value;
    }
    pub fn set_e(&mut self, value: bool) {
        self.e = value;
    }
}

impl fmt::Display for Nixbpe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, i, x, b, p, e) = self.tuple();
        write!(f, "n={} i={} x={} b={} p={} e={}", n, i, x, b, p, e)
    }
}

/// The three-valued condition code held in the two low-order bits of SW.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cc {
    LT,
    EQ,
    GT,
}

impl Cc {
    pub fn bits(&self) -> u32 {
        match *self {
            Cc::LT => 0,
            Cc::EQ => 1,
            Cc::GT => 2,
        }
    }

    /// The bit pattern 0b11 is unused; it reads as GT to keep the decoding
    /// total.
    pub fn from_bits(sw: u32) -> Cc {
        match sw & 0x3 {
            0 => Cc::LT,
            1 => Cc::EQ,
            _ => Cc::GT,
        }
    }

    pub fn of(ordering: Ordering) -> Cc {
        match ordering {
            Ordering::Less => Cc::LT,
            Ordering::Equal => Cc::EQ,
            Ordering::Greater => Cc::GT,
        }
    }
}

impl fmt::Display for Cc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:?}", self))
    }
}
