// This is where the dirty grunt work of making sense of the assembler's
// record stream happens. The loader writes straight into machine memory and
// metadata; it does not touch the registers.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::machine::Machine;

/// Malformed object programs are fatal; the driver maps this to a non-zero
/// exit status.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("object program does not start with a header record")]
    MissingHeader,
    #[error("invalid/missing record format ({0:?})")]
    InvalidRecord(char),
    #[error("invalid hex field {0:?}")]
    InvalidHex(String),
    #[error("object program is not ASCII")]
    NotAscii,
    #[error("unexpected end of object program")]
    UnexpectedEof,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn load_file<P: AsRef<Path>>(path: P, machine: &mut Machine) -> Result<(), LoadError> {
    let source = fs::read_to_string(path)?;
    load_str(&source, machine)
}

/// Parse a record stream: one header, then text/modification records in any
/// order, then the end record. Record separators are tolerated in between;
/// any other leading byte is fatal.
pub fn load_str(source: &str, machine: &mut Machine) -> Result<(), LoadError> {
    let mut records = Records::new(source);
    records.header(machine)?;
    loop {
        match records.next_tag() {
            None => return Ok(()),
            Some('T') => records.text(machine)?,
            Some('E') => records.end(machine)?,
            Some('M') => records.modification()?,
            Some('\n') | Some('\r') => continue,
            Some(other) => return Err(LoadError::InvalidRecord(other)),
        }
    }
}

struct Records<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Records<'a> {
    fn new(source: &'a str) -> Records<'a> {
        Records { bytes: source.as_bytes(), pos: 0 }
    }

    fn next_tag(&mut self) -> Option<char> {
        let byte = self.bytes.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte as char)
    }

    fn take(&mut self, count: usize) -> Result<&'a str, LoadError> {
        if self.pos + count > self.bytes.len() {
            return Err(LoadError::UnexpectedEof);
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        std::str::from_utf8(slice).map_err(|_| LoadError::NotAscii)
    }

    fn hex(&mut self, digits: usize) -> Result<u32, LoadError> {
        let field = self.take(digits)?;
        u32::from_str_radix(field, 16).map_err(|_| LoadError::InvalidHex(field.to_string()))
    }

    /// `H`, six name characters, six hex digits load address, six hex digits
    /// program length.
    fn header(&mut self, machine: &mut Machine) -> Result<(), LoadError> {
        info!("reading header record");
        match self.next_tag() {
            Some('H') => {}
            _ => return Err(LoadError::MissingHeader),
        }
        let name = self.take(6)?;
        machine.set_prog_name(name);
        debug!("set program name: {}", name);
        let code_address = self.hex(6)?;
        machine.set_code_address(code_address);
        debug!("set code address: {:#x}", code_address);
        let length = self.hex(6)?;
        machine.set_prog_length(length);
        debug!("set program length: {:#x}", length);
        Ok(())
    }

    /// Six hex digits start address, two hex digits byte count, then that
    /// many two-digit bytes written consecutively into memory.
    fn text(&mut self, machine: &mut Machine) -> Result<(), LoadError> {
        info!("reading text record");
        let start = self.hex(6)?;
        let count = self.hex(2)?;
        for offset in 0..count {
            let byte = self.hex(2)? as u8;
            machine.set_byte(start + offset, byte);
            debug!("mem[{:06x}]={:02x}", start + offset, byte);
        }
        Ok(())
    }

    /// Six hex digits entry point, stored as the initial PC for reset.
    fn end(&mut self, machine: &mut Machine) -> Result<(), LoadError> {
        info!("reading end record");
        let entry = self.hex(6)?;
        machine.set_prog_start(entry);
        debug!("set program start: {:#x}", entry);
        Ok(())
    }

    /// Parsed and discarded; the assembler fixes all addresses up front.
    fn modification(&mut self) -> Result<(), LoadError> {
        info!("reading modification record");
        let _address = self.hex(6)?;
        let _length = self.hex(2)?;
        Ok(())
    }
}
