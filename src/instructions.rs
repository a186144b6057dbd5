// Instruction semantics. The engine has already resolved the finalised
// parameter; the bodies below only mutate machine state through its
// accessors, which wrap register writes modulo 2^24 and range-check memory.

use log::error;

use crate::conversions::{sign_extend, word_to_i32, word_to_u32};
use crate::fields::{Cc, Nixbpe};
use crate::machine::Machine;
use crate::opcodes::Opcode;

pub(crate) fn exec_f1(m: &mut Machine, opcode: Opcode) {
    match opcode {
        Opcode::FIX => {
            let truncated = m.f() as i64;
            m.set_a(truncated.rem_euclid(1 << 24) as u32);
        }
        Opcode::FLOAT => m.set_f(m.a() as f64),
        // Recognised, no state change.
        Opcode::HIO | Opcode::NORM | Opcode::SIO | Opcode::TIO => {}
        _ => error!("opcode {} is not a format 1 instruction", opcode),
    }
}

pub(crate) fn exec_f2(m: &mut Machine, opcode: Opcode, r1: usize, r2: usize) {
    match opcode {
        Opcode::ADDR => m.set_reg(r2, m.reg(r2).wrapping_add(m.reg(r1))),
        Opcode::SUBR => m.set_reg(r2, m.reg(r2).wrapping_sub(m.reg(r1))),
        Opcode::MULR => m.set_reg(r2, m.reg(r2).wrapping_mul(m.reg(r1))),
        Opcode::DIVR => {
            let divisor = m.reg(r1);
            if divisor == 0 {
                panic!("division by zero");
            }
            m.set_reg(r2, m.reg(r2) / divisor);
        }
        Opcode::CLEAR => m.set_reg(r1, 0),
        Opcode::RMO => m.set_reg(r2, m.reg(r1)),
        Opcode::COMPR => {
            let diff = sign_extend(m.reg(r1), 24) as i64 - sign_extend(m.reg(r2), 24) as i64;
            m.set_cc(Cc::of(diff.cmp(&0)));
        }
        // The shift count is the raw second nibble; the result is not masked
        // here, the register setter wraps it.
        Opcode::SHIFTL => m.set_reg(r1, ((m.reg(r1) as u64) << r2) as u32),
        Opcode::SHIFTR => m.set_reg(r1, m.reg(r1) >> r2),
        Opcode::TIXR => {
            m.set_x(m.x().wrapping_add(1));
            let diff = sign_extend(m.x(), 24) as i64 - sign_extend(m.reg(r1), 24) as i64;
            m.set_cc(Cc::of(diff.cmp(&0)));
        }
        // Recognised, no state change.
        Opcode::SVC => {}
        _ => error!("opcode {} is not a format 2 instruction", opcode),
    }
}

pub(crate) fn exec_sic_f3_f4(m: &mut Machine, opcode: Opcode, nixbpe: Nixbpe, parameter: [u8; 3]) {
    let unsigned = word_to_u32(parameter);
    match opcode {
        Opcode::ADD => m.set_a(m.a().wrapping_add(unsigned)),
        Opcode::AND => m.set_a(m.a() & unsigned),
        Opcode::COMP => {
            let diff = sign_extend(m.a(), 24) as i64 - word_to_i32(parameter) as i64;
            m.set_cc(Cc::of(diff.cmp(&0)));
        }
        Opcode::DIV => {
            if unsigned == 0 {
                panic!("division by zero");
            }
            m.set_a(m.a() / unsigned);
        }
        Opcode::MUL => m.set_a(m.a().wrapping_mul(unsigned)),
        Opcode::OR => m.set_a(m.a() | unsigned),
        Opcode::SUB => m.set_a(m.a().wrapping_sub(unsigned)),

        Opcode::J => m.set_pc(unsigned),
        Opcode::JEQ => {
            if m.cc() == Cc::EQ {
                m.set_pc(unsigned);
            }
        }
        Opcode::JGT => {
            if m.cc() == Cc::GT {
                m.set_pc(unsigned);
            }
        }
        Opcode::JLT => {
            if m.cc() == Cc::LT {
                m.set_pc(unsigned);
            }
        }
        Opcode::JSUB => {
            m.set_l(m.pc());
            m.set_pc(unsigned);
        }
        Opcode::RSUB => m.set_pc(m.l()),

        Opcode::LDA => m.set_a(unsigned),
        Opcode::LDB => m.set_b(unsigned),
        Opcode::LDL => m.set_l(unsigned),
        Opcode::LDS => m.set_s(unsigned),
        Opcode::LDT => m.set_t(unsigned),
        Opcode::LDX => m.set_x(unsigned),
        Opcode::LDCH => {
            // Under immediate addressing the parameter already holds the
            // literal, so the byte sits at the other end.
            let byte = match nixbpe.tuple() {
                (0, 1, _, _, _, _) => parameter[2],
                _ => parameter[0],
            };
            m.set_a((m.a() & 0xFFFF00) | byte as u32);
        }

        Opcode::STA => m.set_word(unsigned, m.a()),
        Opcode::STB => m.set_word(unsigned, m.b()),
        Opcode::STCH => m.set_byte(unsigned, m.a() as u8),
        Opcode::STL => m.set_word(unsigned, m.l()),
        Opcode::STS => m.set_word(unsigned, m.s()),
        Opcode::STSW => m.set_word(unsigned, m.sw()),
        Opcode::STT => m.set_word(unsigned, m.t()),
        Opcode::STX => m.set_word(unsigned, m.x()),

        Opcode::TIX => {
            m.set_x(m.x().wrapping_add(1));
            let diff = sign_extend(m.x(), 24) as i64 - word_to_i32(parameter) as i64;
            m.set_cc(Cc::of(diff.cmp(&0)));
        }

        Opcode::RD => rd(m, &nixbpe, parameter),
        Opcode::TD => td(m, &nixbpe, parameter),
        Opcode::WD => wd(m, &nixbpe, parameter),

        Opcode::LDF => {
            let value = m.get_float(unsigned);
            m.set_f(value);
        }
        Opcode::ADDF => {
            let value = m.get_float(unsigned);
            m.set_f(m.f() + value);
        }
        Opcode::SUBF => {
            let value = m.get_float(unsigned);
            m.set_f(m.f() - value);
        }
        Opcode::MULF => {
            let value = m.get_float(unsigned);
            m.set_f(m.f() * value);
        }
        Opcode::DIVF => {
            let value = m.get_float(unsigned);
            m.set_f(m.f() / value);
        }
        Opcode::COMPF => {
            let value = m.get_float(unsigned);
            let cc = if m.f() > value {
                Cc::GT
            } else if m.f() < value {
                Cc::LT
            } else {
                Cc::EQ
            };
            m.set_cc(cc);
        }
        Opcode::STF => m.set_float(unsigned, m.f()),

        // Recognised, no state change.
        Opcode::LPS | Opcode::SSK | Opcode::STI => {}
        _ => error!("opcode {} is not a SIC, format 3 or format 4 instruction", opcode),
    }
}

/// The device id byte of RD/TD/WD: the last parameter byte under immediate
/// addressing, the first otherwise.
fn device_id(nixbpe: &Nixbpe, parameter: [u8; 3]) -> u8 {
    match nixbpe.tuple() {
        (0, 1, _, _, _, _) => parameter[2],
        _ => parameter[0],
    }
}

fn rd(m: &mut Machine, nixbpe: &Nixbpe, parameter: [u8; 3]) {
    let id = device_id(nixbpe, parameter);
    // stdout and stderr are not readable.
    if id == 1 || id == 2 {
        error!("invalid device id ({})", id);
        return;
    }
    let byte = {
        let device = m.ensure_device(id);
        if !device.initialised() {
            error!("device is not accessible ({})", id);
            return;
        }
        device.read()
    };
    m.set_a((m.a() & 0xFFFF00) | byte as u32);
}

fn td(m: &mut Machine, nixbpe: &Nixbpe, parameter: [u8; 3]) {
    let id = device_id(nixbpe, parameter);
    let initialised = m.ensure_device(id).initialised();
    m.set_cc(if initialised { Cc::LT } else { Cc::EQ });
}

fn wd(m: &mut Machine, nixbpe: &Nixbpe, parameter: [u8; 3]) {
    let id = device_id(nixbpe, parameter);
    // stdin is not writable.
    if id == 0 {
        error!("invalid device id ({})", id);
        return;
    }
    let byte = m.a() as u8;
    let device = m.ensure_device(id);
    if device.initialised() {
        device.write(&[byte]);
        device.flush();
    } else {
        error!("device is not accessible ({})", id);
    }
}
