use num_enum::TryFromPrimitive;
use std::fmt;
use thiserror::Error;

/// Bits [first:last] of `word`, numbered from the most significant bit
/// (bit 0) downwards.
pub fn field(word: u32, first: u32, last: u32) -> u32 {
    let width = last - first + 1;
    (word >> (31 - last)) & ((1 << width) - 1)
}

/// Sign-extend the low `bits` bits of `value` to 64 bits.
pub fn sign_extend(bits: u32, value: u32) -> i64 {
    let shift = 64 - bits;
    (i64::from(value) << shift) >> shift
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    Special = 0,
    Halt = 1,
    Jump = 2,
    Beq = 4,
    Bne = 5,
    Daddi = 24,
    Daddiu = 25,
    Dump = 44,
    LoadFloat = 53,
    LoadInt = 55,
    StoreFloat = 61,
    StoreInt = 63,
}

/// Function-code dispatch for register-form instructions (opcode 0).
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Funct {
    Dadd = 44,
    Dsub = 46,
    AddFloat = 47,
    SubFloat = 48,
    MulFloat = 49,
    DivFloat = 50,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unrecognized opcode {opcode} in word {word:#010x}")]
    UnknownOpcode { word: u32, opcode: u8 },
    #[error("unrecognized function code {funct} in word {word:#010x}")]
    UnknownFunct { word: u32, funct: u8 },
}

/// A decoded instruction. Immediates are already extended (sign- or
/// zero-extended as the operation demands) and branch/jump distances are
/// already scaled to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    Halt,
    Dump { mask: u32 },
    Jump { target: u64 },
    BranchIfEqual { rs: u8, rt: u8, offset: i64 },
    BranchIfNotEqual { rs: u8, rt: u8, offset: i64 },
    AddImm { rt: u8, rs: u8, imm: i64 },
    AddImmUnsigned { rt: u8, rs: u8, imm: i64 },
    Add { rd: u8, rs: u8, rt: u8 },
    Sub { rd: u8, rs: u8, rt: u8 },
    AddFloat { fd: u8, fs: u8, ft: u8 },
    SubFloat { fd: u8, fs: u8, ft: u8 },
    MulFloat { fd: u8, fs: u8, ft: u8 },
    DivFloat { fd: u8, fs: u8, ft: u8 },
    LoadInt { rt: u8, base: u8, offset: i64 },
    LoadFloat { ft: u8, base: u8, offset: i64 },
    StoreInt { rt: u8, base: u8, offset: i64 },
    StoreFloat { ft: u8, base: u8, offset: i64 },
}

pub fn decode(word: u32) -> Result<Inst, DecodeError> {
    let rs = field(word, 6, 10) as u8;
    let rt = field(word, 11, 15) as u8;
    let rd = field(word, 16, 20) as u8;
    let imm = field(word, 16, 31);
    let wide = field(word, 6, 31);

    let opcode = field(word, 0, 5) as u8;
    let op = Opcode::try_from(opcode).map_err(|_| DecodeError::UnknownOpcode { word, opcode })?;

    Ok(match op {
        Opcode::Special => {
            let funct = field(word, 26, 31) as u8;
            match Funct::try_from(funct)
                .map_err(|_| DecodeError::UnknownFunct { word, funct })?
            {
                Funct::Dadd => Inst::Add { rd, rs, rt },
                Funct::Dsub => Inst::Sub { rd, rs, rt },
                Funct::AddFloat => Inst::AddFloat { fd: rd, fs: rs, ft: rt },
                Funct::SubFloat => Inst::SubFloat { fd: rd, fs: rs, ft: rt },
                Funct::MulFloat => Inst::MulFloat { fd: rd, fs: rs, ft: rt },
                Funct::DivFloat => Inst::DivFloat { fd: rd, fs: rs, ft: rt },
            }
        }
        Opcode::Halt => Inst::Halt,
        Opcode::Jump => Inst::Jump {
            target: u64::from(wide) * 4,
        },
        Opcode::Beq => Inst::BranchIfEqual {
            rs,
            rt,
            offset: sign_extend(16, imm) * 4,
        },
        Opcode::Bne => Inst::BranchIfNotEqual {
            rs,
            rt,
            offset: sign_extend(16, imm) * 4,
        },
        Opcode::Daddi => Inst::AddImm {
            rt,
            rs,
            imm: sign_extend(16, imm),
        },
        Opcode::Daddiu => Inst::AddImmUnsigned {
            rt,
            rs,
            imm: i64::from(imm),
        },
        Opcode::Dump => Inst::Dump { mask: wide },
        Opcode::LoadFloat => Inst::LoadFloat {
            ft: rt,
            base: rs,
            offset: i64::from(imm),
        },
        Opcode::LoadInt => Inst::LoadInt {
            rt,
            base: rs,
            offset: i64::from(imm),
        },
        Opcode::StoreFloat => Inst::StoreFloat {
            ft: rt,
            base: rs,
            offset: i64::from(imm),
        },
        Opcode::StoreInt => Inst::StoreInt {
            rt,
            base: rs,
            offset: i64::from(imm),
        },
    })
}

// Lifecycle-table labels.
impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Inst::Halt => write!(f, "halt"),
            Inst::Dump { mask } => write!(f, "dump {mask}"),
            Inst::Jump { target } => write!(f, "j {target}"),
            Inst::BranchIfEqual { rs, rt, offset } => write!(f, "beq r{rs} r{rt} {offset}"),
            Inst::BranchIfNotEqual { rs, rt, offset } => write!(f, "bne r{rs} r{rt} {offset}"),
            Inst::AddImm { rt, rs, imm } => write!(f, "daddi r{rt} r{rs} {imm}"),
            Inst::AddImmUnsigned { rt, rs, imm } => write!(f, "daddiu r{rt} r{rs} {imm}"),
            Inst::Add { rd, rs, rt } => write!(f, "dadd r{rd} r{rs} r{rt}"),
            Inst::Sub { rd, rs, rt } => write!(f, "dsub r{rd} r{rs} r{rt}"),
            Inst::AddFloat { fd, fs, ft } => write!(f, "add.d f{fd} f{fs} f{ft}"),
            Inst::SubFloat { fd, fs, ft } => write!(f, "sub.d f{fd} f{fs} f{ft}"),
            Inst::MulFloat { fd, fs, ft } => write!(f, "mul.d f{fd} f{fs} f{ft}"),
            Inst::DivFloat { fd, fs, ft } => write!(f, "div.d f{fd} f{fs} f{ft}"),
            Inst::LoadInt { rt, base, offset } => write!(f, "ld r{rt} {offset} r{base}"),
            Inst::LoadFloat { ft, base, offset } => write!(f, "l.d f{ft} {offset} r{base}"),
            Inst::StoreInt { rt, base, offset } => write!(f, "sd r{rt} {offset} r{base}"),
            Inst::StoreFloat { ft, base, offset } => write!(f, "s.d f{ft} {offset} r{base}"),
        }
    }
}
