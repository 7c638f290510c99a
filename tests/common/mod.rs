//! Instruction-word builders and run helpers shared by the integration
//! tests.
#![allow(dead_code)]

use tomasim::{
    mem::Memory,
    scheduler::{SimResult, Simulator},
    status::LifecycleEntry,
};

fn reg_form(funct: u32, rd: u32, rs: u32, rt: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | funct
}

fn imm_form(opcode: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    (opcode << 26) | (rs << 21) | (rt << 16) | u32::from(imm)
}

pub fn dadd(rd: u32, rs: u32, rt: u32) -> u32 {
    reg_form(44, rd, rs, rt)
}

pub fn dsub(rd: u32, rs: u32, rt: u32) -> u32 {
    reg_form(46, rd, rs, rt)
}

pub fn add_d(fd: u32, fs: u32, ft: u32) -> u32 {
    reg_form(47, fd, fs, ft)
}

pub fn sub_d(fd: u32, fs: u32, ft: u32) -> u32 {
    reg_form(48, fd, fs, ft)
}

pub fn mul_d(fd: u32, fs: u32, ft: u32) -> u32 {
    reg_form(49, fd, fs, ft)
}

pub fn div_d(fd: u32, fs: u32, ft: u32) -> u32 {
    reg_form(50, fd, fs, ft)
}

pub fn daddi(rt: u32, rs: u32, imm: i16) -> u32 {
    imm_form(24, rs, rt, imm as u16)
}

pub fn daddiu(rt: u32, rs: u32, imm: u16) -> u32 {
    imm_form(25, rs, rt, imm)
}

pub fn ld(rt: u32, offset: u16, base: u32) -> u32 {
    imm_form(55, base, rt, offset)
}

pub fn l_d(ft: u32, offset: u16, base: u32) -> u32 {
    imm_form(53, base, ft, offset)
}

pub fn sd(rt: u32, offset: u16, base: u32) -> u32 {
    imm_form(63, base, rt, offset)
}

pub fn s_d(ft: u32, offset: u16, base: u32) -> u32 {
    imm_form(61, base, ft, offset)
}

/// Branch offsets are in words relative to the PC at write-back.
pub fn beq(rs: u32, rt: u32, words: i16) -> u32 {
    imm_form(4, rs, rt, words as u16)
}

pub fn bne(rs: u32, rt: u32, words: i16) -> u32 {
    imm_form(5, rs, rt, words as u16)
}

/// Jump targets are absolute word indices.
pub fn j(word_target: u32) -> u32 {
    (2 << 26) | word_target
}

pub fn halt() -> u32 {
    1 << 26
}

pub fn dump(mask: u32) -> u32 {
    (44 << 26) | mask
}

pub fn image(words: &[u32]) -> String {
    words
        .iter()
        .map(|w| format!("{w:08x}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn run(words: &[u32]) -> SimResult {
    run_with_mem(words, Memory::new())
}

pub fn run_with_mem(words: &[u32], mut mem: Memory) -> SimResult {
    mem.load_image(&image(words))
        .expect("failed to load test image");
    Simulator::new(mem).run().expect("simulation failed")
}

pub fn entry<'a>(res: &'a SimResult, label: &str) -> &'a LifecycleEntry {
    res.lifecycle
        .iter()
        .find(|e| e.label == label)
        .unwrap_or_else(|| panic!("no lifecycle entry labelled '{label}'"))
}
