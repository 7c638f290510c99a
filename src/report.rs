//! Textual rendering of end-of-cycle state. Everything here consumes
//! read-only views; nothing feeds back into scheduling.

use crate::{
    context::Context,
    mem::Memory,
    mem_unit::MemUnit,
    regs::RegFile,
    scheduler::SimResult,
    station::{Operand, Station},
    status::LifecycleEntry,
    unit::ArithUnit,
};
use strum::{EnumIter, IntoEnumIterator};

/// Sections a debug-dump instruction can select, in mask-bit order
/// (LSB first).
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
pub enum DumpSection {
    Memory,
    IntRegs,
    FpRegs,
    FpAddStations,
    FpMulStations,
    FpDivStations,
    IntStations,
    MemStations,
    Lifecycle,
}

pub fn render_dump(
    mask: u32,
    ctx: &Context,
    int_unit: &ArithUnit,
    fp_add: &ArithUnit,
    fp_mul: &ArithUnit,
    fp_div: &ArithUnit,
    mem_unit: &MemUnit,
) -> String {
    let mut out = String::new();

    for (bit, section) in DumpSection::iter().enumerate() {
        if mask & (1 << bit) == 0 {
            continue;
        }

        match section {
            DumpSection::Memory => out.push_str(&memory_dump(&ctx.mem)),
            DumpSection::IntRegs => {
                out.push_str(&register_dump("Integer registers:", &ctx.int_regs))
            }
            DumpSection::FpRegs => {
                out.push_str(&register_dump("Floating-point registers:", &ctx.fp_regs))
            }
            DumpSection::FpAddStations => out.push_str(&station_dump(
                "FP Adder Reservation Stations",
                fp_add.stations(),
            )),
            DumpSection::FpMulStations => out.push_str(&station_dump(
                "FP Multiplier Reservation Stations",
                fp_mul.stations(),
            )),
            DumpSection::FpDivStations => out.push_str(&station_dump(
                "FP Divide Reservation Stations",
                fp_div.stations(),
            )),
            DumpSection::IntStations => out.push_str(&station_dump(
                "Integer Reservation Stations",
                int_unit.stations(),
            )),
            DumpSection::MemStations => {
                out.push_str(&station_dump("Load Buffers", mem_unit.load_stations()));
                out.push_str(&station_dump("Store Buffers", mem_unit.store_stations()));
            }
            DumpSection::Lifecycle => out.push_str(&lifecycle_dump(ctx.status.entries())),
        }
    }

    out
}

/// Memory rendered eight words per line; runs of identical lines collapse
/// to a single `*`.
pub fn memory_dump(mem: &Memory) -> String {
    let mut out = String::new();
    let mut last_line: Option<String> = None;
    let mut elided = false;

    let mut base = 0;
    while base < mem.word_count() {
        let end = (base + 8).min(mem.word_count());
        let line = (base..end)
            .map(|i| format!("{:08x}", mem.word(i)))
            .collect::<Vec<_>>()
            .join(" ");

        if last_line.as_ref() == Some(&line) {
            if !elided {
                out.push_str(" *\n");
                elided = true;
            }
        } else {
            out.push_str(&format!("{:04x}:\t{}\n", base * 4, line));
            last_line = Some(line);
            elided = false;
        }

        base = end;
    }

    out
}

/// Register file rendered eight to a row; a register with a pending
/// producer shows the producing station's name instead of a stale value.
pub fn register_dump(title: &str, regs: &RegFile) -> String {
    let mut out = format!("{title}\n");

    for row in 0..4u8 {
        for col in 0..8u8 {
            let reg = row * 8 + col;
            match regs.producer_of(reg) {
                Some(tag) => out.push_str(&format!("{:<16} ", tag.to_string())),
                None => out.push_str(&format!("{:016x} ", regs.read(reg))),
            }
        }
        out.push('\n');
    }

    out
}

pub fn station_dump(title: &str, stations: &[Station]) -> String {
    let mut out = format!("{title}\n");
    out.push_str(&format!(
        "{:<9} {:<5} {:<7} {:<16} {:<16} {:<9} {:<9} {}\n",
        "Name", "Busy", "Op", "Vj", "Vk", "Qj", "Qk", "A"
    ));

    for st in stations {
        let op = st.op.map(|o| o.to_string()).unwrap_or_default();
        let (vj, qj) = operand_columns(&st.first);
        let (vk, qk) = operand_columns(&st.second);

        out.push_str(&format!(
            "{:<9} {:<5} {:<7} {:<16} {:<16} {:<9} {:<9} {}\n",
            st.id.to_string(),
            st.busy,
            op,
            vj,
            vk,
            qj,
            qk,
            st.imm,
        ));
    }

    out.push('\n');
    out
}

fn operand_columns(operand: &Operand) -> (String, String) {
    match operand {
        Operand::Ready(val) => (format!("{val:016x}"), String::new()),
        Operand::Pending(tag) => (String::new(), tag.to_string()),
    }
}

pub fn lifecycle_dump(entries: &[LifecycleEntry]) -> String {
    let mut out = format!(
        "{:<28} {:>6} {:>8} {:>6} {:>6}\n",
        "Instruction", "Issue", "StartEx", "EndEx", "Write"
    );

    for entry in entries {
        out.push_str(&format!(
            "{:<28} {:>6} {:>8} {:>6} {:>6}\n",
            entry.label,
            entry.issued,
            stage(entry.start_exec),
            stage(entry.end_exec),
            stage(entry.write),
        ));
    }

    out
}

fn stage(cycle: Option<u64>) -> String {
    cycle.map(|c| c.to_string()).unwrap_or_default()
}

/// The end-of-run report the command-line driver prints: memory, both
/// register files, the lifecycle table, and the elapsed cycle count.
pub fn end_of_run(res: &SimResult) -> String {
    let mut out = memory_dump(&res.mem);
    out.push_str(&register_dump("Integer registers:", &res.int_regs));
    out.push_str(&register_dump("Floating-point registers:", &res.fp_regs));
    out.push_str(&lifecycle_dump(&res.lifecycle));
    out.push_str(&format!("Total clock cycles: {}\n", res.cycles));
    out
}
