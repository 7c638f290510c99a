use crate::{
    context::Context,
    regs::RegClass,
    station::{BusMessage, Op, Operand, Station, StationId, UnitKind},
};
use tracing::trace;

pub const INTEGER_LATENCY: u32 = 7;
pub const FP_ADD_LATENCY: u32 = 13;
pub const FP_MUL_LATENCY: u32 = 13;
pub const FP_DIV_LATENCY: u32 = 17;
pub const ARITH_STATIONS: usize = 4;

/// Issue failed for want of a free reservation station; the driver retries
/// the same instruction next cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stall;

/// The single execution pipeline each unit owns: at most one slot is in
/// flight at a time, counting down a fixed latency.
#[derive(Debug, Clone)]
pub struct ExecPipeline {
    busy: bool,
    remaining: u32,
    current: usize,
}

impl ExecPipeline {
    pub fn new() -> Self {
        Self {
            busy: false,
            remaining: 0,
            current: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Slot index currently in flight; meaningful only while busy.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn begin(&mut self, slot: usize, countdown: u32) {
        self.busy = true;
        self.current = slot;
        self.remaining = countdown;
    }

    /// Advance one cycle; yields the completed slot index when the
    /// countdown reaches zero.
    pub fn tick(&mut self) -> Option<usize> {
        if !self.busy {
            return None;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.busy = false;
            Some(self.current)
        } else {
            None
        }
    }
}

impl Default for ExecPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// An arithmetic functional unit: the integer unit and the three
/// floating-point units share this shape and differ only in kind, latency,
/// and which register file they rename through.
#[derive(Debug, Clone)]
pub struct ArithUnit {
    kind: UnitKind,
    latency: u32,
    stations: Vec<Station>,
    pipe: ExecPipeline,
}

impl ArithUnit {
    pub fn integer() -> Self {
        Self::new(UnitKind::Integer, INTEGER_LATENCY)
    }

    pub fn fp_add() -> Self {
        Self::new(UnitKind::FpAdd, FP_ADD_LATENCY)
    }

    pub fn fp_mul() -> Self {
        Self::new(UnitKind::FpMul, FP_MUL_LATENCY)
    }

    pub fn fp_div() -> Self {
        Self::new(UnitKind::FpDiv, FP_DIV_LATENCY)
    }

    fn new(kind: UnitKind, latency: u32) -> Self {
        let stations = (0..ARITH_STATIONS)
            .map(|i| {
                Station::new(StationId {
                    kind,
                    index: i as u8,
                })
            })
            .collect();

        Self {
            kind,
            latency,
            stations,
            pipe: ExecPipeline::new(),
        }
    }

    fn reg_class(&self) -> RegClass {
        match self.kind {
            UnitKind::Integer => RegClass::Int,
            _ => RegClass::Fp,
        }
    }

    /// Register-form issue (`dadd rd, rs, rt` and the FP family).
    pub fn try_issue_reg(
        &mut self,
        op: Op,
        dest: u8,
        src1: u8,
        src2: u8,
        ctx: &mut Context,
    ) -> Result<StationId, Stall> {
        let class = self.reg_class();
        let slot = self.free_slot()?;

        let st = &mut self.stations[slot];
        st.busy = true;
        st.op = Some(op);
        st.first = ctx.regs(class).operand(src1);
        st.second = ctx.regs(class).operand(src2);
        let id = st.id;

        // Destination renames only after both sources resolved, so an
        // instruction reading its own destination sees the old producer.
        ctx.regs_mut(class).bind_producer(dest, id);
        Ok(id)
    }

    /// Immediate-form issue (`daddi`/`daddiu rt, rs, imm`).
    pub fn try_issue_imm(
        &mut self,
        op: Op,
        dest: u8,
        src: u8,
        imm: i64,
        ctx: &mut Context,
    ) -> Result<StationId, Stall> {
        let class = self.reg_class();
        let slot = self.free_slot()?;

        let st = &mut self.stations[slot];
        st.busy = true;
        st.op = Some(op);
        st.imm = imm;
        st.first = ctx.regs(class).operand(src);
        st.second = Operand::Ready(0);
        let id = st.id;

        ctx.regs_mut(class).bind_producer(dest, id);
        Ok(id)
    }

    fn free_slot(&self) -> Result<usize, Stall> {
        self.stations.iter().position(|s| !s.busy).ok_or(Stall)
    }

    pub fn execute(&mut self, ctx: &mut Context) {
        if !self.pipe.is_busy() {
            // Lowest-index ready slot first.
            if let Some(slot) = self.stations.iter().position(Station::ready) {
                self.pipe.begin(slot, self.latency - 1);
                ctx.status
                    .record_start_exec(self.stations[slot].id, ctx.clock.now());
                trace!(station = %self.stations[slot].id, "execute start");
            }
        } else if let Some(slot) = self.pipe.tick() {
            let st = &mut self.stations[slot];
            st.result = compute(st.op(), &st.first, &st.second, st.imm);
            st.result_ready = true;
            ctx.status.record_end_exec(st.id, ctx.clock.now());
            trace!(station = %st.id, result = st.result, "execute done");
        }
    }

    pub fn write(&mut self, ctx: &mut Context) -> Option<BusMessage> {
        let st = self.stations.iter_mut().find(|s| s.result_ready && !s.result_written)?;
        st.result_written = true;
        ctx.status.record_write(st.id, ctx.clock.now());

        Some(BusMessage {
            producer: st.id,
            value: st.result,
        })
    }

    pub fn update_from_broadcast(&mut self, msg: &BusMessage) {
        for st in &mut self.stations {
            st.update_from_broadcast(msg);
        }
    }

    pub fn clear(&mut self) {
        for st in &mut self.stations {
            if st.result_written {
                st.clear();
            }
        }
    }

    pub fn is_drained(&self) -> bool {
        self.stations.iter().all(|s| !s.busy)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }
}

fn compute(op: Op, first: &Operand, second: &Operand, imm: i64) -> u64 {
    let a = first.ready_value();
    let b = second.ready_value();

    match op {
        Op::Dadd => a.wrapping_add(b),
        Op::Dsub => a.wrapping_sub(b),
        Op::Daddi | Op::Daddiu => a.wrapping_add(imm as u64),
        Op::AddFloat => f64::to_bits(f64::from_bits(a) + f64::from_bits(b)),
        Op::SubFloat => f64::to_bits(f64::from_bits(a) - f64::from_bits(b)),
        Op::MulFloat => f64::to_bits(f64::from_bits(a) * f64::from_bits(b)),
        Op::DivFloat => f64::to_bits(f64::from_bits(a) / f64::from_bits(b)),
        _ => panic!("{op} is not an arithmetic operation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::Memory;

    fn ctx() -> Context {
        Context::new(Memory::new())
    }

    #[test]
    fn test_issue_fills_slots_in_order() {
        let mut ctx = ctx();
        let mut unit = ArithUnit::integer();

        for i in 0..ARITH_STATIONS {
            let id = unit
                .try_issue_imm(Op::Daddi, 1, 0, 1, &mut ctx)
                .unwrap();
            assert_eq!(id.index, i as u8);
        }

        // Pool exhausted: structural hazard.
        assert_eq!(
            unit.try_issue_imm(Op::Daddi, 1, 0, 1, &mut ctx),
            Err(Stall)
        );
    }

    #[test]
    fn test_dest_renamed_after_sources() {
        let mut ctx = ctx();
        let mut unit = ArithUnit::integer();

        let first = unit.try_issue_imm(Op::Daddi, 1, 0, 1, &mut ctx).unwrap();
        let second = unit.try_issue_reg(Op::Dadd, 1, 1, 1, &mut ctx).unwrap();

        // dadd r1, r1, r1 waits on the *previous* producer of r1, and the
        // register now names the new one.
        let st = &unit.stations()[usize::from(second.index)];
        assert_eq!(st.first, Operand::Pending(first));
        assert_eq!(st.second, Operand::Pending(first));
        assert_eq!(ctx.int_regs.producer_of(1), Some(second));
    }

    #[test]
    fn test_execute_counts_down_full_latency() {
        let mut ctx = ctx();
        let mut unit = ArithUnit::integer();
        unit.try_issue_imm(Op::Daddi, 1, 0, 5, &mut ctx).unwrap();

        let mut cycles = 0;
        while !unit.stations()[0].result_ready {
            unit.execute(&mut ctx);
            ctx.clock.advance();
            cycles += 1;
        }
        assert_eq!(cycles, INTEGER_LATENCY);
        assert_eq!(unit.stations()[0].result, 5);
    }

    #[test]
    fn test_lowest_index_ready_first() {
        let mut ctx = ctx();
        let mut unit = ArithUnit::integer();

        // Slot 0 waits on a producer; slot 1 is ready.
        ctx.int_regs.bind_producer(2, StationId {
            kind: UnitKind::Load,
            index: 0,
        });
        unit.try_issue_imm(Op::Daddi, 3, 2, 1, &mut ctx).unwrap();
        unit.try_issue_imm(Op::Daddi, 4, 0, 2, &mut ctx).unwrap();

        unit.execute(&mut ctx);
        assert!(unit.pipe.is_busy());
        assert_eq!(unit.pipe.current, 1);
    }

    #[test]
    fn test_write_and_clear() {
        let mut ctx = ctx();
        let mut unit = ArithUnit::integer();
        let id = unit.try_issue_imm(Op::Daddi, 1, 0, 5, &mut ctx).unwrap();

        // Nothing ready yet.
        assert_eq!(unit.write(&mut ctx), None);

        while !unit.stations()[0].result_ready {
            unit.execute(&mut ctx);
            ctx.clock.advance();
        }

        let msg = unit.write(&mut ctx).unwrap();
        assert_eq!(msg, BusMessage {
            producer: id,
            value: 5
        });

        unit.clear();
        assert!(unit.is_drained());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut ctx = ctx();
        let mut unit = ArithUnit::integer();
        unit.clear();
        assert!(unit.is_drained());

        // A busy station without a written result survives clear.
        unit.try_issue_imm(Op::Daddi, 1, 0, 5, &mut ctx).unwrap();
        unit.clear();
        unit.clear();
        assert!(!unit.is_drained());
    }

    #[test]
    fn test_fp_compute() {
        let two = Operand::Ready(2.0f64.to_bits());
        let half = Operand::Ready(0.5f64.to_bits());

        assert_eq!(compute(Op::AddFloat, &two, &half, 0), 2.5f64.to_bits());
        assert_eq!(compute(Op::SubFloat, &two, &half, 0), 1.5f64.to_bits());
        assert_eq!(compute(Op::MulFloat, &two, &half, 0), 1.0f64.to_bits());
        assert_eq!(compute(Op::DivFloat, &two, &half, 0), 4.0f64.to_bits());
    }

    #[test]
    fn test_integer_compute_wraps() {
        let max = Operand::Ready(u64::MAX);
        let one = Operand::Ready(1);

        assert_eq!(compute(Op::Dadd, &max, &one, 0), 0);
        assert_eq!(compute(Op::Dsub, &Operand::Ready(0), &one, 0), u64::MAX);
        assert_eq!(compute(Op::Daddi, &Operand::Ready(5), &Operand::Ready(0), -7), (-2i64) as u64);
    }
}
