use crate::{
    context::Context,
    station::{BusMessage, Op, Operand, Station, StationId, UnitKind},
    unit::{ExecPipeline, Stall},
};
use tracing::trace;

pub const BRANCH_LATENCY: u32 = 9;
/// Unconditional jumps resolve on a short countdown instead of the full
/// branch latency.
pub const JUMP_COUNTDOWN: u32 = 1;

/// The branch unit holds exactly one reservation station: a second branch or
/// jump cannot issue until the first resolves, which is what serializes the
/// instruction stream instead of speculation.
#[derive(Debug, Clone)]
pub struct BranchUnit {
    station: Station,
    pipe: ExecPipeline,
}

impl BranchUnit {
    pub fn new() -> Self {
        Self {
            station: Station::new(StationId {
                kind: UnitKind::Branch,
                index: 0,
            }),
            pipe: ExecPipeline::new(),
        }
    }

    /// Conditional branch: captures both comparison operands through the
    /// integer file and a byte offset relative to the in-flight PC.
    pub fn try_issue_branch(
        &mut self,
        op: Op,
        rs: u8,
        rt: u8,
        offset: i64,
        ctx: &mut Context,
    ) -> Result<StationId, Stall> {
        if self.station.busy {
            return Err(Stall);
        }

        self.station.busy = true;
        self.station.op = Some(op);
        self.station.imm = offset;
        self.station.first = ctx.int_regs.operand(rs);
        self.station.second = ctx.int_regs.operand(rt);
        Ok(self.station.id)
    }

    /// Unconditional jump to an absolute byte target; needs no operands.
    pub fn try_issue_jump(&mut self, target: u64) -> Result<StationId, Stall> {
        if self.station.busy {
            return Err(Stall);
        }

        self.station.busy = true;
        self.station.op = Some(Op::Jump);
        self.station.imm = target as i64;
        self.station.first = Operand::Ready(0);
        self.station.second = Operand::Ready(0);
        Ok(self.station.id)
    }

    /// Advance the pipeline. The returned activity flag is true whenever a
    /// branch is in flight (starting, executing, or still occupying the
    /// slot); the driver suppresses issue for the whole cycle when set.
    pub fn execute(&mut self, ctx: &mut Context) -> bool {
        if self.pipe.is_busy() {
            if self.pipe.tick().is_some() {
                self.station.result_ready = true;
                ctx.status
                    .record_end_exec(self.station.id, ctx.clock.now());
            }
            return true;
        }

        if self.station.ready() {
            let countdown = if self.station.op() == Op::Jump {
                JUMP_COUNTDOWN
            } else {
                BRANCH_LATENCY - 1
            };
            self.pipe.begin(0, countdown);
            ctx.status
                .record_start_exec(self.station.id, ctx.clock.now());
            return true;
        }

        !self.is_drained()
    }

    /// Write-back: evaluate the condition and redirect the PC if taken.
    /// Runs every cycle regardless of pipeline state and never produces a
    /// bus message.
    pub fn write(&mut self, pc: &mut u64, ctx: &mut Context) {
        if !self.station.result_ready || self.station.result_written {
            return;
        }

        ctx.status.record_write(self.station.id, ctx.clock.now());

        let taken = match self.station.op() {
            Op::Beq => self.station.first.ready_value() == self.station.second.ready_value(),
            Op::Bne => self.station.first.ready_value() != self.station.second.ready_value(),
            Op::Jump => true,
            op => panic!("{op} is not a branch operation"),
        };

        if taken {
            *pc = match self.station.op() {
                Op::Jump => self.station.imm as u64,
                _ => pc.wrapping_add_signed(self.station.imm),
            };
            trace!(pc = *pc, "branch taken");
        }

        self.station.result_written = true;
    }

    pub fn update_from_broadcast(&mut self, msg: &BusMessage) {
        self.station.update_from_broadcast(msg);
    }

    pub fn clear(&mut self) {
        if self.station.result_written {
            self.station.clear();
        }
    }

    pub fn is_drained(&self) -> bool {
        !self.station.busy
    }

    pub fn station(&self) -> &Station {
        &self.station
    }
}

impl Default for BranchUnit {
    fn default() -> Self {
        Self::new()
    }
}
