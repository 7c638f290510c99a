use crate::{
    branch_unit::BranchUnit,
    context::Context,
    inst::{decode, DecodeError, Inst},
    mem::{ImageError, MemFault, Memory},
    mem_unit::MemUnit,
    regs::RegFile,
    report,
    station::{BusMessage, Op},
    status::LifecycleEntry,
    unit::{ArithUnit, Stall},
};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("memory fault: {0}")]
    Mem(#[from] MemFault),
    #[error("bad program image: {0}")]
    Image(#[from] ImageError),
}

/// An unrecognized instruction word: recorded and logged, then treated as a
/// no-op so the stream keeps flowing past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFault {
    pub pc: u64,
    pub cycle: u64,
    pub error: DecodeError,
}

/// Output of one debug-dump instruction, rendered eagerly against the
/// state of the cycle it issued in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub cycle: u64,
    pub text: String,
}

/// End-of-run architectural state, handed to the reporting collaborator.
#[derive(Debug, Clone)]
pub struct SimResult {
    pub mem: Memory,
    pub int_regs: RegFile,
    pub fp_regs: RegFile,
    pub cycles: u64,
    pub lifecycle: Vec<LifecycleEntry>,
    pub decode_faults: Vec<DecodeFault>,
    pub dumps: Vec<DumpRecord>,
}

/// The scheduler driver: owns the program counter and all six functional
/// units, and steps them through the fixed per-cycle phase order until the
/// program halts and every unit drains.
#[derive(Debug, Clone)]
pub struct Simulator {
    ctx: Context,
    int_unit: ArithUnit,
    fp_add: ArithUnit,
    fp_mul: ArithUnit,
    fp_div: ArithUnit,
    branch: BranchUnit,
    mem_unit: MemUnit,
    pc: u64,
    halted: bool,
    decode_faults: Vec<DecodeFault>,
    dumps: Vec<DumpRecord>,
}

impl Simulator {
    pub fn new(mem: Memory) -> Self {
        Self {
            ctx: Context::new(mem),
            int_unit: ArithUnit::integer(),
            fp_add: ArithUnit::fp_add(),
            fp_mul: ArithUnit::fp_mul(),
            fp_div: ArithUnit::fp_div(),
            branch: BranchUnit::new(),
            mem_unit: MemUnit::new(),
            pc: 0,
            halted: false,
            decode_faults: Vec::new(),
            dumps: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<SimResult, SimError> {
        while !(self.halted && self.is_drained()) {
            self.step()?;

            debug_assert!(
                self.ctx.clock.total() < 1_000_000,
                "simulation failed to terminate"
            );
        }

        Ok(SimResult {
            mem: self.ctx.mem,
            int_regs: self.ctx.int_regs,
            fp_regs: self.ctx.fp_regs,
            cycles: self.ctx.clock.total(),
            lifecycle: self.ctx.status.entries().to_vec(),
            decode_faults: self.decode_faults,
            dumps: self.dumps,
        })
    }

    fn step(&mut self) -> Result<(), SimError> {
        trace!(cycle = self.ctx.clock.now(), pc = self.pc, "cycle begin");

        // 1. Write: branch PC write-back first, then bus arbitration.
        self.branch.write(&mut self.pc, &mut self.ctx);
        let bus = self.arbitrate_bus()?;

        // 2. Execute. The branch unit reports whether a branch is in
        //    flight; issue is suppressed for such cycles, which keeps the
        //    driver and the branch unit from both writing the PC.
        self.mem_unit.execute(&mut self.ctx);
        self.fp_div.execute(&mut self.ctx);
        self.fp_mul.execute(&mut self.ctx);
        self.fp_add.execute(&mut self.ctx);
        self.int_unit.execute(&mut self.ctx);
        let branch_active = self.branch.execute(&mut self.ctx);

        // 3. Issue.
        if !self.halted && !branch_active {
            self.issue()?;
        }

        // 4. Snoop: this cycle's result becomes visible everywhere at once.
        if let Some(msg) = bus {
            debug!(producer = %msg.producer, value = msg.value, "bus broadcast");
            self.snoop(&msg);
        }

        // 5. Retire.
        self.clear_all();

        // 6. Advance the clock.
        self.ctx.clock.advance();
        Ok(())
    }

    /// Exactly one message per cycle, from the highest-priority unit with a
    /// ready result: Memory > FP divide > FP multiply > FP add > Integer.
    /// Units behind the winner are not queried and hold their results.
    fn arbitrate_bus(&mut self) -> Result<Option<BusMessage>, SimError> {
        if let Some(msg) = self.mem_unit.write(&mut self.ctx)? {
            return Ok(Some(msg));
        }
        if let Some(msg) = self.fp_div.write(&mut self.ctx) {
            return Ok(Some(msg));
        }
        if let Some(msg) = self.fp_mul.write(&mut self.ctx) {
            return Ok(Some(msg));
        }
        if let Some(msg) = self.fp_add.write(&mut self.ctx) {
            return Ok(Some(msg));
        }
        Ok(self.int_unit.write(&mut self.ctx))
    }

    fn issue(&mut self) -> Result<(), SimError> {
        let word = self.ctx.mem.read_word(self.pc)?;

        let inst = match decode(word) {
            Ok(inst) => inst,
            Err(error) => {
                warn!(pc = self.pc, word, %error, "decode fault");
                self.decode_faults.push(DecodeFault {
                    pc: self.pc,
                    cycle: self.ctx.clock.now(),
                    error,
                });
                self.pc += 4;
                return Ok(());
            }
        };

        let stalled = self.dispatch(inst);
        if !self.halted && !stalled {
            self.pc += 4;
        }
        Ok(())
    }

    /// Send a decoded instruction to its owning unit. Returns true when the
    /// issue stalled and the same instruction must be retried next cycle.
    fn dispatch(&mut self, inst: Inst) -> bool {
        let label = inst.to_string();
        let now = self.ctx.clock.now();

        let issued = match inst {
            Inst::Halt => {
                self.halted = true;
                self.ctx.status.record_issue(label, None, now);
                return true;
            }
            Inst::Dump { mask } => {
                self.ctx.status.record_issue(label, None, now);
                let text = report::render_dump(
                    mask,
                    &self.ctx,
                    &self.int_unit,
                    &self.fp_add,
                    &self.fp_mul,
                    &self.fp_div,
                    &self.mem_unit,
                );
                self.dumps.push(DumpRecord { cycle: now, text });
                return false;
            }
            Inst::Add { rd, rs, rt } => {
                self.int_unit.try_issue_reg(Op::Dadd, rd, rs, rt, &mut self.ctx)
            }
            Inst::Sub { rd, rs, rt } => {
                self.int_unit.try_issue_reg(Op::Dsub, rd, rs, rt, &mut self.ctx)
            }
            Inst::AddImm { rt, rs, imm } => {
                self.int_unit.try_issue_imm(Op::Daddi, rt, rs, imm, &mut self.ctx)
            }
            Inst::AddImmUnsigned { rt, rs, imm } => {
                self.int_unit.try_issue_imm(Op::Daddiu, rt, rs, imm, &mut self.ctx)
            }
            Inst::AddFloat { fd, fs, ft } => {
                self.fp_add.try_issue_reg(Op::AddFloat, fd, fs, ft, &mut self.ctx)
            }
            Inst::SubFloat { fd, fs, ft } => {
                self.fp_add.try_issue_reg(Op::SubFloat, fd, fs, ft, &mut self.ctx)
            }
            Inst::MulFloat { fd, fs, ft } => {
                self.fp_mul.try_issue_reg(Op::MulFloat, fd, fs, ft, &mut self.ctx)
            }
            Inst::DivFloat { fd, fs, ft } => {
                self.fp_div.try_issue_reg(Op::DivFloat, fd, fs, ft, &mut self.ctx)
            }
            Inst::LoadInt { rt, base, offset } => {
                self.mem_unit
                    .try_issue_load(Op::LoadInt, rt, base, offset, &mut self.ctx)
            }
            Inst::LoadFloat { ft, base, offset } => {
                self.mem_unit
                    .try_issue_load(Op::LoadFloat, ft, base, offset, &mut self.ctx)
            }
            Inst::StoreInt { rt, base, offset } => {
                self.mem_unit
                    .try_issue_store(Op::StoreInt, rt, base, offset, &mut self.ctx)
            }
            Inst::StoreFloat { ft, base, offset } => {
                self.mem_unit
                    .try_issue_store(Op::StoreFloat, ft, base, offset, &mut self.ctx)
            }
            Inst::Jump { target } => self.branch.try_issue_jump(target),
            Inst::BranchIfEqual { rs, rt, offset } => {
                self.branch.try_issue_branch(Op::Beq, rs, rt, offset, &mut self.ctx)
            }
            Inst::BranchIfNotEqual { rs, rt, offset } => {
                self.branch.try_issue_branch(Op::Bne, rs, rt, offset, &mut self.ctx)
            }
        };

        match issued {
            Ok(station) => {
                trace!(%station, inst = %label, "issue");
                self.ctx.status.record_issue(label, Some(station), now);
                false
            }
            Err(Stall) => {
                trace!(pc = self.pc, "issue stall");
                true
            }
        }
    }

    fn snoop(&mut self, msg: &BusMessage) {
        self.branch.update_from_broadcast(msg);
        self.mem_unit.update_from_broadcast(msg);
        self.fp_div.update_from_broadcast(msg);
        self.fp_mul.update_from_broadcast(msg);
        self.fp_add.update_from_broadcast(msg);
        self.int_unit.update_from_broadcast(msg);
        self.ctx.apply_broadcast(msg);
    }

    fn clear_all(&mut self) {
        self.branch.clear();
        self.mem_unit.clear();
        self.fp_div.clear();
        self.fp_mul.clear();
        self.fp_add.clear();
        self.int_unit.clear();
    }

    fn is_drained(&self) -> bool {
        self.branch.is_drained()
            && self.mem_unit.is_drained()
            && self.fp_div.is_drained()
            && self.fp_mul.is_drained()
            && self.fp_add.is_drained()
            && self.int_unit.is_drained()
    }
}
