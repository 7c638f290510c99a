use crate::{
    context::Context,
    mem::MemFault,
    station::{BusMessage, Op, Operand, Station, StationId, UnitKind},
    unit::{ExecPipeline, Stall},
};
use std::collections::VecDeque;
use tracing::trace;

pub const MEM_LATENCY: u32 = 11;
pub const LOAD_STATIONS: usize = 4;
pub const STORE_STATIONS: usize = 4;

/// One memory unit handles loads and stores. The slot pool is split half
/// and half, but a single FIFO execution queue spans both: memory accesses
/// execute in program issue order regardless of which half they sit in.
#[derive(Debug, Clone)]
pub struct MemUnit {
    stations: Vec<Station>,
    pipe: ExecPipeline,
    exec_queue: VecDeque<usize>,
    write_queue: VecDeque<usize>,
}

impl MemUnit {
    pub fn new() -> Self {
        let loads = (0..LOAD_STATIONS).map(|i| {
            Station::new(StationId {
                kind: UnitKind::Load,
                index: i as u8,
            })
        });
        let stores = (0..STORE_STATIONS).map(|i| {
            Station::new(StationId {
                kind: UnitKind::Store,
                index: i as u8,
            })
        });

        Self {
            stations: loads.chain(stores).collect(),
            pipe: ExecPipeline::new(),
            exec_queue: VecDeque::new(),
            write_queue: VecDeque::new(),
        }
    }

    pub fn try_issue_load(
        &mut self,
        op: Op,
        dest: u8,
        base: u8,
        offset: i64,
        ctx: &mut Context,
    ) -> Result<StationId, Stall> {
        let slot = self.stations[..LOAD_STATIONS]
            .iter()
            .position(|s| !s.busy)
            .ok_or(Stall)?;

        let st = &mut self.stations[slot];
        st.busy = true;
        st.op = Some(op);
        st.imm = offset;
        st.first = ctx.int_regs.operand(base);
        st.second = Operand::Ready(0);
        let id = st.id;

        match op {
            Op::LoadFloat => ctx.fp_regs.bind_producer(dest, id),
            _ => ctx.int_regs.bind_producer(dest, id),
        }

        self.exec_queue.push_back(slot);
        Ok(id)
    }

    pub fn try_issue_store(
        &mut self,
        op: Op,
        data: u8,
        base: u8,
        offset: i64,
        ctx: &mut Context,
    ) -> Result<StationId, Stall> {
        let slot = (LOAD_STATIONS..LOAD_STATIONS + STORE_STATIONS)
            .find(|&i| !self.stations[i].busy)
            .ok_or(Stall)?;

        let st = &mut self.stations[slot];
        st.busy = true;
        st.op = Some(op);
        st.imm = offset;
        st.first = ctx.int_regs.operand(base);
        st.second = match op {
            Op::StoreFloat => ctx.fp_regs.operand(data),
            _ => ctx.int_regs.operand(data),
        };

        self.exec_queue.push_back(slot);
        Ok(st.id)
    }

    /// Only the head of the execution queue may start: a not-yet-ready head
    /// blocks every access behind it.
    pub fn execute(&mut self, ctx: &mut Context) {
        if !self.pipe.is_busy() {
            let head = match self.exec_queue.front() {
                Some(&head) => head,
                None => return,
            };
            if self.stations[head].ready() {
                let st = &mut self.stations[head];
                // Effective address, computed once at execution start.
                st.imm = (st.first.ready_value() as i64).wrapping_add(st.imm);
                let id = st.id;
                self.pipe.begin(head, MEM_LATENCY - 1);
                ctx.status.record_start_exec(id, ctx.clock.now());
                trace!(station = %id, addr = st.imm, "memory access start");
            }
        } else if let Some(slot) = self.pipe.tick() {
            let st = &mut self.stations[slot];
            st.result_ready = true;
            ctx.status.record_end_exec(st.id, ctx.clock.now());

            let popped = self.exec_queue.pop_front();
            debug_assert_eq!(popped, Some(slot));
            self.write_queue.push_back(slot);
        }
    }

    /// Retire up to one store and one load per cycle, in queue order. A
    /// store only touches memory locally; a load additionally supplies this
    /// unit's single bus message.
    pub fn write(&mut self, ctx: &mut Context) -> Result<Option<BusMessage>, MemFault> {
        let mut message = None;
        let mut load_done = false;
        let mut store_done = false;

        for _ in 0..2 {
            let slot = match self.write_queue.front() {
                Some(&slot) => slot,
                None => break,
            };
            let st = &mut self.stations[slot];
            let addr = st.imm as u64;

            if st.op().is_store() && !store_done {
                st.result_written = true;
                let value = st.second.ready_value();
                let id = st.id;
                self.write_queue.pop_front();
                ctx.status.record_write(id, ctx.clock.now());
                ctx.mem.write_doubleword(addr, value)?;
                store_done = true;
            } else if st.op().is_load() && !load_done {
                st.result_written = true;
                let id = st.id;
                self.write_queue.pop_front();
                ctx.status.record_write(id, ctx.clock.now());
                message = Some(BusMessage {
                    producer: id,
                    value: ctx.mem.read_doubleword(addr)?,
                });
                load_done = true;
            } else {
                break;
            }
        }

        Ok(message)
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

    pub fn load_stations(&self) -> &[Station] {
        &self.stations[..LOAD_STATIONS]
    }

    pub fn store_stations(&self) -> &[Station] {
        &self.stations[LOAD_STATIONS..]
    }
}

impl Default for MemUnit {
    fn default() -> Self {
        Self::new()
    }
}
