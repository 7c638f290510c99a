use std::fmt;

/// Functional-unit kind. Loads and stores are separate kinds so that a
/// station id renders as the station's traditional name (`Load0`, `Store2`),
/// even though one memory unit owns both halves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display)]
pub enum UnitKind {
    #[strum(serialize = "Integer")]
    Integer,
    #[strum(serialize = "FPAdd")]
    FpAdd,
    #[strum(serialize = "FPMult")]
    FpMul,
    #[strum(serialize = "FPDiv")]
    FpDiv,
    #[strum(serialize = "Branch")]
    Branch,
    #[strum(serialize = "Load")]
    Load,
    #[strum(serialize = "Store")]
    Store,
}

/// Identity of one reservation-station slot: the producer tag carried by
/// renamed registers and waiting operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StationId {
    pub kind: UnitKind,
    pub index: u8,
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.index)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
pub enum Op {
    #[strum(serialize = "dadd")]
    Dadd,
    #[strum(serialize = "dsub")]
    Dsub,
    #[strum(serialize = "daddi")]
    Daddi,
    #[strum(serialize = "daddiu")]
    Daddiu,
    #[strum(serialize = "add.d")]
    AddFloat,
    #[strum(serialize = "sub.d")]
    SubFloat,
    #[strum(serialize = "mul.d")]
    MulFloat,
    #[strum(serialize = "div.d")]
    DivFloat,
    #[strum(serialize = "ld")]
    LoadInt,
    #[strum(serialize = "l.d")]
    LoadFloat,
    #[strum(serialize = "sd")]
    StoreInt,
    #[strum(serialize = "s.d")]
    StoreFloat,
    #[strum(serialize = "beq")]
    Beq,
    #[strum(serialize = "bne")]
    Bne,
    #[strum(serialize = "j")]
    Jump,
}

impl Op {
    pub fn is_load(self) -> bool {
        matches!(self, Op::LoadInt | Op::LoadFloat)
    }

    pub fn is_store(self) -> bool {
        matches!(self, Op::StoreInt | Op::StoreFloat)
    }
}

/// One operand of a reservation-station slot: either a resolved value or a
/// wait on the station that will produce it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operand {
    Ready(u64),
    Pending(StationId),
}

impl Operand {
    pub fn is_ready(&self) -> bool {
        matches!(self, Operand::Ready(_))
    }

    pub fn ready_value(&self) -> u64 {
        match self {
            Operand::Ready(val) => *val,
            Operand::Pending(tag) => panic!("operand still waiting on {tag}"),
        }
    }

    pub fn resolve(&mut self, msg: &BusMessage) {
        if *self == Operand::Pending(msg.producer) {
            *self = Operand::Ready(msg.value);
        }
    }
}

/// The single message the broadcast bus carries per cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub producer: StationId,
    pub value: u64,
}

/// A reservation-station slot. `busy` holds from issue until `clear`;
/// `result_ready` from the end of execution; `result_written` from the cycle
/// the result went out (or, for stores and branches, was locally applied).
#[derive(Debug, Clone)]
pub struct Station {
    pub id: StationId,
    pub busy: bool,
    pub op: Option<Op>,
    pub first: Operand,
    pub second: Operand,
    pub imm: i64,
    pub result: u64,
    pub result_ready: bool,
    pub result_written: bool,
}

impl Station {
    pub fn new(id: StationId) -> Self {
        Self {
            id,
            busy: false,
            op: None,
            first: Operand::Ready(0),
            second: Operand::Ready(0),
            imm: 0,
            result: 0,
            result_ready: false,
            result_written: false,
        }
    }

    pub fn op(&self) -> Op {
        match self.op {
            Some(op) => op,
            None => panic!("station {} holds no operation", self.id),
        }
    }

    /// Ready to begin execution: issued, not yet executed, both operands
    /// resolved.
    pub fn ready(&self) -> bool {
        self.busy && !self.result_ready && self.first.is_ready() && self.second.is_ready()
    }

    pub fn update_from_broadcast(&mut self, msg: &BusMessage) {
        if self.busy {
            self.first.resolve(msg);
            self.second.resolve(msg);
        }
    }

    pub fn clear(&mut self) {
        *self = Station::new(self.id);
    }
}
