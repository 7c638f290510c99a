pub mod branch_unit;
pub mod clock;
pub mod context;
pub mod inst;
pub mod mem;
pub mod mem_unit;
pub mod regs;
pub mod report;
pub mod scheduler;
pub mod station;
pub mod status;
pub mod unit;

use mem::Memory;
use scheduler::{SimError, SimResult, Simulator};

/// Load a program image and simulate it to completion.
pub fn load_and_run(image: &str) -> Result<SimResult, SimError> {
    let mut mem = Memory::new();
    mem.load_image(image)?;
    Simulator::new(mem).run()
}
