use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tomasim::{mem::Memory, scheduler::Simulator};

fn imm_form(opcode: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    (opcode << 26) | (rs << 21) | (rt << 16) | u32::from(imm)
}

/// Countdown loop: r1 := n; r1 -= 1 until zero. Every iteration pays the
/// full branch serialization, which is the interesting path.
fn countdown_image(n: i16) -> String {
    let words = [
        imm_form(24, 0, 1, n as u16),      // daddi r1, r0, n
        imm_form(24, 1, 1, (-1i16) as u16), // daddi r1, r1, -1
        imm_form(5, 1, 0, (-2i16) as u16), // bne r1, r0, -2 words
        1 << 26,                           // halt
    ];

    words
        .iter()
        .map(|w| format!("{w:08x}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_countdown(n: i16) -> u64 {
    let mut mem = Memory::new();
    mem.load_image(&countdown_image(n)).unwrap();
    Simulator::new(mem).run().unwrap().cycles
}

fn countdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("countdown");
    group.sample_size(20);
    group.bench_function("countdown 500", |b| {
        b.iter(|| run_countdown(black_box(500)))
    });
    group.finish();
}

criterion_group!(benches, countdown);
criterion_main!(benches);
