use std::time::Instant;
use tomasim::{mem::Memory, report, scheduler::Simulator};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let start = Instant::now();

    let path = std::env::args()
        .nth(1)
        .expect("required program image as argument");
    let contents = std::fs::read_to_string(&path).expect("failed to open file");

    let mut mem = Memory::new();
    if let Err(e) = mem.load_image(&contents) {
        eprintln!("error loading {path}: {e}");
        std::process::exit(1);
    }

    let res = match Simulator::new(mem).run() {
        Ok(res) => res,
        Err(e) => {
            eprintln!("simulation aborted: {e}");
            std::process::exit(1);
        }
    };

    for dump in &res.dumps {
        print!("{}", dump.text);
    }
    print!("{}", report::end_of_run(&res));
    println!(
        "Simulator time elapsed: {:.2}s",
        start.elapsed().as_secs_f32()
    );
}
