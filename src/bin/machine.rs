use cisc8::logging::error;
use cisc8::program::Program;
use cisc8::simulation::{self, Outcome};
use std::{env, fs};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <program.bin> <input_schedule>", args[0]);
        std::process::exit(1);
    }

    let program_path = &args[1];
    let schedule_path = &args[2];

    let program_json = fs::read_to_string(program_path).unwrap_or_else(|e| {
        error(format!("failed to read program artifact: {e}"));
        std::process::exit(2);
    });
    let program: Program = serde_json::from_str(&program_json).unwrap_or_else(|e| {
        error(format!("malformed program artifact: {e}"));
        std::process::exit(3);
    });

    let schedule_json = fs::read_to_string(schedule_path).unwrap_or_else(|e| {
        error(format!("failed to read input schedule: {e}"));
        std::process::exit(4);
    });
    let raw_schedule: Vec<(u64, String)> = serde_json::from_str(&schedule_json).unwrap_or_else(|e| {
        error(format!("malformed input schedule: {e}"));
        std::process::exit(5);
    });
    let schedule = raw_schedule
        .into_iter()
        .map(|(tick, ch)| {
            let c = ch.chars().next().unwrap_or_else(|| {
                error(format!("input schedule entry at tick {tick} is not a single character"));
                std::process::exit(6);
            });
            (tick, c)
        })
        .collect();

    let report = simulation::run_with_default_budget(&program, schedule);

    print!("{}", report.output);
    println!("instr_counter: {} ticks: {}", report.instr_counter, report.ticks);

    if let Outcome::Error(e) = report.outcome {
        error(e.to_string());
        std::process::exit(7);
    }
}
