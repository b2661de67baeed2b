use cisc8::logging::error;
use cisc8::translator;
use std::{env, fs};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <input.asm> <output.bin>", args[0]);
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];

    let source = fs::read_to_string(input_path).unwrap_or_else(|e| {
        error(format!("failed to read input file: {e}"));
        std::process::exit(2);
    });

    let program = translator::translate(&source).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });

    let json = serde_json::to_string_pretty(&program).unwrap_or_else(|e| {
        error(format!("failed to encode program artifact: {e}"));
        std::process::exit(4);
    });

    fs::write(output_path, json).unwrap_or_else(|e| {
        error(format!("failed to write to output file: {e}"));
        std::process::exit(5);
    });
}
