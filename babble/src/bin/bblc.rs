//! Babble command-line driver.
//!
//! Usage:
//!   bblc -c | --compile <path>   compile a source file
//!   bblc -o | --out <path>       output path for the bytecode (out.bbl)
//!   bblc -r | --run <path>       execute a bytecode file
//!   bblc --disableWarnings       suppress compilation warnings

use std::io::Write as _;
use std::process::ExitCode;

use babble::ir::bytecode;
use babble::vm::Vm;
use babble_lexer::SourceMap;

// ANSI escape codes, bright/red/green/blue as the diagnostics use them.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const BLUE: &str = "\x1b[34m";
}

#[derive(Debug, Default)]
struct Options {
    compile_file: Option<String>,
    out_file: Option<String>,
    run_file: Option<String>,
    disable_warnings: bool,
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--compile" => {
                if i + 1 < args.len() {
                    i += 1;
                    options.compile_file = Some(args[i].clone());
                }
            }
            "-o" | "--out" => {
                if i + 1 < args.len() {
                    i += 1;
                    options.out_file = Some(args[i].clone());
                }
            }
            "-r" | "--run" => {
                if i + 1 < args.len() {
                    i += 1;
                    options.run_file = Some(args[i].clone());
                }
            }
            "--disableWarnings" => options.disable_warnings = true,
            _ => {}
        }
        i += 1;
    }
    options
}

fn print_help() {
    println!(
        "Usage: bblc [-c | --compile <path>] [-o | --out <path>] [-r | --run <path>] [--disableWarnings]\n"
    );
    println!(
        "{}-c | --compile <path>{}   Compile the file given in <path>",
        colors::BRIGHT,
        colors::RESET
    );
    println!(
        "{}-o | --out <path>{}       Write the compiled file to <path> (default out.bbl)",
        colors::BRIGHT,
        colors::RESET
    );
    println!(
        "{}-r | --run <path>{}       Run the bytecode file given in <path>",
        colors::BRIGHT,
        colors::RESET
    );
    println!(
        "{}--disableWarnings{}       Disable all warnings during compilation",
        colors::BRIGHT,
        colors::RESET
    );
    println!();
}

/// Render a diagnostic with its source line and a caret marker.
fn render_at(source: &str, index: usize, message: &str) {
    eprintln!("{}{}error:{} {}", colors::BRIGHT, colors::RED, colors::RESET, message);
    let map = SourceMap::new(source);
    let (line_no, column) = map.line_col(index.min(source.len()));
    if let Some(line) = source.lines().nth(line_no - 1) {
        eprintln!("  {} | {}", line_no, line);
        let pad = line_no.to_string().len();
        eprintln!("  {} | {}^", " ".repeat(pad), " ".repeat(column.saturating_sub(1)));
    }
}

fn compile_file(path: &str, out_path: &str, disable_warnings: bool) -> Option<u8> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(_) => {
            eprintln!(
                "{}{}Cannot open file {}{}",
                colors::BRIGHT,
                colors::RED,
                colors::RESET,
                path
            );
            return Some(1);
        }
    };

    let outcome = match babble::compile(&source) {
        Ok(outcome) => outcome,
        Err(error) => {
            match error.index() {
                Some(index) => render_at(&source, index, &error.to_string()),
                None => {
                    eprintln!("Something went wrong. We are sorry about it: {error}");
                    return Some(3);
                }
            }
            println!(
                "Terminated, {}{}1{} error(s) were found",
                colors::BRIGHT,
                colors::RED,
                colors::RESET
            );
            return Some(2);
        }
    };

    if !disable_warnings {
        for warning in &outcome.warnings {
            let map = SourceMap::new(&source);
            let (line, column) = map.line_col(warning.index().min(source.len()));
            eprintln!(
                "{}{}warning:{} {} (line {}, column {})",
                colors::BRIGHT,
                colors::BLUE,
                colors::RESET,
                warning,
                line,
                column
            );
        }
    }
    println!(
        "{}{}0{} error(s) were found",
        colors::BRIGHT,
        colors::GREEN,
        colors::RESET
    );
    println!(
        "{}{}{}{} warning(s) were generated",
        colors::BRIGHT,
        colors::BLUE,
        outcome.warnings.len(),
        colors::RESET
    );

    if bytecode::save_to_path(&outcome.program, out_path).is_err() {
        eprintln!(
            "{}{}Cannot open file {}{}",
            colors::BRIGHT,
            colors::RED,
            colors::RESET,
            out_path
        );
        return Some(4);
    }
    println!(
        "{}{}Saved to {}{}",
        colors::BRIGHT,
        colors::BLUE,
        colors::RESET,
        out_path
    );
    None
}

fn run_file(path: &str) -> u8 {
    let program = match bytecode::load_from_path(path) {
        Ok(program) => program,
        Err(error) => {
            eprintln!(
                "{}{}Cannot open file {}{}: {}",
                colors::BRIGHT,
                colors::RED,
                colors::RESET,
                path,
                error
            );
            return 5;
        }
    };
    let mut vm = Vm::new(program);
    match vm.run() {
        Ok(code) => {
            print!("{}", vm.take_output());
            let _ = std::io::stdout().flush();
            println!("Return code: {}", code);
            code as u8
        }
        Err(fault) => {
            print!("{}", vm.take_output());
            let _ = std::io::stdout().flush();
            eprintln!(
                "{}{}runtime fault:{} {}",
                colors::BRIGHT,
                colors::RED,
                colors::RESET,
                fault
            );
            101
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }
    let options = parse_args(&args);

    if let Some(path) = &options.compile_file {
        let out = options.out_file.as_deref().unwrap_or("out.bbl");
        if let Some(code) = compile_file(path, out, options.disable_warnings) {
            return ExitCode::from(code);
        }
    }

    if let Some(path) = &options.run_file {
        return ExitCode::from(run_file(path));
    }

    if options.compile_file.is_none() && options.run_file.is_none() {
        print_help();
    }
    ExitCode::SUCCESS
}
