//! Main application that advances a grid stored in a file by a number of
//! generations.

use std::{env, fs, process::exit};

use polylife::{
    ast::NEIGHBOR_SCRIPT, run, stats::Stats, Error, Executor, Grid, InplaceInterpreter,
    NativeCounter, TreeInterpreter, COLS, ROWS,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum CounterKind {
    Native,
    Inplace,
    Tree,
    Llvm,
}

/// Options collected from the command line.
struct Options {
    kind: CounterKind,
    script: Option<String>,
    print_ast: bool,
    print_ir: bool,
    opt: u32,
    rows: usize,
    cols: usize,
    stats: bool,
    verbose: bool,
    args: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            kind: CounterKind::Tree,
            script: None,
            print_ast: false,
            print_ir: false,
            opt: 1,
            rows: ROWS,
            cols: COLS,
            stats: false,
            verbose: false,
            args: Vec::new(),
        }
    }
}

fn program_name() -> String {
    env::args().next().unwrap_or_else(|| "polylife".to_owned())
}

/// Print the CLI help text for this program to stdout.
fn print_help_text() {
    println!(
        "Usage: {} [option].. input output generations",
        program_name()
    );
    println!("Options:");
    println!("   --native         Count neighbors natively, without a script");
    println!("   --inplace        Re-evaluate the script source for every cell");
    println!("   --tree           Use the tree-walking interpreter (default)");
    println!("   --llvm           Compile the neighbor function with LLVM");
    println!("   -s,--script file Use the neighbor function defined in file");
    println!("   --print-ast      Print the syntax tree of the script and exit");
    println!("   --print-ir       Print the LLVM IR of the script and exit");
    println!("   -O{{0|1|2|3}}      Apply different levels of optimization");
    println!("   --rows n         Number of rows of the grid (default {ROWS})");
    println!("   --cols n         Number of columns of the grid (default {COLS})");
    println!("   --stats          Print timing and memory statistics to stderr");
    println!("   -v,--verbose     Print progress of every generation to stderr");
    println!("   -h,--help        Print this help text");
    println!("Arguments:");
    println!("   input            File containing the initial grid");
    println!("   output           File to write the final grid to");
    println!("   generations      Number of generations to simulate");
}

/// Load the grid, advance it by `generations` using the counter `E` and save
/// the result.
fn simulate<'code, E: Executor<'code>>(
    code: &'code str,
    options: &Options,
    input: &str,
    output: &str,
    generations: usize,
) -> Result<Stats, Error> {
    let mut stats = Stats::new();
    let (grid, time) = Stats::time(|| Grid::load(input, options.rows, options.cols));
    let grid = grid?;
    stats.load = time;
    if options.verbose {
        eprintln!(
            "loaded {}x{} grid with {} live cells",
            grid.rows(),
            grid.cols(),
            grid.live_cells()
        );
    }
    let (exec, time) = Stats::time(|| E::create(code, options.opt));
    let exec = exec?;
    stats.setup = time;
    let (grid, time) = Stats::time(|| {
        run(grid, generations, &exec, |generation, grid| {
            if options.verbose {
                eprintln!(
                    "generation {generation}/{generations}: {} live cells",
                    grid.live_cells()
                );
            }
        })
    });
    let grid = grid?;
    stats.simulate = time;
    stats.generations = generations;
    stats.live_cells = grid.live_cells();
    let (result, time) = Stats::time(|| grid.save(output));
    result?;
    stats.save = time;
    Ok(stats)
}

#[cfg(feature = "llvm")]
fn print_ir(code: &str, opt: u32) -> Result<(), Error> {
    let exec = polylife::LlvmJitCompiler::create(code, opt)?;
    println!("{}", exec.print_llvm_ir());
    Ok(())
}

#[cfg(not(feature = "llvm"))]
fn print_ir(_code: &str, _opt: u32) -> Result<(), Error> {
    Err(Error::Llvm("built without the `llvm` feature".to_owned()))
}

#[cfg(feature = "llvm")]
fn simulate_llvm(
    code: &str,
    options: &Options,
    input: &str,
    output: &str,
    generations: usize,
) -> Result<Stats, Error> {
    simulate::<polylife::LlvmJitCompiler>(code, options, input, output, generations)
}

#[cfg(not(feature = "llvm"))]
fn simulate_llvm(
    _code: &str,
    _options: &Options,
    _input: &str,
    _output: &str,
    _generations: usize,
) -> Result<Stats, Error> {
    Err(Error::Llvm("built without the `llvm` feature".to_owned()))
}

/// Run the program as described by `options`.
fn execute(code: &str, options: &Options) -> Result<(), Error> {
    if options.print_ast {
        TreeInterpreter::create(code, options.opt)?.print_ast();
        return Ok(());
    }
    if options.print_ir {
        return print_ir(code, options.opt);
    }
    let [input, output, generations, ..] = &options.args[..] else {
        unreachable!("argument count is checked before")
    };
    let generations = match generations.parse::<usize>() {
        Ok(generations) => generations,
        Err(_) => {
            eprintln!("error: invalid number of generations `{generations}`");
            exit(1);
        }
    };
    let stats = match options.kind {
        CounterKind::Native => {
            simulate::<NativeCounter>(code, options, input, output, generations)?
        }
        CounterKind::Inplace => {
            simulate::<InplaceInterpreter>(code, options, input, output, generations)?
        }
        CounterKind::Tree => {
            simulate::<TreeInterpreter>(code, options, input, output, generations)?
        }
        CounterKind::Llvm => simulate_llvm(code, options, input, output, generations)?,
    };
    if options.stats {
        eprintln!("{stats}");
    }
    Ok(())
}

fn main() {
    let mut options = Options::default();
    let mut print_help = false;
    let mut has_error = false;
    let mut next_is_script = false;
    let mut next_is_rows = false;
    let mut next_is_cols = false;
    for arg in env::args().skip(1) {
        if next_is_script {
            next_is_script = false;
            options.script = Some(arg);
        } else if next_is_rows || next_is_cols {
            match arg.parse::<usize>() {
                Ok(n) if next_is_rows => options.rows = n,
                Ok(n) => options.cols = n,
                Err(_) => {
                    eprintln!("error: invalid grid size `{arg}`");
                    has_error = true;
                }
            }
            next_is_rows = false;
            next_is_cols = false;
        } else {
            match arg.as_str() {
                "--native" => options.kind = CounterKind::Native,
                "--inplace" => options.kind = CounterKind::Inplace,
                "--tree" => options.kind = CounterKind::Tree,
                "--llvm" => options.kind = CounterKind::Llvm,
                "--print-ast" => options.print_ast = true,
                "--print-ir" => options.print_ir = true,
                "-O0" => options.opt = 0,
                "-O1" => options.opt = 1,
                "-O2" => options.opt = 2,
                "-O3" => options.opt = 3,
                "--rows" => next_is_rows = true,
                "--cols" => next_is_cols = true,
                "--stats" => options.stats = true,
                "-v" | "--verbose" => options.verbose = true,
                "-h" | "-help" | "--help" => print_help = true,
                "-s" | "--script" => next_is_script = true,
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    eprintln!("error: unknown option `{arg}`");
                    has_error = true;
                }
                _ => options.args.push(arg),
            }
        }
    }
    if next_is_script || next_is_rows || next_is_cols {
        eprintln!("error: missing value for the last option");
        has_error = true;
    }
    if print_help {
        print_help_text();
        exit(0);
    }
    let dumping = options.print_ast || options.print_ir;
    for arg in options.args.iter().skip(3) {
        eprintln!("{arg}: ignoring surplus argument");
    }
    if !has_error && !dumping && options.args.len() < 3 {
        eprintln!("error: too few arguments, need input file, output file and number of generations");
        eprintln!(
            "Usage: {} [option].. input output generations",
            program_name()
        );
        has_error = true;
    }
    if has_error {
        exit(1);
    }
    let code = match &options.script {
        Some(path) => match fs::read_to_string(path) {
            Ok(code) => code,
            Err(source) => {
                let error = Error::File {
                    path: path.into(),
                    source,
                };
                eprintln!("error: {error}");
                exit(1);
            }
        },
        None => NEIGHBOR_SCRIPT.to_owned(),
    };
    if let Err(error) = execute(&code, &options) {
        eprintln!("error: {error}");
        exit(1);
    }
}
