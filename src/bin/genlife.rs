//! Small application that writes a random grid to a file, for use as input of
//! the main program.

use std::{
    env,
    hash::{DefaultHasher, Hasher},
    process::exit,
};

use polylife::{Grid, COLS, ROWS};

/// Generate a grid in which every cell is alive with the given `density`. The
/// same seed always produces the same grid.
fn generate_grid(rows: usize, cols: usize, density: f64, seed: u64) -> Grid {
    let mut hasher = DefaultHasher::new();
    hasher.write_u64(seed);
    let threshold = (density.clamp(0.0, 1.0) * u32::MAX as f64) as u64;
    let cells = (0..rows * cols)
        .map(|i| {
            hasher.write_usize(i);
            (hasher.finish() & u32::MAX as u64) < threshold
        })
        .map(|alive| alive as u8)
        .collect();
    Grid::from_cells(rows, cols, cells)
}

/// Print the CLI help text for this program to stdout.
fn print_help_text() {
    println!(
        "Usage: {} [option].. output",
        env::args().next().unwrap_or_else(|| "genlife".to_owned())
    );
    println!("Options:");
    println!("   --rows n         Number of rows (default {ROWS})");
    println!("   --cols n         Number of columns (default {COLS})");
    println!("   --density p      Fraction of live cells (default 0.3)");
    println!("   --seed s         Seed of the random generator (default 0)");
    println!("   -h,--help        Print this help text");
}

fn main() {
    let mut rows = ROWS;
    let mut cols = COLS;
    let mut density = 0.3;
    let mut seed = 0;
    let mut output = None;
    let mut print_help = false;
    let mut has_error = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| match args.next() {
            Some(value) => Some(value),
            None => {
                eprintln!("error: missing value for `{name}`");
                None
            }
        };
        match arg.as_str() {
            "--rows" | "--cols" | "--seed" => match value(&arg).map(|v| v.parse::<u64>()) {
                Some(Ok(n)) if arg == "--rows" => rows = n as usize,
                Some(Ok(n)) if arg == "--cols" => cols = n as usize,
                Some(Ok(n)) => seed = n,
                Some(Err(_)) => {
                    eprintln!("error: invalid value for `{arg}`");
                    has_error = true;
                }
                None => has_error = true,
            },
            "--density" => match value(&arg).map(|v| v.parse::<f64>()) {
                Some(Ok(p)) if (0.0..=1.0).contains(&p) => density = p,
                Some(_) => {
                    eprintln!("error: density must be between 0 and 1");
                    has_error = true;
                }
                None => has_error = true,
            },
            "-h" | "-help" | "--help" => print_help = true,
            _ if output.is_none() => output = Some(arg),
            _ => {
                eprintln!("error: unexpected argument `{arg}`");
                has_error = true;
            }
        }
    }
    if print_help {
        print_help_text();
        return;
    }
    let Some(output) = output else {
        eprintln!("error: missing output file");
        exit(1);
    };
    if has_error {
        exit(1);
    }
    let grid = generate_grid(rows, cols, density, seed);
    if let Err(error) = grid.save(&output) {
        eprintln!("error: {error}");
        exit(1);
    }
}
