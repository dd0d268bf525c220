//! Small application that performs fuzzing on the neighbor counters by
//! comparing them to the native counter on random grids.

use std::{
    collections::hash_map::RandomState,
    env, fs,
    hash::{BuildHasher, DefaultHasher, Hash, Hasher},
    path::Path,
    time::{Duration, Instant},
};

use polylife::{
    ast::NEIGHBOR_SCRIPT, next_generation, Executor, Grid, InplaceInterpreter, NativeCounter,
    TreeInterpreter,
};

/// Generate a random grid of at most `max_size` rows and columns.
fn generate_grid(hasher: &mut impl Hasher, max_size: usize) -> Grid {
    hasher.write_u8(0);
    let rows = 1 + hasher.finish() as usize % max_size;
    hasher.write_u8(1);
    let cols = 1 + hasher.finish() as usize % max_size;
    hasher.write_u8(2);
    let density = 1 + hasher.finish() % 9;
    let cells = (0..rows * cols)
        .map(|i| {
            hasher.write_usize(i);
            (hasher.finish() % 10 < density) as u8
        })
        .collect();
    Grid::from_cells(rows, cols, cells)
}

/// Compute one generation with the counter `E`.
fn result_with<'code, E: Executor<'code>>(code: &'code str, opt: u32, grid: &Grid) -> Grid {
    let exec = E::create(code, opt).unwrap();
    next_generation(grid, &exec).unwrap()
}

/// Check that every counter at every optimization level produces the same
/// generation as the native counter.
fn check_grid(grid: &Grid) -> bool {
    let expected = next_generation(grid, &NativeCounter).unwrap();
    for opt in [0, 1] {
        if result_with::<InplaceInterpreter>(NEIGHBOR_SCRIPT, opt, grid) != expected {
            return false;
        }
    }
    for opt in [0, 1, 3] {
        if result_with::<TreeInterpreter>(NEIGHBOR_SCRIPT, opt, grid) != expected {
            return false;
        }
    }
    #[cfg(feature = "llvm")]
    for opt in [0, 1, 3] {
        if result_with::<polylife::LlvmJitCompiler>(NEIGHBOR_SCRIPT, opt, grid) != expected {
            return false;
        }
    }
    true
}

/// Kill random cells such that the grid still fails.
fn minimize_grid(hasher: &mut impl Hasher, grid: Grid) -> Grid {
    hasher.write_usize(grid.live_cells());
    let len = grid.rows() * grid.cols();
    if len == 0 {
        return grid;
    }
    let start = hasher.finish() as usize % len;
    for i in (0..len).cycle().skip(start).take(len) {
        let (row, col) = (i / grid.cols(), i % grid.cols());
        if grid[(row, col)] != 0 {
            let mut next = grid.clone();
            next.set(row, col, false);
            if !check_grid(&next) {
                return minimize_grid(hasher, next);
            }
        }
    }
    grid
}

/// Load a grid stored by a previous run. The size is taken from the text.
fn load_grid(path: &Path) -> Grid {
    let text = fs::read_to_string(path).unwrap();
    let rows = text.lines().count();
    let cols = text.lines().next().map_or(0, |l| l.chars().count());
    Grid::parse(&text, rows, cols).unwrap()
}

/// Store a failing grid in `dir`, named after its content.
fn store_grid(dir: &Path, grid: &Grid) {
    let text = grid.to_text();
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let path = dir.join(hasher.finish().to_string() + ".life");
    fs::write(path, text).unwrap();
}

/// Print the current number of successful and failed grid samples.
fn print_status(success: usize, failure: usize) {
    println!("success: {success}, failure: {failure}");
}

/// Print the CLI help text for this program to stdout.
fn print_help_text() {
    println!(
        "Usage: {} [option]",
        env::args().next().unwrap_or_else(|| "fuzz".to_owned())
    );
    println!("Options:");
    println!("   --recheck          Run again all the stored failed grids");
    println!("   --minimize file    Run the grid in file and try to make it smaller");
    println!("   -d,--dir dir       Store or load failed grids in this directory");
    println!("   -s,--size n        Don't generate grids larger than n by n cells");
    println!("   -h,--help          Print this help text");
}

fn main() {
    let mut success = 0;
    let mut failure = 0;
    let mut print_help = false;
    let mut recheck = false;
    let mut directory = "fuzz-errors".to_owned();
    let mut minimize = None;
    let mut max_size = 16;
    let mut next_is_dir = false;
    let mut next_is_size = false;
    let mut next_is_min = false;
    for arg in env::args().skip(1) {
        if next_is_dir {
            next_is_dir = false;
            directory = arg;
        } else if next_is_min {
            next_is_min = false;
            minimize = Some(arg);
        } else if next_is_size {
            next_is_size = false;
            match arg.parse::<usize>() {
                Ok(v) if v > 0 => max_size = v,
                _ => eprintln!("{arg}: ignoring invalid size"),
            }
        } else {
            match arg.as_str() {
                "--recheck" => recheck = true,
                "--minimize" => next_is_min = true,
                "-d" | "--dir" => next_is_dir = true,
                "-s" | "--size" => next_is_size = true,
                "-h" | "-help" | "--help" => print_help = true,
                _ => eprintln!("{arg}: ignoring unknown argument"),
            }
        }
    }
    let dir = Path::new(&directory);
    if print_help {
        print_help_text();
    } else if let Some(file) = minimize {
        fs::create_dir_all(dir).unwrap();
        let grid = load_grid(Path::new(&file));
        let mut hasher = RandomState::new().build_hasher();
        store_grid(dir, &minimize_grid(&mut hasher, grid));
    } else if recheck {
        let mut last = Instant::now();
        for file in fs::read_dir(dir).unwrap() {
            let file = file.unwrap().path();
            if check_grid(&load_grid(&file)) {
                success += 1;
                fs::remove_file(file).unwrap();
            } else {
                failure += 1;
            }
            let now = Instant::now();
            if now.duration_since(last) > Duration::from_secs(2) {
                print_status(success, failure);
                last = now;
            }
        }
        print_status(success, failure);
    } else {
        fs::create_dir_all(dir).unwrap();
        loop {
            let random = RandomState::new();
            let mut last = Instant::now();
            let mut hasher = random.build_hasher();
            for i in 0..100_000 {
                hasher.write_usize(i);
                let grid = generate_grid(&mut hasher, max_size);
                if check_grid(&grid) {
                    success += 1;
                } else {
                    failure += 1;
                    store_grid(dir, &minimize_grid(&mut hasher, grid));
                }
                let now = Instant::now();
                if now.duration_since(last) > Duration::from_secs(2) {
                    print_status(success, failure);
                    last = now;
                }
            }
        }
    }
}
