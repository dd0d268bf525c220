//! Benchmark one generation with the different neighbor counters.

use iai_callgrind::{library_benchmark, library_benchmark_group, main};
use polylife::{
    ast::NEIGHBOR_SCRIPT, next_generation, Executor, Grid, InplaceInterpreter, NativeCounter,
    TreeInterpreter,
};
use std::hint::black_box;

/// A square grid with a fixed pseudo-random pattern.
fn pattern(size: usize) -> Grid {
    let cells = (0..size * size)
        .map(|i| ((i * 7919) % 13 < 4) as u8)
        .collect();
    Grid::from_cells(size, size, cells)
}

#[library_benchmark]
#[benches::with_setup(args = [16, 64], setup = pattern)]
fn bench_native(grid: Grid) -> Grid {
    black_box(next_generation(&grid, &NativeCounter).unwrap())
}

#[library_benchmark]
#[benches::with_setup(args = [16, 64], setup = pattern)]
fn bench_tree(grid: Grid) -> Grid {
    let exec = TreeInterpreter::create(NEIGHBOR_SCRIPT, 1).unwrap();
    black_box(next_generation(&grid, &exec).unwrap())
}

#[library_benchmark]
#[benches::with_setup(args = [16], setup = pattern)]
fn bench_inplace(grid: Grid) -> Grid {
    let exec = InplaceInterpreter::create(NEIGHBOR_SCRIPT, 1).unwrap();
    black_box(next_generation(&grid, &exec).unwrap())
}

library_benchmark_group!(
    name = bench_counter_group;
    benchmarks = bench_native, bench_tree, bench_inplace
);

main!(library_benchmark_groups = bench_counter_group);
