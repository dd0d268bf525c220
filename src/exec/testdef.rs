/// Tests every neighbor counter has to pass, using the builtin neighbor script.
macro_rules! counter_tests {
    ($i:ident) => {
        #[cfg(test)]
        mod tests {
            use crate::{
                ast::NEIGHBOR_SCRIPT, next_generation, run, $i, Error, Executor, Grid,
                NeighborCounter,
            };

            fn pattern(rows: usize, cols: usize, seed: u64) -> Grid {
                let mut state = seed;
                let cells = (0..rows * cols)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        ((state >> 33) % 3 == 0) as u8
                    })
                    .collect();
                Grid::from_cells(rows, cols, cells)
            }

            #[test]
            fn full_grid_counts() -> Result<(), Error> {
                let exec = $i::create(NEIGHBOR_SCRIPT, 1)?;
                let grid = Grid::parse("***\n***\n***\n", 3, 3)?;
                assert_eq!(exec.count(&grid, 1, 1)?, 8);
                for (row, col) in [(0, 0), (0, 2), (2, 0), (2, 2)] {
                    assert_eq!(exec.count(&grid, row, col)?, 3);
                }
                for (row, col) in [(0, 1), (1, 0), (1, 2), (2, 1)] {
                    assert_eq!(exec.count(&grid, row, col)?, 5);
                }
                Ok(())
            }

            #[test]
            fn cell_is_not_its_own_neighbor() -> Result<(), Error> {
                let exec = $i::create(NEIGHBOR_SCRIPT, 1)?;
                let grid = Grid::parse("...\n.*.\n...\n", 3, 3)?;
                assert_eq!(exec.count(&grid, 1, 1)?, 0);
                assert_eq!(exec.count(&grid, 0, 0)?, 1);
                assert_eq!(exec.count(&grid, 2, 1)?, 1);
                Ok(())
            }

            #[test]
            fn single_cell_grid_has_no_neighbors() -> Result<(), Error> {
                let exec = $i::create(NEIGHBOR_SCRIPT, 1)?;
                let grid = Grid::parse("*\n", 1, 1)?;
                assert_eq!(exec.count(&grid, 0, 0)?, 0);
                Ok(())
            }

            #[test]
            fn counts_agree_with_native() -> Result<(), Error> {
                let exec = $i::create(NEIGHBOR_SCRIPT, 1)?;
                let grid = pattern(13, 17, 42);
                for row in 0..grid.rows() {
                    for col in 0..grid.cols() {
                        assert_eq!(
                            exec.count(&grid, row, col)?,
                            crate::NativeCounter.count(&grid, row, col)?,
                            "cell ({row}, {col})"
                        );
                    }
                }
                Ok(())
            }

            #[test]
            fn optimization_does_not_change_counts() -> Result<(), Error> {
                let grid = pattern(9, 6, 7);
                let expected = next_generation(&grid, &$i::create(NEIGHBOR_SCRIPT, 0)?)?;
                for opt in 1..=3 {
                    let exec = $i::create(NEIGHBOR_SCRIPT, opt)?;
                    assert_eq!(next_generation(&grid, &exec)?, expected, "-O{opt}");
                }
                Ok(())
            }

            #[test]
            fn block_is_still_life() -> Result<(), Error> {
                let exec = $i::create(NEIGHBOR_SCRIPT, 1)?;
                let grid = Grid::parse("....\n.**.\n.**.\n....\n", 4, 4)?;
                assert_eq!(next_generation(&grid, &exec)?, grid);
                Ok(())
            }

            #[test]
            fn glider_matches_native() -> Result<(), Error> {
                let exec = $i::create(NEIGHBOR_SCRIPT, 1)?;
                let grid = Grid::parse(".*....\n..*...\n***...\n......\n......\n", 5, 6)?;
                let expected = run(grid.clone(), 6, &crate::NativeCounter, |_, _| {})?;
                assert_eq!(run(grid, 6, &exec, |_, _| {})?, expected);
                Ok(())
            }
        }
    };
}

/// Tests for counters that actually run the script they are created with.
macro_rules! script_tests {
    ($i:ident) => {
        #[cfg(test)]
        mod script_tests {
            use crate::{next_generation, $i, Error, Executor, Grid, NeighborCounter};

            #[test]
            fn constant_script_fills_grid() -> Result<(), Error> {
                let exec = $i::create("function three(g, r, c) { return 3; } three", 1)?;
                let grid = Grid::new(4, 5);
                assert_eq!(next_generation(&grid, &exec)?.live_cells(), 20);
                Ok(())
            }

            #[test]
            fn script_reads_globals() -> Result<(), Error> {
                let code = "var keep = 2;\nfunction f(g, r, c) { return keep; }\nf";
                let exec = $i::create(code, 1)?;
                let grid = Grid::parse("*..\n.*.\n..*\n", 3, 3)?;
                assert_eq!(next_generation(&grid, &exec)?, grid);
                Ok(())
            }

            #[test]
            fn script_receives_grid_size() -> Result<(), Error> {
                let code = "function f(g, r, c, n, m) {
                    if (r == 0 && c == 0) return n * 10 + m;
                    return g[r][c] + r - c;
                }
                f";
                let exec = $i::create(code, 1)?;
                let grid = Grid::parse("...\n.*.\n", 2, 3)?;
                assert_eq!(exec.count(&grid, 0, 0)?, 32);
                assert_eq!(exec.count(&grid, 1, 1)?, 1);
                assert_eq!(exec.count(&grid, 1, 2)?, -1);
                Ok(())
            }

            #[test]
            fn missing_result_returns_error() -> Result<(), Error> {
                let exec = $i::create("function f(g) { } f", 1)?;
                let result = exec.count(&Grid::new(1, 1), 0, 0);
                assert!(matches!(result, Err(Error::Script(_))), "{result:?}");
                Ok(())
            }

            #[test]
            fn reading_unassigned_variable_returns_error() -> Result<(), Error> {
                let code = "function f(g, r) {
                    if (r > 0) { y = 2; }
                    if (r > 1) { y = 4; }
                    return y + 1;
                }
                f";
                let exec = $i::create(code, 1)?;
                let grid = Grid::new(3, 1);
                let result = exec.count(&grid, 0, 0);
                assert!(matches!(result, Err(Error::Script(_))), "{result:?}");
                assert_eq!(exec.count(&grid, 1, 0)?, 3);
                assert_eq!(exec.count(&grid, 2, 0)?, 5);
                Ok(())
            }

            #[test]
            fn declared_variable_hides_global() -> Result<(), Error> {
                let code = "var z = 5;
                function f(g, r) {
                    if (r > 0) { var z; }
                    return z + 1;
                }
                f";
                let exec = $i::create(code, 1)?;
                let grid = Grid::new(2, 1);
                assert_eq!(exec.count(&grid, 0, 0)?, 6);
                let result = exec.count(&grid, 1, 0);
                assert!(matches!(result, Err(Error::Script(_))), "{result:?}");
                Ok(())
            }

            #[test]
            fn division_by_zero_returns_error() -> Result<(), Error> {
                let exec = $i::create("function f(g, r) { return 1 / r; } f", 1)?;
                let grid = Grid::new(2, 1);
                assert!(matches!(exec.count(&grid, 0, 0), Err(Error::Script(_))));
                assert_eq!(exec.count(&grid, 1, 0)?, 1);
                Ok(())
            }

            #[test]
            fn script_without_function_fails_to_create() {
                let result = $i::create("var x = 1; x", 1);
                assert!(matches!(result, Err(Error::Script(_))));
            }

            #[test]
            fn broken_script_fails_to_create() {
                let result = $i::create("function f(g { return 0; } f", 1);
                assert!(matches!(result, Err(Error::Syntax { position: 13, .. })));
            }
        }
    };
}
