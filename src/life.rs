//! The rules of the game and the driver that advances a grid by generations.

use crate::{exec::NeighborCounter, Error, Grid};

/// Return the next state of a cell with state `alive` that has
/// `alive_neighbours` live neighbors.
///
/// # Examples
/// ```
/// # use polylife::apply_rules;
/// assert_eq!(apply_rules(1, 1), 0);
/// assert_eq!(apply_rules(1, 2), 1);
/// assert_eq!(apply_rules(0, 3), 1);
/// assert_eq!(apply_rules(1, 4), 0);
/// ```
pub fn apply_rules(alive: u8, alive_neighbours: i64) -> u8 {
    match (alive != 0, alive_neighbours) {
        // Lonely or overpopulated cells die.
        (true, n) if n < 2 || n > 3 => 0,
        // A new cell is born.
        (false, 3) => 1,
        (true, _) => 1,
        (false, _) => 0,
    }
}

/// Compute the following generation of `grid`, using `counter` to find the
/// number of live neighbors of every cell. The result is a new grid, the input
/// is never modified.
pub fn next_generation<E: NeighborCounter + ?Sized>(
    grid: &Grid,
    counter: &E,
) -> Result<Grid, Error> {
    let mut future = Grid::new(grid.rows(), grid.cols());
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let alive_neighbours = counter.count(grid, row, col)?;
            future.set(row, col, apply_rules(grid[(row, col)], alive_neighbours) != 0);
        }
    }
    Ok(future)
}

/// Advance `grid` by the given number of generations. After each generation
/// `observer` is called with the number of the generation just computed and
/// the new grid. With zero generations the grid is returned unchanged.
pub fn run<E, F>(
    mut grid: Grid,
    generations: usize,
    counter: &E,
    mut observer: F,
) -> Result<Grid, Error>
where
    E: NeighborCounter + ?Sized,
    F: FnMut(usize, &Grid),
{
    for generation in 1..=generations {
        grid = next_generation(&grid, counter)?;
        observer(generation, &grid);
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use crate::{apply_rules, next_generation, run, Error, Grid, NativeCounter};

    #[test]
    fn rules_match_conway() {
        for n in 0..=8 {
            let survive = (n == 2 || n == 3) as u8;
            let born = (n == 3) as u8;
            assert_eq!(apply_rules(1, n), survive, "live cell with {n} neighbors");
            assert_eq!(apply_rules(0, n), born, "dead cell with {n} neighbors");
        }
    }

    #[test]
    fn dead_grid_stays_dead() -> Result<(), Error> {
        let grid = Grid::new(8, 8);
        let result = run(grid.clone(), 5, &NativeCounter, |_, g| {
            assert_eq!(g.live_cells(), 0)
        })?;
        assert_eq!(result, grid);
        Ok(())
    }

    #[test]
    fn block_is_still_life() -> Result<(), Error> {
        let grid = Grid::parse("....\n.**.\n.**.\n....\n", 4, 4)?;
        assert_eq!(next_generation(&grid, &NativeCounter)?, grid);
        Ok(())
    }

    #[test]
    fn block_in_corner_is_still_life() -> Result<(), Error> {
        let grid = Grid::parse("**.\n**.\n...\n", 3, 3)?;
        assert_eq!(next_generation(&grid, &NativeCounter)?, grid);
        Ok(())
    }

    #[test]
    fn filled_square_is_not_still() -> Result<(), Error> {
        let grid = Grid::parse(".....\n.***.\n.***.\n.***.\n.....\n", 5, 5)?;
        let next = next_generation(&grid, &NativeCounter)?;
        assert_eq!(next.to_text(), "..*..\n.*.*.\n*...*\n.*.*.\n..*..\n");
        Ok(())
    }

    #[test]
    fn zero_generations_return_input() -> Result<(), Error> {
        let grid = Grid::parse(".*.\n**.\n..*\n", 3, 3)?;
        let mut called = false;
        let result = run(grid.clone(), 0, &NativeCounter, |_, _| called = true)?;
        assert_eq!(result, grid);
        assert!(!called);
        Ok(())
    }

    #[test]
    fn blinker_oscillates() -> Result<(), Error> {
        let horizontal = Grid::parse(".....\n.....\n.***.\n.....\n.....\n", 5, 5)?;
        let vertical = Grid::parse(".....\n..*..\n..*..\n..*..\n.....\n", 5, 5)?;
        assert_eq!(next_generation(&horizontal, &NativeCounter)?, vertical);
        assert_eq!(run(horizontal.clone(), 2, &NativeCounter, |_, _| {})?, horizontal);
        Ok(())
    }

    #[test]
    fn glider_moves_diagonally() -> Result<(), Error> {
        let start = Grid::parse(".*....\n..*...\n***...\n......\n......\n......\n", 6, 6)?;
        let moved = Grid::parse("......\n..*...\n...*..\n.***..\n......\n......\n", 6, 6)?;
        let mut seen = Vec::new();
        assert_eq!(run(start, 4, &NativeCounter, |i, _| seen.push(i))?, moved);
        assert_eq!(seen, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn cells_leaving_grid_vanish() -> Result<(), Error> {
        let grid = Grid::parse("***\n...\n...\n", 3, 3)?;
        let next = next_generation(&grid, &NativeCounter)?;
        assert_eq!(next.to_text(), ".*.\n.*.\n...\n");
        Ok(())
    }
}
