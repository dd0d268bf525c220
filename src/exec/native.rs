//! Neighbor counting implemented directly in Rust.

use crate::{Error, Grid};

use super::{Executor, NeighborCounter};

/// Counts neighbors without going through a script. The script passed to
/// [`Executor::create`] is ignored. Serves as the reference for the other
/// counters.
///
/// # Examples
/// ```
/// # use polylife::{Error, Grid, NativeCounter, NeighborCounter};
/// let grid = Grid::parse("***\n*.*\n***\n", 3, 3)?;
/// assert_eq!(NativeCounter.count(&grid, 1, 1)?, 8);
/// assert_eq!(NativeCounter.count(&grid, 0, 0)?, 2);
/// # Ok::<(), Error>(())
/// ```
#[derive(Clone, Copy, Default, Debug)]
pub struct NativeCounter;

impl<'code> Executor<'code> for NativeCounter {
    fn create(_code: &'code str, _opt: u32) -> Result<Self, Error> {
        Ok(NativeCounter)
    }
}

impl NeighborCounter for NativeCounter {
    fn count(&self, grid: &Grid, row: usize, col: usize) -> Result<i64, Error> {
        let (row, col) = (row as isize, col as isize);
        let mut alive_neighbours = 0;
        for i in -1..=1 {
            for j in -1..=1 {
                if i != 0 || j != 0 {
                    alive_neighbours += grid.cell_or_dead(row + i, col + j) as i64;
                }
            }
        }
        Ok(alive_neighbours)
    }
}

counter_tests!(NativeCounter);
