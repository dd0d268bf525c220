//! An interpreter that starts over from the source text for every cell.

use crate::{ast::Script, runtime::Runtime, Error, Grid};

use super::{Executor, NeighborCounter};

/// A non-caching interpreter. Every call to [`NeighborCounter::count`] parses
/// the script and evaluates its top level again before calling the neighbor
/// function, so the cost of setting up the script is paid once per cell.
///
/// # Examples
/// ```
/// # use polylife::{ast::NEIGHBOR_SCRIPT, Error, Executor, Grid, InplaceInterpreter, NeighborCounter};
/// let exec = InplaceInterpreter::create(NEIGHBOR_SCRIPT, 1)?;
/// let grid = Grid::parse(".*\n**\n", 2, 2)?;
/// assert_eq!(exec.count(&grid, 0, 0)?, 3);
/// # Ok::<(), Error>(())
/// ```
pub struct InplaceInterpreter<'code> {
    code: &'code str,
    opt: u32,
}

impl<'code> InplaceInterpreter<'code> {
    fn runtime(&self) -> Result<Runtime, Error> {
        let mut script = Script::parse(self.code)?;
        if self.opt > 0 {
            script = script.optimize();
        }
        Runtime::new(script)
    }
}

impl<'code> Executor<'code> for InplaceInterpreter<'code> {
    fn create(code: &'code str, opt: u32) -> Result<Self, Error> {
        let exec = InplaceInterpreter { code, opt };
        // Report broken scripts before the first generation.
        exec.runtime()?;
        Ok(exec)
    }
}

impl<'code> NeighborCounter for InplaceInterpreter<'code> {
    fn count(&self, grid: &Grid, row: usize, col: usize) -> Result<i64, Error> {
        self.runtime()?.count(grid, row, col)
    }
}

counter_tests!(InplaceInterpreter);
script_tests!(InplaceInterpreter);
