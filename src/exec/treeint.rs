//! Tree-walking interpreter over the parsed script.

use crate::{ast::Script, runtime::Runtime, Error, Grid};

use super::{Executor, NeighborCounter};

/// Parses the script and evaluates its top level once, then walks the syntax
/// tree of the neighbor function for every cell.
///
/// # Examples
/// ```
/// # use polylife::{ast::NEIGHBOR_SCRIPT, Error, Executor, Grid, NeighborCounter, TreeInterpreter};
/// let exec = TreeInterpreter::create(NEIGHBOR_SCRIPT, 1)?;
/// let grid = Grid::parse("***\n***\n***\n", 3, 3)?;
/// assert_eq!(exec.count(&grid, 1, 1)?, 8);
/// assert_eq!(exec.count(&grid, 2, 1)?, 5);
/// # Ok::<(), Error>(())
/// ```
pub struct TreeInterpreter {
    runtime: Runtime,
}

impl TreeInterpreter {
    /// Print the syntax tree the interpreter executes.
    pub fn print_ast(&self) {
        println!("{:#?}", self.runtime.script());
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

impl<'code> Executor<'code> for TreeInterpreter {
    fn create(code: &'code str, opt: u32) -> Result<Self, Error> {
        let mut script = Script::parse(code)?;
        if opt > 0 {
            script = script.optimize();
        }
        Ok(TreeInterpreter {
            runtime: Runtime::new(script)?,
        })
    }
}

impl NeighborCounter for TreeInterpreter {
    fn count(&self, grid: &Grid, row: usize, col: usize) -> Result<i64, Error> {
        self.runtime.count(grid, row, col)
    }
}

counter_tests!(TreeInterpreter);
script_tests!(TreeInterpreter);
