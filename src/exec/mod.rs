//! This module contains the different strategies for counting neighbors.

use crate::{Error, Grid};

#[macro_use]
mod testdef;

mod inplace;
mod native;
mod treeint;

#[cfg(feature = "llvm")]
mod llvmjit;

pub use inplace::InplaceInterpreter;
pub use native::NativeCounter;
pub use treeint::TreeInterpreter;

#[cfg(feature = "llvm")]
pub use llvmjit::LlvmJitCompiler;

/// Trait implemented by the different neighbor counting strategies provided
/// by this crate.
pub trait NeighborCounter {
    /// Return the number of live cells among the eight neighbors of the cell
    /// at `row` and `col`. Positions outside of the grid count as dead.
    fn count(&self, grid: &Grid, row: usize, col: usize) -> Result<i64, Error>;
}

pub trait Executor<'code>: NeighborCounter + Sized {
    /// Creates a new counter that runs the neighbor function defined by the
    /// script `code`. The code may be captured or used to create other internal
    /// representations. If the counter supports optimizations, they should be
    /// influenced by the `opt` parameter to this method.
    fn create(code: &'code str, opt: u32) -> Result<Self, Error>;
}
