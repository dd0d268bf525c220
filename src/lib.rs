//! Conway's Game of Life with interchangeable neighbor counters. The per-cell
//! neighbor count can be computed natively or by a small embedded script
//! language executed at different tiers, from re-parsing the source for every
//! cell up to compiling it with LLVM.

use std::{io, path::PathBuf};

use thiserror::Error;

pub mod ast;
pub mod exec;
pub mod grid;
pub mod lexer;
pub mod life;
pub mod runtime;
pub mod stats;

pub use exec::{Executor, InplaceInterpreter, NativeCounter, NeighborCounter, TreeInterpreter};
pub use grid::{Grid, COLS, ROWS};
pub use life::{apply_rules, next_generation, run};

#[cfg(feature = "llvm")]
pub use exec::LlvmJitCompiler;

/// Errors that prevent loading, simulating, or saving a grid.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening, reading or writing the file at `path` failed.
    #[error("failed to access `{}`: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },

    /// I/O failure on a reader or writer that has no associated path.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The input ended before all rows of the grid were read.
    #[error("input ended at row {row}, expected {rows} rows")]
    MissingRow { row: usize, rows: usize },

    /// A row of the input contains fewer cells than the grid has columns.
    #[error("row {row} has {len} cells, expected {cols}")]
    ShortRow { row: usize, len: usize, cols: usize },

    /// The requested grid does not fit into memory.
    #[error("grid of {rows}x{cols} cells is too large")]
    GridSize { rows: usize, cols: usize },

    /// The neighbor script could not be parsed. `position` is a byte offset.
    #[error("syntax error at byte {position}: {message}")]
    Syntax { message: String, position: usize },

    /// The neighbor script failed while running.
    #[error("script error: {0}")]
    Script(String),

    /// Code generation or JIT compilation failed.
    #[error("llvm error: {0}")]
    Llvm(String),
}

impl Error {
    /// Create a syntax error at the given byte offset.
    pub(crate) fn syntax<S: ToString>(message: S, position: usize) -> Self {
        Error::Syntax {
            message: message.to_string(),
            position,
        }
    }

    /// Create a runtime error of the script.
    pub(crate) fn script<S: ToString>(message: S) -> Self {
        Error::Script(message.to_string())
    }
}
