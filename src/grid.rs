//! Contains the grid of cells and its text representation.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    ops::Index,
    path::Path,
};

use crate::Error;

/// Number of rows of the grids read and written by the command line program.
pub const ROWS: usize = 4000;

/// Number of columns of the grids read and written by the command line program.
pub const COLS: usize = 4000;

/// Character representing a live cell in the text format.
pub const ALIVE: char = '*';

/// Character representing a dead cell in the text format.
pub const DEAD: char = '.';

/// A rectangular grid of cells. Every cell is either dead (`0`) or alive (`1`).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// Create a new grid in which all cells are dead.
    ///
    /// # Panics
    /// Panics if the grid does not fit into memory. See [`Grid::try_new`].
    pub fn new(rows: usize, cols: usize) -> Self {
        Grid {
            rows,
            cols,
            cells: vec![0; rows * cols],
        }
    }

    /// Create a new grid in which all cells are dead, failing with
    /// [`Error::GridSize`] if it does not fit into memory.
    pub fn try_new(rows: usize, cols: usize) -> Result<Self, Error> {
        let too_large = || Error::GridSize { rows, cols };
        let len = rows.checked_mul(cols).ok_or_else(too_large)?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(len).map_err(|_| too_large())?;
        cells.resize(len, 0);
        Ok(Grid { rows, cols, cells })
    }

    /// Create a grid from the row-major list of cell states. Non-zero states
    /// are treated as alive.
    ///
    /// # Panics
    /// Panics if `cells` does not contain exactly `rows * cols` states.
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<u8>) -> Self {
        assert_eq!(cells.len(), rows * cols, "cell count does not match size");
        Grid {
            rows,
            cols,
            cells: cells.into_iter().map(|c| (c != 0) as u8).collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The row-major cell states.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Set the state of a single cell.
    pub fn set(&mut self, row: usize, col: usize, alive: bool) {
        let idx = self.offset(row, col);
        self.cells[idx] = alive as u8;
    }

    /// Return the state of the cell at the given position, or zero if the
    /// position lies outside of the grid.
    pub fn cell_or_dead(&self, row: isize, col: isize) -> u8 {
        if row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols {
            self.cells[row as usize * self.cols + col as usize]
        } else {
            0
        }
    }

    /// Count the live cells in the grid.
    pub fn live_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({row}, {col}) outside of {}x{} grid",
            self.rows,
            self.cols
        );
        row * self.cols + col
    }

    /// Read a grid of the given size from its text representation. Every line
    /// holds one row and every byte of it is one cell. Surplus lines and bytes
    /// are ignored, and every byte other than [`ALIVE`] is a dead cell. The
    /// input need not be valid UTF-8.
    ///
    /// # Examples
    /// ```
    /// # use polylife::{Grid, Error};
    /// let grid = Grid::read("..*\n*x.\n".as_bytes(), 2, 3)?;
    /// assert_eq!(grid.live_cells(), 2);
    /// assert_eq!(grid[(1, 0)], 1);
    /// # Ok::<(), Error>(())
    /// ```
    pub fn read<R: BufRead>(mut reader: R, rows: usize, cols: usize) -> Result<Self, Error> {
        let mut grid = Grid::try_new(rows, cols)?;
        let mut line = Vec::new();
        for row in 0..rows {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Err(Error::MissingRow { row, rows });
            }
            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }
            if line.len() < cols {
                return Err(Error::ShortRow {
                    row,
                    len: line.len(),
                    cols,
                });
            }
            let cells = &mut grid.cells[row * cols..(row + 1) * cols];
            for (cell, &byte) in cells.iter_mut().zip(&line) {
                *cell = (byte == ALIVE as u8) as u8;
            }
        }
        Ok(grid)
    }

    /// Parse a grid of the given size from a string. See [`Grid::read`].
    pub fn parse(text: &str, rows: usize, cols: usize) -> Result<Self, Error> {
        Self::read(text.as_bytes(), rows, cols)
    }

    /// Write the text representation of the grid, one line per row.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        let mut line = Vec::with_capacity(self.cols + 1);
        for row in 0..self.rows {
            let cells = &self.cells[row * self.cols..(row + 1) * self.cols];
            line.clear();
            line.extend(cells.iter().map(|&c| if c != 0 { ALIVE as u8 } else { DEAD as u8 }));
            line.push(b'\n');
            writer.write_all(&line)?;
        }
        Ok(())
    }

    /// Return the text representation of the grid.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.rows * (self.cols + 1));
        for row in 0..self.rows {
            for col in 0..self.cols {
                text.push(if self[(row, col)] != 0 { ALIVE } else { DEAD });
            }
            text.push('\n');
        }
        text
    }

    /// Load a grid of the given size from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P, rows: usize, cols: usize) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::File {
            path: path.to_owned(),
            source,
        })?;
        match Self::read(BufReader::new(file), rows, cols) {
            Err(Error::Io(source)) => Err(Error::File {
                path: path.to_owned(),
                source,
            }),
            result => result,
        }
    }

    /// Save the grid to the file at `path`, replacing any previous content.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let file_error = |source| Error::File {
            path: path.to_owned(),
            source,
        };
        let file = File::create(path).map_err(file_error)?;
        let mut writer = BufWriter::new(file);
        match self.write(&mut writer) {
            Err(Error::Io(source)) => return Err(file_error(source)),
            result => result?,
        }
        writer.flush().map_err(file_error)
    }
}

impl Index<(usize, usize)> for Grid {
    type Output = u8;

    fn index(&self, (row, col): (usize, usize)) -> &u8 {
        &self.cells[self.offset(row, col)]
    }
}
