use nalgebra::DMatrix;
use prettytable::{Cell as TableCell, Row, Table};
use rand::Rng;

use crate::error::{ConfigError, Error, Result};
use crate::solver::policy::GreedyPolicy;

pub const DEFAULT_LIVING_COST: f64 = 0.04;

const UP: &'static str = "↑";
const DOWN: &'static str = "↓";
const LEFT: &'static str = "←";
const RIGHT: &'static str = "→";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellKind {
    Normal,
    Blocked,
    TerminalPositive,
    TerminalNegative,
}

impl CellKind {
    pub fn from_symbol(symbol: char) -> Option<CellKind> {
        match symbol {
            '1' => Some(CellKind::Normal),
            '0' => Some(CellKind::Blocked),
            '+' => Some(CellKind::TerminalPositive),
            '-' => Some(CellKind::TerminalNegative),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            CellKind::Normal => '1',
            CellKind::Blocked => '0',
            CellKind::TerminalPositive => '+',
            CellKind::TerminalNegative => '-',
        }
    }

    pub fn is_normal(&self) -> bool {
        *self == CellKind::Normal
    }

    // Terminal payoffs have the living cost folded in once, here.
    pub fn reward(&self, living_cost: f64) -> f64 {
        match self {
            CellKind::Normal | CellKind::Blocked => -living_cost,
            CellKind::TerminalPositive => 1.0 - living_cost,
            CellKind::TerminalNegative => -1.0 - living_cost,
        }
    }
}

// Reward for entering a cell of `kind` under the default living cost.
pub fn reward(kind: CellKind) -> f64 {
    kind.reward(DEFAULT_LIVING_COST)
}

// Intended movement direction.
// The order of the variants is the cyclic order used to pick lateral
// outcomes, so `index()` must stay in sync with `ALL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    pub fn index(&self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Left => 1,
            Direction::Down => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_index(index: usize) -> Direction {
        Direction::ALL[index % Direction::ALL.len()]
    }

    pub fn offset(&self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Left => (0, -1),
            Direction::Down => (1, 0),
            Direction::Right => (0, 1),
        }
    }

    // Neighbors of this direction in the cyclic order: `(i - 1) mod 4` and `(i + 1) mod 4`.
    pub fn laterals(&self) -> (Direction, Direction) {
        let n = Direction::ALL.len();
        let i = self.index();
        (
            Direction::from_index((i + n - 1) % n),
            Direction::from_index((i + 1) % n),
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Direction::Up => UP,
            Direction::Left => LEFT,
            Direction::Down => DOWN,
            Direction::Right => RIGHT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub kind: CellKind,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    kinds: DMatrix<CellKind>,
    // Only entries of Normal cells ever become non-zero.
    values: DMatrix<f64>,
    living_cost: f64,
}

impl Grid {
    // Parses a layout where every non-whitespace character of a row is a cell symbol.
    pub fn build<S: AsRef<str>>(layout: &[S]) -> Result<Grid> {
        let mut kinds = Vec::with_capacity(layout.len());
        for (row, line) in layout.iter().enumerate() {
            let mut row_kinds = Vec::new();
            for (col, symbol) in line
                .as_ref()
                .chars()
                .filter(|c| !c.is_whitespace())
                .enumerate()
            {
                let kind = CellKind::from_symbol(symbol)
                    .ok_or(ConfigError::UnknownSymbol { row, col, symbol })?;
                row_kinds.push(kind);
            }
            kinds.push(row_kinds);
        }
        Grid::from_kinds(kinds)
    }

    pub fn from_kinds(layout: Vec<Vec<CellKind>>) -> Result<Grid> {
        let rows = layout.len();
        let cols = layout.first().map_or(0, |r| r.len());
        for (row, row_kinds) in layout.iter().enumerate() {
            if row_kinds.len() != cols {
                return Err(ConfigError::UnequalRows {
                    row,
                    expected: cols,
                    found: row_kinds.len(),
                }
                .into());
            }
        }
        if rows == 0 || cols == 0 {
            return Err(ConfigError::EmptyLayout.into());
        }

        Ok(Grid {
            kinds: DMatrix::from_fn(rows, cols, |r, c| layout[r][c]),
            values: DMatrix::zeros(rows, cols),
            living_cost: DEFAULT_LIVING_COST,
        })
    }

    pub fn with_living_cost(mut self, living_cost: f64) -> Result<Grid> {
        if !living_cost.is_finite() || living_cost < 0.0 {
            return Err(ConfigError::InvalidLivingCost(living_cost).into());
        }
        self.living_cost = living_cost;
        Ok(self)
    }

    pub fn rows(&self) -> usize {
        self.kinds.nrows()
    }

    pub fn cols(&self) -> usize {
        self.kinds.ncols()
    }

    pub fn living_cost(&self) -> f64 {
        self.living_cost
    }

    pub fn reward(&self, kind: CellKind) -> f64 {
        kind.reward(self.living_cost)
    }

    // Reward used when a move leaves the grid and there is no cell to read it from.
    pub fn living_reward(&self) -> f64 {
        -self.living_cost
    }

    pub fn check(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::InvalidCoordinate {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Cell> {
        self.check(row, col)?;
        Ok(Cell {
            row,
            col,
            kind: self.kinds[(row, col)],
            value: self.values[(row, col)],
        })
    }

    pub fn kind(&self, row: usize, col: usize) -> Result<CellKind> {
        self.check(row, col)?;
        Ok(self.kinds[(row, col)])
    }

    pub fn kinds(&self) -> &DMatrix<CellKind> {
        &self.kinds
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    // Writes a value into a Normal cell. Other kinds are silently left untouched.
    pub fn set_value(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check(row, col)?;
        if !value.is_finite() {
            return Err(Error::NonFiniteValue { row, col, value });
        }
        if self.kinds[(row, col)].is_normal() {
            self.values[(row, col)] = value;
        }
        Ok(())
    }

    pub fn randomize_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for (row, col) in self.normal_cells() {
            self.values[(row, col)] = rng.gen::<f64>();
        }
    }

    // Replaces the whole value snapshot. Entries of non-Normal cells are forced to zero.
    pub(crate) fn commit_values(&mut self, mut values: DMatrix<f64>) {
        debug_assert_eq!(values.shape(), self.values.shape());
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                if !self.kinds[(row, col)].is_normal() {
                    values[(row, col)] = 0.0;
                }
            }
        }
        self.values = values;
    }

    pub fn normal_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                if self.kinds[(row, col)].is_normal() {
                    cells.push((row, col));
                }
            }
        }
        cells
    }

    pub fn neighbor(&self, row: usize, col: usize, direction: Direction) -> Option<(usize, usize)> {
        let (dr, dc) = direction.offset();
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr as usize >= self.rows() || nc as usize >= self.cols() {
            return None;
        }
        Some((nr as usize, nc as usize))
    }
}

fn fixed_cell_text(kind: CellKind) -> &'static str {
    match kind {
        CellKind::Blocked | CellKind::Normal => "",
        CellKind::TerminalPositive => "+1",
        CellKind::TerminalNegative => "-1",
    }
}

pub fn values_table(grid: &Grid) -> Table {
    let mut table = Table::new();
    for r in 0..grid.rows() {
        let mut cells = Vec::new();
        for c in 0..grid.cols() {
            let kind = grid.kinds[(r, c)];
            let text = match kind {
                CellKind::Normal => format!("{:.3}", grid.values[(r, c)]),
                _ => fixed_cell_text(kind).to_string(),
            };
            cells.push(TableCell::new(text.as_ref()));
        }
        table.add_row(Row::new(cells));
    }
    table
}

// Arrows for Normal cells the policy has a direction for, blank otherwise.
pub fn policy_table(grid: &Grid, policy: &GreedyPolicy) -> Table {
    let mut table = Table::new();
    for r in 0..grid.rows() {
        let mut cells = Vec::new();
        for c in 0..grid.cols() {
            let kind = grid.kinds[(r, c)];
            let symbol = match kind {
                CellKind::Normal => policy.best_action(r, c).map_or("", |d| d.symbol()),
                _ => fixed_cell_text(kind),
            };
            cells.push(TableCell::new(symbol));
        }
        table.add_row(Row::new(cells));
    }
    table
}

pub fn print_values(grid: &Grid) {
    values_table(grid).printstd();
}

pub fn print_policy(grid: &Grid, policy: &GreedyPolicy) {
    policy_table(grid, policy).printstd();
}
