use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::gridworld::Direction;

// Directions chosen for each cell during a single sweep. Cells that were not swept
// (anything but Normal) hold `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct GreedyPolicy {
    actions: DMatrix<Option<Direction>>,
}

impl GreedyPolicy {
    pub fn new(rows: usize, cols: usize) -> GreedyPolicy {
        GreedyPolicy {
            actions: DMatrix::from_element(rows, cols, None),
        }
    }

    pub(crate) fn record(&mut self, row: usize, col: usize, direction: Direction) {
        self.actions[(row, col)] = Some(direction);
    }

    pub fn best_action(&self, row: usize, col: usize) -> Result<Direction> {
        if row >= self.actions.nrows() || col >= self.actions.ncols() {
            return Err(Error::InvalidCoordinate {
                row,
                col,
                rows: self.actions.nrows(),
                cols: self.actions.ncols(),
            });
        }
        self.actions[(row, col)].ok_or(Error::NotAvailable { row, col })
    }

    pub fn actions(&self) -> &DMatrix<Option<Direction>> {
        &self.actions
    }
}
