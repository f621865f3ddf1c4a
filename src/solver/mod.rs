pub mod policy;
pub mod value_iteration;

use crate::error::{ConfigError, Result};
use crate::gridworld::{CellKind, Direction, Grid};

const PROBABILITY_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BranchProbs {
    // Probability of ending up where the intended direction points.
    pub forward: f64,
    // Probability of each of the two lateral outcomes.
    pub lateral: f64,
}

impl Default for BranchProbs {
    fn default() -> Self {
        BranchProbs {
            forward: 0.8,
            lateral: 0.1,
        }
    }
}

impl BranchProbs {
    pub fn validate(&self) -> Result<()> {
        let valid = self.forward.is_finite()
            && self.lateral.is_finite()
            && self.forward >= 0.0
            && self.lateral >= 0.0
            && (self.forward + 2.0 * self.lateral - 1.0).abs() < PROBABILITY_TOLERANCE;
        if !valid {
            return Err(ConfigError::InvalidProbabilities {
                forward: self.forward,
                lateral: self.lateral,
            }
            .into());
        }
        Ok(())
    }
}

// How an in-bounds Blocked neighbor contributes to the value term of an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockedNeighbor {
    // The blocked cell's own fixed value, which is always zero.
    ZeroValue,
    // The source cell's value, as if the move hit a wall.
    Bounce,
}

impl Default for BlockedNeighbor {
    fn default() -> Self {
        BlockedNeighbor::ZeroValue
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    pub direction: Direction,
    pub probability: f64,
}

// The three stochastic outcomes of intending to move in `intended`: forward, then
// the two lateral directions in cyclic order.
pub fn outcomes(intended: Direction, probs: &BranchProbs) -> [Outcome; 3] {
    let (lateral_a, lateral_b) = intended.laterals();
    [
        Outcome {
            direction: intended,
            probability: probs.forward,
        },
        Outcome {
            direction: lateral_a,
            probability: probs.lateral,
        },
        Outcome {
            direction: lateral_b,
            probability: probs.lateral,
        },
    ]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutcomeTerms {
    pub value: f64,
    pub reward: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransitionModel {
    pub probs: BranchProbs,
    pub blocked_neighbor: BlockedNeighbor,
}

impl TransitionModel {
    pub fn new(probs: BranchProbs, blocked_neighbor: BlockedNeighbor) -> TransitionModel {
        TransitionModel {
            probs,
            blocked_neighbor,
        }
    }

    // Value and reward of moving from (row, col) in `direction`, read from the grid's
    // current snapshot. Leaving the grid keeps the agent in place.
    pub fn outcome_terms(
        &self,
        grid: &Grid,
        row: usize,
        col: usize,
        direction: Direction,
    ) -> OutcomeTerms {
        let own_value = grid.values()[(row, col)];
        match grid.neighbor(row, col, direction) {
            None => OutcomeTerms {
                value: own_value,
                reward: grid.living_reward(),
            },
            Some((nr, nc)) => {
                let kind = grid.kinds()[(nr, nc)];
                let value = match (kind, self.blocked_neighbor) {
                    (CellKind::Blocked, BlockedNeighbor::Bounce) => own_value,
                    _ => grid.values()[(nr, nc)],
                };
                OutcomeTerms {
                    value,
                    reward: grid.reward(kind),
                }
            }
        }
    }

    // Returns the expected value of intending to move in `intended` from (row, col).
    pub fn action_value(&self, grid: &Grid, row: usize, col: usize, intended: Direction) -> f64 {
        outcomes(intended, &self.probs)
            .iter()
            .map(|outcome| {
                let terms = self.outcome_terms(grid, row, col, outcome.direction);
                outcome.probability * (terms.value + terms.reward)
            })
            .sum()
    }

    // Maximum action value over all directions. Ties keep the earliest direction in
    // `Direction::ALL`.
    pub fn best_action(&self, grid: &Grid, row: usize, col: usize) -> (Direction, f64) {
        let mut best_direction = Direction::ALL[0];
        let mut best_value = f64::NEG_INFINITY;
        for direction in Direction::ALL.iter() {
            let value = self.action_value(grid, row, col, *direction);
            if value > best_value {
                best_direction = *direction;
                best_value = value;
            }
        }
        (best_direction, best_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(layout: &[&str], values: &[(usize, usize, f64)]) -> Grid {
        let mut grid = Grid::build(layout).unwrap();
        for (r, c, v) in values {
            grid.set_value(*r, *c, *v).unwrap();
        }
        grid
    }

    #[test]
    fn default_probabilities_are_valid() {
        assert!(BranchProbs::default().validate().is_ok());
    }

    #[test]
    fn probabilities_must_sum_to_one() {
        let probs = BranchProbs {
            forward: 0.7,
            lateral: 0.1,
        };
        assert!(probs.validate().is_err());
        let probs = BranchProbs {
            forward: 1.2,
            lateral: -0.1,
        };
        assert!(probs.validate().is_err());
        let probs = BranchProbs {
            forward: f64::NAN,
            lateral: 0.1,
        };
        assert!(probs.validate().is_err());
        let probs = BranchProbs {
            forward: 1.0,
            lateral: 0.0,
        };
        assert!(probs.validate().is_ok());
    }

    #[test]
    fn outcomes_are_forward_then_laterals() {
        let o = outcomes(Direction::Left, &BranchProbs::default());
        assert_eq!(o[0].direction, Direction::Left);
        assert_eq!(o[1].direction, Direction::Up);
        assert_eq!(o[2].direction, Direction::Down);
        assert_eq!(o[0].probability, 0.8);
        assert_eq!(o[1].probability, 0.1);
    }

    #[test]
    fn interior_cell_with_zero_neighbors() {
        let grid = Grid::build(&["111", "111", "111"]).unwrap();
        let model = TransitionModel::default();
        for d in Direction::ALL.iter() {
            assert!((model.action_value(&grid, 1, 1, *d) + 0.04).abs() < 1e-12);
        }
    }

    #[test]
    fn off_grid_outcome_uses_own_value() {
        let grid = grid_with(&["11", "11"], &[(0, 0, 0.5)]);
        let model = TransitionModel::default();
        let terms = model.outcome_terms(&grid, 0, 0, Direction::Up);
        assert_eq!(terms.value, 0.5);
        assert!((terms.reward + 0.04).abs() < 1e-12);

        // Up: forward off-grid, Right lateral to (0,1), Left lateral off-grid.
        let expected = 0.8 * (0.5 - 0.04) + 0.1 * (0.0 - 0.04) + 0.1 * (0.5 - 0.04);
        assert!((model.action_value(&grid, 0, 0, Direction::Up) - expected).abs() < 1e-12);
    }

    #[test]
    fn terminal_neighbor_contributes_its_reward() {
        let grid = Grid::build(&["1+"]).unwrap();
        let model = TransitionModel::default();
        let terms = model.outcome_terms(&grid, 0, 0, Direction::Right);
        assert_eq!(terms.value, 0.0);
        assert!((terms.reward - 0.96).abs() < 1e-12);
        let (direction, value) = model.best_action(&grid, 0, 0);
        assert_eq!(direction, Direction::Right);
        assert!((value - (0.8 * 0.96 - 0.2 * 0.04)).abs() < 1e-12);
    }

    #[test]
    fn blocked_neighbor_modes() {
        let grid = grid_with(&["10"], &[(0, 0, 0.5)]);
        let zero = TransitionModel::new(BranchProbs::default(), BlockedNeighbor::ZeroValue);
        let bounce = TransitionModel::new(BranchProbs::default(), BlockedNeighbor::Bounce);
        assert_eq!(zero.outcome_terms(&grid, 0, 0, Direction::Right).value, 0.0);
        assert_eq!(bounce.outcome_terms(&grid, 0, 0, Direction::Right).value, 0.5);
        assert!((bounce.outcome_terms(&grid, 0, 0, Direction::Right).reward + 0.04).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_first_direction() {
        let grid = Grid::build(&["1"]).unwrap();
        let (direction, value) = TransitionModel::default().best_action(&grid, 0, 0);
        assert_eq!(direction, Direction::Up);
        assert!((value + 0.04).abs() < 1e-12);
    }
}
