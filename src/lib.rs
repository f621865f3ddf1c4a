pub mod error;
pub mod gridworld;
pub mod solver;

pub use error::{ConfigError, Error, Result};
pub use gridworld::{Cell, CellKind, Direction, Grid};
pub use solver::policy::GreedyPolicy;
pub use solver::value_iteration::{
    Engine, EngineConfig, EngineState, StepResult, Sweep, SweepObserver,
};
pub use solver::{BlockedNeighbor, BranchProbs, TransitionModel};
