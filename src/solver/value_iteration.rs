use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, trace};

use crate::error::{ConfigError, Error, Result};
use crate::gridworld::{Direction, Grid, DEFAULT_LIVING_COST};
use crate::solver::policy::GreedyPolicy;
use crate::solver::{BlockedNeighbor, BranchProbs, TransitionModel};

pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1e-4;
pub const DEFAULT_MAX_STEPS: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub branch_probs: BranchProbs,
    // A sweep whose largest value change is below this ends the run.
    pub convergence_threshold: f64,
    pub max_steps: u32,
    pub living_cost: f64,
    pub blocked_neighbor: BlockedNeighbor,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            branch_probs: BranchProbs::default(),
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            max_steps: DEFAULT_MAX_STEPS,
            living_cost: DEFAULT_LIVING_COST,
            blocked_neighbor: BlockedNeighbor::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_branch_probs(mut self, forward: f64, lateral: f64) -> Self {
        self.branch_probs = BranchProbs { forward, lateral };
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_living_cost(mut self, living_cost: f64) -> Self {
        self.living_cost = living_cost;
        self
    }

    pub fn with_blocked_neighbor(mut self, blocked_neighbor: BlockedNeighbor) -> Self {
        self.blocked_neighbor = blocked_neighbor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.branch_probs.validate()?;
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.convergence_threshold).into());
        }
        if self.max_steps == 0 {
            return Err(ConfigError::ZeroMaxSteps.into());
        }
        if !self.living_cost.is_finite() || self.living_cost < 0.0 {
            return Err(ConfigError::InvalidLivingCost(self.living_cost).into());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Running,
    Converged,
    Capped,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        match self {
            EngineState::Converged | EngineState::Capped => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepResult {
    pub max_delta: f64,
    pub step_count: u32,
    pub state: EngineState,
}

impl StepResult {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug)]
pub struct Sweep<'a> {
    pub step_count: u32,
    pub max_delta: f64,
    pub state: EngineState,
    pub policy: &'a GreedyPolicy,
}

pub trait SweepObserver {
    fn on_sweep(&mut self, sweep: &Sweep<'_>);
}

impl<F> SweepObserver for F
where
    F: FnMut(&Sweep<'_>),
{
    fn on_sweep(&mut self, sweep: &Sweep<'_>) {
        self(sweep)
    }
}

// Synchronous value iteration over a grid world.
// The engine owns the grid and its value snapshot. Every call to `step` computes all
// new values from the snapshot left by the previous call and then replaces it in one
// go, so readers never see a partially updated sweep.
pub struct Engine {
    grid: Grid,
    model: TransitionModel,
    config: EngineConfig,
    state: EngineState,
    step_count: u32,
    last: StepResult,
    policy: Option<GreedyPolicy>,
    observers: Vec<Box<dyn SweepObserver>>,
}

impl Engine {
    pub fn configure<S: AsRef<str>>(layout: &[S], config: EngineConfig) -> Result<Engine> {
        let grid = Grid::build(layout)?;
        Engine::new(grid, config)
    }

    pub fn new(grid: Grid, config: EngineConfig) -> Result<Engine> {
        config.validate()?;
        let grid = grid.with_living_cost(config.living_cost)?;
        debug!(
            rows = grid.rows(),
            cols = grid.cols(),
            normal_cells = grid.normal_cells().len(),
            ?config,
            "engine configured"
        );

        Ok(Engine {
            grid,
            model: TransitionModel::new(config.branch_probs, config.blocked_neighbor),
            config,
            state: EngineState::Uninitialized,
            step_count: 0,
            last: StepResult {
                max_delta: 0.0,
                step_count: 0,
                state: EngineState::Uninitialized,
            },
            policy: None,
            observers: Vec::new(),
        })
    }

    pub fn observe<O: SweepObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    // Randomizes every Normal cell's value and starts a fresh run.
    // Without a seed the generator is seeded from system entropy.
    pub fn reset(&mut self, seed: Option<u64>) {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.grid.randomize_values(&mut rng);
        self.restart();
        debug!(?seed, "values randomized");
    }

    // Overrides one Normal cell's value and starts a fresh run from the current values.
    pub fn set_cell_value(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.grid.set_value(row, col, value)?;
        self.restart();
        Ok(())
    }

    fn restart(&mut self) {
        self.state = EngineState::Ready;
        self.step_count = 0;
        self.policy = None;
        self.last = StepResult {
            max_delta: 0.0,
            step_count: 0,
            state: EngineState::Ready,
        };
    }

    // Performs one Bellman sweep over all Normal cells.
    // Once the run is converged or capped this does nothing and returns the result of
    // the last sweep again.
    pub fn step(&mut self) -> StepResult {
        if self.state.is_terminal() {
            return self.last;
        }

        let mut new_values = self.grid.values().clone();
        let mut policy = GreedyPolicy::new(self.grid.rows(), self.grid.cols());
        let mut max_delta: f64 = 0.0;

        for (row, col) in self.grid.normal_cells() {
            let (direction, value) = self.model.best_action(&self.grid, row, col);
            trace!(row, col, ?direction, value, "best action");

            let prev_value = self.grid.values()[(row, col)];
            max_delta = max_delta.max((value - prev_value).abs());
            new_values[(row, col)] = value;
            policy.record(row, col, direction);
        }

        self.grid.commit_values(new_values);
        self.step_count += 1;

        self.state = if max_delta < self.config.convergence_threshold {
            EngineState::Converged
        } else if self.step_count >= self.config.max_steps {
            EngineState::Capped
        } else {
            EngineState::Running
        };

        self.last = StepResult {
            max_delta,
            step_count: self.step_count,
            state: self.state,
        };
        debug!(step = self.step_count, max_delta, state = ?self.state, "sweep committed");
        if self.state.is_terminal() {
            info!(steps = self.step_count, max_delta, state = ?self.state, "value iteration finished");
        }

        let sweep = Sweep {
            step_count: self.step_count,
            max_delta,
            state: self.state,
            policy: &policy,
        };
        for observer in self.observers.iter_mut() {
            observer.on_sweep(&sweep);
        }

        self.policy = Some(policy);
        self.last
    }

    pub fn run(&mut self) -> StepResult {
        loop {
            let result = self.step();
            if result.is_terminal() {
                return result;
            }
        }
    }

    // Current value of a cell, or `None` for cells that are not Normal.
    pub fn cell_value(&self, row: usize, col: usize) -> Result<Option<f64>> {
        let cell = self.grid.get(row, col)?;
        Ok(if cell.kind.is_normal() {
            Some(cell.value)
        } else {
            None
        })
    }

    pub fn cell_policy(&self, row: usize, col: usize) -> Result<Direction> {
        self.grid.check(row, col)?;
        self.policy
            .as_ref()
            .ok_or(Error::NotAvailable { row, col })?
            .best_action(row, col)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn policy(&self) -> Option<&GreedyPolicy> {
        self.policy.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    const LAYOUT: [&str; 3] = ["111+", "101-", "1111"];

    #[test]
    fn default_config_values() {
        let config = EngineConfig::default();
        assert_eq!(config.branch_probs.forward, 0.8);
        assert_eq!(config.branch_probs.lateral, 0.1);
        assert_eq!(config.convergence_threshold, 1e-4);
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.living_cost, 0.04);
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = [
            EngineConfig::default().with_branch_probs(0.6, 0.1),
            EngineConfig::default().with_convergence_threshold(0.0),
            EngineConfig::default().with_convergence_threshold(f64::INFINITY),
            EngineConfig::default().with_max_steps(0),
            EngineConfig::default().with_living_cost(-0.5),
        ];
        for config in bad.iter() {
            match Engine::configure(&LAYOUT, *config) {
                Err(Error::Config(_)) => {}
                _ => panic!("expected config error for {:?}", config),
            }
        }
    }

    #[test]
    fn lifecycle_states() {
        let mut engine = Engine::configure(&LAYOUT, EngineConfig::default()).unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        engine.reset(Some(1));
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.step_count(), 0);

        let result = engine.step();
        assert_eq!(result.step_count, 1);
        assert_eq!(result.state, EngineState::Running);
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn uninitialized_step_sweeps_zero_values() {
        let mut engine = Engine::configure(&["111", "111", "111"], EngineConfig::default()).unwrap();
        let result = engine.step();
        assert_eq!(result.step_count, 1);
        let center = engine.cell_value(1, 1).unwrap().unwrap();
        assert!((center + 0.04).abs() < 1e-12);
    }

    #[test]
    fn caps_at_max_steps() {
        let config = EngineConfig::default()
            .with_max_steps(3)
            .with_convergence_threshold(1e-12);
        let mut engine = Engine::configure(&LAYOUT, config).unwrap();
        engine.reset(Some(3));
        let result = engine.run();
        assert_eq!(result.state, EngineState::Capped);
        assert_eq!(result.step_count, 3);

        let again = engine.step();
        assert_eq!(again, result);
        assert_eq!(engine.step_count(), 3);
    }

    #[test]
    fn grid_without_normal_cells_converges_immediately() {
        let mut engine = Engine::configure(&["+0-"], EngineConfig::default()).unwrap();
        engine.reset(None);
        let result = engine.step();
        assert_eq!(result.state, EngineState::Converged);
        assert_eq!(result.max_delta, 0.0);
    }

    #[test]
    fn reset_clears_terminal_state_and_policy() {
        let mut engine =
            Engine::configure(&LAYOUT, EngineConfig::default().with_max_steps(1)).unwrap();
        engine.reset(Some(5));
        assert!(engine.step().is_terminal());
        assert!(engine.cell_policy(0, 0).is_ok());

        engine.reset(Some(5));
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.step_count(), 0);
        assert_eq!(
            engine.cell_policy(0, 0),
            Err(Error::NotAvailable { row: 0, col: 0 })
        );
    }

    #[test]
    fn same_seed_same_values() {
        let mut a = Engine::configure(&LAYOUT, EngineConfig::default()).unwrap();
        let mut b = Engine::configure(&LAYOUT, EngineConfig::default()).unwrap();
        a.reset(Some(42));
        b.reset(Some(42));
        assert_eq!(a.grid().values(), b.grid().values());
    }

    #[test]
    fn cell_queries() {
        let mut engine = Engine::configure(&LAYOUT, EngineConfig::default()).unwrap();
        engine.reset(Some(9));
        assert!(engine.cell_value(0, 0).unwrap().is_some());
        assert_eq!(engine.cell_value(1, 1), Ok(None));
        assert_eq!(engine.cell_value(0, 3), Ok(None));
        assert!(matches!(
            engine.cell_value(5, 0),
            Err(Error::InvalidCoordinate { .. })
        ));

        assert_eq!(
            engine.cell_policy(0, 0),
            Err(Error::NotAvailable { row: 0, col: 0 })
        );
        engine.step();
        assert!(engine.cell_policy(0, 0).is_ok());
        assert_eq!(
            engine.cell_policy(1, 1),
            Err(Error::NotAvailable { row: 1, col: 1 })
        );
        assert!(matches!(
            engine.cell_policy(0, 9),
            Err(Error::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn set_cell_value_restarts_run() {
        let mut engine = Engine::configure(&LAYOUT, EngineConfig::default()).unwrap();
        engine.reset(Some(2));
        engine.step();
        engine.set_cell_value(0, 0, 0.25).unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.step_count(), 0);
        assert_eq!(engine.cell_value(0, 0), Ok(Some(0.25)));
        assert!(engine.set_cell_value(7, 7, 0.0).is_err());
    }

    #[test]
    fn observers_see_every_sweep() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine =
            Engine::configure(&LAYOUT, EngineConfig::default().with_max_steps(4)).unwrap();
        let sink = seen.clone();
        engine.observe(move |sweep: &Sweep<'_>| {
            let direction = sweep.policy.best_action(0, 2).ok();
            sink.borrow_mut()
                .push((sweep.step_count, sweep.max_delta, direction));
        });
        engine.reset(Some(11));
        let last = engine.run();

        let seen = seen.borrow();
        assert_eq!(seen.len() as u32, last.step_count);
        for (i, (step, _, direction)) in seen.iter().enumerate() {
            assert_eq!(*step, i as u32 + 1);
            assert!(direction.is_some());
        }
        assert_eq!(seen.last().map(|s| s.1), Some(last.max_delta));
    }

    #[test]
    fn non_finite_override_is_rejected() {
        let mut engine = Engine::configure(&LAYOUT, EngineConfig::default()).unwrap();
        engine.reset(Some(2));
        engine.step();
        let before = engine.cell_value(0, 0).unwrap();

        assert!(matches!(
            engine.set_cell_value(0, 0, f64::NAN),
            Err(Error::NonFiniteValue { row: 0, col: 0, .. })
        ));
        assert_eq!(engine.cell_value(0, 0).unwrap(), before);
        assert_eq!(engine.step_count(), 1);

        let result = engine.step();
        assert!(result.max_delta.is_finite());
        assert!(engine.cell_value(0, 0).unwrap().unwrap().is_finite());
    }
}
