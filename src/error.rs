use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("layout has no cells")]
    EmptyLayout,
    #[error("layout row {row} has {found} cells, expected {expected}")]
    UnequalRows {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown cell symbol {symbol:?} at ({row}, {col})")]
    UnknownSymbol { row: usize, col: usize, symbol: char },
    #[error("branch probabilities forward={forward} lateral={lateral} do not sum to 1")]
    InvalidProbabilities { forward: f64, lateral: f64 },
    #[error("convergence threshold must be positive and finite, got {0}")]
    InvalidThreshold(f64),
    #[error("max_steps must be at least 1")]
    ZeroMaxSteps,
    #[error("living cost must be non-negative and finite, got {0}")]
    InvalidLivingCost(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    InvalidCoordinate {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("value {value} for cell ({row}, {col}) is not finite")]
    NonFiniteValue { row: usize, col: usize, value: f64 },
    #[error("no policy available for cell ({row}, {col})")]
    NotAvailable { row: usize, col: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
