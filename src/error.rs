//! Error type shared by the cell grid, the particle container and the expression evaluator.
use crate::expr::ValueKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Non-positive or non-finite extent, bad cutoff, or a grid too fine to address.
    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("variable `{name}` holds {found} values, not {expected}")]
    VariableKind {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("variable `{0}` is already declared")]
    DuplicateVariable(String),

    /// The neighbour index was built from positions that have since changed.
    #[error("neighbour index is stale (built at generation {index}, positions at generation {positions})")]
    StaleIndex { index: u64, positions: u64 },

    #[error("neighbour search has not been initialised")]
    NoNeighbourSearch,

    #[error("query radius {radius} exceeds the grid cutoff {cutoff}")]
    QueryRadius { radius: f64, cutoff: f64 },

    #[error("type error in expression: {0}")]
    Type(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
