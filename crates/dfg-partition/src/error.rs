use thiserror::Error;

use crate::groups::LabelParseError;
use crate::search::Attempt;
use crate::validate::ConsistencyError;

/// Errors of a partitioning run.
#[derive(Error, Debug)]
pub enum PartitionError {
    /// The graph has no vertices.
    #[error("graph has no vertices")]
    EmptyGraph,
    /// A parameter is out of range.
    #[error("invalid parameter {name} = {value} (must be positive)")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: usize,
    },
    /// A vertex label could not be parsed.
    #[error("label parse error: {0}")]
    LabelParse(#[from] LabelParseError),
    /// An accepted solution violates the model invariants.
    #[error("inconsistent solution: {0}")]
    Consistency(#[from] ConsistencyError),
    /// No partition count up to the iteration limit admits a solution.
    #[error("no feasible partitioning after {iterations} iterations (last tried {last_num_parts} partitions)")]
    NoFeasiblePartitioning {
        /// Number of partition counts tried.
        iterations: usize,
        /// Largest partition count tried.
        last_num_parts: usize,
        /// Every failed iteration, in order.
        attempts: Vec<Attempt>,
    },
}
