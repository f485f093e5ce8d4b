//! Partition a dataflow graph into capacity-bounded, ordered tiles with a 0-1 integer program.
//!
//! Every vertex is placed in one of `P` partitions such that
//! + no partition holds more than `capacity` vertices,
//! + edges never point to an earlier partition,
//! + per partition, the values read from earlier partitions plus the load groups present, and
//!   the values written to later partitions plus the store groups present, each stay within
//!   the transaction limit.
//!
//! Among those placements, the model minimizes weighted group transactions plus crossings.
//! The search starts at `P = ceil(n / capacity)` and adds one partition per infeasible trial.
//!
//! Vertex labels carry memory accesses as `load;<group>` or `store;<group>`. All accesses of a
//! group that land in the same partition are coalesced into one transaction.
//!
//! # Examples
//!
//! ```rust
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use common::instances;
//! use dfg_partition::{partition, GoodLpSolver, PartitionParams, SearchConfig};
//!
//! // ten operations in a row, at most five per tile
//! let dfg = instances::chain(10);
//! let params = PartitionParams::new(5, 1);
//! let outcome = partition(&dfg, &params, &SearchConfig::default(), &GoodLpSolver)?;
//!
//! assert_eq!(outcome.num_parts, 2);
//! assert_eq!(outcome.report.crossing_edges, 1);
//! # Ok(())
//! # }
//! ```
//!
//! The solver is reached through the [MipSolver] trait, so any backend that accepts a [Model]
//! can be plugged in.

#![forbid(unsafe_code)]
#![doc(test(attr(deny(warnings, rust_2018_idioms), allow(dead_code))))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

/// Structural statistics of dataflow graphs.
pub mod analysis;
/// Addressing of the decision variables.
pub mod catalog;
mod config;
/// The constraint families of the partitioning model.
pub mod constraints;
mod error;
/// Extraction of one subgraph per partition.
pub mod extract;
/// Load and store groups parsed from vertex labels.
pub mod groups;
/// Solver-independent mixed-integer linear programs.
pub mod model;
/// The objective of the partitioning model.
pub mod objective;
mod search;
/// Solver interface and the default backend.
pub mod solver;
mod trial;
/// Independent verification of solutions.
pub mod validate;

pub use analysis::{profile, AnalysisError, DfgProfile};
pub use catalog::Catalog;
pub use config::{PartitionParams, SearchConfig};
pub use error::PartitionError;
pub use extract::{extract_partitions, output_namespace, NodeOrigin, PartitionGraph};
pub use groups::{AccessKind, LabelParseError, MemoryGroups};
pub use model::{Family, Model, VarId};
pub use search::{initial_num_parts, partition, Attempt, AttemptOutcome, PartitionOutcome};
pub use solver::{GoodLpSolver, MipSolver, SolveOutcome, Solution};
pub use trial::{ModelStats, Trial};
pub use validate::{validate, Assignment, ConsistencyError, ValidationReport};
