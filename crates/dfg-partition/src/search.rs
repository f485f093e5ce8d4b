use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use common::dfg::Dfg;
use tracing::{info, instrument, warn};

use crate::config::{PartitionParams, SearchConfig};
use crate::error::PartitionError;
use crate::groups::MemoryGroups;
use crate::solver::{MipSolver, SolveOutcome};
use crate::trial::Trial;
use crate::validate::{validate, Assignment, ValidationReport};

/// What happened when one partition count was tried.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    /// The solver found a solution with this objective value.
    Feasible {
        /// Objective value.
        objective: f64,
    },
    /// The model has no solution.
    Infeasible,
    /// The solver failed. The search moves on as if the model were infeasible.
    SolverError(String),
}

impl Display for AttemptOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Feasible { objective } => write!(f, "feasible (objective {objective})"),
            AttemptOutcome::Infeasible => f.write_str("infeasible"),
            AttemptOutcome::SolverError(message) => write!(f, "solver error ({message})"),
        }
    }
}

/// One iteration of the search.
#[derive(Clone, Debug, PartialEq)]
pub struct Attempt {
    /// Iteration number, starting at `1`.
    pub iteration: usize,
    /// Partition count tried.
    pub num_parts: usize,
    /// Result of the solve.
    pub outcome: AttemptOutcome,
    /// Time spent building and solving the model.
    pub elapsed: Duration,
}

/// The accepted partitioning.
#[derive(Clone, Debug)]
pub struct PartitionOutcome {
    /// Accepted partition count.
    pub num_parts: usize,
    /// Iteration that found it.
    pub iteration: usize,
    /// Objective value of the accepted solution.
    pub objective: f64,
    /// Partition of every vertex.
    pub assignment: Assignment,
    /// Figures recomputed by the validator.
    pub report: ValidationReport,
    /// Every iteration, the accepted one last.
    pub attempts: Vec<Attempt>,
    /// The accepted trial, for exporting its model.
    pub trial: Trial,
    /// Wall-clock time of the whole search.
    pub elapsed: Duration,
}

/// The smallest partition count that can hold all vertices, `ceil(n / capacity)`.
pub fn initial_num_parts(num_vertices: usize, capacity: usize) -> usize {
    num_vertices.div_ceil(capacity)
}

/// Find the smallest feasible partition count, starting at [initial_num_parts] and trying one
/// more partition per iteration.
///
/// # Errors
///
/// + [PartitionError::EmptyGraph] and [PartitionError::InvalidParameter] before any model is built
/// + [PartitionError::LabelParse] if a memory-access label has no valid group id
/// + [PartitionError::Consistency] if the solver returns a solution that violates the model
/// + [PartitionError::NoFeasiblePartitioning] after `config.max_iterations` failed iterations
#[instrument(skip_all, fields(graph = dfg.name()))]
pub fn partition<S>(
    dfg: &Dfg,
    params: &PartitionParams,
    config: &SearchConfig,
    solver: &S,
) -> Result<PartitionOutcome, PartitionError>
where
    S: MipSolver + ?Sized,
{
    let start = Instant::now();
    if dfg.node_count() == 0 {
        return Err(PartitionError::EmptyGraph);
    }
    params.validate()?;
    if config.max_iterations == 0 {
        return Err(PartitionError::InvalidParameter { name: "max_iterations", value: 0 });
    }
    let groups = MemoryGroups::scan(dfg)?;

    let mut num_parts = initial_num_parts(dfg.node_count(), params.capacity);
    info!(
        n = dfg.node_count(),
        m = dfg.edge_count(),
        groups = groups.len(),
        capacity = params.capacity,
        transaction_limit = params.transaction_limit,
        memory_weight = params.memory_weight,
        num_parts
    );

    let mut attempts = Vec::new();
    for iteration in 1..=config.max_iterations {
        let attempt_start = Instant::now();
        let trial = Trial::with_groups(dfg, params, groups.clone(), num_parts);
        let solved = solver.solve(trial.model());

        let outcome = match &solved {
            SolveOutcome::Optimal(solution) | SolveOutcome::Feasible(solution) => {
                AttemptOutcome::Feasible { objective: solution.objective() }
            }
            SolveOutcome::Infeasible => AttemptOutcome::Infeasible,
            SolveOutcome::Error(message) => {
                warn!(iteration, num_parts, message = message.as_str(), "solver error, trying more partitions");
                AttemptOutcome::SolverError(message.clone())
            }
        };
        attempts.push(Attempt { iteration, num_parts, outcome, elapsed: attempt_start.elapsed() });

        if let Some(solution) = solved.solution() {
            let (assignment, report) = validate(dfg, trial.catalog(), solution, params)?;
            let elapsed = start.elapsed();
            info!(iteration, num_parts, objective = solution.objective(), elapsed = ?elapsed, "solution found");
            return Ok(PartitionOutcome {
                num_parts,
                iteration,
                objective: solution.objective(),
                assignment,
                report,
                attempts,
                trial,
                elapsed,
            });
        }
        info!(iteration, num_parts, "no solution");
        num_parts += 1;
    }

    Err(PartitionError::NoFeasiblePartitioning {
        iterations: config.max_iterations,
        last_num_parts: num_parts - 1,
        attempts,
    })
}
