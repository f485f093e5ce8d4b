use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution as _,
    SolverModel as _, Variable,
};
use tracing::{debug, instrument};

use crate::model::{Model, Sense, VarId, VarKind};

/// Values of all model variables after a successful solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    objective: f64,
}

impl Solution {
    /// Wrap variable values, indexed by [VarId::index], and the objective value.
    pub fn new(values: Vec<f64>, objective: f64) -> Self {
        Self { values, objective }
    }

    /// Value of a variable.
    pub fn value(&self, v: VarId) -> f64 {
        self.values[v.index()]
    }

    /// All values, indexed by [VarId::index].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Objective value.
    pub fn objective(&self) -> f64 {
        self.objective
    }
}

/// Result of handing a [Model] to a [MipSolver].
#[derive(Clone, Debug, PartialEq)]
pub enum SolveOutcome {
    /// Proven optimal solution.
    Optimal(Solution),
    /// Feasible solution without an optimality proof.
    Feasible(Solution),
    /// The model has no solution.
    Infeasible,
    /// The solver failed for another reason.
    Error(String),
}

impl SolveOutcome {
    /// The solution, if the solver found one.
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolveOutcome::Optimal(s) | SolveOutcome::Feasible(s) => Some(s),
            SolveOutcome::Infeasible | SolveOutcome::Error(_) => None,
        }
    }
}

/// A mixed-integer linear programming backend.
pub trait MipSolver {
    /// Solve the model to completion.
    fn solve(&self, model: &Model) -> SolveOutcome;
}

impl<S: MipSolver + ?Sized> MipSolver for &S {
    fn solve(&self, model: &Model) -> SolveOutcome {
        (**self).solve(model)
    }
}

/// Solves models with the default backend of `good_lp`.
#[derive(Copy, Clone, Debug, Default)]
pub struct GoodLpSolver;

impl MipSolver for GoodLpSolver {
    #[instrument(skip_all, fields(model = model.name()))]
    fn solve(&self, model: &Model) -> SolveOutcome {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .variables()
            .iter()
            .map(|def| {
                let mut definition = variable().name(def.name.clone());
                definition = match def.kind {
                    VarKind::Binary => definition.binary(),
                    VarKind::Integer => definition.integer(),
                };
                if def.lower.is_finite() {
                    definition = definition.min(def.lower);
                }
                if def.upper.is_finite() {
                    definition = definition.max(def.upper);
                }
                vars.add(definition)
            })
            .collect();

        let mut objective = Expression::default();
        for (v, c) in model.objective_terms() {
            objective.add_mul(c, handles[v.index()]);
        }

        let mut problem = match model.sense() {
            Sense::Minimize => vars.minimise(objective).using(default_solver),
            Sense::Maximize => vars.maximise(objective).using(default_solver),
        };

        let mut rows = 0;
        for c in model.constraints() {
            if c.terms.is_empty() {
                if c.lower > 0.0 || c.upper < 0.0 {
                    debug!(family = %c.family, "constant row is violated");
                    return SolveOutcome::Infeasible;
                }
                continue;
            }
            let mut row = Expression::default();
            for (v, coefficient) in &c.terms {
                row.add_mul(*coefficient, handles[v.index()]);
            }
            if c.lower == c.upper {
                problem = problem.with(constraint!(row == c.upper));
            } else {
                if c.lower.is_finite() {
                    problem = problem.with(constraint!(row.clone() >= c.lower));
                }
                if c.upper.is_finite() {
                    problem = problem.with(constraint!(row <= c.upper));
                }
            }
            rows += 1;
        }
        debug!(variables = handles.len(), rows);

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = handles.iter().map(|h| solution.value(*h)).collect();
                let objective = model.objective_value(&values);
                SolveOutcome::Optimal(Solution::new(values, objective))
            }
            Err(ResolutionError::Infeasible) => SolveOutcome::Infeasible,
            Err(e) => SolveOutcome::Error(e.to_string()),
        }
    }
}
