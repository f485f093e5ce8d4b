use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};

/// Handle of a variable inside a [Model].
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct VarId(u32);

impl VarId {
    /// Create a handle from a position in [Model::variables].
    #[inline(always)]
    pub fn new(x: usize) -> Self {
        debug_assert!(x < u32::MAX as usize);
        Self(x as u32)
    }

    /// Position in [Model::variables].
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for VarId {
    #[inline(always)]
    fn from(x: usize) -> Self {
        Self::new(x)
    }
}

impl Display for VarId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Domain of a model variable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VarKind {
    /// A 0-1 variable. Its bounds are always `[0, 1]`.
    Binary,
    /// An integer variable with explicit bounds.
    Integer,
}

/// Optimization direction of the objective.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum Sense {
    /// Minimize the objective.
    #[default]
    Minimize,
    /// Maximize the objective.
    Maximize,
}

/// The constraint family a row belongs to. Used for statistics and row names.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Family {
    /// Every vertex is placed exactly once.
    Uniqueness,
    /// No partition holds more vertices than the capacity.
    Capacity,
    /// Edges never point to an earlier partition.
    Precedence,
    /// Linearization of the crossing indicators.
    Crossing,
    /// Linearization of the group presence indicators.
    GroupPresence,
    /// Per-partition read and write transaction limits.
    Transaction,
}

impl Family {
    fn row_prefix(&self) -> &'static str {
        match self {
            Family::Uniqueness => "uniq",
            Family::Capacity => "cap",
            Family::Precedence => "prec",
            Family::Crossing => "cross",
            Family::GroupPresence => "group",
            Family::Transaction => "trans",
        }
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.row_prefix())
    }
}

/// Definition of a single variable.
#[derive(Clone, Debug, PartialEq)]
pub struct VarDef {
    /// Variable domain.
    pub kind: VarKind,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Name used in exports.
    pub name: String,
}

/// A linear row `lower <= sum(coefficient * variable) <= upper`. Infinite bounds are absent.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// Family the row belongs to.
    pub family: Family,
    /// Coefficients by variable, ordered by [VarId]. Each variable appears at most once.
    pub terms: Vec<(VarId, f64)>,
    /// Lower bound, possibly `f64::NEG_INFINITY`.
    pub lower: f64,
    /// Upper bound, possibly `f64::INFINITY`.
    pub upper: f64,
}

impl Constraint {
    /// Evaluate the row activity for the given variable values.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|(v, c)| c * values[v.index()]).sum()
    }
}

/// A mixed-integer linear program.
///
/// The model is a plain value. It is built once per partition-count trial and handed to a
/// [MipSolver](crate::MipSolver) by reference.
#[derive(Clone, Debug, Default)]
pub struct Model {
    name: String,
    variables: Vec<VarDef>,
    constraints: Vec<Constraint>,
    objective: Vec<f64>,
    sense: Sense,
}

impl Model {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a variable. Binary variables ignore the given bounds and use `[0, 1]`.
    pub fn add_variable(&mut self, kind: VarKind, lower: f64, upper: f64, name: impl Into<String>) -> VarId {
        let (lower, upper) = match kind {
            VarKind::Binary => (0.0, 1.0),
            VarKind::Integer => (lower, upper),
        };
        let id = VarId::new(self.variables.len());
        self.variables.push(VarDef { kind, lower, upper, name: name.into() });
        self.objective.push(0.0);
        id
    }

    /// Add a 0-1 variable.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_variable(VarKind::Binary, 0.0, 1.0, name)
    }

    /// Add the row `lower <= terms <= upper`. Repeated variables are merged.
    pub fn add_constraint(
        &mut self,
        family: Family,
        terms: impl IntoIterator<Item = (VarId, f64)>,
        lower: f64,
        upper: f64,
    ) {
        debug_assert!(lower <= upper);
        let terms = merge_terms(terms);
        debug_assert!(terms.iter().all(|(v, _)| v.index() < self.variables.len()));
        self.constraints.push(Constraint { family, terms, lower, upper });
    }

    /// Add the row `terms <= upper`.
    pub fn add_leq(&mut self, family: Family, terms: impl IntoIterator<Item = (VarId, f64)>, upper: f64) {
        self.add_constraint(family, terms, f64::NEG_INFINITY, upper);
    }

    /// Add the row `terms == rhs`.
    pub fn add_eq(&mut self, family: Family, terms: impl IntoIterator<Item = (VarId, f64)>, rhs: f64) {
        self.add_constraint(family, terms, rhs, rhs);
    }

    /// Replace the objective. Variables not mentioned get coefficient zero.
    pub fn set_objective(&mut self, terms: impl IntoIterator<Item = (VarId, f64)>, sense: Sense) {
        self.objective.iter_mut().for_each(|c| *c = 0.0);
        for (v, c) in terms {
            self.objective[v.index()] += c;
        }
        self.sense = sense;
    }

    /// All variables, indexed by [VarId::index].
    pub fn variables(&self) -> &[VarDef] {
        &self.variables
    }

    /// All rows in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective coefficient of a variable.
    pub fn objective_coefficient(&self, v: VarId) -> f64 {
        self.objective[v.index()]
    }

    /// Non-zero objective terms.
    pub fn objective_terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.objective.iter().enumerate().filter(|(_, c)| **c != 0.0).map(|(i, c)| (VarId::new(i), *c))
    }

    /// Objective direction.
    pub fn sense(&self) -> Sense {
        self.sense
    }

    /// Evaluate the objective for the given variable values.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective_terms().map(|(v, c)| c * values[v.index()]).sum()
    }

    /// Number of variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of rows.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Number of rows per family.
    pub fn row_counts(&self) -> BTreeMap<Family, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.constraints {
            *counts.entry(c.family).or_insert(0) += 1;
        }
        counts
    }

    /// Write the model in CPLEX LP format.
    ///
    /// Rows without terms are constant and omitted. Rows are named after their family and their
    /// position within it, e.g. `cap3`.
    pub fn write_lp<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "\\ Model {}", self.name)?;
        match self.sense {
            Sense::Minimize => writeln!(out, "Minimize")?,
            Sense::Maximize => writeln!(out, "Maximize")?,
        }
        let objective: Vec<_> = self.objective_terms().collect();
        write!(out, " obj:")?;
        if objective.is_empty() {
            if let Some(v) = self.variables.first() {
                write!(out, " 0 {}", v.name)?;
            }
        } else {
            self.write_terms(out, &objective)?;
        }
        writeln!(out)?;

        writeln!(out, "Subject To")?;
        let mut counters: BTreeMap<Family, usize> = BTreeMap::new();
        for c in &self.constraints {
            let counter = counters.entry(c.family).or_insert(0);
            let row = *counter;
            *counter += 1;
            if c.terms.is_empty() {
                continue;
            }
            write!(out, " {}{row}:", c.family)?;
            if c.lower == c.upper {
                self.write_terms(out, &c.terms)?;
                writeln!(out, " = {}", c.upper)?;
            } else if c.lower.is_finite() && c.upper.is_finite() {
                write!(out, " {} <=", c.lower)?;
                self.write_terms(out, &c.terms)?;
                writeln!(out, " <= {}", c.upper)?;
            } else if c.upper.is_finite() {
                self.write_terms(out, &c.terms)?;
                writeln!(out, " <= {}", c.upper)?;
            } else {
                self.write_terms(out, &c.terms)?;
                writeln!(out, " >= {}", c.lower)?;
            }
        }

        let integers: Vec<_> = self.variables.iter().filter(|v| v.kind == VarKind::Integer).collect();
        if !integers.is_empty() {
            writeln!(out, "Bounds")?;
            for v in &integers {
                writeln!(out, " {} <= {} <= {}", lp_bound(v.lower), v.name, lp_bound(v.upper))?;
            }
        }
        let binaries: Vec<_> = self.variables.iter().filter(|v| v.kind == VarKind::Binary).collect();
        if !binaries.is_empty() {
            writeln!(out, "Binaries")?;
            for v in binaries {
                writeln!(out, " {}", v.name)?;
            }
        }
        if !integers.is_empty() {
            writeln!(out, "Generals")?;
            for v in integers {
                writeln!(out, " {}", v.name)?;
            }
        }
        writeln!(out, "End")?;
        out.flush()
    }

    fn write_terms<W: Write>(&self, out: &mut W, terms: &[(VarId, f64)]) -> io::Result<()> {
        for (i, (v, c)) in terms.iter().enumerate() {
            let sign = if *c < 0.0 { "-" } else { "+" };
            if i == 0 {
                if *c < 0.0 {
                    write!(out, " -")?;
                }
            } else {
                write!(out, " {sign}")?;
            }
            let name = &self.variables[v.index()].name;
            let magnitude = c.abs();
            if magnitude == 1.0 {
                write!(out, " {name}")?;
            } else {
                write!(out, " {magnitude} {name}")?;
            }
        }
        Ok(())
    }
}

fn lp_bound(b: f64) -> String {
    if b == f64::INFINITY {
        "+inf".to_string()
    } else if b == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        b.to_string()
    }
}

fn merge_terms(terms: impl IntoIterator<Item = (VarId, f64)>) -> Vec<(VarId, f64)> {
    let mut terms: Vec<_> = terms.into_iter().collect();
    terms.sort_by_key(|(v, _)| *v);
    let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(terms.len());
    for (v, c) in terms {
        match merged.last_mut() {
            Some((w, d)) if *w == v => *d += c,
            _ => merged.push((v, c)),
        }
    }
    merged.retain(|(_, c)| *c != 0.0);
    merged
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn var_id() {
        let v = VarId::from(42_usize);
        assert_eq!(v.index(), 42);
        assert_eq!(v.to_string(), "v42");
    }

    #[test]
    fn terms_are_merged_and_zeros_dropped() {
        let mut model = Model::new("m");
        let a = model.add_binary("a");
        let b = model.add_binary("b");
        model.add_leq(Family::Precedence, [(a, 0.0), (b, 2.0), (a, 1.0), (b, -2.0)], 0.0);
        assert_eq!(model.constraints()[0].terms, vec![(a, 1.0)]);
    }

    #[test]
    fn objective_is_replaced() {
        let mut model = Model::new("m");
        let a = model.add_binary("a");
        let b = model.add_binary("b");
        model.set_objective([(a, 3.0)], Sense::Maximize);
        model.set_objective([(b, 2.0), (b, 1.0)], Sense::Minimize);
        assert_eq!(model.objective_coefficient(a), 0.0);
        assert_eq!(model.objective_coefficient(b), 3.0);
        assert_eq!(model.objective_value(&[1.0, 1.0]), 3.0);
        assert_eq!(model.sense(), Sense::Minimize);
    }

    #[test]
    fn binary_bounds_are_fixed() {
        let mut model = Model::new("m");
        let a = model.add_variable(VarKind::Binary, -4.0, 9.0, "a");
        let b = model.add_variable(VarKind::Integer, -4.0, 9.0, "b");
        assert_eq!((model.variables()[a.index()].lower, model.variables()[a.index()].upper), (0.0, 1.0));
        assert_eq!((model.variables()[b.index()].lower, model.variables()[b.index()].upper), (-4.0, 9.0));
    }

    #[test]
    fn lp_export() {
        let mut model = Model::new("tiny");
        let x0 = model.add_binary("x_0_0");
        let x1 = model.add_binary("x_0_1");
        let n = model.add_variable(VarKind::Integer, 0.0, f64::INFINITY, "n");
        model.add_eq(Family::Uniqueness, [(x0, 1.0), (x1, 1.0)], 1.0);
        model.add_leq(Family::Precedence, [(x1, 1.0), (x0, -2.0)], 0.0);
        model.add_constraint(Family::Capacity, [(n, 1.0)], 1.0, 4.0);
        model.add_constraint(Family::Capacity, [(n, 1.0), (x0, -1.0)], 2.0, f64::INFINITY);
        model.add_leq(Family::Transaction, [], 3.0);
        model.set_objective([(x1, 1.0), (n, 2.0)], Sense::Minimize);

        let mut out = Vec::new();
        model.write_lp(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let expected = r"\ Model tiny
Minimize
 obj: x_0_1 + 2 n
Subject To
 uniq0: x_0_0 + x_0_1 = 1
 prec0: - 2 x_0_0 + x_0_1 <= 0
 cap0: 1 <= n <= 4
 cap1: - x_0_0 + n >= 2
Bounds
 0 <= n <= +inf
Binaries
 x_0_0
 x_0_1
Generals
 n
End
";
        assert_eq!(out, expected);
        assert_eq!(model.row_counts()[&Family::Transaction], 1);
    }
}
