use std::collections::BTreeSet;

use common::dfg::Dfg;
use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::PartitionParams;
use crate::groups::AccessKind;
use crate::solver::Solution;

/// Values within this distance of `1` count as set.
pub const TOLERANCE: f64 = 1e-5;

/// An accepted solution breaks a structural invariant of the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// The solution does not hold one value per model variable.
    #[error("solution has {actual} values for {expected} variables")]
    SolutionLength {
        /// Number of model variables.
        expected: usize,
        /// Number of values returned by the solver.
        actual: usize,
    },
    /// No assignment indicator of the vertex is set.
    #[error("vertex {vertex} is not assigned to any partition")]
    Unassigned {
        /// Vertex id.
        vertex: usize,
    },
    /// More than one assignment indicator of the vertex is set.
    #[error("vertex {vertex} is assigned to {count} partitions")]
    MultiplyAssigned {
        /// Vertex id.
        vertex: usize,
        /// Number of set indicators.
        count: usize,
    },
    /// A partition holds too many vertices.
    #[error("partition {part} holds {size} vertices (capacity {capacity})")]
    CapacityExceeded {
        /// Partition.
        part: usize,
        /// Number of vertices.
        size: usize,
        /// Capacity.
        capacity: usize,
    },
    /// An edge points to an earlier partition.
    #[error("edge {source_vertex} -> {target_vertex} goes from partition {source_part} back to {target_part}")]
    PrecedenceViolated {
        /// Edge source.
        source_vertex: usize,
        /// Edge target.
        target_vertex: usize,
        /// Partition of the source.
        source_part: usize,
        /// Partition of the target.
        target_part: usize,
    },
    /// A vertex feeds a later partition but its crossing indicator is not set.
    #[error("crossing of vertex {vertex} from partition {from} to {to} is not reported")]
    MissingCrossing {
        /// Vertex id.
        vertex: usize,
        /// Partition of the vertex.
        from: usize,
        /// Partition of a successor.
        to: usize,
    },
    /// A crossing indicator is set without a matching edge.
    #[error("crossing of vertex {vertex} from partition {from} to {to} is reported but does not exist")]
    SpuriousCrossing {
        /// Vertex id.
        vertex: usize,
        /// First partition of the pair.
        from: usize,
        /// Second partition of the pair.
        to: usize,
    },
    /// Writes and store transactions of a partition exceed the limit.
    #[error("partition {part} issues {writes} writes and {stores} store transactions (limit {limit})")]
    WriteLimitExceeded {
        /// Partition.
        part: usize,
        /// Vertices writing to later partitions.
        writes: usize,
        /// Store groups present.
        stores: usize,
        /// Transaction limit.
        limit: usize,
    },
    /// Reads and load transactions of a partition exceed the limit.
    #[error("partition {part} issues {reads} reads and {loads} load transactions (limit {limit})")]
    ReadLimitExceeded {
        /// Partition.
        part: usize,
        /// Values read from earlier partitions.
        reads: usize,
        /// Load groups present.
        loads: usize,
        /// Transaction limit.
        limit: usize,
    },
}

/// The partition of every vertex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    parts: Vec<usize>,
    num_parts: usize,
}

impl Assignment {
    /// Wrap a partition per vertex.
    pub fn new(parts: Vec<usize>, num_parts: usize) -> Self {
        debug_assert!(parts.iter().all(|p| *p < num_parts));
        Self { parts, num_parts }
    }

    /// Read the assignment indicators of a solution.
    ///
    /// # Errors
    ///
    /// Fails if the solution does not cover every model variable, or unless every vertex has
    /// exactly one indicator within [TOLERANCE] of `1`.
    pub fn from_solution(catalog: &Catalog, solution: &Solution) -> Result<Self, ConsistencyError> {
        if solution.values().len() != catalog.num_variables() {
            return Err(ConsistencyError::SolutionLength {
                expected: catalog.num_variables(),
                actual: solution.values().len(),
            });
        }
        let num_parts = catalog.num_parts();
        let mut parts = Vec::with_capacity(catalog.num_vertices());
        for vertex in 0..catalog.num_vertices() {
            let i = NodeIndex::new(vertex);
            let set: Vec<_> = (0..num_parts).filter(|p| is_set(solution.value(catalog.assign(i, *p)))).collect();
            match set[..] {
                [p] => parts.push(p),
                [] => return Err(ConsistencyError::Unassigned { vertex }),
                _ => return Err(ConsistencyError::MultiplyAssigned { vertex, count: set.len() }),
            }
        }
        Ok(Self { parts, num_parts })
    }

    /// Partition of a vertex.
    #[inline]
    pub fn part(&self, u: NodeIndex) -> usize {
        self.parts[u.index()]
    }

    /// Number of partitions, including empty ones.
    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Vertices of partition `p` in ascending order.
    pub fn members(&self, p: usize) -> Vec<NodeIndex> {
        self.parts.iter().enumerate().filter(|(_, q)| **q == p).map(|(i, _)| NodeIndex::new(i)).collect()
    }

    /// Partition per vertex, indexed by vertex id.
    pub fn as_slice(&self) -> &[usize] {
        &self.parts
    }
}

/// Recomputed transaction figures of one partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Number of vertices.
    pub size: usize,
    /// Vertices with a successor in a later partition.
    pub writes: usize,
    /// Edges leaving towards later partitions.
    pub out_edges: usize,
    /// Distinct (vertex, partition) pairs landing here from earlier partitions.
    pub reads: usize,
    /// Edges arriving from earlier partitions.
    pub in_edges: usize,
    /// Load groups with a member here.
    pub loads: usize,
    /// Store groups with a member here.
    pub stores: usize,
}

/// Figures recomputed from the graph and the assignment alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Per partition figures.
    pub parts: Vec<PartitionStats>,
    /// Load transactions over all partitions.
    pub load_transactions: usize,
    /// Store transactions over all partitions.
    pub store_transactions: usize,
    /// Edges whose endpoints are in different partitions.
    pub crossing_edges: usize,
}

impl ValidationReport {
    /// Load and store transactions together.
    pub fn memory_transactions(&self) -> usize {
        self.load_transactions + self.store_transactions
    }

    /// Write-side crossings over all partitions.
    pub fn total_writes(&self) -> usize {
        self.parts.iter().map(|p| p.writes).sum()
    }

    /// Read-side crossings over all partitions.
    pub fn total_reads(&self) -> usize {
        self.parts.iter().map(|p| p.reads).sum()
    }
}

/// Check a solution against every structural invariant and recompute its transaction figures.
///
/// # Errors
///
/// Returns the first violated invariant as a [ConsistencyError].
#[instrument(skip_all)]
pub fn validate(
    dfg: &Dfg,
    catalog: &Catalog,
    solution: &Solution,
    params: &PartitionParams,
) -> Result<(Assignment, ValidationReport), ConsistencyError> {
    let assignment = Assignment::from_solution(catalog, solution)?;
    let report = tally(dfg, catalog, &assignment);

    for (part, stats) in report.parts.iter().enumerate() {
        if stats.size > params.capacity {
            return Err(ConsistencyError::CapacityExceeded { part, size: stats.size, capacity: params.capacity });
        }
    }
    for (s, d, _) in dfg.edges() {
        let (source_part, target_part) = (assignment.part(s), assignment.part(d));
        if source_part > target_part {
            return Err(ConsistencyError::PrecedenceViolated {
                source_vertex: s.index(),
                target_vertex: d.index(),
                source_part,
                target_part,
            });
        }
    }
    check_crossings(dfg, catalog, solution, &assignment)?;

    let limit = params.transaction_limit;
    for (part, stats) in report.parts.iter().enumerate() {
        if stats.writes + stats.stores > limit {
            return Err(ConsistencyError::WriteLimitExceeded { part, writes: stats.writes, stores: stats.stores, limit });
        }
        if stats.reads + stats.loads > limit {
            return Err(ConsistencyError::ReadLimitExceeded { part, reads: stats.reads, loads: stats.loads, limit });
        }
    }

    info!(
        load_transactions = report.load_transactions,
        store_transactions = report.store_transactions,
        writes = report.total_writes(),
        reads = report.total_reads(),
        crossing_edges = report.crossing_edges
    );
    Ok((assignment, report))
}

/// Recompute the per-partition figures of an assignment.
pub fn tally(dfg: &Dfg, catalog: &Catalog, assignment: &Assignment) -> ValidationReport {
    let mut parts = vec![PartitionStats::default(); assignment.num_parts()];

    for (u, _) in dfg.nodes() {
        let k = assignment.part(u);
        parts[k].size += 1;
        let later: BTreeSet<_> = dfg.successors(u).into_iter().map(|v| assignment.part(v)).filter(|l| *l > k).collect();
        if !later.is_empty() {
            parts[k].writes += 1;
        }
        for l in later {
            parts[l].reads += 1;
        }
    }

    let mut crossing_edges = 0;
    for (s, d, _) in dfg.edges() {
        let (k, l) = (assignment.part(s), assignment.part(d));
        if k < l {
            parts[k].out_edges += 1;
            parts[l].in_edges += 1;
        }
        if k != l {
            crossing_edges += 1;
        }
    }

    let (mut load_transactions, mut store_transactions) = (0, 0);
    for group in catalog.groups().iter() {
        let present: BTreeSet<_> = group.members.iter().map(|m| assignment.part(*m)).collect();
        for p in &present {
            match group.kind {
                AccessKind::Load => parts[*p].loads += 1,
                AccessKind::Store => parts[*p].stores += 1,
            }
        }
        match group.kind {
            AccessKind::Load => load_transactions += present.len(),
            AccessKind::Store => store_transactions += present.len(),
        }
    }

    ValidationReport { parts, load_transactions, store_transactions, crossing_edges }
}

fn check_crossings(
    dfg: &Dfg,
    catalog: &Catalog,
    solution: &Solution,
    assignment: &Assignment,
) -> Result<(), ConsistencyError> {
    for (u, _) in dfg.nodes() {
        let k = assignment.part(u);
        let later: BTreeSet<_> = dfg.successors(u).into_iter().map(|v| assignment.part(v)).filter(|l| *l > k).collect();
        for &l in &later {
            if !is_set(solution.value(catalog.crossing(u, k, l))) {
                return Err(ConsistencyError::MissingCrossing { vertex: u.index(), from: k, to: l });
            }
        }
        for (from, to) in catalog.pairs() {
            if is_set(solution.value(catalog.crossing(u, from, to))) && !(from == k && later.contains(&to)) {
                return Err(ConsistencyError::SpuriousCrossing { vertex: u.index(), from, to });
            }
        }
    }
    Ok(())
}

#[inline]
fn is_set(value: f64) -> bool {
    (value - 1.0).abs() < TOLERANCE
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::groups::MemoryGroups;
    use crate::model::Model;
    use common::instances;

    fn catalog(dfg: &Dfg, num_parts: usize) -> (Model, Catalog) {
        let mut model = Model::new("t");
        let catalog = Catalog::build(&mut model, dfg, MemoryGroups::scan(dfg).unwrap(), num_parts);
        (model, catalog)
    }

    /// A solution that places vertex `i` in `parts[i]` with consistent crossing indicators.
    fn solution_for(dfg: &Dfg, model: &Model, catalog: &Catalog, parts: &[usize]) -> Solution {
        let mut values = vec![0.0; model.num_variables()];
        for (u, _) in dfg.nodes() {
            let k = parts[u.index()];
            values[catalog.assign(u, k).index()] = 1.0;
            for v in dfg.successors(u) {
                let l = parts[v.index()];
                if l > k {
                    values[catalog.crossing(u, k, l).index()] = 1.0;
                }
            }
        }
        Solution::new(values, 0.0)
    }

    #[test]
    fn split_chain() {
        let dfg = instances::chain(10);
        let (model, catalog) = catalog(&dfg, 2);
        let parts: Vec<_> = (0..10).map(|i| i / 5).collect();
        let solution = solution_for(&dfg, &model, &catalog, &parts);
        let (assignment, report) = validate(&dfg, &catalog, &solution, &PartitionParams::new(5, 1)).unwrap();

        assert_eq!(assignment.as_slice(), &parts[..]);
        assert_eq!(report.crossing_edges, 1);
        assert_eq!(report.parts[0], PartitionStats { size: 5, writes: 1, out_edges: 1, ..Default::default() });
        assert_eq!(report.parts[1], PartitionStats { size: 5, reads: 1, in_edges: 1, ..Default::default() });
    }

    #[test]
    fn unassigned_and_multiply_assigned() {
        let dfg = instances::chain(2);
        let (model, catalog) = catalog(&dfg, 2);
        let mut values = vec![0.0; model.num_variables()];
        values[catalog.assign(NodeIndex::new(0), 0).index()] = 1.0;
        let solution = Solution::new(values.clone(), 0.0);
        let err = Assignment::from_solution(&catalog, &solution).unwrap_err();
        assert_eq!(err, ConsistencyError::Unassigned { vertex: 1 });

        values[catalog.assign(NodeIndex::new(0), 1).index()] = 1.0 - 1e-7;
        let solution = Solution::new(values, 0.0);
        let err = Assignment::from_solution(&catalog, &solution).unwrap_err();
        assert_eq!(err, ConsistencyError::MultiplyAssigned { vertex: 0, count: 2 });
    }

    #[test]
    fn short_solution() {
        let dfg = instances::chain(3);
        let (model, catalog) = catalog(&dfg, 2);
        let expected = model.num_variables();
        let solution = Solution::new(vec![1.0; 2], 0.0);
        let err = validate(&dfg, &catalog, &solution, &PartitionParams::new(3, 1)).unwrap_err();
        assert_eq!(err, ConsistencyError::SolutionLength { expected, actual: 2 });

        let solution = Solution::new(vec![0.0; expected + 1], 0.0);
        let err = Assignment::from_solution(&catalog, &solution).unwrap_err();
        assert_eq!(err, ConsistencyError::SolutionLength { expected, actual: expected + 1 });
    }

    #[test]
    fn backward_edge() {
        let dfg = instances::chain(2);
        let (model, catalog) = catalog(&dfg, 2);
        let solution = solution_for(&dfg, &model, &catalog, &[1, 0]);
        let err = validate(&dfg, &catalog, &solution, &PartitionParams::new(2, 2)).unwrap_err();
        assert!(matches!(err, ConsistencyError::PrecedenceViolated { source_vertex: 0, target_vertex: 1, .. }));
    }

    #[test]
    fn crossing_indicators_are_checked_both_ways() {
        let dfg = instances::chain(3);
        let (model, catalog) = catalog(&dfg, 3);
        let params = PartitionParams::new(3, 3);

        let mut missing = solution_for(&dfg, &model, &catalog, &[0, 1, 2]).values().to_vec();
        missing[catalog.crossing(NodeIndex::new(1), 1, 2).index()] = 0.0;
        let err = validate(&dfg, &catalog, &Solution::new(missing, 0.0), &params).unwrap_err();
        assert_eq!(err, ConsistencyError::MissingCrossing { vertex: 1, from: 1, to: 2 });

        let mut spurious = solution_for(&dfg, &model, &catalog, &[0, 1, 2]).values().to_vec();
        spurious[catalog.crossing(NodeIndex::new(0), 0, 2).index()] = 1.0;
        let err = validate(&dfg, &catalog, &Solution::new(spurious, 0.0), &params).unwrap_err();
        assert_eq!(err, ConsistencyError::SpuriousCrossing { vertex: 0, from: 0, to: 2 });
    }

    #[test]
    fn group_transactions_count_distinct_partitions() {
        let dfg = instances::shared_load_group(5, 3);
        let (model, catalog) = catalog(&dfg, 3);
        let solution = solution_for(&dfg, &model, &catalog, &[0, 0, 2, 0, 2]);
        let (_, report) = validate(&dfg, &catalog, &solution, &PartitionParams::new(3, 1)).unwrap();
        assert_eq!(report.load_transactions, 2);
        assert_eq!(report.parts.iter().map(|p| p.loads).collect::<Vec<_>>(), [1, 0, 1]);

        let err = validate(&dfg, &catalog, &solution, &PartitionParams::new(2, 1)).unwrap_err();
        assert_eq!(err, ConsistencyError::CapacityExceeded { part: 0, size: 3, capacity: 2 });
    }

    #[test]
    fn reads_count_distinct_destination_partitions() {
        // 0 feeds 1 and 2 in partition 1 and 3 in partition 2
        let mut dfg = Dfg::new("fan");
        let nodes: Vec<_> = (0..4).map(|_| dfg.add_node("op")).collect();
        for v in &nodes[1..] {
            dfg.add_edge(nodes[0], *v, "");
        }
        let (model, catalog) = catalog(&dfg, 3);
        let solution = solution_for(&dfg, &model, &catalog, &[0, 1, 1, 2]);

        let (_, report) = validate(&dfg, &catalog, &solution, &PartitionParams::new(2, 1)).unwrap();
        assert_eq!(report.parts[0].writes, 1);
        assert_eq!(report.parts[0].out_edges, 3);
        assert_eq!(report.parts[1].reads, 1);
        assert_eq!(report.parts[1].in_edges, 2);
        assert_eq!(report.total_reads(), 2);

        let mut dfg = dfg;
        let extra = dfg.add_node("op");
        dfg.add_edge(nodes[1], extra, "");
        let (model, catalog) = self::catalog(&dfg, 3);
        let solution = solution_for(&dfg, &model, &catalog, &[0, 1, 1, 2, 2]);
        let err = validate(&dfg, &catalog, &solution, &PartitionParams::new(2, 1)).unwrap_err();
        assert_eq!(err, ConsistencyError::ReadLimitExceeded { part: 2, reads: 2, loads: 0, limit: 1 });
    }
}
