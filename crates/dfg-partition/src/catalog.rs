use common::dfg::Dfg;
use petgraph::graph::NodeIndex;
use tracing::{debug, instrument};

use crate::groups::{AccessKind, MemoryGroups};
use crate::model::{Model, VarId};

/// All decision variables of one partition-count trial.
///
/// Variables are created in blocks and addressed arithmetically:
/// + `X[i][p]`: vertex `i` is placed in partition `p`, at `i * P + p`
/// + `L[g][p]`: group `g` has a member in partition `p`, at `g * P + p`
/// + `Y[i][k,l]`, `W[i][k,l]` for `k < l`: at `i * pairs + pair_index(k, l)`
///
/// Presence variables are named by group position, not by the group id of the label, so that
/// negative ids still give valid LP names.
#[derive(Clone, Debug)]
pub struct Catalog {
    num_vertices: usize,
    num_parts: usize,
    assign: Vec<VarId>,
    presence: Vec<VarId>,
    successor_in: Vec<VarId>,
    crossing: Vec<VarId>,
    crossing_cost: Vec<f64>,
    groups: MemoryGroups,
    num_variables: usize,
}

impl Catalog {
    /// Create every variable of the trial inside `model`.
    #[instrument(skip_all, fields(num_parts = num_parts))]
    pub fn build(model: &mut Model, dfg: &Dfg, groups: MemoryGroups, num_parts: usize) -> Self {
        let n = dfg.node_count();
        let pairs = num_pairs(num_parts);

        let mut assign = Vec::with_capacity(n * num_parts);
        for i in 0..n {
            for p in 0..num_parts {
                assign.push(model.add_binary(format!("x_{i}_{p}")));
            }
        }

        let mut presence = Vec::with_capacity(groups.len() * num_parts);
        for (g, group) in groups.iter().enumerate() {
            let prefix = match group.kind {
                AccessKind::Load => "lpg",
                AccessKind::Store => "lps",
            };
            for p in 0..num_parts {
                presence.push(model.add_binary(format!("{prefix}_{g}_{p}")));
            }
        }

        let mut successor_in = Vec::with_capacity(n * pairs);
        let mut crossing = Vec::with_capacity(n * pairs);
        for i in 0..n {
            for (k, l) in partition_pairs(num_parts) {
                successor_in.push(model.add_binary(format!("y_{i}_{k}_{l}")));
                crossing.push(model.add_binary(format!("w_{i}_{k}_{l}")));
            }
        }

        let crossing_cost = crossing_cost_table(num_parts);

        debug!(assign = assign.len(), presence = presence.len(), crossing = successor_in.len() + crossing.len());

        Self {
            num_vertices: n,
            num_parts,
            assign,
            presence,
            successor_in,
            crossing,
            crossing_cost,
            groups,
            num_variables: model.num_variables(),
        }
    }

    /// Number of vertices covered by the catalog.
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Number of partitions of the trial.
    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    /// The load and store groups the presence variables belong to.
    pub fn groups(&self) -> &MemoryGroups {
        &self.groups
    }

    /// `X[i][p]`.
    #[inline]
    pub fn assign(&self, i: NodeIndex, p: usize) -> VarId {
        debug_assert!(p < self.num_parts);
        self.assign[i.index() * self.num_parts + p]
    }

    /// `L[g][p]` where `g` is a position in [Catalog::groups].
    #[inline]
    pub fn presence(&self, g: usize, p: usize) -> VarId {
        debug_assert!(p < self.num_parts);
        self.presence[g * self.num_parts + p]
    }

    /// `Y[i][k,l]`: some successor of `i` is placed in `l`.
    #[inline]
    pub fn successor_in(&self, i: NodeIndex, k: usize, l: usize) -> VarId {
        self.successor_in[i.index() * num_pairs(self.num_parts) + pair_index(self.num_parts, k, l)]
    }

    /// `W[i][k,l]`: `i` is placed in `k` and some successor of `i` in `l`.
    #[inline]
    pub fn crossing(&self, i: NodeIndex, k: usize, l: usize) -> VarId {
        self.crossing[i.index() * num_pairs(self.num_parts) + pair_index(self.num_parts, k, l)]
    }

    /// Objective weight of a crossing from `k` to `l`.
    pub fn crossing_cost(&self, k: usize, l: usize) -> f64 {
        self.crossing_cost[pair_index(self.num_parts, k, l)]
    }

    /// All ordered partition pairs `(k, l)` with `k < l`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> {
        partition_pairs(self.num_parts)
    }

    /// Number of `X` variables.
    pub fn assign_count(&self) -> usize {
        self.assign.len()
    }

    /// Number of `L` variables.
    pub fn presence_count(&self) -> usize {
        self.presence.len()
    }

    /// Number of `Y` and `W` variables together.
    pub fn crossing_count(&self) -> usize {
        self.successor_in.len() + self.crossing.len()
    }

    /// Number of variables of the model the catalog was built in.
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }
}

pub(crate) fn num_pairs(num_parts: usize) -> usize {
    num_parts * num_parts.saturating_sub(1) / 2
}

/// Position of `(k, l)` in the row-major enumeration of pairs `k < l`.
pub(crate) fn pair_index(num_parts: usize, k: usize, l: usize) -> usize {
    debug_assert!(k < l && l < num_parts);
    k * (2 * num_parts - k - 1) / 2 + (l - k - 1)
}

pub(crate) fn partition_pairs(num_parts: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..num_parts).flat_map(move |k| (k + 1..num_parts).map(move |l| (k, l)))
}

/// A crossing is charged once for every side that has to issue a transaction for it. The read
/// side covers pairs landing in `l >= 1` from any `p < l`, the write side pairs leaving
/// `k <= P - 2` towards any `p > k`.
fn crossing_cost_table(num_parts: usize) -> Vec<f64> {
    let mut read = vec![false; num_pairs(num_parts)];
    for l in 1..num_parts {
        for p in 0..l {
            read[pair_index(num_parts, p, l)] = true;
        }
    }
    let mut cost = vec![0.0; num_pairs(num_parts)];
    for k in 0..num_parts.saturating_sub(1) {
        for p in k + 1..num_parts {
            let idx = pair_index(num_parts, k, p);
            cost[idx] = if read[idx] { 2.0 } else { 1.0 };
        }
    }
    cost
}

#[cfg(test)]
mod test {
    use super::*;
    use common::instances;

    #[test]
    fn pair_indices_are_dense() {
        for num_parts in 0..7 {
            let indices: Vec<_> = partition_pairs(num_parts).map(|(k, l)| pair_index(num_parts, k, l)).collect();
            assert_eq!(indices, (0..num_pairs(num_parts)).collect::<Vec<_>>());
        }
    }

    #[test]
    fn every_crossing_is_charged_on_both_sides() {
        for num_parts in 2..6 {
            assert!(crossing_cost_table(num_parts).iter().all(|c| *c == 2.0));
        }
        assert!(crossing_cost_table(1).is_empty());
    }

    #[test]
    fn variable_counts_and_names() {
        let dfg = instances::load_reduce_store(4);
        let groups = MemoryGroups::scan(&dfg).unwrap();
        let mut model = Model::new("m");
        let catalog = Catalog::build(&mut model, &dfg, groups, 3);

        let (n, p, g) = (8, 3, 3);
        assert_eq!(catalog.assign_count(), n * p);
        assert_eq!(catalog.presence_count(), g * p);
        assert_eq!(catalog.crossing_count(), n * p * (p - 1));
        assert_eq!(model.num_variables(), n * p + g * p + n * p * (p - 1));

        let name = |v: VarId| model.variables()[v.index()].name.clone();
        assert_eq!(name(catalog.assign(NodeIndex::new(5), 2)), "x_5_2");
        assert_eq!(name(catalog.presence(0, 1)), "lpg_0_1");
        assert_eq!(name(catalog.presence(2, 0)), "lps_2_0");
        assert_eq!(name(catalog.successor_in(NodeIndex::new(7), 1, 2)), "y_7_1_2");
        assert_eq!(name(catalog.crossing(NodeIndex::new(3), 0, 2)), "w_3_0_2");
    }

    #[test]
    fn negative_group_ids_give_valid_names() {
        let mut dfg = Dfg::new("neg");
        let a = dfg.add_node("load;-2");
        let b = dfg.add_node("store;-7");
        dfg.add_edge(a, b, "");
        let mut model = Model::new("m");
        let catalog = Catalog::build(&mut model, &dfg, MemoryGroups::scan(&dfg).unwrap(), 2);

        let name = |v: VarId| model.variables()[v.index()].name.clone();
        assert_eq!(name(catalog.presence(0, 0)), "lpg_0_0");
        assert_eq!(name(catalog.presence(1, 1)), "lps_1_1");
        assert!(model.variables().iter().all(|v| !v.name.contains('-')));
        assert_eq!(catalog.num_variables(), model.num_variables());
    }
}
