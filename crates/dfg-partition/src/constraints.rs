use common::dfg::Dfg;
use tracing::{debug, instrument};

use crate::catalog::Catalog;
use crate::groups::AccessKind;
use crate::model::{Family, Model};

/// Emit every constraint family of the partitioning model.
#[instrument(skip_all)]
pub fn add_all(model: &mut Model, dfg: &Dfg, catalog: &Catalog, capacity: usize, transaction_limit: usize) {
    add_uniqueness(model, dfg, catalog);
    add_capacity(model, dfg, catalog, capacity);
    add_precedence(model, dfg, catalog);
    add_crossing(model, dfg, catalog);
    add_group_presence(model, catalog);
    add_transaction_limits(model, dfg, catalog, transaction_limit);
    debug!(rows = model.num_constraints());
}

/// Every vertex is placed in exactly one partition.
pub fn add_uniqueness(model: &mut Model, dfg: &Dfg, catalog: &Catalog) {
    for (i, _) in dfg.nodes() {
        model.add_eq(Family::Uniqueness, (0..catalog.num_parts()).map(|p| (catalog.assign(i, p), 1.0)), 1.0);
    }
}

/// No partition holds more than `capacity` vertices.
pub fn add_capacity(model: &mut Model, dfg: &Dfg, catalog: &Catalog, capacity: usize) {
    for p in 0..catalog.num_parts() {
        model.add_leq(Family::Capacity, dfg.nodes().map(|(i, _)| (catalog.assign(i, p), 1.0)), capacity as f64);
    }
}

/// The partition of an edge's source is never larger than the partition of its destination.
pub fn add_precedence(model: &mut Model, dfg: &Dfg, catalog: &Catalog) {
    let parts = catalog.num_parts();
    for (s, d, _) in dfg.edges() {
        let source = (0..parts).map(|p| (catalog.assign(s, p), p as f64));
        let destination = (0..parts).map(|p| (catalog.assign(d, p), -(p as f64)));
        model.add_leq(Family::Precedence, source.chain(destination), 0.0);
    }
}

/// Ties `Y` to the successor placement and linearizes `W = X AND Y`.
///
/// For a vertex `i` with successors `succ(i)` and every pair `k < l`:
/// ```text
/// sum_{j in succ(i)} X[j][l] - Y[i][k,l] >= 0
/// sum_{j in succ(i)} X[j][l] - |succ(i)| Y[i][k,l] <= 0
/// X[i][k] + Y[i][k,l] - W[i][k,l] <= 1
/// -X[i][k] - Y[i][k,l] + 2 W[i][k,l] <= 0
/// ```
/// Sinks have both indicators fixed to zero.
pub fn add_crossing(model: &mut Model, dfg: &Dfg, catalog: &Catalog) {
    for (i, _) in dfg.nodes() {
        let successors = dfg.successors(i);
        for (k, l) in catalog.pairs() {
            let y = catalog.successor_in(i, k, l);
            let w = catalog.crossing(i, k, l);
            if successors.is_empty() {
                model.add_eq(Family::Crossing, [(y, 1.0)], 0.0);
                model.add_eq(Family::Crossing, [(w, 1.0)], 0.0);
                continue;
            }
            let placed_in_l = || successors.iter().map(|j| (catalog.assign(*j, l), 1.0));
            model.add_constraint(Family::Crossing, placed_in_l().chain([(y, -1.0)]), 0.0, f64::INFINITY);
            model.add_leq(Family::Crossing, placed_in_l().chain([(y, -(successors.len() as f64))]), 0.0);

            let x = catalog.assign(i, k);
            model.add_leq(Family::Crossing, [(x, 1.0), (y, 1.0), (w, -1.0)], 1.0);
            model.add_leq(Family::Crossing, [(x, -1.0), (y, -1.0), (w, 2.0)], 0.0);
        }
    }
}

/// `L[g][p]` is one exactly if some member of `g` is placed in `p`.
pub fn add_group_presence(model: &mut Model, catalog: &Catalog) {
    for (g, group) in catalog.groups().iter().enumerate() {
        let size = group.members.len() as f64;
        for p in 0..catalog.num_parts() {
            let members = || group.members.iter().map(|m| (catalog.assign(*m, p), 1.0));
            let l = catalog.presence(g, p);
            model.add_leq(Family::GroupPresence, members().map(|(v, c)| (v, -c)).chain([(l, 1.0)]), 0.0);
            model.add_leq(Family::GroupPresence, members().chain([(l, -size)]), 0.0);
        }
    }
}

/// Reads and writes of each partition stay within `transaction_limit`.
///
/// Reads of `k` are the crossings landing in `k` plus the load groups present in `k`. Writes are
/// the crossings leaving `k` plus the store groups present in `k`.
pub fn add_transaction_limits(model: &mut Model, dfg: &Dfg, catalog: &Catalog, transaction_limit: usize) {
    let parts = catalog.num_parts();
    let limit = transaction_limit as f64;
    let groups = catalog.groups();
    for k in 0..parts {
        let mut reads = vec![];
        let mut writes = vec![];
        for (i, _) in dfg.nodes() {
            reads.extend((0..k).map(|p| (catalog.crossing(i, p, k), 1.0)));
            writes.extend((k + 1..parts).map(|p| (catalog.crossing(i, k, p), 1.0)));
        }
        reads.extend(groups.of_kind(AccessKind::Load).map(|(g, _)| (catalog.presence(g, k), 1.0)));
        writes.extend(groups.of_kind(AccessKind::Store).map(|(g, _)| (catalog.presence(g, k), 1.0)));
        model.add_leq(Family::Transaction, reads, limit);
        model.add_leq(Family::Transaction, writes, limit);
    }
}
