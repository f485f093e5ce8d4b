use common::dfg::Dfg;

use crate::catalog::Catalog;
use crate::model::{Model, Sense};

/// Minimize weighted group transactions plus crossing transactions.
///
/// Every present group costs `memory_weight`, every crossing `W[i][k,l]` costs
/// [Catalog::crossing_cost]. Assignment and successor indicators are free.
pub fn set_objective(model: &mut Model, dfg: &Dfg, catalog: &Catalog, memory_weight: usize) {
    let weight = memory_weight as f64;
    let mut terms = Vec::with_capacity(catalog.presence_count() + catalog.crossing_count() / 2);
    for g in 0..catalog.groups().len() {
        terms.extend((0..catalog.num_parts()).map(|p| (catalog.presence(g, p), weight)));
    }
    for (i, _) in dfg.nodes() {
        terms.extend(catalog.pairs().map(|(k, l)| (catalog.crossing(i, k, l), catalog.crossing_cost(k, l))));
    }
    model.set_objective(terms, Sense::Minimize);
}
