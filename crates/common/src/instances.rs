use crate::dfg::Dfg;
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `0 -> 1 -> ... -> n-1`, every vertex labelled `op`.
pub fn chain(n: usize) -> Dfg {
    let mut dfg = Dfg::with_capacity(format!("chain{n}"), n, n.saturating_sub(1));
    for _ in 0..n {
        dfg.add_node("op");
    }
    for i in 1..n {
        dfg.add_edge(NodeIndex::new(i - 1), NodeIndex::new(i), "");
    }
    dfg
}

/// `n` independent loads sharing load group `group`.
pub fn shared_load_group(n: usize, group: u32) -> Dfg {
    let mut dfg = Dfg::with_capacity(format!("loads{n}"), n, 0);
    for _ in 0..n {
        dfg.add_node(format!("load;{group}"));
    }
    dfg
}

/// Loads feeding a reduction tree whose root is stored.
///
/// Loads alternate between groups `0` and `1`, the store is in group `2`.
pub fn load_reduce_store(loads: usize) -> Dfg {
    let mut dfg = Dfg::new(format!("reduce{loads}"));
    let mut frontier: Vec<_> = (0..loads).map(|i| dfg.add_node(format!("load;{}", i % 2))).collect();
    while frontier.len() > 1 {
        let mut next = vec![];
        for pair in frontier.chunks(2) {
            if let [a, b] = pair {
                let add = dfg.add_node("add");
                dfg.add_edge(*a, add, "");
                dfg.add_edge(*b, add, "");
                next.push(add);
            } else {
                next.push(pair[0]);
            }
        }
        frontier = next;
    }
    if let Some(&root) = frontier.first() {
        let store = dfg.add_node("store;2");
        dfg.add_edge(root, store, "");
    }
    dfg
}

/// A random DAG on `n` vertices. Edges only go from lower to higher ids, each present with
/// probability `p`. Roughly a quarter of the vertices are loads and stores in a few groups.
pub fn random_dag(n: usize, p: f64, seed: u64) -> Dfg {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dfg = Dfg::new(format!("random{n}_{seed}"));
    for _ in 0..n {
        let label = match rng.gen_range(0..8) {
            0 => format!("load;{}", rng.gen_range(0..2)),
            1 => format!("store;{}", rng.gen_range(10..12)),
            _ => "op".to_string(),
        };
        dfg.add_node(label);
    }
    for u in 0..n {
        for v in u + 1..n {
            if rng.gen_bool(p) {
                dfg.add_edge(NodeIndex::new(u), NodeIndex::new(v), "");
            }
        }
    }
    dfg
}
