use std::fmt::{Display, Formatter};

use common::dfg::Dfg;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::instrument;

use crate::groups::AccessKind;

/// The graph is not acyclic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A cycle passes through the vertex.
    #[error("graph has a cycle through vertex {0}")]
    Cycle(usize),
}

/// Vertices in an order where every edge points forward.
///
/// # Errors
///
/// Returns [AnalysisError::Cycle] if there is no such order.
pub fn topological_order(dfg: &Dfg) -> Result<Vec<NodeIndex>, AnalysisError> {
    toposort(dfg.graph(), None).map_err(|cycle| AnalysisError::Cycle(cycle.node_id().index()))
}

/// Earliest time step of every vertex. Sources are at level `1`, every other vertex one level
/// after its latest predecessor.
///
/// # Errors
///
/// Returns [AnalysisError::Cycle] on cyclic graphs.
pub fn time_levels(dfg: &Dfg) -> Result<Vec<usize>, AnalysisError> {
    let order = topological_order(dfg)?;
    let mut level = vec![0; dfg.node_count()];
    for u in order {
        level[u.index()] = 1 + dfg.predecessors(u).iter().map(|v| level[v.index()]).max().unwrap_or(0);
    }
    Ok(level)
}

/// Maximum, minimum and mean of a degree distribution.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FanStats {
    /// Largest degree.
    pub max: usize,
    /// Smallest degree.
    pub min: usize,
    /// Mean degree.
    pub avg: f64,
}

impl FanStats {
    fn of(degrees: impl IntoIterator<Item = usize>) -> Option<Self> {
        let degrees: Vec<_> = degrees.into_iter().collect();
        let max = *degrees.iter().max()?;
        let min = *degrees.iter().min()?;
        let avg = degrees.iter().sum::<usize>() as f64 / degrees.len() as f64;
        Some(Self { max, min, avg })
    }
}

impl Display for FanStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "max {} min {} avg {:.2}", self.max, self.min, self.avg)
    }
}

/// Shape of a dataflow graph.
#[derive(Clone, Debug, PartialEq)]
pub struct DfgProfile {
    /// Number of vertices.
    pub node_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Edges per vertex.
    pub avg_degree: f64,
    /// Number of levels, the length of the longest path in vertices.
    pub critical_path: usize,
    /// Vertices per level on average.
    pub parallelism: f64,
    /// Number of vertices on level `i + 1`.
    pub level_sizes: Vec<usize>,
    /// Loads that can run in the first step.
    pub loads_at_first_level: usize,
    /// In-degrees of all vertices except loads.
    pub fan_in: Option<FanStats>,
    /// Out-degrees of all vertices except stores.
    pub fan_out: Option<FanStats>,
    /// Number of load vertices.
    pub loads: usize,
    /// Number of store vertices.
    pub stores: usize,
}

/// Compute the [DfgProfile] of a graph.
///
/// # Errors
///
/// Returns [AnalysisError::Cycle] on cyclic graphs.
#[instrument(skip_all)]
pub fn profile(dfg: &Dfg) -> Result<DfgProfile, AnalysisError> {
    let levels = time_levels(dfg)?;
    let n = dfg.node_count();
    let critical_path = levels.iter().copied().max().unwrap_or(0);
    let mut level_sizes = vec![0; critical_path];
    for l in &levels {
        level_sizes[l - 1] += 1;
    }

    let kinds: Vec<_> = dfg.nodes().map(|(_, label)| AccessKind::classify(label)).collect();
    let degrees = |skip: AccessKind, degree: fn(&Dfg, NodeIndex) -> usize| {
        FanStats::of(dfg.nodes().filter(|(u, _)| kinds[u.index()] != Some(skip)).map(|(u, _)| degree(dfg, u)))
    };
    let fan_in = degrees(AccessKind::Load, Dfg::in_degree);
    let fan_out = degrees(AccessKind::Store, Dfg::out_degree);

    let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
    Ok(DfgProfile {
        node_count: n,
        edge_count: dfg.edge_count(),
        avg_degree: ratio(dfg.edge_count(), n),
        critical_path,
        parallelism: ratio(n, critical_path),
        level_sizes,
        loads_at_first_level: (0..n).filter(|i| levels[*i] == 1 && kinds[*i] == Some(AccessKind::Load)).count(),
        fan_in,
        fan_out,
        loads: kinds.iter().filter(|k| **k == Some(AccessKind::Load)).count(),
        stores: kinds.iter().filter(|k| **k == Some(AccessKind::Store)).count(),
    })
}

impl Display for DfgProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "nodes {} edges {} degree {:.2}", self.node_count, self.edge_count, self.avg_degree)?;
        writeln!(f, "loads {} stores {} loads at level 1 {}", self.loads, self.stores, self.loads_at_first_level)?;
        writeln!(f, "critical path {} parallelism {:.2}", self.critical_path, self.parallelism)?;
        let levels: Vec<_> = self.level_sizes.iter().map(|c| c.to_string()).collect();
        writeln!(f, "level sizes [{}]", levels.join(", "))?;
        match &self.fan_in {
            Some(stats) => writeln!(f, "fan-in {stats}")?,
            None => writeln!(f, "fan-in -")?,
        }
        match &self.fan_out {
            Some(stats) => write!(f, "fan-out {stats}"),
            None => write!(f, "fan-out -"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::instances;

    #[test]
    fn chain_levels() {
        let dfg = instances::chain(5);
        assert_eq!(time_levels(&dfg).unwrap(), [1, 2, 3, 4, 5]);
        let profile = profile(&dfg).unwrap();
        assert_eq!(profile.critical_path, 5);
        assert_eq!(profile.parallelism, 1.0);
        assert_eq!(profile.level_sizes, [1; 5]);
    }

    #[test]
    fn reduction_profile() {
        let dfg = instances::load_reduce_store(4);
        let profile = profile(&dfg).unwrap();
        assert_eq!(profile.node_count, 8);
        assert_eq!(profile.edge_count, 7);
        assert_eq!(profile.critical_path, 4);
        assert_eq!(profile.level_sizes, [4, 2, 1, 1]);
        assert_eq!(profile.parallelism, 2.0);
        assert_eq!((profile.loads, profile.stores, profile.loads_at_first_level), (4, 1, 4));
        assert_eq!(profile.fan_in, Some(FanStats { max: 2, min: 1, avg: 7.0 / 4.0 }));
        assert_eq!(profile.fan_out, Some(FanStats { max: 1, min: 1, avg: 1.0 }));
    }

    #[test]
    fn order_respects_edges() {
        let dfg = instances::random_dag(30, 0.2, 7);
        let order = topological_order(&dfg).unwrap();
        let mut position = vec![0; dfg.node_count()];
        for (i, u) in order.iter().enumerate() {
            position[u.index()] = i;
        }
        assert!(dfg.edges().all(|(u, v, _)| position[u.index()] < position[v.index()]));
    }

    #[test]
    fn cycle() {
        let mut dfg = Dfg::new("cycle");
        let a = dfg.add_node("op");
        let b = dfg.add_node("op");
        dfg.add_edge(a, b, "");
        dfg.add_edge(b, a, "");
        assert!(matches!(topological_order(&dfg), Err(AnalysisError::Cycle(_))));
        assert!(profile(&dfg).is_err());
    }

    #[test]
    fn empty() {
        let profile = profile(&Dfg::new("empty")).unwrap();
        assert_eq!(profile.critical_path, 0);
        assert_eq!(profile.parallelism, 0.0);
        assert_eq!(profile.fan_in, None);
    }
}
