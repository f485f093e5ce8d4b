use std::path::Path;

use common::dfg::Dfg;
use petgraph::graph::NodeIndex;
use tracing::{debug, instrument};

use crate::config::PartitionParams;
use crate::validate::Assignment;

/// Label of the vertex standing in for a value read from an earlier partition.
pub const SCRATCHPAD_READ: &str = "sc_pad_read";
/// Label of the vertex standing in for a value written to a later partition.
pub const SCRATCHPAD_WRITE: &str = "sc_pad_write";

/// Where a vertex of a partition subgraph comes from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeOrigin {
    /// Copy of an original vertex.
    Vertex(NodeIndex),
    /// Placeholder feeding a value from an earlier partition.
    ScratchpadRead,
    /// Placeholder receiving a value for a later partition.
    ScratchpadWrite,
}

/// The subgraph induced by one partition with boundary placeholders.
#[derive(Clone, Debug)]
pub struct PartitionGraph {
    /// Partition index.
    pub index: usize,
    /// The renumbered subgraph.
    pub dfg: Dfg,
    /// Origin of every local vertex, indexed by local id.
    pub origin: Vec<NodeOrigin>,
}

impl PartitionGraph {
    /// Number of original vertices in the partition.
    pub fn vertex_count(&self) -> usize {
        self.origin.iter().filter(|o| matches!(o, NodeOrigin::Vertex(_))).count()
    }

    /// Number of placeholders of the given kind.
    pub fn placeholder_count(&self, origin: NodeOrigin) -> usize {
        self.origin.iter().filter(|o| **o == origin).count()
    }
}

/// Build one subgraph per partition.
///
/// Vertices keep their relative order and are numbered from `0`. Edges are visited in the
/// order of the original graph. An edge inside the partition is copied, an edge leaving to a
/// later partition ends in a new [SCRATCHPAD_WRITE] vertex, and an edge arriving from an
/// earlier partition starts at a new [SCRATCHPAD_READ] vertex. Edge labels are kept.
#[instrument(skip_all)]
pub fn extract_partitions(dfg: &Dfg, assignment: &Assignment) -> Vec<PartitionGraph> {
    (0..assignment.num_parts()).map(|p| extract_partition(dfg, assignment, p)).collect()
}

fn extract_partition(dfg: &Dfg, assignment: &Assignment, p: usize) -> PartitionGraph {
    let members = assignment.members(p);
    let mut local = vec![None; dfg.node_count()];
    let mut sub = Dfg::with_capacity(format!("{}_{p}", dfg.name()), members.len(), 0);
    let mut origin = Vec::with_capacity(members.len());
    for u in members {
        local[u.index()] = Some(sub.add_node(dfg.label(u)));
        origin.push(NodeOrigin::Vertex(u));
    }

    for (s, d, label) in dfg.edges() {
        match (local[s.index()], local[d.index()]) {
            (Some(a), Some(b)) => sub.add_edge(a, b, label),
            (Some(a), None) if assignment.part(d) > p => {
                let pad = sub.add_node(SCRATCHPAD_WRITE);
                origin.push(NodeOrigin::ScratchpadWrite);
                sub.add_edge(a, pad, label);
            }
            (None, Some(b)) if assignment.part(s) < p => {
                let pad = sub.add_node(SCRATCHPAD_READ);
                origin.push(NodeOrigin::ScratchpadRead);
                sub.add_edge(pad, b, label);
            }
            _ => {}
        }
    }
    debug!(part = p, n = sub.node_count(), m = sub.edge_count());
    PartitionGraph { index: p, dfg: sub, origin }
}

/// Directory name for the outputs of one run, `<stem>_<capacity>_<limit>_<weight>`.
pub fn output_namespace(graph_path: &Path, params: &PartitionParams) -> String {
    let stem = graph_path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    format!("{stem}_{}_{}_{}", params.capacity, params.transaction_limit, params.memory_weight)
}
