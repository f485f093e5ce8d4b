use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};

/// A dataflow graph. Node weights are operation labels, edge weights are edge labels.
#[derive(Clone, Debug, Default)]
pub struct Dfg {
    name: String,
    graph: DiGraph<String, String>,
}

impl Dfg {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), graph: DiGraph::new() }
    }

    pub fn with_capacity(name: impl Into<String>, nodes: usize, edges: usize) -> Self {
        Self { name: name.into(), graph: DiGraph::with_capacity(nodes, edges) }
    }

    pub fn from_graph(name: impl Into<String>, graph: DiGraph<String, String>) -> Self {
        Self { name: name.into(), graph }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &DiGraph<String, String> {
        &self.graph
    }

    pub fn add_node(&mut self, label: impl Into<String>) -> NodeIndex {
        self.graph.add_node(label.into())
    }

    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, label: impl Into<String>) {
        self.graph.add_edge(source, target, label.into());
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn find_node(&self, id: usize) -> Option<&str> {
        self.graph.node_weight(NodeIndex::new(id)).map(String::as_str)
    }

    pub fn label(&self, u: NodeIndex) -> &str {
        &self.graph[u]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &str)> + '_ {
        self.graph.node_indices().map(|u| (u, self.graph[u].as_str()))
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &str)> + '_ {
        self.graph.edge_references().map(|e| (e.source(), e.target(), e.weight().as_str()))
    }

    /// Distinct successors of `u` in ascending order. Parallel edges are reported once.
    pub fn successors(&self, u: NodeIndex) -> Vec<NodeIndex> {
        self.distinct_neighbors(u, Outgoing)
    }

    /// Distinct predecessors of `u` in ascending order.
    pub fn predecessors(&self, u: NodeIndex) -> Vec<NodeIndex> {
        self.distinct_neighbors(u, Incoming)
    }

    pub fn in_degree(&self, u: NodeIndex) -> usize {
        self.graph.edges_directed(u, Incoming).count()
    }

    pub fn out_degree(&self, u: NodeIndex) -> usize {
        self.graph.edges_directed(u, Outgoing).count()
    }

    fn distinct_neighbors(&self, u: NodeIndex, dir: petgraph::Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<_> = self.graph.neighbors_directed(u, dir).collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}
