//! Network Space
//!
//! An undirected [`Graph`] and a [`NetworkGrid`] that places agents on its
//! nodes.

use abm_types::AgentId;
use rand::Rng;
use std::collections::HashMap;

use super::SpaceError;

/// Undirected simple graph on nodes `0..n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: Vec<Vec<usize>>,
    edge_count: usize,
}

impl Graph {
    /// A graph with `nodes` nodes and no edges.
    pub fn new(nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); nodes],
            edge_count: 0,
        }
    }

    /// Random graph with the given average node degree.
    ///
    /// Repeatedly links two distinct random nodes until the edge count
    /// reaches `avg_degree * n / 2` (capped at a complete graph).
    pub fn random_with_average_degree<R: Rng + ?Sized>(
        nodes: usize,
        avg_degree: f64,
        rng: &mut R,
    ) -> Self {
        let mut graph = Self::new(nodes);
        if nodes < 2 {
            return graph;
        }
        let max_edges = nodes * (nodes - 1) / 2;
        let target = ((avg_degree.max(0.0) * nodes as f64 / 2.0).ceil() as usize).min(max_edges);

        while graph.edge_count < target {
            let a = rng.gen_range(0..nodes);
            let b = rng.gen_range(0..nodes);
            if a != b {
                // both nodes are in range and distinct
                let _ = graph.add_edge(a, b);
            }
        }
        graph
    }

    /// G(n, p): every pair is linked independently with probability `p`.
    pub fn erdos_renyi<R: Rng + ?Sized>(nodes: usize, p: f64, rng: &mut R) -> Self {
        let mut graph = Self::new(nodes);
        let p = p.clamp(0.0, 1.0);
        for a in 0..nodes {
            for b in (a + 1)..nodes {
                if rng.gen_bool(p) {
                    let _ = graph.add_edge(a, b);
                }
            }
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn check_node(&self, node: usize) -> Result<(), SpaceError> {
        if node < self.adjacency.len() {
            Ok(())
        } else {
            Err(SpaceError::InvalidNode(node))
        }
    }

    /// Links two nodes. Returns false if they were already linked.
    pub fn add_edge(&mut self, a: usize, b: usize) -> Result<bool, SpaceError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(SpaceError::SelfLoop(a));
        }
        let Err(slot) = self.adjacency[a].binary_search(&b) else {
            return Ok(false);
        };
        self.adjacency[a].insert(slot, b);
        if let Err(slot) = self.adjacency[b].binary_search(&a) {
            self.adjacency[b].insert(slot, a);
        }
        self.edge_count += 1;
        Ok(true)
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|adj| adj.binary_search(&b).is_ok())
    }

    /// Adjacent nodes in ascending order; empty for unknown nodes.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }

    /// Every edge once as `(a, b)` with `a < b`, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(a, adj)| adj.iter().filter(move |b| **b > a).map(move |b| (a, *b)))
            .collect()
    }
}

/// Agents placed on the nodes of a graph.
#[derive(Debug, Clone)]
pub struct NetworkGrid {
    graph: Graph,
    contents: Vec<Vec<AgentId>>,
    positions: HashMap<AgentId, usize>,
}

impl NetworkGrid {
    pub fn new(graph: Graph) -> Self {
        let contents = vec![Vec::new(); graph.node_count()];
        Self {
            graph,
            contents,
            positions: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn place_agent(&mut self, id: AgentId, node: usize) -> Result<(), SpaceError> {
        self.graph.check_node(node)?;
        if self.positions.contains_key(&id) {
            return Err(SpaceError::AlreadyPlaced(id));
        }
        self.contents[node].push(id);
        self.positions.insert(id, node);
        Ok(())
    }

    pub fn move_agent(&mut self, id: AgentId, node: usize) -> Result<(), SpaceError> {
        self.graph.check_node(node)?;
        let old = self.position_of(id).ok_or(SpaceError::NotPlaced(id))?;
        self.contents[old].retain(|other| *other != id);
        self.contents[node].push(id);
        self.positions.insert(id, node);
        Ok(())
    }

    /// Takes an agent off the network, returning its node.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<usize, SpaceError> {
        let node = self.positions.remove(&id).ok_or(SpaceError::NotPlaced(id))?;
        self.contents[node].retain(|other| *other != id);
        Ok(node)
    }

    pub fn position_of(&self, id: AgentId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Neighboring node ids, optionally preceded by `node` itself.
    pub fn get_neighbors(&self, node: usize, include_center: bool) -> Vec<usize> {
        let mut nodes = Vec::with_capacity(self.graph.degree(node) + 1);
        if include_center && node < self.graph.node_count() {
            nodes.push(node);
        }
        nodes.extend_from_slice(self.graph.neighbors(node));
        nodes
    }

    pub fn is_cell_empty(&self, node: usize) -> bool {
        self.contents.get(node).map_or(true, Vec::is_empty)
    }

    pub fn contents(&self, node: usize) -> &[AgentId] {
        self.contents.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Agents on the given nodes, in node order.
    pub fn get_cell_list_contents(&self, nodes: &[usize]) -> Vec<AgentId> {
        nodes
            .iter()
            .flat_map(|node| self.contents(*node).iter().copied())
            .collect()
    }

    /// Every placed agent, in node order.
    pub fn get_all_cell_contents(&self) -> Vec<AgentId> {
        self.contents.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_add_edge_rules() {
        let mut graph = Graph::new(3);
        assert_eq!(graph.add_edge(0, 2), Ok(true));
        assert_eq!(graph.add_edge(2, 0), Ok(false));
        assert_eq!(graph.add_edge(1, 1), Err(SpaceError::SelfLoop(1)));
        assert_eq!(graph.add_edge(0, 3), Err(SpaceError::InvalidNode(3)));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge(2, 0));
        assert_eq!(graph.edges(), vec![(0, 2)]);
    }

    #[test]
    fn test_neighbors_sorted() {
        let mut graph = Graph::new(5);
        for b in [4, 1, 3] {
            graph.add_edge(0, b).unwrap();
        }
        assert_eq!(graph.neighbors(0), &[1, 3, 4]);
        assert_eq!(graph.neighbors(9), &[] as &[usize]);
    }

    #[test]
    fn test_random_with_average_degree() {
        let mut rng = SmallRng::seed_from_u64(5);
        let graph = Graph::random_with_average_degree(10, 3.0, &mut rng);
        assert_eq!(graph.edge_count(), 15);

        let dense = Graph::random_with_average_degree(4, 10.0, &mut rng);
        assert_eq!(dense.edge_count(), 6);
    }

    #[test]
    fn test_fractional_edge_target_rounds_up() {
        // 2.8 * 16 / 2 = 22.4 edges
        let mut rng = SmallRng::seed_from_u64(3);
        let graph = Graph::random_with_average_degree(16, 2.8, &mut rng);
        assert_eq!(graph.edge_count(), 23);
    }

    #[test]
    fn test_random_graph_is_seeded() {
        let a = Graph::random_with_average_degree(20, 4.0, &mut SmallRng::seed_from_u64(9));
        let b = Graph::random_with_average_degree(20, 4.0, &mut SmallRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_erdos_renyi_extremes() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(Graph::erdos_renyi(6, 0.0, &mut rng).edge_count(), 0);
        assert_eq!(Graph::erdos_renyi(6, 1.0, &mut rng).edge_count(), 15);
    }

    #[test]
    fn test_network_grid_placement() {
        let mut graph = Graph::new(3);
        graph.add_edge(0, 1).unwrap();
        graph.add_edge(1, 2).unwrap();
        let mut net = NetworkGrid::new(graph);

        net.place_agent(AgentId(0), 0).unwrap();
        net.place_agent(AgentId(1), 2).unwrap();
        assert_eq!(net.place_agent(AgentId(0), 1), Err(SpaceError::AlreadyPlaced(AgentId(0))));
        assert_eq!(net.place_agent(AgentId(5), 7), Err(SpaceError::InvalidNode(7)));

        assert_eq!(net.get_neighbors(1, false), vec![0, 2]);
        assert_eq!(net.get_neighbors(1, true), vec![1, 0, 2]);
        assert_eq!(net.get_cell_list_contents(&net.get_neighbors(1, false)), vec![AgentId(0), AgentId(1)]);
        assert!(net.is_cell_empty(1));

        net.move_agent(AgentId(0), 1).unwrap();
        assert_eq!(net.position_of(AgentId(0)), Some(1));
        assert!(net.is_cell_empty(0));

        assert_eq!(net.remove_agent(AgentId(1)), Ok(2));
        assert_eq!(net.get_all_cell_contents(), vec![AgentId(0)]);
        assert_eq!(net.remove_agent(AgentId(1)), Err(SpaceError::NotPlaced(AgentId(1))));
    }
}
