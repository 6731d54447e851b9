// Critical request forest and chain enumeration

use crate::error::{AnalysisError, Result};
use crate::graph::{DependencyEdge, DependencyGraph};
use crate::model::RequestRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Dense index into a `RequestForest`.
pub type NodeId = usize;

/// A critical request inside the forest. Links are arena indices; `parent`
/// is a traversal back-pointer only.
#[derive(Debug, Clone)]
pub struct ChainNode<'a> {
    pub request: &'a RequestRecord,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Rooted forest of critical requests, built fresh per analysis.
#[derive(Debug, Clone, Default)]
pub struct RequestForest<'a> {
    nodes: Vec<ChainNode<'a>>,
    roots: Vec<NodeId>,
}

impl<'a> RequestForest<'a> {
    /// Build the forest in a single pass over requests and edges.
    ///
    /// Edges touching a non-critical or unknown request are skipped. An edge
    /// index outside `node_request_ids` is a `MalformedGraph` error. A second
    /// parent for an already-parented node is logged and dropped; the first
    /// assignment stands.
    pub fn build(
        requests: &'a [RequestRecord],
        edges: &[DependencyEdge],
        node_request_ids: &[String],
    ) -> Result<Self> {
        let mut nodes: Vec<ChainNode<'a>> = Vec::new();
        let mut by_request_id: HashMap<&'a str, NodeId> = HashMap::new();

        for request in requests.iter().filter(|r| r.is_critical()) {
            if by_request_id.contains_key(request.request_id.as_str()) {
                warn!(
                    "Duplicate request id {} in capture, keeping the first record",
                    request.request_id
                );
                continue;
            }
            by_request_id.insert(request.request_id.as_str(), nodes.len());
            nodes.push(ChainNode {
                request,
                parent: None,
                children: Vec::new(),
            });
        }

        let mut connected: HashSet<(NodeId, NodeId)> = HashSet::new();
        for edge in edges {
            let from_id = resolve_node(node_request_ids, edge.from_index, edge)?;
            let to_id = resolve_node(node_request_ids, edge.to_index, edge)?;

            let (Some(&from), Some(&to)) = (
                by_request_id.get(from_id.as_str()),
                by_request_id.get(to_id.as_str()),
            ) else {
                continue;
            };

            if !connected.insert((from, to)) {
                debug!("Skipping repeated edge {} -> {}", from_id, to_id);
                continue;
            }

            if let Some(existing) = nodes[to].parent {
                warn!(
                    "Request {} already has parent {}; ignoring second parent {}",
                    to_id, nodes[existing].request.request_id, from_id
                );
                continue;
            }

            nodes[from].children.push(to);
            nodes[to].parent = Some(from);
        }

        let roots = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| id)
            .collect();

        Ok(Self { nodes, roots })
    }

    /// Convenience wrapper over `build` for an extracted graph.
    pub fn from_graph(requests: &'a [RequestRecord], graph: &DependencyGraph) -> Result<Self> {
        Self::build(requests, &graph.edges, &graph.node_request_ids)
    }

    pub fn nodes(&self) -> &[ChainNode<'a>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&ChainNode<'a>> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every maximal root-to-leaf path, one per leaf. Roots in insertion
    /// order, then depth-first child order.
    ///
    /// Depth is bounded by the node count, and every node must be reached
    /// from some root; otherwise the graph has a cycle.
    pub fn chains(&self) -> Result<Vec<Chain<'a>>> {
        let limit = self.nodes.len();
        let mut visited = vec![false; limit];
        let mut chains = Vec::new();
        let mut path: Vec<NodeId> = Vec::new();

        for &root in &self.roots {
            let mut stack = vec![(root, 0usize)];

            while let Some((id, depth)) = stack.pop() {
                if depth >= limit || visited[id] {
                    return Err(self.cycle_at(id));
                }
                visited[id] = true;

                path.truncate(depth);
                path.push(id);

                let node = &self.nodes[id];
                if node.children.is_empty() {
                    chains.push(Chain {
                        requests: path.iter().map(|&n| self.nodes[n].request).collect(),
                    });
                } else {
                    for &child in node.children.iter().rev() {
                        stack.push((child, depth + 1));
                    }
                }
            }
        }

        if let Some(unreached) = visited.iter().position(|seen| !seen) {
            return Err(self.cycle_at(unreached));
        }

        Ok(chains)
    }

    fn cycle_at(&self, id: NodeId) -> AnalysisError {
        AnalysisError::CyclicGraph {
            request_id: self.nodes[id].request.request_id.clone(),
        }
    }
}

fn resolve_node<'g>(
    node_request_ids: &'g [String],
    index: usize,
    edge: &DependencyEdge,
) -> Result<&'g String> {
    node_request_ids.get(index).ok_or_else(|| {
        AnalysisError::MalformedGraph(format!(
            "edge ({}, {}) references node {} but the node list has {} entries",
            edge.from_index,
            edge.to_index,
            index,
            node_request_ids.len()
        ))
    })
}

/// Ordered requests from a root to a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain<'a> {
    pub requests: Vec<&'a RequestRecord>,
}

impl<'a> Chain<'a> {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.request_id.clone()).collect()
    }

    /// Timing annotation over the chain's requests.
    pub fn summary(&self) -> ChainSummary {
        let times = self
            .requests
            .iter()
            .map(|r| RequestTimes {
                start_time: r.start_time,
                response_received_time: r.response_received_time,
                end_time: r.end_time,
            })
            .collect();

        let total_time_between_begin_and_end = match (self.requests.first(), self.requests.last())
        {
            (Some(first), Some(last)) => last.end_time - first.start_time,
            _ => 0.0,
        };

        ChainSummary {
            urls: self.requests.iter().map(|r| r.url.clone()).collect(),
            total_requests: self.requests.len(),
            times,
            total_time_between_begin_and_end,
            total_loading_time: self
                .requests
                .iter()
                .map(|r| r.end_time - r.response_received_time)
                .sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTimes {
    pub start_time: f64,
    pub response_received_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub urls: Vec<String>,
    pub total_requests: usize,
    pub times: Vec<RequestTimes>,
    pub total_time_between_begin_and_end: f64,
    pub total_loading_time: f64,
}

/// Audit-facing view of the critical chains of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub chains: Vec<Vec<String>>,
    pub summaries: Vec<ChainSummary>,
    pub max_chain_length: usize,
}

impl ChainReport {
    pub fn from_chains(chains: &[Chain<'_>]) -> Self {
        Self {
            chains: chains.iter().map(|c| c.request_ids()).collect(),
            summaries: chains.iter().map(|c| c.summary()).collect(),
            max_chain_length: chains.iter().map(|c| c.len()).max().unwrap_or(0),
        }
    }

    /// Summaries of chains with more than one request.
    pub fn non_trivial(&self) -> impl Iterator<Item = &ChainSummary> {
        self.summaries.iter().filter(|s| s.total_requests > 1)
    }
}

/// Build, enumerate and annotate in one call.
pub fn critical_chains(requests: &[RequestRecord], graph: &DependencyGraph) -> Result<ChainReport> {
    let forest = RequestForest::from_graph(requests, graph)?;
    let chains = forest.chains()?;
    Ok(ChainReport::from_chains(&chains))
}
