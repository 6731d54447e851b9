// Request dependency edges and the extractors that produce them

use crate::error::{AnalysisError, Result};
use crate::model::RequestRecord;
use crate::trace::Trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// `from_index` initiated `to_index`. Both index into `DependencyGraph::node_request_ids`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from_index: usize,
    pub to_index: usize,
}

impl DependencyEdge {
    pub fn new(from_index: usize, to_index: usize) -> Self {
        Self {
            from_index,
            to_index,
        }
    }
}

/// Output of network-dependency extraction: a node list (by request id) and
/// the initiator edges between those nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub node_request_ids: Vec<String>,
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Parse the document written by the external dependency-graph tool.
    pub fn from_netdep_json(json: &str) -> Result<Self> {
        let document: NetdepDocument = serde_json::from_str(json)?;
        let graph = document.graph;

        let node_request_ids = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                id_string(&node.request.request_id).ok_or_else(|| {
                    AnalysisError::MalformedGraph(format!(
                        "node {} has no usable request id",
                        index
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let edges = graph
            .edges
            .iter()
            .map(|edge| DependencyEdge::new(edge.from, edge.to))
            .collect();

        Ok(Self {
            node_request_ids,
            edges,
        })
    }
}

#[derive(Deserialize)]
struct NetdepDocument {
    graph: NetdepGraph,
}

#[derive(Deserialize)]
struct NetdepGraph {
    nodes: Vec<NetdepNode>,
    #[serde(default)]
    edges: Vec<NetdepEdge>,
}

#[derive(Deserialize)]
struct NetdepNode {
    request: NetdepRequest,
}

#[derive(Deserialize)]
struct NetdepRequest {
    #[serde(alias = "requestId", alias = "_requestId")]
    request_id: Value,
}

#[derive(Deserialize)]
struct NetdepEdge {
    #[serde(rename = "__from_node_index")]
    from: usize,
    #[serde(rename = "__to_node_index")]
    to: usize,
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Derives initiator edges for one captured session.
pub trait GraphExtractor: Send + Sync {
    fn extract(&self, requests: &[RequestRecord], trace: &Trace) -> Result<DependencyGraph>;
}

/// In-process extraction from each record's `initiator_url`.
///
/// The node list is the capture order. A request is linked to the earliest
/// request for its initiator URL that started no later than itself.
#[derive(Debug, Clone, Default)]
pub struct InitiatorExtractor;

impl InitiatorExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

impl GraphExtractor for InitiatorExtractor {
    fn extract(&self, requests: &[RequestRecord], _trace: &Trace) -> Result<DependencyGraph> {
        let mut by_url: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, request) in requests.iter().enumerate() {
            by_url
                .entry(normalize_url(&request.url))
                .or_default()
                .push(index);
        }

        let mut edges = Vec::new();
        for (index, request) in requests.iter().enumerate() {
            let Some(initiator) = request.initiator_url.as_deref() else {
                continue;
            };
            let Some(candidates) = by_url.get(&normalize_url(initiator)) else {
                debug!(
                    "Initiator {} of request {} was not captured",
                    initiator, request.request_id
                );
                continue;
            };

            let parent = candidates
                .iter()
                .copied()
                .filter(|&candidate| {
                    candidate != index && requests[candidate].start_time <= request.start_time
                })
                .min_by(|&a, &b| {
                    requests[a]
                        .start_time
                        .total_cmp(&requests[b].start_time)
                        .then(a.cmp(&b))
                });

            if let Some(parent) = parent {
                edges.push(DependencyEdge::new(parent, index));
            }
        }

        Ok(DependencyGraph {
            node_request_ids: requests.iter().map(|r| r.request_id.clone()).collect(),
            edges,
        })
    }
}

/// Reads a graph precomputed by the external dependency-graph tool.
#[derive(Debug, Clone)]
pub struct NetdepGraphFile {
    path: PathBuf,
}

impl NetdepGraphFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl GraphExtractor for NetdepGraphFile {
    fn extract(&self, _requests: &[RequestRecord], _trace: &Trace) -> Result<DependencyGraph> {
        let content = fs::read_to_string(&self.path)?;
        DependencyGraph::from_netdep_json(&content)
    }
}
