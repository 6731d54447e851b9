//! Simulated scheduling of a page-load dependency graph.
//!
//! A [`Simulator`] turns a [`SimulationGraph`] into per-node timings under a
//! [`SchedulingPolicy`]. The [`SchedulingEstimator`] feeds the CPU timings of
//! both policies through the same queuing delay aggregation used for real
//! traces and blends the two sums with fixed coefficients.

use crate::delay::cumulative_long_queuing_delay;
use crate::error::{AnalysisError, Result};
use crate::model::Interval;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Cpu,
    Network,
}

/// Resource contention assumption for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingPolicy {
    /// Best case: network requests never wait for a connection.
    Optimistic,
    /// Worst case: network requests share a bounded pool of connections.
    Pessimistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationNode {
    pub id: String,
    pub node_type: NodeType,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEdge {
    pub from: String,
    pub to: String,
}

/// Serialized form of a simulation graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationGraphSpec {
    pub nodes: Vec<SimulationNode>,
    #[serde(default)]
    pub edges: Vec<SimulationEdge>,
}

/// Directed dependency graph of work units. An edge `a -> b` means `b` may
/// only start once `a` has finished.
#[derive(Debug, Clone, Default)]
pub struct SimulationGraph {
    graph: DiGraph<SimulationNode, ()>,
}

impl SimulationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: SimulationNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    pub fn add_dependency(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.add_edge(from, to, ());
    }

    pub fn from_spec(spec: SimulationGraphSpec) -> Result<Self> {
        let mut graph = Self::new();
        let mut by_id: HashMap<String, NodeIndex> = HashMap::new();

        for node in spec.nodes {
            if !node.duration_ms.is_finite() || node.duration_ms < 0.0 {
                return Err(AnalysisError::InvalidInput(format!(
                    "simulation node {} has invalid duration {}",
                    node.id, node.duration_ms
                )));
            }
            if by_id.contains_key(&node.id) {
                return Err(AnalysisError::InvalidInput(format!(
                    "duplicate simulation node id {}",
                    node.id
                )));
            }
            let id = node.id.clone();
            by_id.insert(id, graph.add_node(node));
        }

        for edge in spec.edges {
            let lookup = |id: &str| {
                by_id.get(id).copied().ok_or_else(|| {
                    AnalysisError::InvalidInput(format!("edge references unknown node {}", id))
                })
            };
            let from = lookup(&edge.from)?;
            let to = lookup(&edge.to)?;
            graph.add_dependency(from, to);
        }

        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_spec(serde_json::from_str(json)?)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn inner(&self) -> &DiGraph<SimulationNode, ()> {
        &self.graph
    }
}

/// Simulated timing of one node under one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTiming {
    pub node_id: String,
    pub node_type: NodeType,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

/// Node timings in graph node order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub policy: Option<SchedulingPolicy>,
    pub node_timings: Vec<NodeTiming>,
}

pub trait Simulator {
    fn simulate(&self, graph: &SimulationGraph, policy: SchedulingPolicy) -> Result<SimulationResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Connection pool size under the pessimistic policy.
    pub max_concurrent_requests: usize,
    /// Scales every CPU node's duration.
    pub cpu_slowdown_multiplier: f64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 6,
            cpu_slowdown_multiplier: 1.0,
        }
    }
}

/// Discrete list scheduler. CPU work runs on a single main thread; network
/// work runs unbounded (optimistic) or on a fixed pool of connections
/// (pessimistic). Among ready nodes the earliest ready wins, ties go to the
/// lower node index.
#[derive(Debug, Clone, Default)]
pub struct ListScheduler {
    options: SimulationOptions,
}

impl ListScheduler {
    pub fn new(options: SimulationOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ready {
    at: f64,
    index: usize,
}

impl Eq for Ready {}

// Reversed so BinaryHeap pops the earliest ready node first
impl Ord for Ready {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Simulator for ListScheduler {
    fn simulate(&self, graph: &SimulationGraph, policy: SchedulingPolicy) -> Result<SimulationResult> {
        let g = graph.inner();
        toposort(g, None).map_err(|cycle| AnalysisError::CyclicSimulation {
            node_id: g[cycle.node_id()].id.clone(),
        })?;

        let count = g.node_count();
        let mut pending: Vec<usize> = g
            .node_indices()
            .map(|i| g.neighbors_directed(i, Direction::Incoming).count())
            .collect();
        let mut ready_at = vec![0.0_f64; count];
        let mut timings: Vec<Option<NodeTiming>> = vec![None; count];

        let mut cpu_free = 0.0_f64;
        let mut connections: Option<Vec<f64>> = match policy {
            SchedulingPolicy::Optimistic => None,
            SchedulingPolicy::Pessimistic => {
                Some(vec![0.0; self.options.max_concurrent_requests.max(1)])
            }
        };

        let mut queue: BinaryHeap<Ready> = g
            .node_indices()
            .filter(|i| pending[i.index()] == 0)
            .map(|i| Ready {
                at: 0.0,
                index: i.index(),
            })
            .collect();

        while let Some(Ready { at, index }) = queue.pop() {
            let node_index = NodeIndex::new(index);
            let node = &g[node_index];

            let (start, duration) = match node.node_type {
                NodeType::Cpu => {
                    let duration = node.duration_ms * self.options.cpu_slowdown_multiplier;
                    let start = at.max(cpu_free);
                    cpu_free = start + duration;
                    (start, duration)
                }
                NodeType::Network => match connections.as_mut() {
                    None => (at, node.duration_ms),
                    Some(slots) => {
                        let (slot, free_at) = slots
                            .iter()
                            .copied()
                            .enumerate()
                            .min_by(|a, b| a.1.total_cmp(&b.1))
                            .unwrap_or((0, 0.0));
                        let start = at.max(free_at);
                        slots[slot] = start + node.duration_ms;
                        (start, node.duration_ms)
                    }
                },
            };
            let end = start + duration;

            for next in g.neighbors_directed(node_index, Direction::Outgoing) {
                let next = next.index();
                ready_at[next] = ready_at[next].max(end);
                pending[next] -= 1;
                if pending[next] == 0 {
                    queue.push(Ready {
                        at: ready_at[next],
                        index: next,
                    });
                }
            }

            timings[index] = Some(NodeTiming {
                node_id: node.id.clone(),
                node_type: node.node_type,
                start_time: start,
                end_time: end,
                duration,
            });
        }

        debug!(
            "Simulated {} nodes under {:?} policy",
            count, policy
        );

        Ok(SimulationResult {
            policy: Some(policy),
            node_timings: timings.into_iter().flatten().collect(),
        })
    }
}

/// CPU timings at least `min_duration_ms` long, as intervals sorted by start.
/// The sort is stable, so equal starts keep node order.
pub fn top_level_tasks(result: &SimulationResult, min_duration_ms: f64) -> Vec<Interval> {
    let mut tasks: Vec<Interval> = result
        .node_timings
        .iter()
        .filter(|t| t.node_type == NodeType::Cpu && t.duration >= min_duration_ms)
        .map(|t| Interval {
            start: t.start_time,
            end: t.end_time,
            duration: t.duration,
        })
        .collect();
    tasks.sort_by(|a, b| a.start.total_cmp(&b.start));
    tasks
}

/// An externally computed boundary metric under both policies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEstimate {
    pub optimistic_ms: f64,
    pub pessimistic_ms: f64,
}

/// Simulated first-contentful-paint and interactive estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBounds {
    #[serde(default)]
    pub first_contentful_paint: Option<BoundaryEstimate>,
    #[serde(default)]
    pub interactive: Option<BoundaryEstimate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coefficients {
    pub intercept: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            intercept: 0.0,
            optimistic: 0.5,
            pessimistic: 0.5,
        }
    }
}

impl Coefficients {
    pub fn combine(&self, optimistic: f64, pessimistic: f64) -> f64 {
        self.intercept + self.optimistic * optimistic + self.pessimistic * pessimistic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDelay {
    pub optimistic_ms: f64,
    pub pessimistic_ms: f64,
    pub timing_ms: f64,
}

pub struct SchedulingEstimator<S> {
    simulator: S,
}

impl<S: Simulator> SchedulingEstimator<S> {
    pub fn new(simulator: S) -> Self {
        Self { simulator }
    }

    /// Long CPU tasks of `graph` simulated under `policy`.
    pub fn estimate(
        &self,
        graph: &SimulationGraph,
        policy: SchedulingPolicy,
        threshold_ms: f64,
    ) -> Result<Vec<Interval>> {
        let result = self.simulator.simulate(graph, policy)?;
        Ok(top_level_tasks(&result, threshold_ms))
    }

    /// Blend the optimistic and pessimistic delay sums.
    ///
    /// Bounds are crossed on purpose: the optimistic sum uses the pessimistic
    /// FCP with the optimistic interactive time, and the reverse for the
    /// pessimistic sum. A later FCP excludes more tasks, so crossing keeps the
    /// two sums ordered the same way as their policies.
    pub fn simulated_delay(
        &self,
        graph: &SimulationGraph,
        bounds: &SimulatedBounds,
        coefficients: &Coefficients,
        threshold_ms: f64,
    ) -> Result<SimulatedDelay> {
        let fcp = bounds
            .first_contentful_paint
            .ok_or(AnalysisError::MissingSignal("first-contentful-paint"))?;
        let interactive = bounds
            .interactive
            .ok_or(AnalysisError::MissingSignal("interactive"))?;

        let optimistic_tasks = self.estimate(graph, SchedulingPolicy::Optimistic, threshold_ms)?;
        let optimistic_ms = cumulative_long_queuing_delay(
            &optimistic_tasks,
            fcp.pessimistic_ms,
            interactive.optimistic_ms,
            threshold_ms,
        );

        let pessimistic_tasks = self.estimate(graph, SchedulingPolicy::Pessimistic, threshold_ms)?;
        let pessimistic_ms = cumulative_long_queuing_delay(
            &pessimistic_tasks,
            fcp.optimistic_ms,
            interactive.pessimistic_ms,
            threshold_ms,
        );

        Ok(SimulatedDelay {
            optimistic_ms,
            pessimistic_ms,
            timing_ms: coefficients.combine(optimistic_ms, pessimistic_ms),
        })
    }
}
