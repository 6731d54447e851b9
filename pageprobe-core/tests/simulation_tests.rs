// Tests for the scheduling simulator and simulated queuing delay

use pageprobe_core::error::{AnalysisError, Result};
use pageprobe_core::simulation::{
    BoundaryEstimate, Coefficients, ListScheduler, NodeTiming, NodeType, SchedulingEstimator,
    SchedulingPolicy, SimulatedBounds, SimulationGraph, SimulationOptions, SimulationResult,
    Simulator, top_level_tasks,
};

const PAGE_GRAPH: &str = r#"{
    "nodes": [
        {"id": "document", "node_type": "network", "duration_ms": 100.0},
        {"id": "parse", "node_type": "cpu", "duration_ms": 200.0},
        {"id": "a.js", "node_type": "network", "duration_ms": 300.0},
        {"id": "b.js", "node_type": "network", "duration_ms": 300.0},
        {"id": "eval-a", "node_type": "cpu", "duration_ms": 120.0},
        {"id": "eval-b", "node_type": "cpu", "duration_ms": 80.0}
    ],
    "edges": [
        {"from": "document", "to": "parse"},
        {"from": "parse", "to": "a.js"},
        {"from": "parse", "to": "b.js"},
        {"from": "a.js", "to": "eval-a"},
        {"from": "b.js", "to": "eval-b"}
    ]
}"#;

fn page_graph() -> SimulationGraph {
    SimulationGraph::from_json(PAGE_GRAPH).unwrap()
}

fn single_connection() -> ListScheduler {
    ListScheduler::new(SimulationOptions {
        max_concurrent_requests: 1,
        cpu_slowdown_multiplier: 1.0,
    })
}

fn span(result: &SimulationResult, id: &str) -> (f64, f64) {
    let timing = result
        .node_timings
        .iter()
        .find(|t| t.node_id == id)
        .unwrap();
    (timing.start_time, timing.end_time)
}

fn timing(id: &str, node_type: NodeType, start: f64, duration: f64) -> NodeTiming {
    NodeTiming {
        node_id: id.to_string(),
        node_type,
        start_time: start,
        end_time: start + duration,
        duration,
    }
}

/// Returns canned timings regardless of the graph.
struct CannedSimulator {
    optimistic: Vec<NodeTiming>,
    pessimistic: Vec<NodeTiming>,
}

impl Simulator for CannedSimulator {
    fn simulate(&self, _graph: &SimulationGraph, policy: SchedulingPolicy) -> Result<SimulationResult> {
        let node_timings = match policy {
            SchedulingPolicy::Optimistic => self.optimistic.clone(),
            SchedulingPolicy::Pessimistic => self.pessimistic.clone(),
        };
        Ok(SimulationResult {
            policy: Some(policy),
            node_timings,
        })
    }
}

// ============================================================================
// List scheduler
// ============================================================================

#[test]
fn test_optimistic_runs_network_in_parallel() {
    let result = single_connection()
        .simulate(&page_graph(), SchedulingPolicy::Optimistic)
        .unwrap();

    assert_eq!(span(&result, "document"), (0.0, 100.0));
    assert_eq!(span(&result, "parse"), (100.0, 300.0));
    assert_eq!(span(&result, "a.js"), (300.0, 600.0));
    assert_eq!(span(&result, "b.js"), (300.0, 600.0));
    assert_eq!(span(&result, "eval-a"), (600.0, 720.0));
    // Main thread is busy with eval-a until 720
    assert_eq!(span(&result, "eval-b"), (720.0, 800.0));
}

#[test]
fn test_pessimistic_queues_on_connection_pool() {
    let result = single_connection()
        .simulate(&page_graph(), SchedulingPolicy::Pessimistic)
        .unwrap();

    assert_eq!(span(&result, "a.js"), (300.0, 600.0));
    assert_eq!(span(&result, "b.js"), (600.0, 900.0));
    assert_eq!(span(&result, "eval-a"), (600.0, 720.0));
    assert_eq!(span(&result, "eval-b"), (900.0, 980.0));
}

#[test]
fn test_cpu_slowdown_scales_cpu_only() {
    let scheduler = ListScheduler::new(SimulationOptions {
        max_concurrent_requests: 6,
        cpu_slowdown_multiplier: 2.0,
    });
    let result = scheduler
        .simulate(&page_graph(), SchedulingPolicy::Optimistic)
        .unwrap();

    assert_eq!(span(&result, "document"), (0.0, 100.0));
    assert_eq!(span(&result, "parse"), (100.0, 500.0));
}

#[test]
fn test_timings_follow_node_order() {
    let result = ListScheduler::default()
        .simulate(&page_graph(), SchedulingPolicy::Optimistic)
        .unwrap();
    let ids: Vec<&str> = result.node_timings.iter().map(|t| t.node_id.as_str()).collect();
    assert_eq!(ids, vec!["document", "parse", "a.js", "b.js", "eval-a", "eval-b"]);
}

#[test]
fn test_cyclic_simulation_graph_is_rejected() {
    let graph = SimulationGraph::from_json(
        r#"{"nodes": [
            {"id": "a", "node_type": "cpu", "duration_ms": 10.0},
            {"id": "b", "node_type": "cpu", "duration_ms": 10.0}
        ], "edges": [{"from": "a", "to": "b"}, {"from": "b", "to": "a"}]}"#,
    )
    .unwrap();

    let result = ListScheduler::default().simulate(&graph, SchedulingPolicy::Optimistic);
    assert!(matches!(result, Err(AnalysisError::CyclicSimulation { .. })));
}

#[test]
fn test_graph_spec_validation() {
    let unknown = SimulationGraph::from_json(
        r#"{"nodes": [{"id": "a", "node_type": "cpu", "duration_ms": 1.0}],
            "edges": [{"from": "a", "to": "ghost"}]}"#,
    );
    assert!(matches!(unknown, Err(AnalysisError::InvalidInput(_))));

    let duplicate = SimulationGraph::from_json(
        r#"{"nodes": [
            {"id": "a", "node_type": "cpu", "duration_ms": 1.0},
            {"id": "a", "node_type": "network", "duration_ms": 1.0}
        ]}"#,
    );
    assert!(matches!(duplicate, Err(AnalysisError::InvalidInput(_))));

    let negative = SimulationGraph::from_json(
        r#"{"nodes": [{"id": "a", "node_type": "cpu", "duration_ms": -1.0}]}"#,
    );
    assert!(matches!(negative, Err(AnalysisError::InvalidInput(_))));
}

// ============================================================================
// Estimation
// ============================================================================

#[test]
fn test_top_level_tasks_filter_and_stable_sort() {
    let result = SimulationResult {
        policy: None,
        node_timings: vec![
            timing("a", NodeType::Cpu, 10.0, 60.0),
            timing("b", NodeType::Cpu, 5.0, 60.0),
            timing("c", NodeType::Cpu, 10.0, 70.0),
            timing("d", NodeType::Network, 0.0, 100.0),
            timing("e", NodeType::Cpu, 0.0, 20.0),
        ],
    };

    let tasks = top_level_tasks(&result, 50.0);
    let durations: Vec<f64> = tasks.iter().map(|t| t.duration).collect();
    let starts: Vec<f64> = tasks.iter().map(|t| t.start).collect();
    assert_eq!(starts, vec![5.0, 10.0, 10.0]);
    assert_eq!(durations, vec![60.0, 60.0, 70.0]);
}

#[test]
fn test_estimate_returns_long_cpu_tasks() {
    let estimator = SchedulingEstimator::new(single_connection());
    let tasks = estimator
        .estimate(&page_graph(), SchedulingPolicy::Optimistic, 100.0)
        .unwrap();

    let spans: Vec<(f64, f64)> = tasks.iter().map(|t| (t.start, t.end)).collect();
    assert_eq!(spans, vec![(100.0, 300.0), (600.0, 720.0)]);
}

#[test]
fn test_simulated_delay_blends_both_policies() {
    let estimator = SchedulingEstimator::new(single_connection());
    let bounds = SimulatedBounds {
        first_contentful_paint: Some(BoundaryEstimate {
            optimistic_ms: 100.0,
            pessimistic_ms: 150.0,
        }),
        interactive: Some(BoundaryEstimate {
            optimistic_ms: 700.0,
            pessimistic_ms: 1000.0,
        }),
    };

    let delay = estimator
        .simulated_delay(&page_graph(), &bounds, &Coefficients::default(), 50.0)
        .unwrap();

    // Optimistic window [150, 700]: parse 100ms + eval-a 70ms
    assert_eq!(delay.optimistic_ms, 170.0);
    // Pessimistic window [100, 1000]: parse 150ms + eval-a 70ms + eval-b 30ms
    assert_eq!(delay.pessimistic_ms, 250.0);
    assert_eq!(delay.timing_ms, 210.0);
}

#[test]
fn test_simulated_delay_crosses_fcp_estimates() {
    let task = vec![timing("main", NodeType::Cpu, 0.0, 300.0)];
    let estimator = SchedulingEstimator::new(CannedSimulator {
        optimistic: task.clone(),
        pessimistic: task,
    });
    let bounds = SimulatedBounds {
        first_contentful_paint: Some(BoundaryEstimate {
            optimistic_ms: 100.0,
            pessimistic_ms: 200.0,
        }),
        interactive: Some(BoundaryEstimate {
            optimistic_ms: 1000.0,
            pessimistic_ms: 1000.0,
        }),
    };

    let delay = estimator
        .simulated_delay(&SimulationGraph::new(), &bounds, &Coefficients::default(), 50.0)
        .unwrap();

    // Region is [0, 250]; the optimistic sum starts at the pessimistic FCP
    assert_eq!(delay.optimistic_ms, 50.0);
    assert_eq!(delay.pessimistic_ms, 150.0);
}

#[test]
fn test_custom_coefficients() {
    let coefficients = Coefficients {
        intercept: 10.0,
        optimistic: 0.25,
        pessimistic: 0.75,
    };
    assert_eq!(coefficients.combine(100.0, 200.0), 185.0);
}

#[test]
fn test_simulated_delay_requires_bounds() {
    let estimator = SchedulingEstimator::new(ListScheduler::default());
    let bounds = SimulatedBounds {
        first_contentful_paint: None,
        interactive: Some(BoundaryEstimate {
            optimistic_ms: 1.0,
            pessimistic_ms: 2.0,
        }),
    };

    let result = estimator.simulated_delay(&page_graph(), &bounds, &Coefficients::default(), 50.0);
    assert!(matches!(
        result,
        Err(AnalysisError::MissingSignal("first-contentful-paint"))
    ));
}
