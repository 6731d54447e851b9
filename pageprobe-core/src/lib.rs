pub mod artifacts;
pub mod audit;
pub mod chains;
pub mod config;
pub mod delay;
pub mod error;
pub mod graph;
pub mod model;
pub mod simulation;
pub mod trace;

pub use artifacts::{ArtifactBundle, CollectorArtifact};
pub use audit::{AuditOutcome, DelayReport, MetricInputs, PageAudit, PageReport, SimulationInputs};
pub use chains::{Chain, ChainNode, ChainReport, ChainSummary, RequestForest, critical_chains};
pub use config::AnalysisConfig;
pub use delay::{LONG_QUEUING_DELAY_THRESHOLD_MS, cumulative_long_queuing_delay, observed_delay};
pub use error::{AnalysisError, Result};
pub use graph::{DependencyEdge, DependencyGraph, GraphExtractor, InitiatorExtractor, NetdepGraphFile};
pub use model::{Interval, Priority, RequestRecord};
pub use simulation::{
    BoundaryEstimate, Coefficients, ListScheduler, NodeTiming, NodeType, SchedulingEstimator,
    SchedulingPolicy, SimulatedBounds, SimulatedDelay, SimulationGraph, SimulationOptions,
    SimulationResult, Simulator,
};
pub use trace::{Trace, TraceEvent};
