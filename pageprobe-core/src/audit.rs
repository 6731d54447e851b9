// Audit-facing assembly of chain and delay results for one bundle

use crate::artifacts::ArtifactBundle;
use crate::chains::{ChainReport, critical_chains};
use crate::config::AnalysisConfig;
use crate::delay::observed_delay;
use crate::error::Result;
use crate::graph::GraphExtractor;
use crate::simulation::{
    ListScheduler, SchedulingEstimator, SimulatedBounds, SimulationGraph, Simulator,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Either a computed value or the reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditOutcome<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> AuditOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> From<Result<T>> for AuditOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self {
                value: Some(value),
                error: None,
            },
            Err(e) => Self {
                value: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayReport {
    pub observed_delay_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated_delay_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimistic_delay_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pessimistic_delay_ms: Option<f64>,
    /// Why the simulated trio is missing when simulation inputs were given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulated_error: Option<String>,
}

/// Simulation graph plus its externally estimated boundary metrics.
#[derive(Debug, Clone)]
pub struct SimulationInputs {
    pub graph: SimulationGraph,
    pub bounds: SimulatedBounds,
}

/// Boundary metrics computed outside this crate.
#[derive(Debug, Clone, Default)]
pub struct MetricInputs {
    /// Overrides the paint mark found in the trace.
    pub first_contentful_paint_ms: Option<f64>,
    pub interactive_ms: Option<f64>,
    pub simulation: Option<SimulationInputs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub session_id: Uuid,
    pub url: String,
    pub chains: AuditOutcome<ChainReport>,
    pub delay: AuditOutcome<DelayReport>,
}

pub struct PageAudit<'a> {
    config: &'a AnalysisConfig,
    extractor: &'a dyn GraphExtractor,
}

impl<'a> PageAudit<'a> {
    pub fn new(config: &'a AnalysisConfig, extractor: &'a dyn GraphExtractor) -> Self {
        Self { config, extractor }
    }

    /// Chains and delay are independent; a failure in one is reported next
    /// to the other's value.
    pub fn run(&self, bundle: &ArtifactBundle, inputs: &MetricInputs) -> PageReport {
        let simulator = ListScheduler::new(self.config.simulation.clone());
        self.run_with_simulator(bundle, inputs, simulator)
    }

    pub fn run_with_simulator<S: Simulator>(
        &self,
        bundle: &ArtifactBundle,
        inputs: &MetricInputs,
        simulator: S,
    ) -> PageReport {
        let chains = AuditOutcome::from(self.chains(bundle));
        if let Some(error) = &chains.error {
            warn!("Critical chain audit failed for {}: {}", bundle.url, error);
        }

        let delay = AuditOutcome::from(self.delay(bundle, inputs, simulator));
        if let Some(error) = &delay.error {
            warn!("Queuing delay audit failed for {}: {}", bundle.url, error);
        }

        PageReport {
            session_id: bundle.session_id,
            url: bundle.url.to_string(),
            chains,
            delay,
        }
    }

    pub fn chains(&self, bundle: &ArtifactBundle) -> Result<ChainReport> {
        let graph = self.extractor.extract(&bundle.network_records, &bundle.trace)?;
        critical_chains(&bundle.network_records, &graph)
    }

    pub fn delay<S: Simulator>(
        &self,
        bundle: &ArtifactBundle,
        inputs: &MetricInputs,
        simulator: S,
    ) -> Result<DelayReport> {
        let threshold = self.config.long_task_threshold_ms;
        let fcp = inputs
            .first_contentful_paint_ms
            .or_else(|| bundle.trace.first_contentful_paint_ms());

        let tasks = bundle.trace.main_thread_tasks();
        let observed_delay_ms = observed_delay(&tasks, fcp, inputs.interactive_ms, threshold)?;

        let mut report = DelayReport {
            observed_delay_ms,
            simulated_delay_ms: None,
            optimistic_delay_ms: None,
            pessimistic_delay_ms: None,
            simulated_error: None,
        };

        // The observed value stands on its own when simulation fails
        if let Some(simulation) = &inputs.simulation {
            match SchedulingEstimator::new(simulator).simulated_delay(
                &simulation.graph,
                &simulation.bounds,
                &self.config.coefficients,
                threshold,
            ) {
                Ok(simulated) => {
                    report.simulated_delay_ms = Some(simulated.timing_ms);
                    report.optimistic_delay_ms = Some(simulated.optimistic_ms);
                    report.pessimistic_delay_ms = Some(simulated.pessimistic_ms);
                }
                Err(e) => {
                    warn!("Simulated queuing delay failed for {}: {}", bundle.url, e);
                    report.simulated_error = Some(e.to_string());
                }
            }
        }

        Ok(report)
    }
}
