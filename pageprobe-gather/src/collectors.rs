// Built-in collectors

use crate::collector::Collector;
use crate::error::Result;
use crate::pipeline::{GatherContext, TracingData};
use async_trait::async_trait;
use pageprobe_core::audit::AuditOutcome;
use pageprobe_core::chains::{ChainReport, critical_chains};
use pageprobe_core::graph::GraphExtractor;
use pageprobe_core::model::Interval;
use serde_json::{Value, json};
use tracing::{info, warn};
use url::Url;

/// The closed list of collectors a standard session runs, in hook order.
pub fn default_collectors(extractor: Box<dyn GraphExtractor>) -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(UrlCollector::default()),
        Box::new(CriticalChainsCollector::new(extractor)),
        Box::new(MainThreadTasksCollector::default()),
    ]
}

/// Records the session's target URL.
#[derive(Debug, Default)]
pub struct UrlCollector {
    url: Option<Url>,
}

#[async_trait]
impl Collector for UrlCollector {
    fn name(&self) -> &str {
        "url"
    }

    async fn setup(&mut self, context: &GatherContext) -> Result<()> {
        self.url = Some(context.url.clone());
        Ok(())
    }

    fn artifact(&self) -> Value {
        match &self.url {
            Some(url) => json!({ "url": url.as_str() }),
            None => Value::Null,
        }
    }
}

/// Builds the critical request chains once network records are in.
/// A bad dependency graph is recorded in the artifact and never fails the
/// session.
pub struct CriticalChainsCollector {
    extractor: Box<dyn GraphExtractor>,
    outcome: Option<AuditOutcome<ChainReport>>,
}

impl CriticalChainsCollector {
    pub fn new(extractor: Box<dyn GraphExtractor>) -> Self {
        Self {
            extractor,
            outcome: None,
        }
    }

    pub fn outcome(&self) -> Option<&AuditOutcome<ChainReport>> {
        self.outcome.as_ref()
    }
}

#[async_trait]
impl Collector for CriticalChainsCollector {
    fn name(&self) -> &str {
        "critical-request-chains"
    }

    async fn after_trace_collected(
        &mut self,
        context: &GatherContext,
        data: &TracingData,
    ) -> Result<()> {
        let result = self
            .extractor
            .extract(&data.network_records, &data.trace)
            .and_then(|graph| critical_chains(&data.network_records, &graph));

        if let Ok(report) = &result {
            for summary in report.non_trivial() {
                info!(
                    "Critical chain of {} requests on {}: {:?}",
                    summary.total_requests, context.url, summary.urls
                );
                info!(
                    "  times: {:?}, begin-to-end: {}, loading: {}",
                    summary.times,
                    summary.total_time_between_begin_and_end,
                    summary.total_loading_time
                );
            }
        }

        let outcome = AuditOutcome::from(result);
        if let Some(error) = &outcome.error {
            warn!("Could not compute critical chains for {}: {}", context.url, error);
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    fn artifact(&self) -> Value {
        serde_json::to_value(&self.outcome).unwrap_or_else(|e| {
            warn!("Could not serialize critical chains artifact: {}", e);
            Value::Null
        })
    }
}

/// Top-level main-thread tasks and first contentful paint from the trace.
#[derive(Debug, Default)]
pub struct MainThreadTasksCollector {
    tasks: Vec<Interval>,
    first_contentful_paint_ms: Option<f64>,
}

impl MainThreadTasksCollector {
    pub fn tasks(&self) -> &[Interval] {
        &self.tasks
    }
}

#[async_trait]
impl Collector for MainThreadTasksCollector {
    fn name(&self) -> &str {
        "main-thread-tasks"
    }

    async fn after_trace_collected(
        &mut self,
        _context: &GatherContext,
        data: &TracingData,
    ) -> Result<()> {
        self.tasks = data.trace.main_thread_tasks();
        self.first_contentful_paint_ms = data.trace.first_contentful_paint_ms();
        Ok(())
    }

    fn artifact(&self) -> Value {
        json!({
            "tasks": self.tasks,
            "first_contentful_paint_ms": self.first_contentful_paint_ms,
        })
    }
}
