// Ordered gather session around one page load

use crate::collector::Collector;
use crate::driver::{Driver, WaitMode};
use crate::error::{GatherError, Result};
use pageprobe_core::artifacts::{ArtifactBundle, CollectorArtifact};
use pageprobe_core::model::RequestRecord;
use pageprobe_core::trace::Trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

fn default_load_page() -> bool {
    true
}

/// What one gather session should do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default = "default_load_page")]
    pub load_page: bool,
    #[serde(default)]
    pub emulate_mobile: bool,
    #[serde(default)]
    pub wait_mode: WaitMode,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            url: None,
            load_page: true,
            emulate_mobile: false,
            wait_mode: WaitMode::default(),
        }
    }
}

impl SessionOptions {
    pub fn for_url(url: Url) -> Self {
        Self {
            url: Some(url),
            ..Self::default()
        }
    }
}

/// Shared, read-only view of the session handed to every hook.
#[derive(Debug, Clone)]
pub struct GatherContext {
    pub url: Url,
    pub options: SessionOptions,
}

/// Captures available once tracing has stopped.
#[derive(Debug, Clone, Default)]
pub struct TracingData {
    pub network_records: Vec<RequestRecord>,
    pub trace: Trace,
}

/// Collector hook phases, in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    BeforePageLoad,
    AfterPageLoad,
    AfterTraceCollected,
    TearDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Setup => "setup",
            Phase::BeforePageLoad => "before-page-load",
            Phase::AfterPageLoad => "after-page-load",
            Phase::AfterTraceCollected => "after-trace-collected",
            Phase::TearDown => "tear-down",
        };
        write!(f, "{}", name)
    }
}

enum Hook<'a> {
    Setup,
    BeforePageLoad,
    AfterPageLoad,
    AfterTraceCollected(&'a TracingData),
    TearDown(&'a TracingData),
}

impl Hook<'_> {
    fn phase(&self) -> Phase {
        match self {
            Hook::Setup => Phase::Setup,
            Hook::BeforePageLoad => Phase::BeforePageLoad,
            Hook::AfterPageLoad => Phase::AfterPageLoad,
            Hook::AfterTraceCollected(_) => Phase::AfterTraceCollected,
            Hook::TearDown(_) => Phase::TearDown,
        }
    }
}

/// Drives one page-load session through its phases and assembles the
/// resulting artifact bundle.
pub struct GatherPipeline {
    options: SessionOptions,
    collectors: Vec<Box<dyn Collector>>,
}

impl GatherPipeline {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            collectors: Vec::new(),
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_collectors(mut self, collectors: Vec<Box<dyn Collector>>) -> Self {
        self.collectors.extend(collectors);
        self
    }

    pub fn collectors(&self) -> &[Box<dyn Collector>] {
        &self.collectors
    }

    /// Run the session. Without a target URL this fails before the driver
    /// is touched. Any failure after connecting triggers a best-effort
    /// disconnect before the original error is returned.
    pub async fn run(&mut self, driver: &mut dyn Driver) -> Result<ArtifactBundle> {
        let url = self
            .options
            .url
            .clone()
            .ok_or_else(|| GatherError::Session("no target URL supplied".to_string()))?;
        let context = GatherContext {
            url: url.clone(),
            options: self.options.clone(),
        };

        info!("Starting gather session for {}", url);

        driver.connect().await?;
        let data = match self.connected_phases(driver, &context).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Gather session for {} failed: {}", url, e);
                if let Err(disconnect_err) = driver.disconnect().await {
                    warn!("Disconnect after failure also failed: {}", disconnect_err);
                }
                return Err(e);
            }
        };

        debug!("Disconnecting");
        driver.disconnect().await?;

        self.run_hooks(&context, Hook::TearDown(&data)).await?;

        let mut bundle = ArtifactBundle::new(url, data.network_records, data.trace);
        bundle.artifacts = self
            .collectors
            .iter()
            .map(|collector| CollectorArtifact {
                collector: collector.name().to_string(),
                value: collector.artifact(),
            })
            .collect();

        info!(
            "Gather session {} finished: {} requests, {} trace events, {} artifacts",
            bundle.session_id,
            bundle.network_records.len(),
            bundle.trace.events.len(),
            bundle.artifacts.len()
        );
        Ok(bundle)
    }

    /// Everything between connect and disconnect.
    async fn connected_phases(
        &mut self,
        driver: &mut dyn Driver,
        context: &GatherContext,
    ) -> Result<TracingData> {
        if context.options.emulate_mobile {
            debug!("Enabling mobile emulation");
            driver.begin_emulation().await?;
        }

        debug!("Clearing caches and updating service workers");
        driver.clean_and_disable_browser_caches().await?;
        driver.force_update_service_workers().await?;

        self.run_hooks(context, Hook::Setup).await?;

        debug!("Beginning frame-load, trace and network capture");
        driver.begin_frame_load_collect().await?;
        driver.begin_trace().await?;
        driver.begin_network_collect().await?;

        self.run_hooks(context, Hook::BeforePageLoad).await?;

        if context.options.load_page {
            debug!("Loading {} (waiting for {})", context.url, context.options.wait_mode);
            driver.goto_url(&context.url, context.options.wait_mode).await?;
        }

        self.run_hooks(context, Hook::AfterPageLoad).await?;

        debug!("Ending capture");
        let network_records = driver.end_network_collect().await?;
        let trace = driver.end_trace().await?;
        driver.end_frame_load_collect().await?;

        let data = TracingData {
            network_records,
            trace,
        };
        self.run_hooks(context, Hook::AfterTraceCollected(&data)).await?;

        Ok(data)
    }

    async fn run_hooks(&mut self, context: &GatherContext, hook: Hook<'_>) -> Result<()> {
        let phase = hook.phase();
        debug!("Running {} hooks on {} collectors", phase, self.collectors.len());

        for collector in self.collectors.iter_mut() {
            let result = match &hook {
                Hook::Setup => collector.setup(context).await,
                Hook::BeforePageLoad => collector.before_page_load(context).await,
                Hook::AfterPageLoad => collector.after_page_load(context).await,
                Hook::AfterTraceCollected(data) => {
                    collector.after_trace_collected(context, data).await
                }
                Hook::TearDown(data) => collector.tear_down(context, data).await,
            };

            result.map_err(|e| match e {
                GatherError::Collector { .. } => e,
                other => GatherError::Collector {
                    collector: collector.name().to_string(),
                    phase: phase.to_string(),
                    message: other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}
