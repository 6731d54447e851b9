// Driver that replays a persisted artifact bundle

use crate::driver::{Driver, WaitMode};
use crate::error::{GatherError, Result};
use async_trait::async_trait;
use pageprobe_core::artifacts::ArtifactBundle;
use pageprobe_core::model::RequestRecord;
use pageprobe_core::trace::Trace;
use tracing::debug;
use url::Url;

/// Serves the captures of an earlier session without a browser. Calls must
/// arrive in a valid order: capture must begin before it ends, and nothing
/// but `connect` is accepted while disconnected.
#[derive(Debug)]
pub struct ReplayDriver {
    bundle: ArtifactBundle,
    connected: bool,
    frame_load_active: bool,
    trace_active: bool,
    network_active: bool,
    visited: Vec<Url>,
}

impl ReplayDriver {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self {
            bundle,
            connected: false,
            frame_load_active: false,
            trace_active: false,
            network_active: false,
            visited: Vec::new(),
        }
    }

    /// URLs navigated to so far.
    pub fn visited(&self) -> &[Url] {
        &self.visited
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn require_connected(&self, operation: &str) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(GatherError::driver(operation, "not connected"))
        }
    }
}

/// Flip a capture flag from `from` to `!from`, failing if it is not in `from`.
fn toggle(flag: &mut bool, from: bool, operation: &str) -> Result<()> {
    if *flag != from {
        let message = if from {
            "capture was never started"
        } else {
            "capture already started"
        };
        return Err(GatherError::driver(operation, message));
    }
    *flag = !from;
    Ok(())
}

#[async_trait]
impl Driver for ReplayDriver {
    async fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Err(GatherError::driver("connect", "already connected"));
        }
        debug!("Replaying session {}", self.bundle.session_id);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.require_connected("disconnect")?;
        self.connected = false;
        self.frame_load_active = false;
        self.trace_active = false;
        self.network_active = false;
        Ok(())
    }

    async fn begin_emulation(&mut self) -> Result<()> {
        self.require_connected("begin_emulation")
    }

    async fn clean_and_disable_browser_caches(&mut self) -> Result<()> {
        self.require_connected("clean_and_disable_browser_caches")
    }

    async fn force_update_service_workers(&mut self) -> Result<()> {
        self.require_connected("force_update_service_workers")
    }

    async fn begin_frame_load_collect(&mut self) -> Result<()> {
        self.require_connected("begin_frame_load_collect")?;
        toggle(&mut self.frame_load_active, false, "begin_frame_load_collect")
    }

    async fn end_frame_load_collect(&mut self) -> Result<()> {
        self.require_connected("end_frame_load_collect")?;
        toggle(&mut self.frame_load_active, true, "end_frame_load_collect")
    }

    async fn begin_trace(&mut self) -> Result<()> {
        self.require_connected("begin_trace")?;
        toggle(&mut self.trace_active, false, "begin_trace")
    }

    async fn end_trace(&mut self) -> Result<Trace> {
        self.require_connected("end_trace")?;
        toggle(&mut self.trace_active, true, "end_trace")?;
        Ok(self.bundle.trace.clone())
    }

    async fn begin_network_collect(&mut self) -> Result<()> {
        self.require_connected("begin_network_collect")?;
        toggle(&mut self.network_active, false, "begin_network_collect")
    }

    async fn end_network_collect(&mut self) -> Result<Vec<RequestRecord>> {
        self.require_connected("end_network_collect")?;
        toggle(&mut self.network_active, true, "end_network_collect")?;
        Ok(self.bundle.network_records.clone())
    }

    async fn goto_url(&mut self, url: &Url, wait_mode: WaitMode) -> Result<()> {
        self.require_connected("goto_url")?;
        if url != &self.bundle.url {
            debug!(
                "Replay requested {} but the bundle captured {}",
                url, self.bundle.url
            );
        }
        debug!("Replayed navigation to {} (wait for {})", url, wait_mode);
        self.visited.push(url.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::default_collectors;
    use crate::pipeline::{GatherPipeline, SessionOptions};
    use pageprobe_core::graph::{InitiatorExtractor, NetdepGraphFile};
    use pageprobe_core::model::Priority;
    use pageprobe_core::trace::TraceEvent;

    fn record(id: &str, url: &str, start: f64, initiator: Option<&str>) -> RequestRecord {
        RequestRecord {
            request_id: id.to_string(),
            initial_priority: Priority::High,
            start_time: start,
            response_received_time: start + 0.1,
            end_time: start + 0.2,
            url: url.to_string(),
            initiator_url: initiator.map(|s| s.to_string()),
        }
    }

    fn bundle() -> ArtifactBundle {
        let trace = Trace::new(vec![
            TraceEvent {
                name: "navigationStart".to_string(),
                ph: "R".to_string(),
                ..TraceEvent::default()
            },
            TraceEvent {
                name: "RunTask".to_string(),
                ph: "X".to_string(),
                ts: 100_000.0,
                dur: Some(80_000.0),
                ..TraceEvent::default()
            },
        ]);
        ArtifactBundle::new(
            Url::parse("https://example.com/").unwrap(),
            vec![
                record("1", "https://example.com/", 0.0, None),
                record("2", "https://example.com/app.js", 0.5, Some("https://example.com/")),
            ],
            trace,
        )
    }

    #[tokio::test]
    async fn test_rejects_out_of_order_calls() {
        let mut driver = ReplayDriver::new(bundle());

        assert!(driver.begin_trace().await.is_err());

        driver.connect().await.unwrap();
        assert!(driver.connect().await.is_err());
        assert!(driver.end_trace().await.is_err());

        driver.begin_trace().await.unwrap();
        assert!(driver.begin_trace().await.is_err());
        assert_eq!(driver.end_trace().await.unwrap().events.len(), 2);

        driver.disconnect().await.unwrap();
        assert!(driver.disconnect().await.is_err());
    }

    #[tokio::test]
    async fn test_replayed_gather_rebuilds_artifacts() {
        let original = bundle();
        let mut driver = ReplayDriver::new(original.clone());
        let mut pipeline = GatherPipeline::new(SessionOptions::for_url(original.url.clone()))
            .with_collectors(default_collectors(Box::new(InitiatorExtractor::new())));

        let replayed = pipeline.run(&mut driver).await.unwrap();

        assert!(!driver.is_connected());
        assert_eq!(driver.visited(), &[original.url.clone()]);
        assert_ne!(replayed.session_id, original.session_id);
        assert_eq!(replayed.network_records, original.network_records);

        let names: Vec<&str> = replayed
            .artifacts
            .iter()
            .map(|a| a.collector.as_str())
            .collect();
        assert_eq!(names, vec!["url", "critical-request-chains", "main-thread-tasks"]);

        let chains = replayed.artifact("critical-request-chains").unwrap();
        assert_eq!(chains["value"]["chains"][0][1], "2");
        assert_eq!(chains["value"]["max_chain_length"], 2);

        let tasks = replayed.artifact("main-thread-tasks").unwrap();
        assert_eq!(tasks["tasks"][0]["start"], 100.0);
        assert_eq!(tasks["tasks"][0]["duration"], 80.0);
    }

    #[tokio::test]
    async fn test_unreadable_graph_is_recorded_not_fatal() {
        let original = bundle();
        let mut driver = ReplayDriver::new(original.clone());
        let extractor = NetdepGraphFile::new("/nonexistent/pageprobe/graph.json");
        let mut pipeline = GatherPipeline::new(SessionOptions::for_url(original.url.clone()))
            .with_collectors(default_collectors(Box::new(extractor)));

        let replayed = pipeline.run(&mut driver).await.unwrap();

        let chains = replayed.artifact("critical-request-chains").unwrap();
        assert!(chains["error"].is_string());
        assert!(chains.get("value").is_none());

        let tasks = replayed.artifact("main-thread-tasks").unwrap();
        assert_eq!(tasks["tasks"][0]["duration"], 80.0);
    }
}
