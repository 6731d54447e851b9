// Browser automation capability consumed by the gather pipeline

use crate::error::Result;
use async_trait::async_trait;
use pageprobe_core::model::RequestRecord;
use pageprobe_core::trace::Trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// When navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
    #[default]
    Loaded,
    DomContentLoaded,
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitMode::Loaded => write!(f, "load"),
            WaitMode::DomContentLoaded => write!(f, "DOMContentLoaded"),
        }
    }
}

/// One browsing session. Every call may suspend; the pipeline never issues
/// two calls concurrently. Navigation timeouts are the driver's concern.
#[async_trait]
pub trait Driver: Send {
    async fn connect(&mut self) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;

    async fn begin_emulation(&mut self) -> Result<()>;
    async fn clean_and_disable_browser_caches(&mut self) -> Result<()>;
    async fn force_update_service_workers(&mut self) -> Result<()>;

    async fn begin_frame_load_collect(&mut self) -> Result<()>;
    async fn end_frame_load_collect(&mut self) -> Result<()>;

    async fn begin_trace(&mut self) -> Result<()>;
    async fn end_trace(&mut self) -> Result<Trace>;

    async fn begin_network_collect(&mut self) -> Result<()>;
    async fn end_network_collect(&mut self) -> Result<Vec<RequestRecord>>;

    async fn goto_url(&mut self, url: &Url, wait_mode: WaitMode) -> Result<()>;
}
