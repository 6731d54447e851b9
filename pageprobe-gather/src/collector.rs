// Five-hook collector capability

use crate::error::Result;
use crate::pipeline::{GatherContext, TracingData};
use async_trait::async_trait;
use serde_json::Value;

/// A plugin that observes one gather session and accumulates an artifact.
///
/// Hooks run strictly one collector after another, in the order the
/// collectors were handed to the pipeline. Every hook defaults to a no-op,
/// but the pipeline still calls it.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Name the artifact is stored under.
    fn name(&self) -> &str;

    async fn setup(&mut self, _context: &GatherContext) -> Result<()> {
        Ok(())
    }

    async fn before_page_load(&mut self, _context: &GatherContext) -> Result<()> {
        Ok(())
    }

    async fn after_page_load(&mut self, _context: &GatherContext) -> Result<()> {
        Ok(())
    }

    async fn after_trace_collected(
        &mut self,
        _context: &GatherContext,
        _data: &TracingData,
    ) -> Result<()> {
        Ok(())
    }

    async fn tear_down(&mut self, _context: &GatherContext, _data: &TracingData) -> Result<()> {
        Ok(())
    }

    /// Accumulated result, read once after tear-down.
    fn artifact(&self) -> Value;
}
