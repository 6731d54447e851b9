pub mod collector;
pub mod collectors;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod replay;

pub use collector::Collector;
pub use collectors::{
    CriticalChainsCollector, MainThreadTasksCollector, UrlCollector, default_collectors,
};
pub use driver::{Driver, WaitMode};
pub use error::{GatherError, Result};
pub use pipeline::{GatherContext, GatherPipeline, Phase, SessionOptions, TracingData};
pub use replay::ReplayDriver;
