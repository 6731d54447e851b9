use pageprobe_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatherError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Driver {operation} failed: {message}")]
    Driver { operation: String, message: String },

    #[error("Collector {collector} failed during {phase}: {message}")]
    Collector {
        collector: String,
        phase: String,
        message: String,
    },

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

impl GatherError {
    pub fn driver(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatherError>;
