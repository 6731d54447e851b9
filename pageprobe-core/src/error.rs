use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Malformed dependency graph: {0}")]
    MalformedGraph(String),

    #[error("Cycle detected in critical request graph at request {request_id}")]
    CyclicGraph { request_id: String },

    #[error("Cycle detected in simulation graph at node {node_id}")]
    CyclicSimulation { node_id: String },

    #[error("Required signal was not computed: {0}")]
    MissingSignal(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
