// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    DEFAULT_CONFIG_PATH, OutputFormat, compute_delay, default_config_path, extractor_for,
    load_bundle, load_config, load_simulation_inputs, render_chains, render_delay,
    render_gather_summary,
};
