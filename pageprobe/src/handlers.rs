use anyhow::{Context, Result};
use colored::Colorize;
use pageprobe_core::artifacts::ArtifactBundle;
use pageprobe_core::audit::{AuditOutcome, DelayReport, MetricInputs, PageAudit, SimulationInputs};
use pageprobe_core::chains::ChainReport;
use pageprobe_core::config::AnalysisConfig;
use pageprobe_core::graph::{GraphExtractor, InitiatorExtractor, NetdepGraphFile};
use pageprobe_core::simulation::{ListScheduler, SimulatedBounds, SimulationGraph};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/pageprobe/config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Unknown output format '{}'", other),
        }
    }
}

/// Tilde-expanded location of the default config file.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref())
}

/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<AnalysisConfig> {
    match explicit {
        Some(path) => {
            let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
            AnalysisConfig::load(&expanded)
                .with_context(|| format!("Failed to load config {}", expanded.display()))
        }
        None => {
            let path = default_config_path();
            debug!("Looking for config at {}", path.display());
            AnalysisConfig::load_or_default(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
    }
}

pub fn load_bundle(path: &Path) -> Result<ArtifactBundle> {
    ArtifactBundle::load(path)
        .with_context(|| format!("Failed to load session bundle {}", path.display()))
}

/// Precomputed graph file when given, initiator-based extraction otherwise.
pub fn extractor_for(graph: Option<&PathBuf>) -> Box<dyn GraphExtractor> {
    match graph {
        Some(path) => Box::new(NetdepGraphFile::new(path)),
        None => Box::new(InitiatorExtractor::new()),
    }
}

pub fn load_simulation_inputs(graph: &Path, estimates: &Path) -> Result<SimulationInputs> {
    let graph_json = fs::read_to_string(graph)
        .with_context(|| format!("Failed to read simulation graph {}", graph.display()))?;
    let graph = SimulationGraph::from_json(&graph_json)
        .with_context(|| format!("Invalid simulation graph {}", graph.display()))?;

    let estimates_json = fs::read_to_string(estimates)
        .with_context(|| format!("Failed to read estimates {}", estimates.display()))?;
    let bounds: SimulatedBounds = serde_json::from_str(&estimates_json)
        .with_context(|| format!("Invalid estimates {}", estimates.display()))?;

    Ok(SimulationInputs { graph, bounds })
}

/// Queuing delay alone; chain extraction is not run.
pub fn compute_delay(
    config: &AnalysisConfig,
    bundle: &ArtifactBundle,
    inputs: &MetricInputs,
) -> AuditOutcome<DelayReport> {
    let extractor = InitiatorExtractor::new();
    let simulator = ListScheduler::new(config.simulation.clone());
    AuditOutcome::from(PageAudit::new(config, &extractor).delay(bundle, inputs, simulator))
}

fn print_divider(out: &mut String) {
    out.push_str(&format!("{}\n", "═".repeat(60).bright_blue().bold()));
}

pub fn render_chains(outcome: &AuditOutcome<ChainReport>, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(outcome)?);
    }

    let mut out = String::new();
    print_divider(&mut out);
    out.push_str(&format!("{}\n", "Critical request chains".bold()));
    print_divider(&mut out);

    let report = match (&outcome.value, &outcome.error) {
        (Some(report), _) => report,
        (None, error) => {
            let reason = error.as_deref().unwrap_or("unknown error");
            out.push_str(&format!("{} {}\n", "✗".red(), reason.red()));
            return Ok(out);
        }
    };

    if report.chains.is_empty() {
        out.push_str("No critical requests found\n");
        return Ok(out);
    }

    out.push_str(&format!(
        "Chains: {}  Longest: {}\n\n",
        report.chains.len(),
        report.max_chain_length.to_string().yellow().bold()
    ));

    for (index, summary) in report.summaries.iter().enumerate() {
        out.push_str(&format!(
            "{} {} requests, {:.3} begin to end, {:.3} loading\n",
            format!("#{}", index + 1).cyan(),
            summary.total_requests,
            summary.total_time_between_begin_and_end,
            summary.total_loading_time
        ));
        for (depth, url) in summary.urls.iter().enumerate() {
            out.push_str(&format!("{}└─ {}\n", "   ".repeat(depth), url));
        }
    }
    Ok(out)
}

pub fn render_delay(outcome: &AuditOutcome<DelayReport>, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(outcome)?);
    }

    let mut out = String::new();
    print_divider(&mut out);
    out.push_str(&format!("{}\n", "Cumulative long queuing delay".bold()));
    print_divider(&mut out);

    let Some(report) = &outcome.value else {
        let reason = outcome.error.as_deref().unwrap_or("unknown error");
        out.push_str(&format!("{} {}\n", "✗".red(), reason.red()));
        return Ok(out);
    };

    out.push_str(&format!(
        "Observed:    {} ms\n",
        format!("{:.1}", report.observed_delay_ms).green().bold()
    ));
    let simulated = [
        ("Simulated:  ", report.simulated_delay_ms),
        ("Optimistic: ", report.optimistic_delay_ms),
        ("Pessimistic:", report.pessimistic_delay_ms),
    ];
    for (label, value) in simulated {
        if let Some(value) = value {
            out.push_str(&format!("{} {:.1} ms\n", label, value));
        }
    }
    if let Some(reason) = &report.simulated_error {
        out.push_str(&format!("Simulated:   {} {}\n", "✗".red(), reason.red()));
    }
    Ok(out)
}

/// One-line summary of a gathered bundle's artifacts.
pub fn render_gather_summary(bundle: &ArtifactBundle, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let artifacts: Vec<&str> = bundle
            .artifacts
            .iter()
            .map(|a| a.collector.as_str())
            .collect();
        let summary = json!({
            "session_id": bundle.session_id,
            "url": bundle.url,
            "requests": bundle.network_records.len(),
            "trace_events": bundle.trace.events.len(),
            "artifacts": artifacts,
        });
        return Ok(serde_json::to_string_pretty(&summary)?);
    }

    let mut out = format!(
        "{} Session {} for {}\n",
        "✓".green(),
        bundle.session_id,
        bundle.url
    );
    out.push_str(&format!(
        "  {} requests, {} trace events\n",
        bundle.network_records.len(),
        bundle.trace.events.len()
    ));
    for artifact in &bundle.artifacts {
        out.push_str(&format!("  artifact: {}\n", artifact.collector.cyan()));
    }
    Ok(out)
}
