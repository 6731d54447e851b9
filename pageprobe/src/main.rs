use anyhow::{Context, Result};
use clap::ArgMatches;
use commands::command_argument_builder;
use pageprobe::handlers::{
    OutputFormat, compute_delay, extractor_for, load_bundle, load_config, load_simulation_inputs,
    render_chains, render_delay, render_gather_summary,
};
use pageprobe_core::audit::{AuditOutcome, MetricInputs, PageAudit};
use pageprobe_core::config::AnalysisConfig;
use pageprobe_gather::{GatherPipeline, ReplayDriver, SessionOptions, WaitMode, default_collectors};
use std::path::PathBuf;
use tracing::{Level, info};
use url::Url;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    let level = match chosen_command.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match chosen_command.subcommand() {
        Some(("chains", primary_command)) => handle_chains(&chosen_command, primary_command),
        Some(("delay", primary_command)) => handle_delay(&chosen_command, primary_command),
        Some(("gather", primary_command)) => handle_gather(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn config_from(global: &ArgMatches) -> Result<AnalysisConfig> {
    load_config(global.get_one::<PathBuf>("config"))
}

fn format_from(args: &ArgMatches) -> Result<OutputFormat> {
    let name = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    OutputFormat::from_name(name)
}

fn required_path<'a>(args: &'a ArgMatches, id: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(id)
        .with_context(|| format!("--{} is required", id))
}

fn handle_chains(global: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let config = config_from(global)?;
    let bundle = load_bundle(required_path(args, "bundle")?)?;
    let extractor = extractor_for(args.get_one::<PathBuf>("graph"));

    info!(
        "Computing critical chains for session {} ({} requests)",
        bundle.session_id,
        bundle.network_records.len()
    );
    let outcome = AuditOutcome::from(PageAudit::new(&config, extractor.as_ref()).chains(&bundle));

    print!("{}", render_chains(&outcome, format_from(args)?)?);
    Ok(())
}

fn handle_delay(global: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let config = config_from(global)?;
    let bundle = load_bundle(required_path(args, "bundle")?)?;

    let simulation = match (
        args.get_one::<PathBuf>("sim-graph"),
        args.get_one::<PathBuf>("estimates"),
    ) {
        (Some(graph), Some(estimates)) => Some(load_simulation_inputs(graph, estimates)?),
        _ => None,
    };
    let inputs = MetricInputs {
        first_contentful_paint_ms: args.get_one::<f64>("fcp-ms").copied(),
        interactive_ms: args.get_one::<f64>("interactive-ms").copied(),
        simulation,
    };

    let outcome = compute_delay(&config, &bundle, &inputs);
    print!("{}", render_delay(&outcome, format_from(args)?)?);
    Ok(())
}

async fn handle_gather(args: &ArgMatches) -> Result<()> {
    let replay_path = required_path(args, "replay")?;
    let bundle = load_bundle(replay_path)?;
    let url: Url = args
        .get_one::<Url>("url")
        .cloned()
        .unwrap_or_else(|| bundle.url.clone());

    let options = SessionOptions {
        url: Some(url),
        load_page: !args.get_flag("no-load"),
        emulate_mobile: args.get_flag("mobile"),
        wait_mode: WaitMode::Loaded,
    };

    let collectors = default_collectors(extractor_for(args.get_one::<PathBuf>("graph")));
    let mut pipeline = GatherPipeline::new(options).with_collectors(collectors);
    let mut driver = ReplayDriver::new(bundle);

    let gathered = pipeline
        .run(&mut driver)
        .await
        .with_context(|| format!("Replay of {} failed", replay_path.display()))?;

    if let Some(save_path) = args.get_one::<PathBuf>("save") {
        gathered
            .save(save_path)
            .with_context(|| format!("Failed to save bundle to {}", save_path.display()))?;
    }

    print!("{}", render_gather_summary(&gathered, format_from(args)?)?);
    Ok(())
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
