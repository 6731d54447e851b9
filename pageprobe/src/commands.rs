use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("pageprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pageprobe")
        .about("Derive critical request chains and queuing delay from captured page loads")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-v --"verbose" "Raise log verbosity (-v info, -vv debug)")
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Analysis config file (default: ~/.config/pageprobe/config.json)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand_required(true)
        .subcommand(
            command!("chains")
                .about("Enumerate critical request chains of a saved session")
                .arg(bundle_arg())
                .arg(graph_arg())
                .arg(format_arg()),
        )
        .subcommand(
            command!("delay")
                .about("Compute cumulative long queuing delay of a saved session")
                .arg(bundle_arg())
                .arg(
                    arg!(--"interactive-ms" <MS>)
                        .required(true)
                        .help("Interactive time in milliseconds from navigation start")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"fcp-ms" <MS>)
                        .required(false)
                        .help("First contentful paint override (default: read from the trace)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"sim-graph" <PATH>)
                        .required(false)
                        .help("Simulation graph for the simulated delay")
                        .value_parser(clap::value_parser!(PathBuf))
                        .requires("estimates"),
                )
                .arg(
                    arg!(--"estimates" <PATH>)
                        .required(false)
                        .help("Optimistic/pessimistic FCP and interactive estimates")
                        .value_parser(clap::value_parser!(PathBuf))
                        .requires("sim-graph"),
                )
                .arg(format_arg()),
        )
        .subcommand(
            command!("gather")
                .about("Run the gather pipeline against a replayed session")
                .arg(
                    arg!(-r --"replay" <PATH>)
                        .required(true)
                        .help("Saved session bundle to replay")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Target URL (default: the URL the bundle captured)")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"mobile")
                        .required(false)
                        .help("Enable mobile emulation")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-load")
                        .required(false)
                        .help("Skip navigation to the target URL")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(graph_arg())
                .arg(
                    arg!(-s --"save" <PATH>)
                        .required(false)
                        .help("Write the gathered bundle to this path")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(format_arg()),
        )
}

fn bundle_arg() -> clap::Arg {
    arg!(-b --"bundle" <PATH>)
        .required(true)
        .help("Saved session bundle (JSON)")
        .value_parser(clap::value_parser!(PathBuf))
}

fn graph_arg() -> clap::Arg {
    arg!(-g --"graph" <PATH>)
        .required(false)
        .help("Precomputed dependency graph (default: derived from request initiators)")
        .value_parser(clap::value_parser!(PathBuf))
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Output format: text, json")
        .value_parser(["text", "json"])
        .default_value("text")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_delay_requires_both_simulation_inputs() {
        let result = command_argument_builder().try_get_matches_from([
            "pageprobe",
            "delay",
            "--bundle",
            "b.json",
            "--interactive-ms",
            "3000",
            "--sim-graph",
            "g.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = command_argument_builder()
            .try_get_matches_from(["pageprobe", "chains", "-b", "b.json", "-vv"])
            .unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "chains");
        assert_eq!(sub.get_one::<String>("format").unwrap(), "text");
    }
}
