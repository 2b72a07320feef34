use crate::CLAP_STYLING;
use clap::{arg, command};
use lsmap_core::source::DEFAULT_HINTS_URL;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("lsmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("lsmap")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner, progress and the final report").required(false))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl the lookup service cache directory and harvest every measurement \
                host it leads to.",
                )
                .arg(
                    arg!([HINTS_URL])
                        .required(false)
                        .help("URL of the newline-delimited list of cache archives")
                        .value_parser(clap::value_parser!(Url))
                        .default_value(DEFAULT_HINTS_URL),
                )
                .arg(
                    arg!(-o --"output-dir" <PATH>)
                        .required(false)
                        .help("Directory the link, summary and results logs are written to")
                        .default_value("."),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Timeout for every HTTP request, in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(-p --"port" <PORT>)
                        .required(false)
                        .help("Port the harvest endpoints are requested on")
                        .value_parser(clap::value_parser!(u16).range(1..))
                        .default_value("80"),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Disable the progress spinner")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
