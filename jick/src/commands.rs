use crate::CLAP_STYLING;
use clap::{arg, command};
use jick_core::config::DEFAULT_CONFIG_PATH;
use jick_scanner::session::DEFAULT_USER_AGENT;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("jick")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("jick")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log crawl decisions (repeat for trace output)")
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init-config")
                .about("Writes the bundled form-value generation rules to disk for editing")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the TOML file")
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing file at the specified location")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a single host, following links and submitting synthesized form \
                values. Every distinct endpoint found is written to the output file.",
                )
                .arg(
                    arg!(-u --"urls" <URLS>)
                        .required(false)
                        .help("Comma-separated start URLs; the first one fixes the crawl host")
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of start URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("urls"),
                )
                .arg(arg!(--"href" "Follow <a href> links").action(clap::ArgAction::SetTrue))
                .arg(arg!(--"iframe" "Follow <iframe src> links").action(clap::ArgAction::SetTrue))
                .arg(arg!(--"get" "Submit GET forms").action(clap::ArgAction::SetTrue))
                .arg(arg!(--"post" "Submit POST forms").action(clap::ArgAction::SetTrue))
                .arg(arg!(--"robots" "Seed from /robots.txt").action(clap::ArgAction::SetTrue))
                .arg(arg!(--"site-map" "Seed from /sitemap.xml").action(clap::ArgAction::SetTrue))
                .arg(
                    arg!(--"user-agent" <AGENT>)
                        .required(false)
                        .help("User-Agent header sent with every request")
                        .default_value(DEFAULT_USER_AGENT),
                )
                .arg(
                    arg!(--"use-cookies")
                        .help("Keep cookies between requests (default: cleared after each)")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"proxy" <ADDR>)
                        .required(false)
                        .help("Proxy for all schemes, e.g. http://127.0.0.1:8080"),
                )
                .arg(
                    arg!(--"min-delay" <SECONDS>)
                        .required(false)
                        .help("Lower bound of the random pause after each request")
                        .value_parser(clap::value_parser!(i64))
                        .allow_negative_numbers(true)
                        .default_value("0"),
                )
                .arg(
                    arg!(--"max-delay" <SECONDS>)
                        .required(false)
                        .help("Upper bound of the random pause (default: 3x min-delay)")
                        .value_parser(clap::value_parser!(i64))
                        .allow_negative_numbers(true),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Output file [default: web_crawler_output_<date>_<h>_<m>.txt]")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text or json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"max-time" <SECONDS>)
                        .required(false)
                        .help("Stop after this many seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("600"),
                )
                .arg(
                    arg!(--"max-results" <COUNT>)
                        .required(false)
                        .help("Stop once this many endpoints are known")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("300"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Form-value generation rules (default: bundled rules)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"path-aware-dedup")
                        .help("Count equal parameter names on different paths as distinct")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
