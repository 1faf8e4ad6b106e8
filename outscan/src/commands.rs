use clap::{arg, command};
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("outscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("outscan")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Check every page of a site for outbound URLs we don't expect, \
                and report anything unlisted.",
                )
                .arg(
                    arg!(-s --"sitemap-url" <URL>)
                        .required(false)
                        .help("URL of an XML sitemap to use as source data")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("specific-url"),
                )
                .arg(
                    arg!(-u --"specific-url" <URL>)
                        .required(false)
                        .help("Specific URL/page to check. Repeat the flag once per URL")
                        .value_parser(clap::value_parser!(Url))
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-b --"batch" <SPEC>)
                        .required(false)
                        .help(
                            "Batch the gathered URLs and work on one batch. Format is \
                        {number}/{total}: 1/2 means chop the set in two and do the first half",
                        ),
                )
                .arg(
                    arg!(-a --"allowlist" <PATH>)
                        .required(false)
                        .help(
                            "Path to a YAML-formatted allowlist. If none is provided, the \
                        ALLOWLIST_FILEPATH env var is used",
                        ),
                )
                .arg(
                    arg!(--"extra-urls" <PATH>)
                        .required(false)
                        .help(
                            "Path to a YAML-formatted list of additional URLs to check. If none \
                        is provided, the EXTRA_URLS_FILEPATH env var is used",
                        ),
                )
                .arg(
                    arg!(--"maintain-hostname")
                        .required(false)
                        .help(
                            "Keep URLs exactly as the sitemap lists them instead of re-homing \
                        them onto the sitemap's own hostname",
                        )
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"export-cache")
                        .required(false)
                        .help("Dump fetched pages to {output}/page_cache for other checks to reuse")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Directory the report artifacts are written to")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .default_value("output"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"user-agent" <STRING>)
                        .required(false)
                        .help(
                            "Identifying User-Agent header. If none is provided, the USER_AGENT \
                        env var is used",
                        ),
                )
                .arg(
                    arg!(--"max-sitemap-depth" <LEVELS>)
                        .required(false)
                        .help("Hard ceiling on sitemap-index nesting")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                ),
        )
}
