use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("trawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("trawl")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log checker activity (overridden by RUST_LOG)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Path to the config file (default: ~/.config/trawl/config.toml)"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default configuration file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to write config.toml into")
                        .default_value("~/.config/trawl/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrite an existing config.toml at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("verify")
                .about("Evaluate a URL against every configured source and print a verdict")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The URL to verify. https:// is assumed when no scheme is given"),
                )
                .arg(
                    arg!(--"full")
                        .required(false)
                        .help("Also run threat intelligence, heuristics and the SSL probe"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("domain")
                .about("Check whether a domain belongs to a known official entity")
                .arg(arg!(<DOMAIN>).required(true).help("The domain to look up")),
        )
        .subcommand(
            command!("batch")
                .about("Check up to 10 domains against the official registry")
                .arg(
                    arg!([DOMAINS] ...)
                        .required(false)
                        .help("Domains to check")
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of domains or URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the batch report as JSON"),
                ),
        )
        .subcommand(
            command!("similar")
                .about("List official domains that look like the given one")
                .arg(arg!(<DOMAIN>).required(true).help("The domain to compare"))
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the result as JSON"),
                ),
        )
        .subcommand(
            command!("validate")
                .about("Score a domain name for suspicious patterns")
                .arg(arg!(<DOMAIN>).required(true).help("The domain to validate"))
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the result as JSON"),
                ),
        )
        .subcommand(
            command!("serve")
                .about("Run the HTTP API")
                .arg(
                    arg!(-b --"bind" <ADDR>)
                        .required(false)
                        .help("Address to listen on (default: [server] bind from the config)"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_batch_rejects_domains_with_hosts_file() {
        let result = command_argument_builder().try_get_matches_from([
            "trawl",
            "batch",
            "bbva.com.ar",
            "-H",
            "domains.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let matches = command_argument_builder()
            .try_get_matches_from(["trawl", "verify", "-u", "example.com", "-c", "/tmp/t.toml"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("config").map(String::as_str),
            Some("/tmp/t.toml")
        );
        let (_, verify) = matches.subcommand().unwrap();
        assert!(!verify.get_flag("full"));
        assert_eq!(
            verify.get_one::<String>("format").map(String::as_str),
            Some("text")
        );
    }
}
