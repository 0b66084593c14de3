use crate::CLAP_STYLING;
use clap::{arg, command};
use std::net::IpAddr;
use std::path::PathBuf;

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Path to the sitemapper database (file or directory)")
        .env("SITEMAPPER_DB")
}

fn domain_arg() -> clap::Arg {
    arg!(-d --"domain" <DOMAIN>)
        .required(true)
        .help("Domain to operate on, e.g. example.com")
}

fn max_urls_arg() -> clap::Arg {
    arg!(--"max-urls" <NUM>)
        .required(false)
        .help("Maximum number of distinct URLs visited per crawl")
        .value_parser(clap::builder::RangedU64ValueParser::<usize>::new().range(1..))
        .default_value("50000")
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitemapper")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitemapper")
        .about("Crawl a site, track its pages and serve its XML sitemap")
        .styles(CLAP_STYLING)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("init")
                .about("Initializes the sitemapper database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the sitemapper database")
                        .default_value("~/.config/sitemapper/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("serve")
                .about("Run the sitemap HTTP API with the weekly re-crawl schedule")
                .arg(
                    arg!(--"host" <ADDR>)
                        .required(false)
                        .help("Address to bind")
                        .value_parser(clap::value_parser!(IpAddr))
                        .env("SITEMAPPER_HOST")
                        .default_value("0.0.0.0"),
                )
                .arg(
                    arg!(-p --"port" <PORT>)
                        .required(false)
                        .help("Port to listen on")
                        .value_parser(clap::value_parser!(u16))
                        .env("PORT")
                        .default_value("3000"),
                )
                .arg(db_arg())
                .arg(
                    arg!(--"no-schedule")
                        .required(false)
                        .help("Disable the weekly re-crawl of known domains")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(max_urls_arg()),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl a domain or a list of domains and store every page found")
                .arg(
                    arg!(-d --"domain" <DOMAIN>)
                        .required(false)
                        .help("The domain or URL to crawl")
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of domains to crawl")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("domain"),
                )
                .group(
                    clap::ArgGroup::new("source")
                        .args(["domain", "hosts-file"])
                        .required(true),
                )
                .arg(max_urls_arg())
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(db_arg()),
        )
        .subcommand(
            command!("generate")
                .about("Generate the XML sitemap for a crawled domain")
                .arg(domain_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the sitemap to this file (default: stdout)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"gzip")
                        .required(false)
                        .help("Gzip the sitemap")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(db_arg()),
        )
        .subcommand(
            command!("stats")
                .about("Show URL counts for a crawled domain")
                .arg(domain_arg())
                .arg(db_arg()),
        )
        .subcommand(
            command!("urls")
                .about("List stored URLs for a domain")
                .arg(domain_arg())
                .arg(
                    arg!(-s --"status" <CODE>)
                        .required(false)
                        .help("Only list URLs with this HTTP status")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    arg!(--"page" <PAGE>)
                        .required(false)
                        .help("Page number, starting at 1")
                        .value_parser(clap::value_parser!(u32).range(1..))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"limit" <LIMIT>)
                        .required(false)
                        .help("URLs per page (1-1000)")
                        .value_parser(clap::value_parser!(u32).range(1..=1000))
                        .default_value("50"),
                )
                .arg(db_arg()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_crawl_requires_a_source() {
        let result = command_argument_builder().try_get_matches_from(["sitemapper", "crawl"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_crawl_source_is_exclusive() {
        let result = command_argument_builder().try_get_matches_from([
            "sitemapper",
            "crawl",
            "-d",
            "example.com",
            "-H",
            "hosts.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_urls_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["sitemapper", "urls", "-d", "example.com"])
            .unwrap();
        let (_, urls) = matches.subcommand().unwrap();
        assert_eq!(urls.get_one::<u32>("page"), Some(&1));
        assert_eq!(urls.get_one::<u32>("limit"), Some(&50));
        assert!(urls.get_one::<u16>("status").is_none());
    }

    #[test]
    fn test_urls_limit_is_capped() {
        let result = command_argument_builder().try_get_matches_from([
            "sitemapper",
            "urls",
            "-d",
            "example.com",
            "--limit",
            "5000",
        ]);
        assert!(result.is_err());
    }
}
