use colored::Colorize;
use sitemapper::commands::command_argument_builder;
use sitemapper::handlers::{
    handle_crawl, handle_generate, handle_init, handle_serve, handle_stats, handle_urls,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_telemetry(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();

    // One-shot commands only surface warnings
    match chosen_command.subcommand_name() {
        Some("serve") => init_telemetry("info,sitemapper=debug"),
        _ => init_telemetry("warn"),
    }

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("serve", primary_command)) => handle_serve(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("generate", primary_command)) => handle_generate(primary_command),
        Some(("stats", primary_command)) => handle_stats(primary_command),
        Some(("urls", primary_command)) => handle_urls(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
