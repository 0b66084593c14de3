pub mod commands;
pub mod handlers;
pub mod server;

// Re-export commonly used helpers for convenience
pub use handlers::{
    load_domains_from_file, load_domains_from_source, parse_domain_line, resolve_db_path,
};
pub use server::{ApiError, AppState, router};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
