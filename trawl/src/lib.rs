pub mod handlers;
pub mod server;
pub mod usage;

// Re-export commonly used helpers for convenience
pub use handlers::{
    load_config, load_domains_from_file, load_domains_from_source, parse_domain_line,
    parse_url_line,
};
pub use server::router;
