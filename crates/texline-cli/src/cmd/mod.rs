pub mod crawl;
pub mod show_config;
