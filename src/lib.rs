pub mod browser;
pub mod config;
pub mod error;
pub mod export;
pub mod note;
pub mod scrape;
