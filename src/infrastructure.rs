//! Infrastructure layer: configuration, logging, HTTP, parsing and storage

pub mod config;
pub mod html_parser;
pub mod http_client;
pub mod logging;
pub mod memory_store;
pub mod parsing_error;
pub mod site_source;
pub mod sqlite_store;

pub use config::{AppConfig, ConfigManager};
pub use html_parser::SiteParser;
pub use http_client::{HttpClient, HttpClientConfig, HttpError};
pub use logging::init_logging;
pub use memory_store::MemoryStore;
pub use parsing_error::{ParsingError, ParsingResult};
pub use site_source::SiteSource;
pub use sqlite_store::SqliteStore;
