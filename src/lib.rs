pub mod config;
pub mod error;
pub mod db;
pub mod registry;
pub mod lifecycle;
pub mod ingest;
pub mod embeddings;
pub mod cache;
pub mod index;
pub mod generate;
pub mod answer;
pub mod delete;
pub mod router;
pub mod assistant;

pub use assistant::Assistant;
pub use config::Config;
pub use error::{FileragError, Result};
pub use router::{parse_command, Command};
