// Core modules
pub mod api;
pub mod chain;
pub mod codec;
pub mod config;
pub mod db;
pub mod execution;
pub mod models;
pub mod scheduler;

// Re-export commonly used types
pub use config::Config;
pub use models::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
