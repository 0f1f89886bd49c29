pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod migration;
pub mod models;
pub mod mqtt;
pub mod repositories;

pub use config::Config;
pub use error::AppError;
