pub mod auth;
pub mod bracket;
pub mod config;
pub mod db;
pub mod jobs;
pub mod models;
pub mod payments;
pub mod prom_metrics;
pub mod server;
pub mod summary;
pub mod validate;
