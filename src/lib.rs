pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod metrics;
pub mod planner;
pub mod rate_limit;
