pub mod health;
pub mod metrics;
pub mod models;
pub mod predict;
pub mod tuning;
