pub mod barista;
pub mod config;
pub mod strategy;
pub mod telemetry;
