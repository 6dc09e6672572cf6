// Core utilities: configuration and axis math

pub mod config;
pub mod math;

pub use config::{BotConfig, ConfigError};
