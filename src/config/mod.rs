/// Database configuration and connection management
pub mod database;

/// Shop configuration (time zone, business hours, booking windows) from config.toml
pub mod shop;
