pub mod config;
pub mod controller;

pub use config::{Config, ConfigUpdate};
pub use controller::{Controller, SHUTDOWN_BROADCAST, Status};
