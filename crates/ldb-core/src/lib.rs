pub mod config;
pub mod types;

pub use config::{LdbConfig, LogConfig, RefinerConfig};
pub use types::*;
