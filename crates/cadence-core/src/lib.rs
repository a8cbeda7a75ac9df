pub mod config;
pub mod date;
pub mod synth;
pub mod types;

pub use config::{load_config, parse_config, BranchingStrategy, ConfigError, HostSettings, SimulationConfig};
pub use types::*;
