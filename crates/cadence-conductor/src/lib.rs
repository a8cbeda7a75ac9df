pub mod error;
pub mod plan;
pub mod runner;
pub mod state;

pub use error::RunError;
pub use plan::generator::{compute_stats, generate_plan, generate_plan_seeded};
pub use runner::event_log::{Echo, EventLog};
pub use runner::orchestrator::Orchestrator;
pub use runner::retry::RetryPolicy;
pub use state::chain::GitChainState;
pub use state::machine::Cursor;
