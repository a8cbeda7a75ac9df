pub mod event_log;
pub mod files;
pub mod orchestrator;
pub mod retry;
