pub mod audit;
pub mod bootstrap;
pub mod broker;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod launcher;
pub mod model;
pub mod orchestrator;
pub mod resource;
pub mod state;
pub mod terminator;
pub mod users;

pub use bootstrap::{bootstrap, Bootstrapped};
pub use config::{BrokerConfig, Config, ControllerConfig, DatabaseConfig, JobCatalog, LogsConfig, ServerConfig};
pub use error::{Error, Result};
pub use model::{
    JobHistoryEntry, JobPhase, JobTypeSpec, JobTypeState, MessageAuditRecord, MessageStatus,
    MetricsSnapshot, ScalingStatus, WorkerJobRecord,
};
pub use state::SharedState;

/// Current version of the job scaler crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_available() {
        assert!(!VERSION.is_empty());
    }
}
