use std::sync::Arc;

use jobscaler_core::audit::AuditStore;
use jobscaler_core::orchestrator::OrchestratorClient;
use jobscaler_core::users::UserStore;
use jobscaler_core::{Config, SharedState};

#[derive(Clone)]
pub struct AppState {
    pub state: SharedState,
    pub audit: AuditStore,
    pub users: Arc<UserStore>,
    pub orchestrator: Arc<dyn OrchestratorClient>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        state: SharedState,
        audit: AuditStore,
        users: Arc<UserStore>,
        orchestrator: Arc<dyn OrchestratorClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            state,
            audit,
            users,
            orchestrator,
            config,
        }
    }
}
