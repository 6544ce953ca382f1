//! Explicit startup sequence: load configuration, connect to Postgres,
//! run migrations, seed the default principal, build the orchestrator/
//! broker clients, and assemble a fully constructed [`ScalingController`].
//!
//! Deliberately not a module-level one-shot initializer - every piece of
//! state here is owned by the returned [`Bootstrapped`] value.

use std::sync::Arc;

use crate::audit::AuditStore;
use crate::broker::{BrokerClient, RabbitMqBrokerClient};
use crate::config::{Config, JobCatalog};
use crate::controller::ScalingController;
use crate::db;
use crate::launcher::JobLauncher;
use crate::orchestrator::{KubeOrchestratorClient, OrchestratorClient};
use crate::state::SharedState;
use crate::terminator::JobTerminator;
use crate::users::UserStore;
use crate::Result;

pub struct Bootstrapped {
    pub config: Arc<Config>,
    pub controller: Arc<ScalingController>,
    pub users: Arc<UserStore>,
    pub orchestrator: Arc<dyn OrchestratorClient>,
    pub audit: AuditStore,
    pub state: SharedState,
}

/// Run the full startup sequence.
pub async fn bootstrap() -> Result<Bootstrapped> {
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database).await?;
    db::migrate::auto_migrate(&pool).await?;

    let users = Arc::new(UserStore::new(pool.clone()));
    users.seed_default_admin().await?;

    let catalog = match JobCatalog::load(std::path::Path::new(&config.controller.catalog_path)) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, "failed to load job catalog, starting with an empty one");
            JobCatalog::default()
        }
    };

    let broker: Arc<dyn BrokerClient> = Arc::new(RabbitMqBrokerClient::new(&config.broker));
    let orchestrator: Arc<dyn OrchestratorClient> =
        Arc::new(KubeOrchestratorClient::new(config.controller.namespace.clone()).await?);

    let report_url = format!(
        "http://{}:{}/report",
        config.controller.service_name, config.server.port
    );
    let launcher = JobLauncher::new(
        orchestrator.clone(),
        pool.clone(),
        config.broker.host.clone(),
        report_url,
        config.logs.root.clone(),
    );
    let terminator = JobTerminator::new(orchestrator.clone());
    let audit = AuditStore::new(pool.clone());
    let state = SharedState::new();
    let config = Arc::new(config);

    let controller = Arc::new(ScalingController::new(
        catalog,
        config.controller.max_jobs,
        broker,
        orchestrator.clone(),
        launcher,
        terminator,
        audit.clone(),
        state.clone(),
    ));

    Ok(Bootstrapped {
        config,
        controller,
        users,
        orchestrator,
        audit,
        state,
    })
}
