pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::services::model_process::ModelProcessService;
use crate::services::project_files::ProjectFileService;
use crate::services::proxy::ProxyClient;
use crate::services::storage::FileStore;
use crate::services::workflow::ProjectWorkflow;

pub use routes::create_routes;

/// Shared handler state. Everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub workflow: ProjectWorkflow,
    pub models: ModelProcessService,
    pub proxy: ProxyClient,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> anyhow::Result<Self> {
        let proxy = ProxyClient::new(&config.proxy_url, config.proxy_timeout)?;
        let results = FileStore::new(&config.results_dir);
        let uploads = FileStore::new(&config.uploads_dir);

        let files = ProjectFileService::new(db.clone(), results.clone());
        let workflow = ProjectWorkflow::new(db.clone(), files, proxy.clone());
        let models = ModelProcessService::new(db.clone(), uploads, results, proxy.clone());

        Ok(Self {
            db,
            config: Arc::new(config),
            workflow,
            models,
            proxy,
        })
    }
}

impl FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for ProxyClient {
    fn from_ref(state: &AppState) -> Self {
        state.proxy.clone()
    }
}
