use async_trait::async_trait;
use db::DBService;
use services::services::{
    admin_lists::AdminLists,
    app_state::AppStore,
    list::{ListConfig, ListError},
    notification::NotificationService,
};
use std::sync::Arc;
use thiserror::Error;

pub mod config;

pub use config::ServerConfig;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    List(#[from] ListError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Everything a binary needs to serve the admin dashboard.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new(config: ServerConfig) -> Result<Self, DeploymentError>;

    fn db(&self) -> &DBService;

    fn config(&self) -> &ServerConfig;

    fn notifications(&self) -> &NotificationService;

    fn app_store(&self) -> &AppStore;

    fn list_config(&self) -> &ListConfig {
        &self.config().list
    }

    /// Fresh customer and booking lists wired to this deployment's database.
    fn admin_lists(&self) -> Result<AdminLists, DeploymentError> {
        Ok(AdminLists::new(
            self.db(),
            Arc::new(self.notifications().clone()),
            self.list_config().clone(),
        )?)
    }
}
