use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError, ServerConfig};
use services::services::{app_state::AppStore, notification::NotificationService};
use tracing::info;

/// Single-process deployment over a SQLite file.
#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    config: ServerConfig,
    notifications: NotificationService,
    app_store: AppStore,
}

impl LocalDeployment {
    /// Wrap an already-open database; used with in-memory databases.
    pub fn with_db(db: DBService, config: ServerConfig) -> Self {
        Self {
            db,
            config,
            notifications: NotificationService::default(),
            app_store: AppStore::default(),
        }
    }

    pub async fn ephemeral(config: ServerConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new_in_memory().await?;
        info!("Using in-memory database");
        Ok(Self::with_db(db, config))
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new(config: ServerConfig) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Ok(Self::with_db(db, config))
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    fn app_store(&self) -> &AppStore {
        &self.app_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admin_lists_share_deployment_notifications() {
        let deployment = LocalDeployment::ephemeral(ServerConfig::default())
            .await
            .unwrap();
        let lists = deployment.admin_lists().unwrap();

        assert_eq!(lists.customers.name(), "customers");
        assert_eq!(lists.bookings.config().page_size, 25);
        lists.customers.ensure_range(0..10).await.unwrap();
        assert!(lists.customers.view().is_empty());
        assert!(deployment.notifications().recent().await.is_empty());
    }
}
