use std::sync::Arc;

use crate::config::{AppConfig, StoreKind};
use crate::db;
use crate::notify::{LogNotifier, ResetNotifier};
use crate::users::{
    memory::InMemoryUserRepository,
    repo::{PgUserRepository, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub notifier: Arc<dyn ResetNotifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users = match config.store {
            StoreKind::Postgres => {
                let pool = db::connect(&config.database_url).await?;
                Arc::new(PgUserRepository::new(pool)) as Arc<dyn UserRepository>
            }
            StoreKind::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(InMemoryUserRepository::new()) as Arc<dyn UserRepository>
            }
        };

        Ok(Self::from_parts(users, Arc::new(LogNotifier), config))
    }

    pub fn from_parts(
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn ResetNotifier>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users,
            notifier,
            config,
        }
    }

    /// Empty in-memory store with the logging notifier.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(LogNotifier),
            Arc::new(config),
        )
    }
}
