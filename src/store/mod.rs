use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{AnalysisReport, PropertyInput, PropertyRecord};

pub mod memory;
pub mod postgres;

/// Owner id stamped on records when no database is configured.
pub const LOCAL_USER_ID: &str = "local-user-123";

#[async_trait::async_trait]
pub trait PropertyStore: Send + Sync {
    /// Persists a finalized (input, report) pair and returns the record.
    async fn save(
        &self,
        input: &PropertyInput,
        report: &AnalysisReport,
    ) -> Result<PropertyRecord, AppError>;

    /// All records reachable in the current backend/user context.
    async fn list(&self) -> Result<Vec<PropertyRecord>, AppError>;
}

/// Capability-checked backend selection: database credentials present means
/// Postgres, otherwise the in-memory session store. Decided once at startup.
pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn PropertyStore>> {
    match &config.database_url {
        Some(url) => {
            let store = postgres::PostgresStore::connect(url, &config.app_user_id).await?;
            tracing::info!(user_id = %config.app_user_id, "using Postgres record store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory session store");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
    }
}
