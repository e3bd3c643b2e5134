use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;

use content_store::ContentStore;

use crate::database::Database;

#[async_trait]
pub trait DataSource {
    /// Perform various checks on the system to ensure its healthy and ready to accept requests.
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("{0} is not available")]
    DependencyFailure(&'static str),

    #[error("service has received signal indicating it should shutdown")]
    ShuttingDown,
}

pub type DynDataSource = Arc<dyn DataSource + Send + Sync>;

pub struct StateDataSource(DynDataSource);

impl Debug for StateDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDataSource").finish()
    }
}

impl StateDataSource {
    pub fn new(dds: DynDataSource) -> Self {
        Self(dds)
    }
}

impl Deref for StateDataSource {
    type Target = DynDataSource;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Key that is never written; probing it only exercises the backend.
const CONTENT_PROBE_KEY: &str = "readiness-probe";

/// The two backends every request depends on.
struct BackendSource {
    db: Database,
    content: ContentStore,
}

#[async_trait]
impl DataSource for BackendSource {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        self.db.ping().await.map_err(|e| {
            tracing::warn!(error = %e, "database not ready");
            DataSourceError::DependencyFailure("database")
        })?;

        self.content
            .exists(CONTENT_PROBE_KEY)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "content store not ready");
                DataSourceError::DependencyFailure("content store")
            })?;
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StateDataSource
where
    Database: FromRef<S>,
    ContentStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ();

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(StateDataSource(Arc::new(BackendSource {
            db: Database::from_ref(state),
            content: ContentStore::from_ref(state),
        })))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone)]
    pub(crate) enum MockReadiness {
        DependencyFailure,
        Ready,
        ShuttingDown,
    }

    #[async_trait]
    impl DataSource for MockReadiness {
        async fn is_ready(&self) -> Result<(), DataSourceError> {
            use MockReadiness::*;

            match self {
                DependencyFailure => Err(DataSourceError::DependencyFailure("mock")),
                Ready => Ok(()),
                ShuttingDown => Err(DataSourceError::ShuttingDown),
            }
        }
    }

    #[tokio::test]
    async fn test_backends_ready() {
        let source = BackendSource {
            db: Database::in_memory().await.unwrap(),
            content: ContentStore::memory(),
        };
        source.is_ready().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_db_is_dependency_failure() {
        let db = Database::in_memory().await.unwrap();
        db.close().await;
        let source = BackendSource {
            db,
            content: ContentStore::memory(),
        };
        assert!(matches!(
            source.is_ready().await,
            Err(DataSourceError::DependencyFailure("database"))
        ));
    }
}
