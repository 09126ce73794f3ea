//! Application context - dependency injection container

use std::sync::Arc;

use cockroach_mcp_domain::AppConfig;
use cockroach_mcp_infra::{
    config, ApiError, ClusterApiClient, SessionStore, TsdbClient, TsdbClientConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Application context - holds the clients and their shared session
pub struct AppContext {
    pub config: AppConfig,
    pub session: Arc<SessionStore>,
    pub cluster_api: ClusterApiClient,
    pub tsdb: TsdbClient,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("cluster_api", &self.cluster_api)
            .field("tsdb", &self.tsdb)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build the context from the environment or a config file
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if no valid configuration is found or a
    /// client cannot be constructed
    pub fn new() -> Result<Self, ApiError> {
        Self::new_with_config(config::load()?)
    }

    /// Build the context from an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if a client cannot be constructed
    pub fn new_with_config(config: AppConfig) -> Result<Self, ApiError> {
        config.validate()?;

        let session = Arc::new(SessionStore::new());
        let cluster_api = ClusterApiClient::new(&config.cluster_api, Arc::clone(&session))?;
        let tsdb = TsdbClient::new(TsdbClientConfig::from_settings(
            &config.tsdb,
            &config.cluster_api.credential,
        ))?;

        info!(
            cluster_api = %config.cluster_api.base_url,
            tsdb = %config.tsdb.url,
            "Application context initialized"
        );

        Ok(Self { config, session, cluster_api, tsdb })
    }

    /// Eager startup login
    ///
    /// # Errors
    ///
    /// The authenticator's error; the binary treats it as fatal
    pub async fn login(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.cluster_api.login(cancel).await
    }
}
