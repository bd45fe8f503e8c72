//! Client wiring
//!
//! [`MedoolClient`] builds the whole stack from a [`ClientConfig`]:
//! durable store, credential store, refresh coordinator, request gateway,
//! upload pipeline and session controller, all sharing one logout signal.

use std::sync::Arc;
use std::time::Duration;

use medool_common::auth::{
    CredentialStore, DurableStore, FileStore, Fingerprint, KeyringStore, LogoutSignal, MemoryStore,
    Obfuscator, RefreshCoordinator,
};
use medool_common::resilience::RetryError;
use medool_core::{SessionController, SessionError, SessionPhase};
use medool_domain::{ClientConfig, MedoolError, Result, StorageBackend};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::api::{ApiClient, EndpointPolicy, HttpAuthApi, HttpTokenExchange};
use crate::http::HttpClient;
use crate::upload::UploadPipeline;

/// Fully wired Medool client
pub struct MedoolClient {
    config: ClientConfig,
    credentials: Arc<CredentialStore>,
    refresher: RefreshCoordinator,
    api: Arc<ApiClient>,
    uploads: UploadPipeline,
    session: Arc<SessionController>,
    logout: LogoutSignal,
}

impl std::fmt::Debug for MedoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedoolClient")
            .field("base_url", &self.config.api.base_url)
            .field("phase", &self.session.phase())
            .finish_non_exhaustive()
    }
}

impl MedoolClient {
    /// Build a client with the storage backend named in `config`.
    ///
    /// # Errors
    /// Returns `MedoolError::Config` when the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig, fingerprint: Fingerprint) -> Result<Self> {
        let durable = durable_store(&config.session.storage);
        Self::with_store(config, fingerprint, durable)
    }

    /// Build a client on an explicit durable store.
    ///
    /// # Errors
    /// See [`Self::from_config`].
    pub fn with_store(
        config: ClientConfig,
        fingerprint: Fingerprint,
        durable: Arc<dyn DurableStore>,
    ) -> Result<Self> {
        config.validate()?;

        let credentials = Arc::new(
            CredentialStore::new(durable, Obfuscator::new(&fingerprint))
                .with_expiry_margin(Duration::from_secs(config.session.expiry_margin_secs)),
        );

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(config.api.user_agent.clone())
            .build()?;

        let exchange = Arc::new(HttpTokenExchange::new(http.clone(), &config.api.base_url));
        let refresher = RefreshCoordinator::new(Arc::clone(&credentials), exchange);
        let logout = LogoutSignal::new();

        let api = Arc::new(ApiClient::new(
            http,
            &config.api.base_url,
            EndpointPolicy::new(config.api.public_endpoints.iter()),
            Arc::new(refresher.clone()),
            logout.clone(),
        ));

        let uploads =
            UploadPipeline::new(Arc::clone(&api), &config.upload).map_err(retry_config_error)?;

        let session = Arc::new(SessionController::new(
            Arc::new(HttpAuthApi::new(Arc::clone(&api))),
            refresher.clone(),
        ));

        Ok(Self { config, credentials, refresher, api, uploads, session, logout })
    }

    /// Start listening for forced logouts and settle the startup session.
    ///
    /// Must be called from within a Tokio runtime. The returned handle
    /// belongs to the logout listener; it ends when the client is dropped.
    ///
    /// # Errors
    /// Propagates a failed bootstrap from the session controller.
    #[instrument(skip_all)]
    pub async fn start(&self) -> std::result::Result<(SessionPhase, JoinHandle<()>), SessionError> {
        let listener = self.session.spawn_logout_listener(&self.logout);
        let phase = self.session.bootstrap().await?;
        info!(?phase, "client started");
        Ok((phase, listener))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.uploads
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn logout_signal(&self) -> &LogoutSignal {
        &self.logout
    }
}

fn durable_store(backend: &StorageBackend) -> Arc<dyn DurableStore> {
    match backend {
        StorageBackend::File { path } => Arc::new(FileStore::new(path.clone())),
        StorageBackend::Keychain { service } => Arc::new(KeyringStore::new(service.clone())),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

fn retry_config_error(err: RetryError<()>) -> MedoolError {
    match err {
        RetryError::InvalidConfiguration { message } => {
            MedoolError::Config(format!("upload retry settings: {message}"))
        }
        other => MedoolError::Config(format!("upload retry settings: {other:?}")),
    }
}
