//! Provisioner: the entry point for reconciling server sub-resources

use crate::api::ComputeApi;
use crate::error::{ApiError, ComputeError, Result};
use crate::model::Server;
use provisync_cloud::{AsyncOperationLock, Attempt, ClassifyError, RetryExecutor};
use provisync_config::ProviderSettings;
use std::future::Future;
use tracing::{debug, info, warn};

/// Reconciles a server's sub-resources through a [`ComputeApi`].
///
/// All mutating calls go through [`RetryExecutor`] and are initiated while
/// holding the shared [`AsyncOperationLock`]; pass clones of the same lock to
/// every provisioner that talks to the same remote account.
pub struct Provisioner<A> {
    api: A,
    executor: RetryExecutor,
    lock: AsyncOperationLock,
    settings: ProviderSettings,
}

impl<A: ComputeApi> Provisioner<A> {
    pub fn new(api: A, settings: ProviderSettings, lock: AsyncOperationLock) -> Self {
        Self {
            api,
            executor: RetryExecutor::new(settings.retry_delay()),
            lock,
            settings,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn lock(&self) -> &AsyncOperationLock {
        &self.lock
    }

    /// Read a server, failing if it no longer exists.
    pub async fn require_server(&self, server_id: &str) -> Result<Server> {
        self.api
            .get_server(server_id)
            .await?
            .ok_or_else(|| ComputeError::ServerNotFound(server_id.to_string()))
    }

    /// Initiate a mutating operation, retrying while the remote reports busy.
    ///
    /// The lock is held only while the call is in flight; completion polling
    /// is the caller's business and happens after release.
    pub(crate) async fn issue<T, F, Fut>(&self, description: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let lock = &self.lock;
        let value = self
            .executor
            .action(description, self.settings.retry_timeout(), |_| {
                let request = call();
                async move {
                    let mut guard = lock.acquire(description).await;
                    let result = request.await;
                    guard.release();
                    Attempt::from_result(result)
                }
            })
            .await?;

        Ok(value)
    }

    /// Like [`issue`](Self::issue) for removals: a target that no longer
    /// exists counts as removed. Returns `false` in that case, meaning there
    /// is no change to wait for.
    pub(crate) async fn issue_removal<F, Fut>(&self, description: &str, mut call: F) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<(), ApiError>>,
    {
        self.issue(description, || {
            let request = call();
            async move {
                match request.await {
                    Ok(()) => Ok(true),
                    Err(e) if e.is_not_found() => {
                        warn!("{} - target not found; treating as already removed", description);
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    /// Shut a server down and wait until it has stopped.
    pub async fn shutdown_server(&self, server_id: &str) -> Result<()> {
        if !self.settings.allow_server_reboot {
            return Err(ComputeError::RebootNotAllowed(server_id.to_string()));
        }

        info!("Shutting down server '{}'...", server_id);
        let description = format!("Shut down server '{}'", server_id);
        self.issue(&description, || self.api.shutdown_server(server_id))
            .await?;
        self.api
            .wait_for_change(
                server_id,
                "Shut down server",
                self.settings.server_shutdown_timeout(),
            )
            .await?;
        info!("Server '{}' has been shut down.", server_id);

        Ok(())
    }

    /// Start a server and wait until it is running.
    pub async fn start_server(&self, server_id: &str) -> Result<()> {
        if !self.settings.allow_server_reboot {
            return Err(ComputeError::RebootNotAllowed(server_id.to_string()));
        }

        info!("Starting server '{}'...", server_id);
        let description = format!("Start server '{}'", server_id);
        self.issue(&description, || self.api.start_server(server_id))
            .await?;
        self.api
            .wait_for_change(
                server_id,
                "Start server",
                self.settings.server_shutdown_timeout(),
            )
            .await?;
        debug!("Server '{}' has been started.", server_id);

        Ok(())
    }
}
