//! Compute API client contract
//!
//! The HTTP client lives outside this crate. Mutating calls only *initiate*
//! an asynchronous operation on the server; callers follow them with
//! [`ComputeApi::wait_for_change`] (or the backup equivalent) to observe
//! completion.

use crate::error::ApiResult;
use crate::model::{BackupClient, Disk, DiskSpeed, NetworkAdapter, Server};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Get a server, or `None` if it no longer exists
    async fn get_server(&self, server_id: &str) -> ApiResult<Option<Server>>;

    /// Gracefully shut a server down
    async fn shutdown_server(&self, server_id: &str) -> ApiResult<()>;

    async fn start_server(&self, server_id: &str) -> ApiResult<()>;

    /// Wait for the server's pending operation to finish, returning its
    /// refreshed state.
    async fn wait_for_change(
        &self,
        server_id: &str,
        action: &str,
        timeout: Duration,
    ) -> ApiResult<Server>;

    /// Add a disk; returns the identifier of the new disk
    async fn add_disk(&self, server_id: &str, disk: &Disk) -> ApiResult<String>;

    async fn expand_disk(
        &self,
        server_id: &str,
        disk_id: &str,
        new_size_gb: u32,
    ) -> ApiResult<()>;

    async fn change_disk_speed(
        &self,
        server_id: &str,
        disk_id: &str,
        speed: DiskSpeed,
    ) -> ApiResult<()>;

    async fn remove_disk(&self, server_id: &str, disk_id: &str) -> ApiResult<()>;

    /// Add a network adapter; returns the identifier of the new adapter
    async fn add_network_adapter(
        &self,
        server_id: &str,
        adapter: &NetworkAdapter,
    ) -> ApiResult<String>;

    async fn change_network_adapter_ipv4(
        &self,
        server_id: &str,
        adapter_id: &str,
        ipv4: &str,
    ) -> ApiResult<()>;

    async fn change_network_adapter_type(
        &self,
        server_id: &str,
        adapter_id: &str,
        adapter_type: &str,
    ) -> ApiResult<()>;

    async fn remove_network_adapter(&self, server_id: &str, adapter_id: &str) -> ApiResult<()>;

    /// One page (numbered from 1) of the server's backup clients
    async fn list_backup_clients(
        &self,
        server_id: &str,
        page: u32,
    ) -> ApiResult<Vec<BackupClient>>;

    /// Add a backup client; returns the identifier of the new client
    async fn add_backup_client(
        &self,
        server_id: &str,
        client: &BackupClient,
    ) -> ApiResult<String>;

    /// Update a client's schedule, storage policy and alerting
    async fn modify_backup_client(
        &self,
        server_id: &str,
        client: &BackupClient,
    ) -> ApiResult<()>;

    /// Cancel any running jobs for a backup client
    async fn cancel_backup_client_jobs(
        &self,
        server_id: &str,
        client_id: &str,
    ) -> ApiResult<()>;

    async fn remove_backup_client(&self, server_id: &str, client_id: &str) -> ApiResult<()>;

    /// Wait until the server's backup service reports normal status
    async fn wait_for_backup_status_normal(
        &self,
        server_id: &str,
        timeout: Duration,
    ) -> ApiResult<()>;
}
