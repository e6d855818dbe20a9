//! Backup client reconciliation

use crate::api::ComputeApi;
use crate::error::{ComputeError, Result};
use crate::model::{BackupClient, sort_by_type};
use crate::provider::Provisioner;
use provisync_cloud::{
    ApplyReport, ClassifyError, CloudError, DeltaKind, Reconcilable, capture_ids,
    collect_pages, split_by_action,
};
use tracing::{debug, info};

impl<A: ComputeApi> Provisioner<A> {
    /// Read every backup client on a server, sorted by type.
    pub async fn read_backup_clients(&self, server_id: &str) -> Result<Vec<BackupClient>> {
        let mut clients =
            collect_pages(|page| self.api().list_backup_clients(server_id, page)).await?;
        sort_by_type(&mut clients);
        Ok(clients)
    }

    /// Bring a server's backup clients in line with `desired`.
    ///
    /// Clients are removed, then added, then updated. Running jobs are
    /// cancelled before a client is removed. Identifiers are written back
    /// into `desired`, which ends up sorted by type.
    pub async fn reconcile_backup_clients(
        &self,
        server_id: &str,
        desired: &mut [BackupClient],
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::new();
        let mut actual = self.read_backup_clients(server_id).await?;

        let delta = split_by_action(desired, &actual)?;
        if delta.is_empty() {
            debug!("Backup clients for server '{}' are up to date", server_id);
            capture_ids(desired, &actual)?;
            sort_by_type(desired);
            report.finish();
            return Ok(report);
        }
        info!("Server '{}' backup clients: {}", server_id, delta.summary());

        let (add, modify, remove) = delta.into_parts();

        for client in &remove {
            let client_id = client
                .id
                .as_deref()
                .ok_or_else(|| CloudError::MissingIdentifier { key: client.key() })?;
            let client_type = client.client_type.as_str();

            let description = format!(
                "Remove backup client '{}' ({}) from server '{}'",
                client_id, client_type, server_id
            );
            let api = self.api();
            let removed = self
                .issue_removal(&description, || async move {
                    match api.cancel_backup_client_jobs(server_id, client_id).await {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {
                            debug!("No jobs to cancel for backup client '{}'", client_id);
                        }
                        Err(e) => return Err(e),
                    }
                    api.remove_backup_client(server_id, client_id).await
                })
                .await?;
            if removed {
                actual = self.wait_for_backup_clients(server_id).await?;
            } else {
                actual.retain(|c| c.client_type != client_type);
            }

            info!(
                "Removed backup client '{}' ({}) from server '{}'.",
                client_id, client_type, server_id
            );
            report.record(
                DeltaKind::Remove,
                client.key(),
                Some(client_id.to_string()),
                format!("Removed {} backup client", client_type),
            );
        }

        for client in &add {
            let description = format!(
                "Add {} backup client to server '{}'",
                client.client_type, server_id
            );
            self.issue(&description, || {
                self.api().add_backup_client(server_id, client)
            })
            .await?;
            actual = self.wait_for_backup_clients(server_id).await?;

            let created = desired
                .iter_mut()
                .find(|c| c.client_type == client.client_type)
                .ok_or_else(|| ComputeError::SubResourceNotFound {
                    kind: "Configured backup client",
                    key: client.key(),
                })?;
            capture_ids(std::slice::from_mut(created), &actual)?;

            info!(
                "Added {} backup client '{}' to server '{}'.",
                client.client_type,
                created.id.as_deref().unwrap_or_default(),
                server_id
            );
            report.record(
                DeltaKind::Add,
                client.key(),
                created.id.clone(),
                format!("Added {} backup client", client.client_type),
            );
        }

        for client in &modify {
            let current_id = actual
                .iter()
                .find(|c| c.client_type == client.client_type)
                .and_then(|c| c.id.clone())
                .ok_or_else(|| ComputeError::SubResourceNotFound {
                    kind: "Backup client",
                    key: client.key(),
                })?;
            let update = client.clone().with_id(current_id.clone());

            let description = format!(
                "Modify backup client '{}' ({}) on server '{}'",
                current_id, client.client_type, server_id
            );
            self.issue(&description, || {
                self.api().modify_backup_client(server_id, &update)
            })
            .await?;
            actual = self.wait_for_backup_clients(server_id).await?;

            info!(
                "Modified backup client '{}' ({}) on server '{}'.",
                current_id, client.client_type, server_id
            );
            report.record(
                DeltaKind::Modify,
                client.key(),
                Some(current_id),
                format!(
                    "Updated {} backup client (schedule '{}', storage '{}')",
                    client.client_type, client.schedule_policy, client.storage_policy
                ),
            );
        }

        capture_ids(desired, &actual)?;
        sort_by_type(desired);

        report.finish();
        Ok(report)
    }

    /// Wait for the backup service to settle, then re-read the clients.
    async fn wait_for_backup_clients(&self, server_id: &str) -> Result<Vec<BackupClient>> {
        self.api()
            .wait_for_backup_status_normal(server_id, self.settings().backup_timeout())
            .await?;
        self.read_backup_clients(server_id).await
    }
}
