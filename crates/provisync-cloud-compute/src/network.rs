//! Additional network adapter reconciliation
//!
//! Adapters are keyed by VLAN. The primary adapter is never touched here.

use crate::api::ComputeApi;
use crate::error::{ComputeError, Result};
use crate::model::NetworkAdapter;
use crate::provider::Provisioner;
use provisync_cloud::{
    ApplyReport, CloudError, DeltaKind, Reconcilable, capture_ids, split_by_action,
};
use tracing::{debug, info};

impl<A: ComputeApi> Provisioner<A> {
    /// Bring a server's additional network adapters in line with `desired`.
    ///
    /// Identifiers of added adapters are written back into `desired`.
    pub async fn reconcile_network_adapters(
        &self,
        server_id: &str,
        desired: &mut [NetworkAdapter],
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::new();

        if let Some(adapter) = desired.iter().find(|a| a.primary) {
            return Err(ComputeError::InvalidConfig(format!(
                "network adapter for VLAN '{}' is marked primary; only additional adapters can be configured",
                adapter.vlan_id
            )));
        }

        let server = self.require_server(server_id).await?;
        let mut actual = server.additional_network_adapters();

        let delta = split_by_action(desired, &actual)?;
        if delta.is_empty() {
            debug!("Network adapters for server '{}' are up to date", server_id);
            capture_ids(desired, &actual)?;
            report.finish();
            return Ok(report);
        }
        info!("Server '{}' network adapters: {}", server_id, delta.summary());

        let (add, modify, remove) = delta.into_parts();

        for adapter in &remove {
            let adapter_id = adapter
                .id
                .as_deref()
                .ok_or_else(|| CloudError::MissingIdentifier { key: adapter.key() })?;

            let description = format!(
                "Remove network adapter '{}' (VLAN '{}') from server '{}'",
                adapter_id, adapter.vlan_id, server_id
            );
            let removed = self
                .issue_removal(&description, || {
                    self.api().remove_network_adapter(server_id, adapter_id)
                })
                .await?;
            if removed {
                actual = self
                    .wait_for_adapters(server_id, "Remove network adapter")
                    .await?;
            } else {
                actual.retain(|a| a.vlan_id != adapter.vlan_id);
            }

            info!(
                "Removed network adapter '{}' from server '{}'.",
                adapter_id, server_id
            );
            report.record(
                DeltaKind::Remove,
                adapter.key(),
                Some(adapter_id.to_string()),
                format!("Removed network adapter on VLAN '{}'", adapter.vlan_id),
            );
        }

        for adapter in &modify {
            let current = actual
                .iter()
                .find(|a| a.vlan_id == adapter.vlan_id)
                .cloned()
                .ok_or_else(|| ComputeError::SubResourceNotFound {
                    kind: "Network adapter",
                    key: adapter.key(),
                })?;
            let adapter_id = current
                .id
                .clone()
                .ok_or_else(|| CloudError::MissingIdentifier { key: adapter.key() })?;
            let adapter_id = adapter_id.as_str();

            let new_ipv4 = adapter
                .private_ipv4
                .as_deref()
                .filter(|_| adapter.ipv4_differs(&current));
            if let Some(ipv4) = new_ipv4 {
                let description = format!(
                    "Change IPv4 address of network adapter '{}' on server '{}' to {}",
                    adapter_id, server_id, ipv4
                );
                self.issue(&description, || {
                    self.api()
                        .change_network_adapter_ipv4(server_id, adapter_id, ipv4)
                })
                .await?;
                actual = self.wait_for_adapters(server_id, "Change IPv4 address").await?;

                report.record(
                    DeltaKind::Modify,
                    adapter.key(),
                    Some(adapter_id.to_string()),
                    format!("Changed private IPv4 address to {}", ipv4),
                );
            }

            let new_type = adapter
                .adapter_type
                .as_deref()
                .filter(|_| adapter.type_differs(&current));
            if let Some(adapter_type) = new_type {
                let description = format!(
                    "Change type of network adapter '{}' on server '{}' to {}",
                    adapter_id, server_id, adapter_type
                );
                self.issue(&description, || {
                    self.api()
                        .change_network_adapter_type(server_id, adapter_id, adapter_type)
                })
                .await?;
                actual = self
                    .wait_for_adapters(server_id, "Change network adapter type")
                    .await?;

                report.record(
                    DeltaKind::Modify,
                    adapter.key(),
                    Some(adapter_id.to_string()),
                    format!("Changed adapter type to {}", adapter_type),
                );
            }

            info!(
                "Updated network adapter '{}' on server '{}'.",
                adapter_id, server_id
            );
        }

        for adapter in &add {
            let description = format!(
                "Add network adapter for VLAN '{}' to server '{}'",
                adapter.vlan_id, server_id
            );
            self.issue(&description, || {
                self.api().add_network_adapter(server_id, adapter)
            })
            .await?;
            actual = self.wait_for_adapters(server_id, "Add network adapter").await?;

            let created = desired
                .iter_mut()
                .find(|a| a.vlan_id == adapter.vlan_id)
                .ok_or_else(|| ComputeError::SubResourceNotFound {
                    kind: "Configured network adapter",
                    key: adapter.key(),
                })?;
            capture_ids(std::slice::from_mut(created), &actual)?;

            info!(
                "Added network adapter '{}' on VLAN '{}' to server '{}'.",
                created.id.as_deref().unwrap_or_default(),
                adapter.vlan_id,
                server_id
            );
            report.record(
                DeltaKind::Add,
                adapter.key(),
                created.id.clone(),
                format!("Added network adapter on VLAN '{}'", adapter.vlan_id),
            );
        }

        // Adapters that were only modified keep the identifiers the server reports.
        capture_ids(desired, &actual)?;

        report.finish();
        Ok(report)
    }

    async fn wait_for_adapters(
        &self,
        server_id: &str,
        action: &str,
    ) -> Result<Vec<NetworkAdapter>> {
        let server = self
            .api()
            .wait_for_change(server_id, action, self.settings().server_update_timeout())
            .await?;
        Ok(server.additional_network_adapters())
    }
}
