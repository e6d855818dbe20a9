//! Disk reconciliation
//!
//! Disks are keyed by SCSI path and may only grow. Size and speed are
//! changed by separate operations. The server is stopped while its disks
//! change (when reboots are allowed) and started again afterwards.

use crate::api::ComputeApi;
use crate::error::{ComputeError, Result};
use crate::model::{Disk, ScsiPath};
use crate::provider::Provisioner;
use provisync_cloud::{
    ApplyReport, CloudError, DeltaKind, Reconcilable, capture_ids, split_by_action,
    split_by_initial_type, validate_unique_keys,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// SCSI bus that server disks must be attached to
pub const DISK_SCSI_BUS: u32 = 0;

/// Check configured disks for duplicate or unsupported SCSI paths.
pub fn validate_disks(disks: &[Disk]) -> Result<()> {
    validate_unique_keys(disks, "disk")?;

    if let Some(disk) = disks.iter().find(|d| d.scsi_bus_number != DISK_SCSI_BUS) {
        return Err(ComputeError::InvalidConfig(format!(
            "disk at SCSI path {} is not on bus {} (only bus {} is supported)",
            disk.scsi_path(),
            DISK_SCSI_BUS,
            DISK_SCSI_BUS
        )));
    }

    Ok(())
}

/// Fail if any modified disk would shrink.
fn ensure_no_shrink(modify: &[Disk], actual: &[Disk]) -> Result<()> {
    for disk in modify {
        let current = actual.iter().find(|d| d.key() == disk.key());
        if let Some(current) = current.filter(|c| disk.size_gb < c.size_gb) {
            return Err(ComputeError::UnsupportedChange(format!(
                "disk at SCSI {} cannot shrink from {} GB to {} GB",
                disk.key(),
                current.size_gb,
                disk.size_gb
            )));
        }
    }

    Ok(())
}

impl<A: ComputeApi> Provisioner<A> {
    /// Apply disk configuration to a freshly deployed server.
    ///
    /// Configured disks that came with the image take on the image disk's
    /// identifier and are resized or re-tiered if needed; the rest are added.
    /// Image disks that are not configured are left alone. An empty
    /// configuration adopts the image disks as-is.
    pub async fn create_disks(
        &self,
        server_id: &str,
        desired: &mut Vec<Disk>,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::new();
        let server = self.require_server(server_id).await?;

        if desired.is_empty() {
            info!(
                "No disks configured for server '{}'; using {} disk(s) from its image.",
                server_id,
                server.disks.len()
            );
            *desired = server.disks;
            report.finish();
            return Ok(report);
        }

        validate_disks(desired)?;

        let (image_disks, additional_disks) = split_by_initial_type(desired, &server.disks);
        debug!(
            "Server '{}' has {} image disk(s) and {} additional disk(s) configured",
            server_id,
            image_disks.len(),
            additional_disks.len()
        );

        let image_keys: HashSet<ScsiPath> = image_disks.iter().map(Disk::key).collect();
        for disk in desired.iter_mut().filter(|d| image_keys.contains(&d.key())) {
            capture_ids(std::slice::from_mut(disk), &server.disks)?;
        }

        let delta = split_by_action(desired, &server.disks)?;
        let (add, modify, _) = delta.into_parts();
        if add.is_empty() && modify.is_empty() {
            report.finish();
            return Ok(report);
        }

        let add_keys: Vec<ScsiPath> = add.iter().map(Disk::key).collect();
        let changes = self
            .apply_disk_changes(
                &server.id,
                server.started,
                desired,
                &[],
                &modify,
                &add_keys,
                server.disks,
            )
            .await?;
        report.extend(changes);

        report.finish();
        Ok(report)
    }

    /// Bring a server's disks in line with `desired`.
    ///
    /// Unconfigured disks are removed, changed disks are expanded or
    /// re-tiered, and missing disks are added, in that order. Identifiers of
    /// added disks are written back into `desired`. An empty configuration
    /// adopts the server's current disks without changing anything.
    pub async fn update_disks(
        &self,
        server_id: &str,
        desired: &mut Vec<Disk>,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::new();
        let server = self.require_server(server_id).await?;

        if desired.is_empty() {
            info!(
                "No disks configured for server '{}'; adopting its {} current disk(s).",
                server_id,
                server.disks.len()
            );
            *desired = server.disks;
            report.finish();
            return Ok(report);
        }

        validate_disks(desired)?;

        let delta = split_by_action(desired, &server.disks)?;
        if delta.is_empty() {
            debug!("Disks for server '{}' are up to date", server_id);
            capture_ids(desired, &server.disks)?;
            report.finish();
            return Ok(report);
        }
        info!("Server '{}' disks: {}", server_id, delta.summary());

        let (add, modify, remove) = delta.into_parts();
        let add_keys: Vec<ScsiPath> = add.iter().map(Disk::key).collect();
        let changes = self
            .apply_disk_changes(
                &server.id,
                server.started,
                desired,
                &remove,
                &modify,
                &add_keys,
                server.disks,
            )
            .await?;
        report.extend(changes);

        // Modified and pre-existing disks keep the identifiers already known.
        capture_ids(desired, &self.require_server(server_id).await?.disks)?;

        report.finish();
        Ok(report)
    }

    /// Stop the server if needed, apply the changes in order and restart it.
    #[allow(clippy::too_many_arguments)]
    async fn apply_disk_changes(
        &self,
        server_id: &str,
        started: bool,
        desired: &mut [Disk],
        remove: &[Disk],
        modify: &[Disk],
        add_keys: &[ScsiPath],
        mut actual: Vec<Disk>,
    ) -> Result<ApplyReport> {
        ensure_no_shrink(modify, &actual)?;

        let mut changes = ApplyReport::new();

        if started {
            self.shutdown_server(server_id).await?;
        }

        self.remove_disks(server_id, remove, &mut actual, &mut changes)
            .await?;
        self.modify_disks(server_id, modify, &mut actual, &mut changes)
            .await?;
        self.add_disks(server_id, desired, add_keys, &mut actual, &mut changes)
            .await?;

        if started {
            self.start_server(server_id).await?;
        }

        changes.finish();
        Ok(changes)
    }

    async fn remove_disks(
        &self,
        server_id: &str,
        remove: &[Disk],
        actual: &mut Vec<Disk>,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for disk in remove {
            let key = disk.key();
            let disk_id = disk.id.as_deref().ok_or_else(|| CloudError::MissingIdentifier {
                key: key.to_string(),
            })?;

            let description = format!(
                "Remove disk '{}' (SCSI {}) from server '{}'",
                disk_id, key, server_id
            );
            let removed = self
                .issue_removal(&description, || self.api().remove_disk(server_id, disk_id))
                .await?;

            if removed {
                let server = self
                    .api()
                    .wait_for_change(
                        server_id,
                        "Remove disk",
                        self.settings().server_update_timeout(),
                    )
                    .await?;
                *actual = server.disks;
            } else {
                actual.retain(|d| d.key() != key);
            }

            info!("Removed disk '{}' (SCSI {}) from server '{}'.", disk_id, key, server_id);
            report.record(
                DeltaKind::Remove,
                key.to_string(),
                Some(disk_id.to_string()),
                format!("Removed disk at SCSI {}", key),
            );
        }

        Ok(())
    }

    async fn modify_disks(
        &self,
        server_id: &str,
        modify: &[Disk],
        actual: &mut Vec<Disk>,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for disk in modify {
            let key = disk.key();
            let current = actual
                .iter()
                .find(|d| d.key() == key)
                .cloned()
                .ok_or_else(|| ComputeError::SubResourceNotFound {
                    kind: "Disk",
                    key: key.to_string(),
                })?;
            let disk_id = current.id.clone().ok_or_else(|| CloudError::MissingIdentifier {
                key: key.to_string(),
            })?;
            let disk_id = disk_id.as_str();

            if disk.size_gb > current.size_gb {
                let description = format!(
                    "Expand disk '{}' (SCSI {}) on server '{}' to {} GB",
                    disk_id, key, server_id, disk.size_gb
                );
                self.issue(&description, || {
                    self.api().expand_disk(server_id, disk_id, disk.size_gb)
                })
                .await?;
                let server = self
                    .api()
                    .wait_for_change(
                        server_id,
                        "Expand disk",
                        self.settings().server_update_timeout(),
                    )
                    .await?;
                *actual = server.disks;

                info!(
                    "Expanded disk '{}' from {} GB to {} GB.",
                    disk_id, current.size_gb, disk.size_gb
                );
                report.record(
                    DeltaKind::Modify,
                    key.to_string(),
                    Some(disk_id.to_string()),
                    format!(
                        "Expanded disk from {} GB to {} GB",
                        current.size_gb, disk.size_gb
                    ),
                );
            }

            if disk.speed != current.speed {
                let description = format!(
                    "Change speed of disk '{}' (SCSI {}) on server '{}' to {}",
                    disk_id, key, server_id, disk.speed
                );
                self.issue(&description, || {
                    self.api().change_disk_speed(server_id, disk_id, disk.speed)
                })
                .await?;
                let server = self
                    .api()
                    .wait_for_change(
                        server_id,
                        "Change disk speed",
                        self.settings().server_update_timeout(),
                    )
                    .await?;
                *actual = server.disks;

                info!(
                    "Changed speed of disk '{}' from {} to {}.",
                    disk_id, current.speed, disk.speed
                );
                report.record(
                    DeltaKind::Modify,
                    key.to_string(),
                    Some(disk_id.to_string()),
                    format!("Changed disk speed from {} to {}", current.speed, disk.speed),
                );
            }
        }

        Ok(())
    }

    async fn add_disks(
        &self,
        server_id: &str,
        desired: &mut [Disk],
        add_keys: &[ScsiPath],
        actual: &mut Vec<Disk>,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for key in add_keys {
            let index = desired
                .iter()
                .position(|d| d.key() == *key)
                .ok_or_else(|| ComputeError::SubResourceNotFound {
                    kind: "Configured disk",
                    key: key.to_string(),
                })?;
            let disk = desired[index].clone();

            let description = format!(
                "Add {} GB disk at SCSI {} to server '{}'",
                disk.size_gb, key, server_id
            );
            let reported_id = self
                .issue(&description, || self.api().add_disk(server_id, &disk))
                .await?;
            let server = self
                .api()
                .wait_for_change(
                    server_id,
                    "Add disk",
                    self.settings().server_update_timeout(),
                )
                .await?;
            *actual = server.disks;

            let created = &mut desired[index];
            capture_ids(std::slice::from_mut(created), actual)?;
            if created.id.as_deref() != Some(reported_id.as_str()) {
                debug!(
                    "Disk at SCSI {} was reported as '{}' but is listed as '{:?}'",
                    key, reported_id, created.id
                );
            }

            info!(
                "Added disk '{}' at SCSI {} to server '{}'.",
                created.id.as_deref().unwrap_or_default(),
                key,
                server_id
            );
            report.record(
                DeltaKind::Add,
                key.to_string(),
                created.id.clone(),
                format!("Added {} GB {} disk", disk.size_gb, disk.speed),
            );
        }

        Ok(())
    }
}
