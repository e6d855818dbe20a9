//! Server sub-resource reconciliation for Provisync
//!
//! This crate reconciles a server's disks, additional network adapters and
//! backup clients against their configured state, through a [`ComputeApi`]
//! client supplied by the caller.
//!
//! # Features
//!
//! - Disk management (add, expand, change speed, remove)
//! - Additional network adapter management
//! - Backup client management
//! - Server power cycling around changes that require it
//!
//! Every mutating call is retried while the remote reports busy and is
//! initiated under a shared single-flight lock.
//!
//! # Example
//!
//! ```ignore
//! use provisync_cloud::AsyncOperationLock;
//! use provisync_cloud_compute::{Disk, DiskSpeed, Provisioner};
//!
//! let settings = provisync_config::load_settings(None)?;
//! let provisioner = Provisioner::new(api, settings, AsyncOperationLock::new());
//!
//! let mut disks = vec![Disk::new(0, 10, DiskSpeed::Standard)];
//! let report = provisioner.update_disks("server-1", &mut disks).await?;
//! ```

pub mod api;
pub mod backup;
pub mod disks;
pub mod error;
pub mod model;
pub mod network;
pub mod provider;

pub use api::ComputeApi;
pub use disks::{DISK_SCSI_BUS, validate_disks};
pub use error::{ApiError, ApiResult, ComputeError, Result};
pub use model::{
    BackupAlerting, BackupClient, Disk, DiskSpeed, NetworkAdapter, ScsiPath, Server,
    sort_by_type,
};
pub use provider::Provisioner;
