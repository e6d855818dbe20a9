//! Server sub-resource models

mod backup_client;
mod disk;
mod network_adapter;
mod server;

pub use backup_client::*;
pub use disk::*;
pub use network_adapter::*;
pub use server::*;
