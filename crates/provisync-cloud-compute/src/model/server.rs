use super::{Disk, NetworkAdapter};
use serde::{Deserialize, Serialize};

/// Server as reported by the compute API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,

    /// Whether the server is powered on
    pub started: bool,

    #[serde(default)]
    pub disks: Vec<Disk>,

    /// All adapters, including the primary one
    #[serde(default)]
    pub network_adapters: Vec<NetworkAdapter>,
}

impl Server {
    /// Adapters other than the primary one
    pub fn additional_network_adapters(&self) -> Vec<NetworkAdapter> {
        self.network_adapters
            .iter()
            .filter(|adapter| !adapter.primary)
            .cloned()
            .collect()
    }
}
