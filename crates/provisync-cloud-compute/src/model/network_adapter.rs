use provisync_cloud::Reconcilable;
use serde::{Deserialize, Serialize};

/// Network adapter attached to a server.
///
/// Additional adapters are identified by the VLAN they connect to. When a
/// configured adapter leaves `private_ipv4` or `adapter_type` unset, the
/// remote system chooses, and that attribute is not compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub vlan_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ipv4: Option<String>,

    /// Adapter type such as `E1000` or `VMXNET3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,

    /// Whether this is the server's primary adapter
    #[serde(default)]
    pub primary: bool,
}

impl NetworkAdapter {
    pub fn new(vlan_id: impl Into<String>) -> Self {
        Self {
            id: None,
            vlan_id: vlan_id.into(),
            private_ipv4: None,
            adapter_type: None,
            primary: false,
        }
    }

    pub fn with_ipv4(mut self, ipv4: impl Into<String>) -> Self {
        self.private_ipv4 = Some(ipv4.into());
        self
    }

    pub fn with_type(mut self, adapter_type: impl Into<String>) -> Self {
        self.adapter_type = Some(adapter_type.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether the configured IPv4 address differs from `actual`'s
    pub fn ipv4_differs(&self, actual: &Self) -> bool {
        self.private_ipv4
            .as_ref()
            .is_some_and(|ipv4| actual.private_ipv4.as_ref() != Some(ipv4))
    }

    /// Whether the configured adapter type differs from `actual`'s
    pub fn type_differs(&self, actual: &Self) -> bool {
        self.adapter_type
            .as_ref()
            .is_some_and(|t| actual.adapter_type.as_ref() != Some(t))
    }
}

impl Reconcilable for NetworkAdapter {
    type Key = String;

    fn key(&self) -> String {
        self.vlan_id.clone()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn differs_from(&self, actual: &Self) -> bool {
        self.ipv4_differs(actual) || self.type_differs(actual)
    }

    fn apply_attributes(&mut self, current: &Self) {
        self.private_ipv4 = current.private_ipv4.clone();
        self.adapter_type = current.adapter_type.clone();
    }
}
