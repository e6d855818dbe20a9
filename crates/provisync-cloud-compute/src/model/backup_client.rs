use provisync_cloud::Reconcilable;
use serde::{Deserialize, Serialize};

/// When backup alerts are sent, and to whom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupAlerting {
    /// `ON_FAILURE`, `ON_SUCCESS` or `ON_SUCCESS_OR_FAILURE`
    pub trigger: String,

    #[serde(default)]
    pub emails: Vec<String>,
}

/// A backup client installed on a server.
///
/// A server has at most one client of each type, so the type is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupClient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Client type such as `FA.Linux`
    pub client_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub schedule_policy: String,

    pub storage_policy: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerting: Option<BackupAlerting>,

    /// Agent download URL reported by the remote system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl BackupClient {
    pub fn new(
        client_type: impl Into<String>,
        schedule_policy: impl Into<String>,
        storage_policy: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            client_type: client_type.into(),
            description: None,
            schedule_policy: schedule_policy.into(),
            storage_policy: storage_policy.into(),
            alerting: None,
            download_url: None,
        }
    }

    pub fn with_alerting(mut self, alerting: BackupAlerting) -> Self {
        self.alerting = Some(alerting);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Reconcilable for BackupClient {
    type Key = String;

    fn key(&self) -> String {
        self.client_type.clone()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn differs_from(&self, actual: &Self) -> bool {
        self.schedule_policy != actual.schedule_policy
            || self.storage_policy != actual.storage_policy
            || self.alerting != actual.alerting
    }

    fn apply_attributes(&mut self, current: &Self) {
        self.schedule_policy = current.schedule_policy.clone();
        self.storage_policy = current.storage_policy.clone();
        self.alerting = current.alerting.clone();
    }
}

/// Sort clients by type so results are stable across reads.
pub fn sort_by_type(clients: &mut [BackupClient]) {
    clients.sort_by(|a, b| a.client_type.cmp(&b.client_type));
}
