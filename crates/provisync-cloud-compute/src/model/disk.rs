use provisync_cloud::Reconcilable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Disk performance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DiskSpeed {
    #[serde(rename = "ECONOMY")]
    Economy,
    #[default]
    #[serde(rename = "STANDARD")]
    Standard,
    #[serde(rename = "HIGHPERFORMANCE")]
    HighPerformance,
}

impl DiskSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskSpeed::Economy => "ECONOMY",
            DiskSpeed::Standard => "STANDARD",
            DiskSpeed::HighPerformance => "HIGHPERFORMANCE",
        }
    }
}

impl fmt::Display for DiskSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskSpeed {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ECONOMY" => Ok(DiskSpeed::Economy),
            "STANDARD" => Ok(DiskSpeed::Standard),
            "HIGHPERFORMANCE" => Ok(DiskSpeed::HighPerformance),
            other => Err(format!(
                "invalid disk speed '{}' (expected ECONOMY, STANDARD or HIGHPERFORMANCE)",
                other
            )),
        }
    }
}

/// SCSI bus and unit a disk is attached at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScsiPath {
    pub bus_number: u32,
    pub unit_id: u32,
}

impl fmt::Display for ScsiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bus_number, self.unit_id)
    }
}

/// A disk attached to a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub scsi_bus_number: u32,

    pub scsi_unit_id: u32,

    pub size_gb: u32,

    #[serde(default)]
    pub speed: DiskSpeed,
}

impl Disk {
    pub fn new(scsi_unit_id: u32, size_gb: u32, speed: DiskSpeed) -> Self {
        Self {
            id: None,
            scsi_bus_number: 0,
            scsi_unit_id,
            size_gb,
            speed,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn scsi_path(&self) -> ScsiPath {
        ScsiPath {
            bus_number: self.scsi_bus_number,
            unit_id: self.scsi_unit_id,
        }
    }
}

impl Reconcilable for Disk {
    type Key = ScsiPath;

    fn key(&self) -> ScsiPath {
        self.scsi_path()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn differs_from(&self, actual: &Self) -> bool {
        self.size_gb != actual.size_gb || self.speed != actual.speed
    }

    fn apply_attributes(&mut self, current: &Self) {
        self.size_gb = current.size_gb;
        self.speed = current.speed;
    }
}
