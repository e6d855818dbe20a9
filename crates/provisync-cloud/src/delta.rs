//! Delta types produced by reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change needed to bring an actual item in line with configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    /// Create a new item
    Add,
    /// Change mutable attributes of an existing item
    Modify,
    /// Remove an item that is no longer configured
    Remove,
}

impl std::fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaKind::Add => write!(f, "add"),
            DeltaKind::Modify => write!(f, "modify"),
            DeltaKind::Remove => write!(f, "remove"),
        }
    }
}

/// Add/Modify/Remove partitions between a desired and an actual collection.
///
/// `add` and `modify` hold desired items in configuration order; `remove`
/// holds actual items in the order the remote returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<T> {
    pub add: Vec<T>,
    pub modify: Vec<T>,
    pub remove: Vec<T>,
}

impl<T> Default for Delta<T> {
    fn default() -> Self {
        Self {
            add: Vec::new(),
            modify: Vec::new(),
            remove: Vec::new(),
        }
    }
}

impl<T> Delta<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any change is needed
    pub fn has_changes(&self) -> bool {
        !(self.add.is_empty() && self.modify.is_empty() && self.remove.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }

    /// Items of one kind
    pub fn of_kind(&self, kind: DeltaKind) -> &[T] {
        match kind {
            DeltaKind::Add => &self.add,
            DeltaKind::Modify => &self.modify,
            DeltaKind::Remove => &self.remove,
        }
    }

    pub fn summary(&self) -> DeltaSummary {
        DeltaSummary {
            add: self.add.len(),
            modify: self.modify.len(),
            remove: self.remove.len(),
        }
    }

    pub fn into_parts(self) -> (Vec<T>, Vec<T>, Vec<T>) {
        (self.add, self.modify, self.remove)
    }
}

/// Counts of planned changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub add: usize,
    pub modify: usize,
    pub remove: usize,
}

impl std::fmt::Display for DeltaSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to modify, {} to remove",
            self.add, self.modify, self.remove
        )
    }
}

/// A change that was applied to the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub kind: DeltaKind,

    /// Composite key of the item, rendered for display
    pub key: String,

    /// Remote identifier of the item, when known
    pub id: Option<String>,

    pub message: String,
}

/// Record of the changes applied during one reconciliation pass.
///
/// Applied changes are never rolled back; when a later change fails, the
/// changes recorded so far remain in effect on the remote system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub applied: Vec<AppliedChange>,

    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn new() -> Self {
        Self {
            applied: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn record(
        &mut self,
        kind: DeltaKind,
        key: impl Into<String>,
        id: Option<String>,
        message: impl Into<String>,
    ) {
        self.applied.push(AppliedChange {
            kind,
            key: key.into(),
            id,
            message: message.into(),
        });
    }

    pub fn count(&self, kind: DeltaKind) -> usize {
        self.applied.iter().filter(|c| c.kind == kind).count()
    }

    /// Merge another report's changes into this one.
    pub fn extend(&mut self, other: ApplyReport) {
        self.applied.extend(other.applied);
    }

    /// Stamp the elapsed time since `started_at`.
    pub fn finish(&mut self) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self::new()
    }
}
