//! Plan summary types shared by engine backends.

use serde::{Deserialize, Serialize};

/// Kind of engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Plan,
    Apply,
    Destroy,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunType::Plan => write!(f, "plan"),
            RunType::Apply => write!(f, "apply"),
            RunType::Destroy => write!(f, "destroy"),
        }
    }
}

/// Action planned for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Replace,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Replace => write!(f, "replace"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// A resource change in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    pub resource_type: String,
    pub name: String,
    pub action: ChangeAction,
}

/// Parsed plan summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanSummary {
    pub to_add: Vec<ResourceChange>,
    pub to_change: Vec<ResourceChange>,
    pub to_destroy: Vec<ResourceChange>,
}

impl PlanSummary {
    pub fn record(&mut self, change: ResourceChange) {
        match change.action {
            ChangeAction::Create => self.to_add.push(change),
            ChangeAction::Update => self.to_change.push(change),
            ChangeAction::Delete => self.to_destroy.push(change),
            // A replacement destroys and recreates.
            ChangeAction::Replace => {
                self.to_destroy.push(change.clone());
                self.to_add.push(change);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_change.is_empty() && self.to_destroy.is_empty()
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.to_add.len(),
            self.to_change.len(),
            self.to_destroy.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(action: ChangeAction) -> ResourceChange {
        ResourceChange {
            address: "google_storage_bucket.sbom".to_string(),
            resource_type: "google_storage_bucket".to_string(),
            name: "sbom".to_string(),
            action,
        }
    }

    #[test]
    fn test_replace_counts_both_ways() {
        let mut summary = PlanSummary::default();
        summary.record(change(ChangeAction::Replace));
        summary.record(change(ChangeAction::Update));
        assert_eq!(summary.to_string(), "1 to add, 1 to change, 1 to destroy");
        assert!(!summary.is_empty());
    }
}
