//! Reconciling optimistic local state with the server.

use crate::domain::DropPolicy;
use serde::{Deserialize, Serialize};

pub mod board_sync;
pub mod persist;

pub use board_sync::{BoardSync, DropOutcome};
pub use persist::{fetch_snapshot, persist, PersistReport};

/// When to refetch after a reorder has been persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefetchPolicy {
    /// After every reorder
    Always,
    /// After reorders that move an item between containers; same-container
    /// reorders trust local state and resync in the background only when a
    /// persist call failed
    #[default]
    CrossContainer,
    /// Never; local state is trusted even after failures
    Never,
}

/// How a settled reorder gets back in step with the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    None,
    /// Refetch before the operation returns
    Immediate,
    /// Refetch without waiting; the snapshot is applied later
    Background,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    pub refetch: RefetchPolicy,
    pub drop: DropPolicy,
}

impl SyncPolicy {
    pub fn resync_for(&self, crosses_containers: bool, report: &PersistReport) -> Resync {
        match self.refetch {
            RefetchPolicy::Always => Resync::Immediate,
            RefetchPolicy::CrossContainer if crosses_containers => Resync::Immediate,
            RefetchPolicy::CrossContainer if !report.is_complete() => Resync::Background,
            RefetchPolicy::CrossContainer | RefetchPolicy::Never => Resync::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{PositionChange, TaskId},
        error::BoardError,
        store::ItemChange,
    };

    fn failed_report() -> PersistReport {
        let change = ItemChange::Task(PositionChange {
            id: TaskId(1),
            position: 0,
            container: None,
        });
        PersistReport {
            attempted: 2,
            failures: vec![(change, BoardError::Other("boom".to_string()))],
        }
    }

    #[test]
    fn test_resync_decisions() {
        let ok = PersistReport::default();
        let failed = failed_report();
        let policy = SyncPolicy::default();

        assert_eq!(policy.resync_for(true, &ok), Resync::Immediate);
        assert_eq!(policy.resync_for(false, &ok), Resync::None);
        assert_eq!(policy.resync_for(false, &failed), Resync::Background);

        let always = SyncPolicy {
            refetch: RefetchPolicy::Always,
            ..Default::default()
        };
        assert_eq!(always.resync_for(false, &ok), Resync::Immediate);

        let never = SyncPolicy {
            refetch: RefetchPolicy::Never,
            ..Default::default()
        };
        assert_eq!(never.resync_for(true, &failed), Resync::None);
    }
}
