use crate::domain::{board::ColumnId, ordering::Positioned};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Server-assigned task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = crate::error::BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| crate::error::BoardError::Other(format!("Invalid task ID: {}", s)))
    }
}

/// Task priority, stored by the server as 0, 1 or 2
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Low,
        }
    }
}

impl From<Priority> for i64 {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// A task card inside a column
///
/// Timestamps are naive because the server emits them without an offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub column_id: Option<ColumnId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    /// Creates a task in the given column at the given position
    pub fn new(id: TaskId, column_id: ColumnId, title: impl Into<String>, position: i64) -> Self {
        Self {
            id,
            column_id: Some(column_id),
            title: title.into(),
            description: None,
            position,
            deadline: None,
            created_at: None,
            updated_at: None,
            priority: Priority::Low,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
    }

    /// An empty description clears the field
    pub fn set_description(&mut self, description: String) {
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
    }

    pub fn set_deadline(&mut self, deadline: Option<NaiveDateTime>) {
        self.deadline = deadline;
    }

    /// Checks whether the deadline has passed at `now`
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.deadline.map(|d| d < now).unwrap_or(false)
    }
}

impl Positioned for Task {
    type Id = TaskId;
    type Container = ColumnId;

    fn id(&self) -> TaskId {
        self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn container(&self) -> Option<ColumnId> {
        self.column_id
    }

    fn set_container(&mut self, container: ColumnId) {
        self.column_id = Some(container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_task_id_parsing() {
        assert_eq!(TaskId::from_str("42").unwrap(), TaskId(42));
        assert!(TaskId::from_str("abc").is_err());
        assert!(TaskId::from_str("").is_err());
    }

    #[test]
    fn test_priority_from_integer() {
        assert_eq!(Priority::from(0), Priority::Low);
        assert_eq!(Priority::from(1), Priority::Medium);
        assert_eq!(Priority::from(2), Priority::High);
        assert_eq!(Priority::from(9), Priority::Low);
        assert_eq!(i64::from(Priority::High), 2);
    }

    #[test]
    fn test_deserialize_server_listing() {
        // The per-column listing omits column_id and timestamps
        let json = r#"{"id": 7, "title": "Write docs", "description": null, "position": 1}"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.id, TaskId(7));
        assert_eq!(task.column_id, None);
        assert_eq!(task.position, 1);
        assert_eq!(task.priority, Priority::Low);
    }

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "id": 7,
            "title": "Write docs",
            "description": "API section",
            "position": 0,
            "column_id": 3,
            "created_at": "2024-01-01T09:30:00",
            "updated_at": "2024-01-02T10:00:00.123456",
            "deadline": null,
            "priority": 2
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.column_id, Some(ColumnId(3)));
        assert_eq!(task.priority, Priority::High);
        assert!(task.created_at.is_some());
        assert!(task.updated_at.is_some());
        assert!(task.deadline.is_none());
    }

    #[test]
    fn test_serialization_skips_missing_dates() {
        let task = Task::new(TaskId(1), ColumnId(1), "Test", 0);
        let json = serde_json::to_string(&task).unwrap();

        assert!(!json.contains("deadline"));
        assert!(!json.contains("created_at"));
        assert!(json.contains(r#""priority":0"#));
    }

    #[test]
    fn test_set_description_blank_clears() {
        let mut task = Task::new(TaskId(1), ColumnId(1), "Test", 0).with_description("old");
        task.set_description("   ".to_string());
        assert!(task.description.is_none());

        task.set_description("new".to_string());
        assert_eq!(task.description.as_deref(), Some("new"));
    }

    #[test]
    fn test_is_overdue() {
        let mut task = Task::new(TaskId(1), ColumnId(1), "Test", 0);
        assert!(!task.is_overdue(at(10)));

        task.set_deadline(Some(at(5)));
        assert!(task.is_overdue(at(10)));
        assert!(!task.is_overdue(at(4)));
    }
}
