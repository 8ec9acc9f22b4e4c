use crate::domain::ordering::Positioned;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Server-assigned board identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub i64);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BoardId {
    type Err = crate::error::BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| crate::error::BoardError::Other(format!("Invalid board ID: {}", s)))
    }
}

/// Server-assigned column identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(pub i64);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ColumnId {
    type Err = crate::error::BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| crate::error::BoardError::Other(format!("Invalid column ID: {}", s)))
    }
}

/// A board owned by the logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
}

impl Board {
    pub fn new(id: BoardId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// A kanban board column
///
/// `position` is zero-based and dense within the board once normalized.
/// The server listing endpoint omits `board_id`, so it is filled in by the
/// client when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    #[serde(default)]
    pub board_id: Option<BoardId>,
    pub title: String,
    #[serde(default)]
    pub position: i64,
}

impl Column {
    pub fn new(id: ColumnId, board_id: BoardId, title: impl Into<String>, position: i64) -> Self {
        Self {
            id,
            board_id: Some(board_id),
            title: title.into(),
            position,
        }
    }
}

impl Positioned for Column {
    type Id = ColumnId;
    type Container = BoardId;

    fn id(&self) -> ColumnId {
        self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn container(&self) -> Option<BoardId> {
        self.board_id
    }

    fn set_container(&mut self, container: BoardId) {
        self.board_id = Some(container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_deserialize_without_board_id() {
        let json = r#"{"id": 4, "title": "Doing", "position": 2}"#;
        let column: Column = serde_json::from_str(json).unwrap();

        assert_eq!(column.id, ColumnId(4));
        assert_eq!(column.board_id, None);
        assert_eq!(column.position, 2);
    }

    #[test]
    fn test_ids_parse_and_display() {
        let id = ColumnId::from_str(" 17 ").unwrap();
        assert_eq!(id, ColumnId(17));
        assert_eq!(id.to_string(), "17");

        assert!(BoardId::from_str("abc").is_err());
    }

    #[test]
    fn test_board_serializes_flat_ids() {
        let board = Board::new(BoardId(3), "Sprint");
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"{"id":3,"title":"Sprint"}"#);
    }
}
