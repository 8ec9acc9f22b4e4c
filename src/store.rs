//! Client-side copy of one board.
//!
//! The store is a possibly-stale mirror of the server. Every mutation goes
//! through [`BoardStore::apply`] or one of the drop entry points. Loading
//! keeps the positions the server reported (they may be sparse); any list
//! touched afterwards is rewritten to dense positions and the difference
//! against the previous values is returned for persisting.

use crate::{
    domain::{
        ordering::{self, DragGesture, DropPolicy, MoveDirection, PositionChange},
        BoardId, Column, ColumnId, Task, TaskId,
    },
    error::{BoardError, Result},
};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

pub type TaskChange = PositionChange<TaskId, ColumnId>;
pub type ColumnChange = PositionChange<ColumnId, BoardId>;

/// A position update waiting to be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChange {
    Task(TaskChange),
    Column(ColumnChange),
}

impl fmt::Display for ItemChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(change) => write!(f, "task {} -> {}", change.id, change.position),
            Self::Column(change) => write!(f, "column {} -> {}", change.id, change.position),
        }
    }
}

/// The outcome of an optimistic drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderPlan {
    pub changes: Vec<ItemChange>,
    pub crosses_containers: bool,
}

impl ReorderPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Columns and their tasks as fetched from the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub columns: Vec<Column>,
    pub tasks: HashMap<ColumnId, Vec<Task>>,
}

/// State transitions accepted by [`BoardStore::apply`]
#[derive(Debug, Clone, PartialEq)]
pub enum BoardAction {
    /// Replace everything with a fresh snapshot, keeping server positions
    Loaded(BoardSnapshot),
    /// Rewrite every list to dense positions
    Normalize,
    ColumnAdded(Column),
    ColumnRemoved(ColumnId),
    ColumnRenamed { id: ColumnId, title: String },
    TaskAdded(Task),
    TaskRemoved(TaskId),
    /// Replace a task's details; its column and position are kept
    TaskUpdated(Task),
}

#[derive(Debug, Clone)]
pub struct BoardStore {
    board_id: BoardId,
    columns: Vec<Column>,
    tasks: HashMap<ColumnId, Vec<Task>>,
    revision: u64,
}

impl BoardStore {
    pub fn new(board_id: BoardId) -> Self {
        Self {
            board_id,
            columns: Vec::new(),
            tasks: HashMap::new(),
            revision: 0,
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Number of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.id).collect()
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Tasks of a column in display order; empty for unknown columns
    pub fn tasks(&self, column: ColumnId) -> &[Task] {
        self.tasks.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.values().flatten().find(|t| t.id == id)
    }

    /// The column currently holding a task
    pub fn find_container(&self, id: TaskId) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|c| self.tasks(c.id).iter().any(|t| t.id == id))
            .map(|c| c.id)
    }

    /// Checks that every list holds positions `0..n-1`
    pub fn is_consistent(&self) -> bool {
        ordering::is_dense(&self.columns)
            && self.columns.iter().all(|c| ordering::is_dense(self.tasks(c.id)))
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            columns: self.columns.clone(),
            tasks: self.tasks.clone(),
        }
    }

    /// Applies an action and returns the position changes it produced
    pub fn apply(&mut self, action: BoardAction) -> Result<Vec<ItemChange>> {
        let changes = match action {
            BoardAction::Loaded(snapshot) => {
                self.load(snapshot);
                Vec::new()
            }
            BoardAction::Normalize => self.normalize(),
            BoardAction::ColumnAdded(mut column) => {
                column.board_id = Some(self.board_id);
                self.tasks.entry(column.id).or_default();
                let before = self.columns.clone();
                self.columns.push(column);
                ordering::assign_positions(&mut self.columns);
                column_changes(&before, &self.columns)
            }
            BoardAction::ColumnRemoved(id) => {
                let index = self
                    .columns
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or_else(|| BoardError::ItemNotFound(format!("column {}", id)))?;
                let before = self.columns.clone();
                self.columns.remove(index);
                self.tasks.remove(&id);
                ordering::assign_positions(&mut self.columns);
                column_changes(&before, &self.columns)
            }
            BoardAction::ColumnRenamed { id, title } => {
                let column = self
                    .columns
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| BoardError::ItemNotFound(format!("column {}", id)))?;
                column.title = title;
                Vec::new()
            }
            BoardAction::TaskAdded(task) => {
                let column_id = task
                    .column_id
                    .filter(|id| self.column(*id).is_some())
                    .ok_or_else(|| {
                        BoardError::ItemNotFound(format!("column for task {}", task.id))
                    })?;
                let list = self.tasks.entry(column_id).or_default();
                let before = list.clone();
                list.push(task);
                ordering::assign_positions(list);
                task_changes(&before, list)
            }
            BoardAction::TaskRemoved(id) => {
                let column_id = self
                    .find_container(id)
                    .ok_or_else(|| BoardError::ItemNotFound(format!("task {}", id)))?;
                let list = self.tasks.entry(column_id).or_default();
                let before = list.clone();
                list.retain(|t| t.id != id);
                ordering::assign_positions(list);
                task_changes(&before, list)
            }
            BoardAction::TaskUpdated(task) => {
                let existing = self
                    .tasks
                    .values_mut()
                    .flatten()
                    .find(|t| t.id == task.id)
                    .ok_or_else(|| BoardError::ItemNotFound(format!("task {}", task.id)))?;
                let (column_id, position) = (existing.column_id, existing.position);
                *existing = task;
                existing.column_id = column_id;
                existing.position = position;
                Vec::new()
            }
        };

        self.revision += 1;
        Ok(changes)
    }

    /// Applies a task drop optimistically.
    ///
    /// Returns the changes to persist; an empty plan means nothing moved.
    pub fn drop_task(
        &mut self,
        gesture: &DragGesture<TaskId, ColumnId>,
        policy: DropPolicy,
    ) -> Result<ReorderPlan> {
        let placement = {
            let lists: Vec<(ColumnId, &[Task])> = self
                .columns
                .iter()
                .map(|c| (c.id, self.tasks(c.id)))
                .collect();
            ordering::resolve_drop(&lists, gesture, policy)?
        };

        if placement.is_noop() {
            return Ok(ReorderPlan::default());
        }

        let changes = if placement.crosses_containers() {
            let source = self.tasks(placement.source).to_vec();
            let target = self.tasks(placement.target).to_vec();
            let (new_source, new_target) = ordering::transfer(
                &source,
                &target,
                gesture.item,
                placement.to_index,
                placement.target,
            )?;

            let before: Vec<Task> = source.into_iter().chain(target).collect();
            let after: Vec<Task> = new_source.iter().chain(new_target.iter()).cloned().collect();
            let changes = task_changes(&before, &after);

            self.tasks.insert(placement.source, new_source);
            self.tasks.insert(placement.target, new_target);
            changes
        } else {
            let list = self.tasks(placement.source).to_vec();
            let reordered = ordering::reorder(&list, placement.from_index, placement.to_index)?;
            let changes = task_changes(&list, &reordered);
            self.tasks.insert(placement.source, reordered);
            changes
        };

        self.revision += 1;
        debug!(
            task = %gesture.item,
            from = %placement.source,
            to = %placement.target,
            index = placement.to_index,
            changed = changes.len(),
            "task dropped"
        );

        Ok(ReorderPlan {
            changes,
            crosses_containers: placement.crosses_containers(),
        })
    }

    /// Applies a column drop optimistically
    pub fn drop_column(&mut self, gesture: &DragGesture<ColumnId, BoardId>) -> Result<ReorderPlan> {
        let placement = {
            let lists = [(self.board_id, self.columns.as_slice())];
            ordering::resolve_drop(&lists, gesture, DropPolicy::default())?
        };

        if placement.is_noop() {
            return Ok(ReorderPlan::default());
        }

        let reordered = ordering::reorder(&self.columns, placement.from_index, placement.to_index)?;
        let changes = column_changes(&self.columns, &reordered);
        self.columns = reordered;
        self.revision += 1;
        debug!(column = %gesture.item, index = placement.to_index, "column dropped");

        Ok(ReorderPlan {
            changes,
            crosses_containers: false,
        })
    }

    /// The column a task would land in after one step, if any
    pub fn step_target(&self, task: TaskId, direction: MoveDirection) -> Result<Option<ColumnId>> {
        let current = self
            .find_container(task)
            .ok_or_else(|| BoardError::ItemNotFound(format!("task {}", task)))?;
        Ok(ordering::step_target(&self.column_ids(), current, direction))
    }

    pub fn can_step(&self, task: TaskId, direction: MoveDirection) -> bool {
        matches!(self.step_target(task, direction), Ok(Some(_)))
    }

    fn load(&mut self, snapshot: BoardSnapshot) {
        let BoardSnapshot {
            mut columns,
            mut tasks,
        } = snapshot;

        for column in columns.iter_mut() {
            column.board_id = Some(self.board_id);
        }
        ordering::sort_by_position(&mut columns);

        let mut by_column = HashMap::with_capacity(columns.len());
        for column in &columns {
            let mut list = tasks.remove(&column.id).unwrap_or_default();
            for task in list.iter_mut() {
                task.column_id = Some(column.id);
            }
            ordering::sort_by_position(&mut list);
            by_column.insert(column.id, list);
        }

        debug!(board = %self.board_id, columns = columns.len(), "board loaded");
        self.columns = columns;
        self.tasks = by_column;
    }

    fn normalize(&mut self) -> Vec<ItemChange> {
        let before = self.columns.clone();
        ordering::assign_positions(&mut self.columns);
        let mut changes = column_changes(&before, &self.columns);

        for list in self.tasks.values_mut() {
            let before = list.clone();
            ordering::assign_positions(list);
            changes.extend(task_changes(&before, list));
        }
        changes
    }
}

fn task_changes(before: &[Task], after: &[Task]) -> Vec<ItemChange> {
    ordering::position_changes(before, after)
        .into_iter()
        .map(ItemChange::Task)
        .collect()
}

fn column_changes(before: &[Column], after: &[Column]) -> Vec<ItemChange> {
    ordering::position_changes(before, after)
        .into_iter()
        .map(ItemChange::Column)
        .collect()
}
