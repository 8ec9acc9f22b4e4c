//! Drag-and-drop ordering for positioned lists.
//!
//! Tasks within a column and columns within a board share one model: an
//! ordered list whose `position` fields must be exactly `0..n-1`. The
//! functions here are pure. They take the current lists, return the new
//! ones with positions rewritten, and leave persistence to the caller.

use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// An entity with a position inside a container
pub trait Positioned {
    type Id: Copy + Eq + Hash + Ord + fmt::Display + fmt::Debug;
    type Container: Copy + Eq + Hash + fmt::Display + fmt::Debug;

    fn id(&self) -> Self::Id;
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
    fn container(&self) -> Option<Self::Container>;
    fn set_container(&mut self, container: Self::Container);
}

/// A position (and possibly container) that differs from what was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange<I, C> {
    pub id: I,
    pub position: i64,
    /// Set only when the item moved to another container
    pub container: Option<C>,
}

/// Where a cross-container drop over an item lands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    #[default]
    InsertBefore,
    InsertAfter,
}

/// What the pointer was over when the drag ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget<I, C> {
    /// Empty space inside a container
    Container(C),
    /// Another item
    Item(I),
}

/// A finished drag as reported by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragGesture<I, C> {
    pub item: I,
    pub over: Option<DropTarget<I, C>>,
}

impl<I, C> DragGesture<I, C> {
    pub fn onto_item(item: I, over: I) -> Self {
        Self {
            item,
            over: Some(DropTarget::Item(over)),
        }
    }

    pub fn onto_container(item: I, container: C) -> Self {
        Self {
            item,
            over: Some(DropTarget::Container(container)),
        }
    }

    /// Dropped outside every container
    pub fn nowhere(item: I) -> Self {
        Self { item, over: None }
    }
}

/// A drag gesture resolved to concrete list coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement<C> {
    pub source: C,
    pub from_index: usize,
    pub target: C,
    pub to_index: usize,
}

impl<C: PartialEq> Placement<C> {
    pub fn crosses_containers(&self) -> bool {
        self.source != self.target
    }

    pub fn is_noop(&self) -> bool {
        !self.crosses_containers() && self.from_index == self.to_index
    }
}

/// One step left or right across the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Left,
    Right,
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Sorts by stored position, ties broken by id
pub fn sort_by_position<T: Positioned>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

/// Rewrites every position to its index
pub fn assign_positions<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as i64);
    }
}

/// Sorts by stored position and then makes the positions dense
pub fn normalize<T: Positioned>(items: &mut [T]) {
    sort_by_position(items);
    assign_positions(items);
}

/// Checks the `{0, 1, ..., n-1}` invariant in list order
pub fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index as i64)
}

/// Moves the item at `from` to `to`, shifting the items in between.
///
/// Both indexes must lie inside the list. The returned list has dense
/// positions.
///
/// # Examples
/// ```
/// use taskboard_client::domain::ordering::reorder;
/// use taskboard_client::domain::{ColumnId, Task, TaskId};
///
/// let tasks = vec![
///     Task::new(TaskId(10), ColumnId(1), "a", 0),
///     Task::new(TaskId(11), ColumnId(1), "b", 1),
///     Task::new(TaskId(12), ColumnId(1), "c", 2),
/// ];
///
/// let moved = reorder(&tasks, 2, 0).unwrap();
/// let ids: Vec<i64> = moved.iter().map(|t| t.id.0).collect();
/// assert_eq!(ids, vec![12, 10, 11]);
/// ```
pub fn reorder<T: Positioned + Clone>(items: &[T], from: usize, to: usize) -> Result<Vec<T>> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(BoardError::IndexOutOfRange { index, len });
        }
    }

    let mut result = items.to_vec();
    let moved = result.remove(from);
    result.insert(to, moved);
    assign_positions(&mut result);
    Ok(result)
}

/// Moves an item from `source` into `target` at `target_index`.
///
/// The index is clamped to `[0, target.len()]`. The moved item takes
/// `target_container` as its container and both lists come back dense.
pub fn transfer<T: Positioned + Clone>(
    source: &[T],
    target: &[T],
    item_id: T::Id,
    target_index: usize,
    target_container: T::Container,
) -> Result<(Vec<T>, Vec<T>)> {
    let from = source
        .iter()
        .position(|item| item.id() == item_id)
        .ok_or_else(|| BoardError::ItemNotFound(item_id.to_string()))?;

    let mut new_source = source.to_vec();
    let mut moved = new_source.remove(from);
    moved.set_container(target_container);

    let mut new_target = target.to_vec();
    let index = target_index.min(new_target.len());
    new_target.insert(index, moved);

    assign_positions(&mut new_source);
    assign_positions(&mut new_target);
    Ok((new_source, new_target))
}

/// Lists the items of `after` whose position or container differs from
/// their entry in `before`.
///
/// Items absent from `before` are reported with their container. An
/// unchanged ordering yields no changes.
pub fn position_changes<T: Positioned>(
    before: &[T],
    after: &[T],
) -> Vec<PositionChange<T::Id, T::Container>> {
    let previous: HashMap<T::Id, (i64, Option<T::Container>)> = before
        .iter()
        .map(|item| (item.id(), (item.position(), item.container())))
        .collect();

    after
        .iter()
        .filter_map(|item| {
            let moved_container = match previous.get(&item.id()) {
                Some(&(position, container)) => {
                    let moved = container != item.container();
                    if !moved && position == item.position() {
                        return None;
                    }
                    moved
                }
                None => true,
            };

            Some(PositionChange {
                id: item.id(),
                position: item.position(),
                container: if moved_container {
                    item.container()
                } else {
                    None
                },
            })
        })
        .collect()
}

/// Resolves a drag gesture against the current lists.
///
/// `lists` holds every container that can receive a drop, in display order.
/// Dropping on empty space appends to that container. Dropping on an item
/// in the same container takes that item's index; dropping on an item in
/// another container inserts before or after it according to `policy`.
pub fn resolve_drop<T: Positioned>(
    lists: &[(T::Container, &[T])],
    gesture: &DragGesture<T::Id, T::Container>,
    policy: DropPolicy,
) -> Result<Placement<T::Container>> {
    let (source, from_index) = locate(lists, gesture.item)
        .ok_or_else(|| BoardError::ItemNotFound(gesture.item.to_string()))?;

    let over = gesture
        .over
        .ok_or_else(|| BoardError::DropTargetNotFound(gesture.item.to_string()))?;

    let (target, to_index) = match over {
        DropTarget::Container(container) => {
            let (_, items) = lists
                .iter()
                .find(|(id, _)| *id == container)
                .ok_or_else(|| BoardError::DropTargetNotFound(container.to_string()))?;
            if container == source {
                (container, items.len().saturating_sub(1))
            } else {
                (container, items.len())
            }
        }
        DropTarget::Item(over_id) => {
            let (container, index) = locate(lists, over_id)
                .ok_or_else(|| BoardError::DropTargetNotFound(over_id.to_string()))?;
            if container == source {
                (container, index)
            } else {
                match policy {
                    DropPolicy::InsertBefore => (container, index),
                    DropPolicy::InsertAfter => (container, index + 1),
                }
            }
        }
    };

    Ok(Placement {
        source,
        from_index,
        target,
        to_index,
    })
}

/// Returns the neighbouring container in `direction`, if any
pub fn step_target<C: Copy + PartialEq>(
    containers: &[C],
    current: C,
    direction: MoveDirection,
) -> Option<C> {
    let index = containers.iter().position(|c| *c == current)?;
    match direction {
        MoveDirection::Left => index.checked_sub(1).map(|i| containers[i]),
        MoveDirection::Right => containers.get(index + 1).copied(),
    }
}

fn locate<T: Positioned>(
    lists: &[(T::Container, &[T])],
    id: T::Id,
) -> Option<(T::Container, usize)> {
    lists.iter().find_map(|(container, items)| {
        items
            .iter()
            .position(|item| item.id() == id)
            .map(|index| (*container, index))
    })
}
