pub mod board;
pub mod ordering;
pub mod task;

pub use board::{Board, BoardId, Column, ColumnId};
pub use ordering::{
    DragGesture, DropPolicy, DropTarget, MoveDirection, Placement, PositionChange, Positioned,
};
pub use task::{Priority, Task, TaskId};
