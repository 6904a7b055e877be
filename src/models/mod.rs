//! Concrete registry instantiations: the order ledger and the project task
//! board.

pub mod order;
pub mod task_item;

pub use order::{Order, OrderLedger, OrderStatus};
pub use task_item::{ProjectTaskBoard, TaskItem, TaskPriority, TaskState, TaskSummary};
