//! Task and event history: bounded logs with paged, filtered collectors.

mod collector;
mod event;
mod manager;
mod scope;
mod task;
pub use collector::*;
pub use event::*;
pub use manager::HistoryManager;
pub use task::*;
