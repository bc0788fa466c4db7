//! # Models
//!
//! Persistent entities. The poller tracks exactly one: [`task::Task`].

pub mod task;

pub use task::{Task, TaskId};
