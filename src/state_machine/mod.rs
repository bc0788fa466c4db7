//! # Task State Machine
//!
//! The single set of transition rules shared by every [`TaskStore`] backend.
//! Stores load a row under their own atomicity primitive, apply a
//! [`TaskEvent`] with [`apply_event`], and persist the result.
//!
//! [`TaskStore`]: crate::database::TaskStore

pub mod events;
pub mod states;
pub mod task_state_machine;

pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::apply_event;
