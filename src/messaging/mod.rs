//! # Messaging Module
//!
//! The publish collaborator: scores are republished onto a PostgreSQL message
//! queue (pgmq) for downstream consumers. Delivery is at-least-once.

pub mod errors;
pub mod message;
pub mod publisher;

pub use errors::MessagingError;
pub use message::EventScoreMessage;
pub use publisher::{PgmqScorePublisher, ScorePublisher};
