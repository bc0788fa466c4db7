//! # Database
//!
//! Durable task storage. [`TaskStore`] is the contract the orchestration layer
//! depends on; [`PgTaskStore`] is the production backend and
//! [`InMemoryTaskStore`] the embedded one used by tests.

pub mod connection;
pub mod memory_store;
pub mod migrator;
pub mod pg_store;
pub mod store;

pub use connection::DatabaseConnection;
pub use memory_store::InMemoryTaskStore;
pub use pg_store::PgTaskStore;
pub use store::TaskStore;
