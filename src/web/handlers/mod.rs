//! Request handlers, grouped by route family.

pub mod events;
pub mod health;
pub mod mock_api;
