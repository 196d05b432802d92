//! Storage capability implementations
//!
//! Concrete [`DatabaseConnector`](bridge_traits::database::DatabaseConnector)
//! and [`DatabaseAdapter`](bridge_traits::database::DatabaseAdapter) types used
//! by the direct-command backend.

pub mod sqlite_native;

pub use sqlite_native::{SqliteAdapter, SqliteConnector};
