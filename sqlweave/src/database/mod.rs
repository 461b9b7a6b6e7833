//! Database abstraction layer
//!
//! Dialects generate SQL, the pool executes it. The two meet only in
//! [`ActiveConnection`](crate::ActiveConnection).

pub mod identifier;
pub mod pool;
pub mod registry;
pub mod traits;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the main trait
pub use pool::DbPool;
pub use traits::{SqlDialect, Statement};
