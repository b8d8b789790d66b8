pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgrest")]
pub mod postgrest;

pub use memory::InMemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SQLiteStorage;

#[cfg(feature = "postgrest")]
pub use postgrest::PostgrestStorage;
