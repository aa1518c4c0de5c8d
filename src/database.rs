pub mod memory;
pub mod sqlx;

pub use self::memory::MemoryManager;
pub use self::sqlx::{PgSqlx, PgSqlxManager};
