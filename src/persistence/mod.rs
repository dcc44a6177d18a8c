// Persistence for member records, targets and guild config
pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::MemoryStore;
pub use postgres::PgHeistStore;
pub use repository::{HeistStore, VaultChange};
