pub mod memory;
pub mod mongodb;

pub use self::memory::InMemoryStateStore;
pub use self::mongodb::MongoStateStore;
