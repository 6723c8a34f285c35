//! The MongoDB storage backend.

mod bson;
mod collection;
mod counter;
pub mod errors;
mod store;

pub use bson::{u32_id_filter, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_counters_exist, Counter};
pub use store::MongoStore;
