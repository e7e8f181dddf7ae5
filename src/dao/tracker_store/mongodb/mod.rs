//! MongoDB backend for the tracker store.

mod error;
mod models;
mod store;

pub use error::{MongoDaoError, MongoResult};
pub use store::MongoTrackerStore;
