//! Persistence layer: entities, storage errors and store backends.

pub mod models;
pub mod storage;
pub mod tracker_store;
