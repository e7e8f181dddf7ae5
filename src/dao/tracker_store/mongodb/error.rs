use thiserror::Error;
use uuid::Uuid;

use crate::dao::storage::StorageError;
use crate::dao::tracker_store::memory::ACTIVE_TIMER_CONSTRAINT;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB tracker store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The driver client could not be constructed.
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The initial connectivity ping never succeeded.
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        /// Number of ping attempts made.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A health-check ping failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A write against a collection failed.
    #[error("failed to save `{id}` into `{collection}`")]
    Save {
        /// Target collection.
        collection: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A delete against a collection failed.
    #[error("failed to delete `{id}` from `{collection}`")]
    Delete {
        /// Target collection.
        collection: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// A read against a collection failed.
    #[error("query against `{collection}` failed")]
    Query {
        /// Target collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },
    /// The per-user active timer uniqueness index rejected an insert.
    #[error("user `{user_id}` already has an active timer on record")]
    ActiveTimerExists {
        /// User whose insert was rejected.
        user_id: Uuid,
    },
    /// A stored document decoded into an impossible state.
    #[error("invalid document `{id}` in `{collection}`: {message}")]
    InvalidDocument {
        /// Source collection.
        collection: &'static str,
        /// Document id.
        id: Uuid,
        /// Description of the inconsistency.
        message: String,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::ActiveTimerExists { .. } => StorageError::UniqueViolation {
                constraint: ACTIVE_TIMER_CONSTRAINT,
            },
            MongoDaoError::InvalidDocument { .. } => StorageError::Corrupted {
                message: err.to_string(),
            },
            other => {
                let message = other.to_string();
                StorageError::unavailable(message, other)
            }
        }
    }
}
