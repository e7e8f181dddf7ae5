use std::{sync::Arc, time::Duration, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{ClientOptions, IndexOptions},
};
use tokio::{sync::RwLock, time::sleep};
use uuid::Uuid;

use super::{
    error::{MongoDaoError, MongoResult},
    models::{
        GROUP_COLLECTION, MongoGroupDocument, MongoTaskDocument, MongoTimerDocument,
        TASK_COLLECTION, TIMER_COLLECTION, USER_COLLECTION, doc_id, uuid_as_binary,
    },
};
use crate::dao::{
    models::{GroupEntity, TaskEntity, TimerEntity, UserEntity},
    storage::StorageResult,
    tracker_store::TrackerStore,
};

const DEFAULT_DATABASE: &str = "taskpulse";

struct RetryPolicy;

impl RetryPolicy {
    const MAX_ATTEMPTS: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 250;

    fn initial_delay() -> Duration {
        Duration::from_millis(Self::INITIAL_DELAY_MS)
    }

    fn next_delay(current: Duration) -> Duration {
        (current * 2).min(Duration::from_secs(5))
    }
}

/// MongoDB-backed [`TrackerStore`].
#[derive(Clone)]
pub struct MongoTrackerStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    options: ClientOptions,
    database_name: String,
}

struct MongoState {
    database: Database,
}

impl MongoTrackerStore {
    /// Establish a connection, verify it with a ping and ensure indexes.
    pub async fn connect(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();

        let database = establish_connection(&options, &database_name).await?;
        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { database }),
                options,
                database_name,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Create the indexes the timer core relies on. The unique partial index
    /// on active timers is the store-level guard behind the per-user
    /// at-most-one-active-timer invariant.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let timers = database.collection::<MongoTimerDocument>(TIMER_COLLECTION);

        let active_per_user = IndexModel::builder()
            .keys(doc! {"user_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("active_timer_per_user".to_owned()))
                    .unique(Some(true))
                    .partial_filter_expression(Some(doc! {"is_active": true}))
                    .build(),
            )
            .build();
        timers
            .create_index(active_per_user)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TIMER_COLLECTION,
                index: "active_timer_per_user",
                source,
            })?;

        let task_history = IndexModel::builder()
            .keys(doc! {"task_id": 1, "started_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("task_timers_idx".to_owned()))
                    .build(),
            )
            .build();
        timers
            .create_index(task_history)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TIMER_COLLECTION,
                index: "task_timers_idx",
                source,
            })?;

        let group_completed = IndexModel::builder()
            .keys(doc! {"group_id": 1, "is_completed": 1, "ended_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("group_completed_idx".to_owned()))
                    .build(),
            )
            .build();
        timers
            .create_index(group_completed)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TIMER_COLLECTION,
                index: "group_completed_idx",
                source,
            })?;

        let group_members = IndexModel::builder()
            .keys(doc! {"members": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("group_members_idx".to_owned()))
                    .build(),
            )
            .build();
        database
            .collection::<MongoGroupDocument>(GROUP_COLLECTION)
            .create_index(group_members)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GROUP_COLLECTION,
                index: "group_members_idx",
                source,
            })?;

        Ok(())
    }

    async fn ping(&self) -> MongoResult<()> {
        let database = self.database().await;
        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.inner.options, &self.inner.database_name).await?;
        let mut guard = self.inner.state.write().await;
        guard.database = database;
        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn timers(&self) -> Collection<MongoTimerDocument> {
        self.database()
            .await
            .collection::<MongoTimerDocument>(TIMER_COLLECTION)
    }

    async fn tasks(&self) -> Collection<MongoTaskDocument> {
        self.database()
            .await
            .collection::<MongoTaskDocument>(TASK_COLLECTION)
    }

    async fn users(&self) -> Collection<UserEntity> {
        self.database()
            .await
            .collection::<UserEntity>(USER_COLLECTION)
    }

    async fn groups(&self) -> Collection<MongoGroupDocument> {
        self.database()
            .await
            .collection::<MongoGroupDocument>(GROUP_COLLECTION)
    }

    async fn collect_timers(&self, filter: Document) -> MongoResult<Vec<TimerEntity>> {
        let documents: Vec<MongoTimerDocument> = self
            .timers()
            .await
            .find(filter)
            .sort(doc! {"started_at": 1})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: TIMER_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: TIMER_COLLECTION,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn public_group_ids(&self) -> MongoResult<Vec<Uuid>> {
        let documents: Vec<MongoGroupDocument> = self
            .groups()
            .await
            .find(doc! {"is_public": true})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GROUP_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GROUP_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(|group| group.id).collect())
    }
}

async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<Database> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = RetryPolicy::initial_delay();

    loop {
        match database.run_command(doc! {"ping": 1}).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= RetryPolicy::MAX_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                sleep(delay).await;
                delay = RetryPolicy::next_delay(delay);
            }
        }
    }

    Ok(database)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

fn completion_filter(since: Option<SystemTime>) -> Document {
    let mut filter = doc! {"is_completed": true};
    if let Some(cutoff) = since {
        filter.insert("ended_at", doc! {"$gte": DateTime::from_system_time(cutoff)});
    }
    filter
}

impl TrackerStore for MongoTrackerStore {
    fn find_task(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TaskEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .tasks()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: TASK_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn save_task(&self, task: TaskEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = task.id;
            let document: MongoTaskDocument = task.into();
            store
                .tasks()
                .await
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Save {
                    collection: TASK_COLLECTION,
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let user = store
                .users()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: USER_COLLECTION,
                    source,
                })?;
            Ok(user)
        })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = user.id;
            store
                .users()
                .await
                .replace_one(doc_id(id), &user)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Save {
                    collection: USER_COLLECTION,
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .groups()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: GROUP_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = group.id;
            let document: MongoGroupDocument = group.into();
            store
                .groups()
                .await
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Save {
                    collection: GROUP_COLLECTION,
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn find_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .timers()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: TIMER_COLLECTION,
                    source,
                })?;
            document.map(TryInto::try_into).transpose().map_err(Into::into)
        })
    }

    fn insert_timer(&self, timer: TimerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = timer.id;
            let user_id = timer.user_id;
            let document: MongoTimerDocument = timer.into();
            store
                .timers()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| {
                    if is_duplicate_key(&source) {
                        MongoDaoError::ActiveTimerExists { user_id }
                    } else {
                        MongoDaoError::Save {
                            collection: TIMER_COLLECTION,
                            id,
                            source,
                        }
                    }
                })?;
            Ok(())
        })
    }

    fn save_timer(&self, timer: TimerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = timer.id;
            let document: MongoTimerDocument = timer.into();
            store
                .timers()
                .await
                .replace_one(doc_id(id), &document)
                .await
                .map_err(|source| MongoDaoError::Save {
                    collection: TIMER_COLLECTION,
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn delete_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .timers()
                .await
                .delete_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Delete {
                    collection: TIMER_COLLECTION,
                    id,
                    source,
                })?;
            Ok(())
        })
    }

    fn find_active_timer(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .timers()
                .await
                .find_one(doc! {"user_id": uuid_as_binary(user_id), "is_active": true})
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: TIMER_COLLECTION,
                    source,
                })?;
            document.map(TryInto::try_into).transpose().map_err(Into::into)
        })
    }

    fn list_task_timers(
        &self,
        task_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> BoxFuture<'static, StorageResult<(Vec<TimerEntity>, u64)>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {"task_id": uuid_as_binary(task_id)};
            let collection = store.timers().await;

            let total = collection
                .count_documents(filter.clone())
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: TIMER_COLLECTION,
                    source,
                })?;

            let documents: Vec<MongoTimerDocument> = collection
                .find(filter)
                .sort(doc! {"started_at": -1})
                .skip(offset)
                .limit(limit as i64)
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: TIMER_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: TIMER_COLLECTION,
                    source,
                })?;

            let timers = documents
                .into_iter()
                .map(TryInto::try_into)
                .collect::<MongoResult<Vec<TimerEntity>>>()?;
            Ok((timers, total))
        })
    }

    fn completed_timers_for_group(
        &self,
        group_id: Uuid,
        since: Option<SystemTime>,
    ) -> BoxFuture<'static, StorageResult<Vec<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = completion_filter(since);
            filter.insert("group_id", uuid_as_binary(group_id));
            store.collect_timers(filter).await.map_err(Into::into)
        })
    }

    fn completed_timers_for_public_groups(
        &self,
        since: Option<SystemTime>,
    ) -> BoxFuture<'static, StorageResult<Vec<TimerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let group_ids = store.public_group_ids().await?;
            if group_ids.is_empty() {
                return Ok(Vec::new());
            }
            let binaries: Vec<_> = group_ids.into_iter().map(uuid_as_binary).collect();
            let mut filter = completion_filter(since);
            filter.insert("group_id", doc! {"$in": binaries});
            store.collect_timers(filter).await.map_err(Into::into)
        })
    }

    fn groups_for_member(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move {
            let member = uuid_as_binary(user_id);
            let documents: Vec<MongoGroupDocument> = store
                .groups()
                .await
                .find(doc! {"$or": [
                    {"leader_id": member.clone()},
                    {"members": member},
                ]})
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: GROUP_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: GROUP_COLLECTION,
                    source,
                })?;

            Ok(documents.into_iter().map(|group| group.id).collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reconnect().await.map_err(Into::into) })
    }
}
