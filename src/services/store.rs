use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::job::Job;

const KEY_PREFIX: &str = "uhd_camera:job:";

/// Keyed storage for locally tracked jobs. Entries are ephemeral: every
/// record carries a maximum age and can be given a shorter grace period once
/// its terminal state has been read.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job record.
    async fn put(&self, job: &Job) -> Result<(), StoreError>;

    /// Fetch a job, or `None` if it never existed or has expired.
    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Schedule removal `after` from now. Never extends an earlier deadline.
    async fn expire(&self, id: &str, after: Duration) -> Result<(), StoreError>;

    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

struct Entry {
    job: Job,
    deadline: Instant,
}

/// In-process job store. Expired entries are invisible to readers and are
/// reclaimed by [`MemoryJobStore::purge_expired`].
pub struct MemoryJobStore {
    entries: Mutex<HashMap<String, Entry>>,
    max_age: Duration,
}

impl MemoryJobStore {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
        }
    }

    /// Drop every entry whose deadline has passed. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.deadline > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        let deadline = Instant::now() + self.max_age;
        self.entries.lock().await.insert(
            job.id.clone(),
            Entry {
                job: job.clone(),
                deadline,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(id) {
            Some(entry) if entry.deadline > now => Ok(Some(entry.job.clone())),
            Some(_) => {
                entries.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(id);
        Ok(())
    }

    async fn expire(&self, id: &str, after: Duration) -> Result<(), StoreError> {
        let deadline = Instant::now() + after;
        if let Some(entry) = self.entries.lock().await.get_mut(id) {
            entry.deadline = entry.deadline.min(deadline);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Periodically reclaim expired entries from a memory store until `cancel` fires.
pub async fn run_sweeper(
    store: Arc<MemoryJobStore>,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = every.as_secs(), "Job store sweeper started");
    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job store sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired jobs");
                }
            }
        }
    }
}

/// Redis-backed job store. Records are JSON strings with a native TTL.
pub struct RedisJobStore {
    client: redis::Client,
    max_age: Duration,
}

impl RedisJobStore {
    pub fn new(redis_url: &str, max_age: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(StoreError::Redis)?;
        Ok(Self { client, max_age })
    }

    fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::Redis)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job).map_err(StoreError::Serialize)?;
        conn.set_ex::<_, _, ()>(Self::key(&job.id), payload, self.max_age.as_secs().max(1))
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(Self::key(id)).await.map_err(StoreError::Redis)?;

        match payload {
            Some(payload) => {
                let job: Job = serde_json::from_str(&payload).map_err(StoreError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(Self::key(id)).await.map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn expire(&self, id: &str, after: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        // LT only shortens an existing TTL, so repeated terminal reads keep the first deadline.
        redis::cmd("EXPIRE")
            .arg(Self::key(id))
            .arg(after.as_secs().max(1))
            .arg("LT")
            .query_async::<i64>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
