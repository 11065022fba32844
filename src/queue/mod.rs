//! Background job queue.
//!
//! Two backends implement [`TaskQueue`]:
//!
//! | Backend | Selected when | Storage |
//! |---------|---------------|---------|
//! | [`FileQueue`] | `REDIS_URL` is unset or empty | SQLite file next to the bot |
//! | [`RedisQueue`] | `REDIS_URL` is set | Redis list (LPUSH / RPOP) |
//!
//! Jobs are JSON so either backend can be drained by any build of the bot.

pub mod file;
#[cfg(feature = "redis-queue")]
pub mod redis;
pub mod worker;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::{CubeCompError, Result};

pub use file::FileQueue;
#[cfg(feature = "redis-queue")]
pub use self::redis::RedisQueue;
pub use worker::{WorkerStats, drain};

/// Environment variable that selects the Redis backend
pub const REDIS_URL_ENV: &str = "REDIS_URL";
/// Queue (and Redis list key) used when none is given
pub const DEFAULT_QUEUE_NAME: &str = "cubecomp:jobs";

/// Work the bot can be asked to do out of band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Post the next competition
    RotateCompetition,
    /// Score a competition thread; `None` means the current one
    ScoreCompetition { post_id: Option<String> },
    /// Bring the database to the latest schema
    Migrate,
}

impl Job {
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| CubeCompError::queue(format!("unreadable job {payload:?}: {e}")))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RotateCompetition => write!(f, "rotate"),
            Self::ScoreCompetition { post_id: Some(id) } => write!(f, "score({id})"),
            Self::ScoreCompetition { post_id: None } => write!(f, "score(current)"),
            Self::Migrate => write!(f, "migrate"),
        }
    }
}

/// A FIFO of [`Job`]s
pub trait TaskQueue {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn enqueue(&mut self, job: &Job) -> Result<()>;

    /// Oldest job, or `None` when the queue is empty
    fn dequeue(&mut self) -> Result<Option<Job>>;

    fn len(&mut self) -> Result<usize>;

    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// The backend picked by [`select_backend`]
pub enum QueueBackend {
    File(FileQueue),
    #[cfg(feature = "redis-queue")]
    Redis(RedisQueue),
}

impl fmt::Debug for QueueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(q) => write!(f, "QueueBackend::File({:?})", q.path()),
            #[cfg(feature = "redis-queue")]
            Self::Redis(q) => write!(f, "QueueBackend::Redis({})", q.url()),
        }
    }
}

impl QueueBackend {
    fn inner(&mut self) -> &mut dyn TaskQueue {
        match self {
            Self::File(q) => q as &mut dyn TaskQueue,
            #[cfg(feature = "redis-queue")]
            Self::Redis(q) => q as &mut dyn TaskQueue,
        }
    }
}

impl TaskQueue for QueueBackend {
    fn name(&self) -> &str {
        match self {
            Self::File(q) => q.name(),
            #[cfg(feature = "redis-queue")]
            Self::Redis(q) => q.name(),
        }
    }

    fn enqueue(&mut self, job: &Job) -> Result<()> {
        self.inner().enqueue(job)
    }

    fn dequeue(&mut self) -> Result<Option<Job>> {
        self.inner().dequeue()
    }

    fn len(&mut self) -> Result<usize> {
        self.inner().len()
    }
}

/// Picks the backend from the environment.
///
/// A non-empty `REDIS_URL` selects Redis, built from that URL without
/// connecting. Otherwise (or in builds without the `redis-queue` feature)
/// the SQLite file at `file_path` is used.
pub fn select_backend<F>(env_lookup: F, file_path: &Path, name: &str) -> Result<QueueBackend>
where
    F: Fn(&str) -> Option<String>,
{
    let redis_url = env_lookup(REDIS_URL_ENV).filter(|url| !url.trim().is_empty());

    match redis_url {
        #[cfg(feature = "redis-queue")]
        Some(url) => {
            info!("Using Redis queue '{}'", name);
            Ok(QueueBackend::Redis(RedisQueue::new(&url, name)?))
        }
        #[cfg(not(feature = "redis-queue"))]
        Some(_) => {
            tracing::warn!(
                "{} is set but this build has no Redis support; falling back to {:?}",
                REDIS_URL_ENV, file_path
            );
            Ok(QueueBackend::File(FileQueue::open(file_path, name)?))
        }
        None => {
            info!("Using file queue {:?}", file_path);
            Ok(QueueBackend::File(FileQueue::open(file_path, name)?))
        }
    }
}

/// [`select_backend`] over the process environment
pub fn from_env(file_path: &Path, name: &str) -> Result<QueueBackend> {
    select_backend(|key| std::env::var(key).ok(), file_path, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_payloads() {
        let job = Job::ScoreCompetition {
            post_id: Some("abc123".to_string()),
        };
        let payload = job.to_payload().unwrap();
        assert_eq!(payload, r#"{"kind":"score_competition","post_id":"abc123"}"#);
        assert_eq!(Job::from_payload(&payload).unwrap(), job);
        assert_eq!(
            Job::from_payload(r#"{"kind":"rotate_competition"}"#).unwrap(),
            Job::RotateCompetition
        );
        assert!(matches!(
            Job::from_payload(r#"{"kind":"reboot"}"#),
            Err(CubeCompError::Queue(_))
        ));
    }

    #[test]
    fn test_no_redis_url_selects_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let backend = select_backend(|_| None, &path, DEFAULT_QUEUE_NAME).unwrap();
        assert!(matches!(backend, QueueBackend::File(_)));
        assert!(path.exists());
    }

    #[test]
    fn test_empty_redis_url_selects_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let backend =
            select_backend(|_| Some("  ".to_string()), &path, DEFAULT_QUEUE_NAME).unwrap();
        assert!(matches!(backend, QueueBackend::File(_)));
    }

    #[cfg(feature = "redis-queue")]
    #[test]
    fn test_redis_url_selects_redis_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let lookup = |key: &str| {
            (key == REDIS_URL_ENV).then(|| "redis://cache.internal:6380/2".to_string())
        };
        let backend = select_backend(lookup, &path, "weekly").unwrap();
        match backend {
            QueueBackend::Redis(queue) => {
                assert_eq!(queue.url(), "redis://cache.internal:6380/2");
                assert_eq!(queue.name(), "weekly");
            }
            other => panic!("expected Redis backend, got {other:?}"),
        }
        // No connection is attempted and the file is left alone
        assert!(!path.exists());
    }

    #[cfg(feature = "redis-queue")]
    #[test]
    fn test_malformed_redis_url_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = select_backend(
            |_| Some("not a url".to_string()),
            &dir.path().join("queue.db"),
            DEFAULT_QUEUE_NAME,
        );
        assert!(result.is_err());
    }
}
