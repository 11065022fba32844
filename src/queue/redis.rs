//! Redis-backed queue: a list key, LPUSH to enqueue and RPOP to dequeue.
//!
//! The client is built from the URL up front but the connection is only
//! opened on first use, so selecting this backend never touches the network.

use redis::Commands;
use tracing::debug;

use super::{Job, TaskQueue};
use crate::error::{CubeCompError, Result};

pub struct RedisQueue {
    client: redis::Client,
    conn: Option<redis::Connection>,
    url: String,
    key: String,
}

impl RedisQueue {
    /// Parses the URL; fails on a malformed one
    pub fn new(url: &str, key: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: None,
            url: url.to_string(),
            key: key.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn connection(&mut self) -> Result<&mut redis::Connection> {
        if self.conn.is_none() {
            debug!("Connecting to Redis for queue {}", self.key);
            self.conn = Some(self.client.get_connection()?);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| CubeCompError::queue("Redis connection unavailable"))
    }
}

impl TaskQueue for RedisQueue {
    fn name(&self) -> &str {
        &self.key
    }

    fn enqueue(&mut self, job: &Job) -> Result<()> {
        let payload = job.to_payload()?;
        let key = self.key.clone();
        self.connection()?.lpush::<_, _, ()>(&key, payload)?;
        debug!("Queued {} on {}", job, key);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<Option<Job>> {
        let key = self.key.clone();
        let payload: Option<String> = self.connection()?.rpop(&key, None)?;
        payload.map(|p| Job::from_payload(&p)).transpose()
    }

    fn len(&mut self) -> Result<usize> {
        let key = self.key.clone();
        Ok(self.connection()?.llen(&key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_does_not_connect() {
        // Nothing listens on port 1; construction must still succeed
        let queue = RedisQueue::new("redis://127.0.0.1:1/0", "jobs").unwrap();
        assert_eq!(queue.url(), "redis://127.0.0.1:1/0");
        assert_eq!(queue.name(), "jobs");
    }

    #[test]
    fn test_unreachable_server_errors_on_use() {
        let mut queue = RedisQueue::new("redis://127.0.0.1:1/0", "jobs").unwrap();
        assert!(matches!(queue.len(), Err(CubeCompError::Redis(_))));
    }
}
