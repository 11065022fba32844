//! Local queue kept in a SQLite file.
//!
//! Several named queues can share one file; each row is one JSON job and
//! the row id gives FIFO order.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::{Job, TaskQueue};
use crate::clock::unix_now;
use crate::error::Result;

pub struct FileQueue {
    conn: Connection,
    path: PathBuf,
    name: String,
}

impl FileQueue {
    pub fn open(path: &Path, name: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_queue ON jobs(queue, id);",
        )?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            name: name.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn connection_for_tests(&self) -> &Connection {
        &self.conn
    }
}

impl TaskQueue for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn enqueue(&mut self, job: &Job) -> Result<()> {
        self.conn.execute(
            "INSERT INTO jobs (queue, payload, enqueued_at) VALUES (?1, ?2, ?3)",
            params![self.name, job.to_payload()?, unix_now()],
        )?;
        debug!("Queued {} on {}", job, self.name);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<Option<Job>> {
        // IMMEDIATE takes the write lock up front so two workers never pop
        // the same row
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let next: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, payload FROM jobs WHERE queue = ?1 ORDER BY id LIMIT 1",
                [&self.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((id, payload)) = next else {
            return Ok(None);
        };
        tx.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        tx.commit()?;
        Job::from_payload(&payload).map(Some)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE queue = ?1",
            [&self.name],
            |row| row.get(0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = FileQueue::open(&dir.path().join("q.db"), "jobs").unwrap();
        assert!(queue.is_empty().unwrap());

        queue.enqueue(&Job::Migrate).unwrap();
        queue.enqueue(&Job::RotateCompetition).unwrap();
        queue
            .enqueue(&Job::ScoreCompetition { post_id: None })
            .unwrap();
        assert_eq!(queue.len().unwrap(), 3);

        assert_eq!(queue.dequeue().unwrap(), Some(Job::Migrate));
        assert_eq!(queue.dequeue().unwrap(), Some(Job::RotateCompetition));
        assert_eq!(
            queue.dequeue().unwrap(),
            Some(Job::ScoreCompetition { post_id: None })
        );
        assert_eq!(queue.dequeue().unwrap(), None);
    }

    #[test]
    fn test_named_queues_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.db");
        let mut a = FileQueue::open(&path, "a").unwrap();
        let mut b = FileQueue::open(&path, "b").unwrap();
        a.enqueue(&Job::Migrate).unwrap();
        assert_eq!(b.len().unwrap(), 0);
        assert_eq!(b.dequeue().unwrap(), None);
        assert_eq!(a.len().unwrap(), 1);
    }

    #[test]
    fn test_jobs_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.db");
        FileQueue::open(&path, "jobs")
            .unwrap()
            .enqueue(&Job::RotateCompetition)
            .unwrap();
        let mut reopened = FileQueue::open(&path, "jobs").unwrap();
        assert_eq!(reopened.dequeue().unwrap(), Some(Job::RotateCompetition));
    }
}
