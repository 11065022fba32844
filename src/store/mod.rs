//! SQLite store for competitions, users, solves and gift codes.
//!
//! Opening a [`Store`] migrates the database to the latest schema, so the
//! repository functions below can assume every table and column exists.
//! Scrambles are stored as a JSON array per event since relay and Megaminx
//! scrambles span several lines.

pub mod migrations;

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CubeCompError, Result};
use crate::scoring::Attempt;
use crate::types::Event;

pub use migrations::{current_version, latest_version, migrate_to};

/// A competition row with the events it ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionRecord {
    pub id: i64,
    pub number: u32,
    pub title: String,
    pub reddit_post_id: Option<String>,
    pub started_at: u64,
    pub active: bool,
    pub events: Vec<Event>,
}

/// One event of a competition about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompetitionEvent {
    pub event: Event,
    pub scrambles: Vec<String>,
}

/// Migrates the database at `path` up or down to `target` (latest when
/// `None`) and returns the versions that ran
pub fn migrate_database(path: &Path, target: Option<u32>) -> Result<Vec<u32>> {
    let mut conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    let target = target.unwrap_or_else(latest_version);
    let from = current_version(&conn)?;
    let executed = migrate_to(&mut conn, target)?;
    info!("Database {:?} at version {} (was {})", path, target, from);
    Ok(executed)
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if needed) and migrates the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!("Opened database {:?}", path);
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        let applied = migrate_to(&mut conn, latest_version())?;
        if !applied.is_empty() {
            info!("Database migrated to version {}", latest_version());
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Makes sure every event has a row, keeping existing descriptions
    pub fn upsert_events(&self, events: &[Event]) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO events (name, code, format, description) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET code = excluded.code, format = excluded.format",
        )?;
        for event in events {
            stmt.execute(params![
                event.to_string(),
                event.code(),
                event.format().to_string(),
                migrations::default_description(*event),
            ])?;
        }
        Ok(())
    }

    pub fn event_description(&self, event: Event) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT description FROM events WHERE name = ?1",
                [event.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .flatten())
    }

    // ------------------------------------------------------------------------
    // Competitions
    // ------------------------------------------------------------------------

    /// Stores a new competition and its events, closing every earlier one
    pub fn insert_competition(
        &mut self,
        number: u32,
        title: &str,
        started_at: u64,
        events: &[NewCompetitionEvent],
    ) -> Result<i64> {
        let event_names: Vec<Event> = events.iter().map(|e| e.event).collect();
        self.upsert_events(&event_names)?;

        let tx = self.conn.transaction()?;
        tx.execute("UPDATE competitions SET active = 0 WHERE active = 1", [])?;
        tx.execute(
            "INSERT INTO competitions (number, title, started_at, active) VALUES (?1, ?2, ?3, 1)",
            params![number, title, started_at],
        )?;
        let competition_id = tx.last_insert_rowid();

        {
            let mut insert = tx.prepare(
                "INSERT INTO competition_events (competition_id, event_id, scrambles)
                 SELECT ?1, id, ?3 FROM events WHERE name = ?2",
            )?;
            for entry in events {
                let scrambles = serde_json::to_string(&entry.scrambles)?;
                if scrambles.len() > migrations::SCRAMBLES_WIDTH {
                    return Err(CubeCompError::state(format!(
                        "{} scrambles are {} characters, the column holds {}",
                        entry.event,
                        scrambles.len(),
                        migrations::SCRAMBLES_WIDTH
                    )));
                }
                insert.execute(params![competition_id, entry.event.to_string(), scrambles])?;
            }
        }
        tx.commit()?;

        info!("Recorded competition {} ({} events)", number, events.len());
        Ok(competition_id)
    }

    pub fn set_competition_post(&self, number: u32, post_id: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE competitions SET reddit_post_id = ?1 WHERE number = ?2",
            params![post_id, number],
        )?;
        if updated == 0 {
            return Err(CubeCompError::state(format!("no competition number {number}")));
        }
        Ok(())
    }

    pub fn competition_by_post(&self, post_id: &str) -> Result<Option<CompetitionRecord>> {
        self.competition_where("reddit_post_id = ?1", post_id)
    }

    pub fn competition_by_number(&self, number: u32) -> Result<Option<CompetitionRecord>> {
        self.competition_where("number = ?1", number)
    }

    fn competition_where(
        &self,
        condition: &str,
        value: impl rusqlite::ToSql,
    ) -> Result<Option<CompetitionRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, number, title, reddit_post_id, started_at, active
                     FROM competitions WHERE {condition}"
                ),
                [value],
                |row| {
                    Ok(CompetitionRecord {
                        id: row.get(0)?,
                        number: row.get(1)?,
                        title: row.get(2)?,
                        reddit_post_id: row.get(3)?,
                        started_at: row.get(4)?,
                        active: row.get(5)?,
                        events: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut record) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT e.name FROM competition_events ce
             JOIN events e ON e.id = ce.event_id
             WHERE ce.competition_id = ?1 ORDER BY ce.id",
        )?;
        let names = stmt
            .query_map([record.id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        record.events = names
            .iter()
            .map(|name| {
                name.parse()
                    .map_err(|_| CubeCompError::UnknownEvent(name.clone()))
            })
            .collect::<Result<Vec<Event>>>()?;
        Ok(Some(record))
    }

    pub fn scrambles_for(&self, competition_id: i64, event: Event) -> Result<Vec<String>> {
        let joined: Option<String> = self
            .conn
            .query_row(
                "SELECT ce.scrambles FROM competition_events ce
                 JOIN events e ON e.id = ce.event_id
                 WHERE ce.competition_id = ?1 AND e.name = ?2",
                params![competition_id, event.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match joined {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------------
    // Users and solves
    // ------------------------------------------------------------------------

    /// Returns the user's id, creating the row on first sight.
    /// Reddit names are case-insensitive.
    pub fn upsert_user(&self, reddit_name: &str, now: u64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (reddit_name, created_at) VALUES (?1, ?2)
             ON CONFLICT(reddit_name) DO NOTHING",
            params![reddit_name, now],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM users WHERE reddit_name = ?1",
            [reddit_name],
            |row| row.get(0),
        )?)
    }

    pub fn set_admin(&self, reddit_name: &str, is_admin: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE users SET is_admin = ?1 WHERE reddit_name = ?2",
            params![is_admin, reddit_name],
        )?;
        if updated == 0 {
            return Err(CubeCompError::state(format!("no user named {reddit_name}")));
        }
        Ok(())
    }

    pub fn is_admin(&self, reddit_name: &str) -> Result<bool> {
        Ok(self
            .conn
            .query_row(
                "SELECT is_admin FROM users WHERE reddit_name = ?1",
                [reddit_name],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(false))
    }

    /// Replaces a user's solves for one event of a competition
    pub fn record_solves(
        &mut self,
        competition_id: i64,
        event: Event,
        user_id: i64,
        attempts: &[Attempt],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        let competition_event_id: i64 = tx
            .query_row(
                "SELECT ce.id FROM competition_events ce
                 JOIN events e ON e.id = ce.event_id
                 WHERE ce.competition_id = ?1 AND e.name = ?2",
                params![competition_id, event.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                CubeCompError::state(format!(
                    "competition {competition_id} did not run {event}"
                ))
            })?;

        tx.execute(
            "DELETE FROM user_solves WHERE user_id = ?1 AND competition_event_id = ?2",
            params![user_id, competition_event_id],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO user_solves (user_id, competition_event_id, solve_index, value, penalty)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (index, attempt) in attempts.iter().enumerate() {
                let (value, penalty) = match attempt {
                    Attempt::Value(v) => (Some(*v), None),
                    Attempt::Dnf => (None, Some("DNF")),
                    Attempt::Dns => (None, Some("DNS")),
                };
                insert.execute(params![user_id, competition_event_id, index, value, penalty])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn attempts_for(
        &self,
        competition_id: i64,
        event: Event,
        reddit_name: &str,
    ) -> Result<Vec<Attempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.value, s.penalty FROM user_solves s
             JOIN users u ON u.id = s.user_id
             JOIN competition_events ce ON ce.id = s.competition_event_id
             JOIN events e ON e.id = ce.event_id
             WHERE ce.competition_id = ?1 AND e.name = ?2 AND u.reddit_name = ?3
             ORDER BY s.solve_index",
        )?;
        let rows = stmt
            .query_map(params![competition_id, event.to_string(), reddit_name], |row| {
                Ok((row.get::<_, Option<u32>>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(value, penalty)| match (value, penalty.as_deref()) {
                (Some(v), None) => Ok(Attempt::Value(v)),
                (None, Some("DNF")) => Ok(Attempt::Dnf),
                (None, Some("DNS")) => Ok(Attempt::Dns),
                other => Err(CubeCompError::state(format!("corrupt solve row {other:?}"))),
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Gift codes
    // ------------------------------------------------------------------------

    pub fn add_gift_code(&self, code: &str, value_cents: u32, now: u64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO gift_codes (code, value_cents, created_at) VALUES (?1, ?2, ?3)",
            params![code, value_cents, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The winner and code already awarded for a competition
    pub fn redemption_for(&self, competition_id: i64) -> Result<Option<(String, String)>> {
        Ok(self
            .conn
            .query_row(
                "SELECT u.reddit_name, g.code FROM gift_code_redemptions r
                 JOIN gift_codes g ON g.id = r.gift_code_id
                 JOIN users u ON u.id = r.user_id
                 WHERE r.competition_id = ?1",
                [competition_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Hands the oldest unredeemed code to a user. `None` when none are left.
    /// A competition gets at most one code; asking again returns the code it
    /// already has.
    pub fn redeem_next_gift_code(
        &mut self,
        user_id: i64,
        competition_id: i64,
        now: u64,
    ) -> Result<Option<String>> {
        let tx = self.conn.transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT g.code FROM gift_code_redemptions r
                 JOIN gift_codes g ON g.id = r.gift_code_id
                 WHERE r.competition_id = ?1",
                [competition_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(existing);
        }

        let next: Option<(i64, String)> = tx
            .query_row(
                "SELECT g.id, g.code FROM gift_codes g
                 WHERE NOT EXISTS (
                     SELECT 1 FROM gift_code_redemptions r WHERE r.gift_code_id = g.id
                 )
                 ORDER BY g.id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((gift_code_id, code)) = next else {
            return Ok(None);
        };
        tx.execute(
            "INSERT INTO gift_code_redemptions (gift_code_id, user_id, competition_id, redeemed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![gift_code_id, user_id, competition_id, now],
        )?;
        tx.commit()?;
        Ok(Some(code))
    }

    pub fn unredeemed_gift_codes(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM gift_codes g WHERE NOT EXISTS (
                 SELECT 1 FROM gift_code_redemptions r WHERE r.gift_code_id = g.id
             )",
            [],
            |row| row.get(0),
        )?)
    }
}
