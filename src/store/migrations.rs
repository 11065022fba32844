//! Ordered schema migrations.
//!
//! Each step has an `up` and a `down`. The applied version lives in
//! `PRAGMA user_version`; every step runs in its own transaction and bumps
//! the version as part of it, so a failed step leaves the previous version
//! in place.
//!
//! | Version | Change |
//! |---------|--------|
//! | 1 | events, competitions, competition_events, users, user_solves |
//! | 2 | `events.description` |
//! | 3 | widen `competition_events.scrambles` to 8192 |
//! | 4 | skipped (see below) |
//! | 5 | seed event descriptions |
//! | 6 | gift codes and redemptions |
//! | 7 | `users.is_admin` |

use rusqlite::{Connection, Transaction, params};
use strum::IntoEnumIterator;
use tracing::{info, warn};

use crate::error::{CubeCompError, Result};
use crate::types::Event;

type Step = fn(&Transaction<'_>) -> rusqlite::Result<()>;

/// One reversible schema change
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    up: Step,
    down: Step,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial schema",
        up: initial_up,
        down: initial_down,
    },
    Migration {
        version: 2,
        name: "add event descriptions",
        up: description_column_up,
        down: description_column_down,
    },
    Migration {
        version: 3,
        name: "widen scramble column",
        up: widen_scrambles_up,
        down: widen_scrambles_down,
    },
    Migration {
        version: 4,
        name: "skipped: event format constraint",
        up: skipped,
        down: skipped,
    },
    Migration {
        version: 5,
        name: "seed event descriptions",
        up: seed_descriptions_up,
        down: seed_descriptions_down,
    },
    Migration {
        version: 6,
        name: "gift codes",
        up: gift_codes_up,
        down: gift_codes_down,
    },
    Migration {
        version: 7,
        name: "admin users",
        up: admin_users_up,
        down: admin_users_down,
    },
];

/// Declared width of `competition_events.scrambles` after version 3.
/// SQLite does not enforce VARCHAR widths, so inserts check it.
pub const SCRAMBLES_WIDTH: usize = 8192;

/// Newest schema version
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Runs `up` steps or `down` steps until the schema is at `target`.
///
/// Foreign keys are switched off for the duration (table rebuilds need it)
/// and checked before they are switched back on. Returns the versions that
/// were applied or reverted, in execution order.
pub fn migrate_to(conn: &mut Connection, target: u32) -> Result<Vec<u32>> {
    let latest = latest_version();
    if target > latest {
        return Err(CubeCompError::migration(format!(
            "target version {target} is newer than the latest known version {latest}"
        )));
    }

    conn.pragma_update(None, "foreign_keys", false)?;
    let outcome = run_steps(conn, target);
    let check = foreign_key_violations(conn);
    conn.pragma_update(None, "foreign_keys", true)?;

    let executed = outcome?;
    let violations = check?;
    if violations > 0 {
        return Err(CubeCompError::migration(format!(
            "{violations} foreign key violations after migrating to version {target}"
        )));
    }
    Ok(executed)
}

fn run_steps(conn: &mut Connection, target: u32) -> Result<Vec<u32>> {
    let current = current_version(conn)?;
    let mut executed = Vec::new();

    if target >= current {
        for migration in MIGRATIONS
            .iter()
            .filter(|m| m.version > current && m.version <= target)
        {
            info!("Applying migration {}: {}", migration.version, migration.name);
            let tx = conn.transaction()?;
            (migration.up)(&tx).map_err(|e| step_error(migration, "up", e))?;
            tx.pragma_update(None, "user_version", migration.version)?;
            tx.commit()?;
            executed.push(migration.version);
        }
    } else {
        for migration in MIGRATIONS
            .iter()
            .rev()
            .filter(|m| m.version <= current && m.version > target)
        {
            info!("Reverting migration {}: {}", migration.version, migration.name);
            let tx = conn.transaction()?;
            (migration.down)(&tx).map_err(|e| step_error(migration, "down", e))?;
            tx.pragma_update(None, "user_version", migration.version - 1)?;
            tx.commit()?;
            executed.push(migration.version);
        }
    }
    Ok(executed)
}

fn step_error(migration: &Migration, direction: &str, err: rusqlite::Error) -> CubeCompError {
    CubeCompError::migration(format!(
        "migration {} ({}) {} failed: {}",
        migration.version, migration.name, direction, err
    ))
}

fn foreign_key_violations(conn: &Connection) -> Result<usize> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let mut count = 0;
    while rows.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

// ============================================================================
// Version 1
// ============================================================================

fn initial_up(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE events (
            id INTEGER PRIMARY KEY,
            name VARCHAR(64) NOT NULL UNIQUE,
            code VARCHAR(64) NOT NULL UNIQUE,
            format VARCHAR(8) NOT NULL
        );

        CREATE TABLE competitions (
            id INTEGER PRIMARY KEY,
            number INTEGER NOT NULL UNIQUE,
            title VARCHAR(128) NOT NULL,
            reddit_post_id VARCHAR(16),
            started_at INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE competition_events (
            id INTEGER PRIMARY KEY,
            competition_id INTEGER NOT NULL REFERENCES competitions(id) ON DELETE CASCADE,
            event_id INTEGER NOT NULL REFERENCES events(id),
            scrambles VARCHAR(2048) NOT NULL,
            UNIQUE(competition_id, event_id)
        );
        CREATE INDEX idx_competition_events_competition ON competition_events(competition_id);

        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            reddit_name VARCHAR(64) NOT NULL UNIQUE COLLATE NOCASE,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE user_solves (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            competition_event_id INTEGER NOT NULL
                REFERENCES competition_events(id) ON DELETE CASCADE,
            solve_index INTEGER NOT NULL,
            value INTEGER,
            penalty VARCHAR(3),
            UNIQUE(user_id, competition_event_id, solve_index)
        );
        CREATE INDEX idx_user_solves_user ON user_solves(user_id);
        "#,
    )?;

    let mut insert =
        tx.prepare("INSERT INTO events (name, code, format) VALUES (?1, ?2, ?3)")?;
    for event in Event::iter() {
        insert.execute(params![
            event.to_string(),
            event.code(),
            event.format().to_string()
        ])?;
    }
    Ok(())
}

fn initial_down(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        DROP TABLE user_solves;
        DROP TABLE users;
        DROP TABLE competition_events;
        DROP TABLE competitions;
        DROP TABLE events;
        "#,
    )
}

// ============================================================================
// Version 2
// ============================================================================

fn description_column_up(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("ALTER TABLE events ADD COLUMN description TEXT")
}

fn description_column_down(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("ALTER TABLE events DROP COLUMN description")
}

// ============================================================================
// Version 3
// ============================================================================

/// SQLite cannot alter a column type in place, so the table is rebuilt
fn rebuild_competition_events(tx: &Transaction<'_>, width: usize) -> rusqlite::Result<()> {
    tx.execute_batch(&format!(
        r#"
        CREATE TABLE competition_events_rebuild (
            id INTEGER PRIMARY KEY,
            competition_id INTEGER NOT NULL REFERENCES competitions(id) ON DELETE CASCADE,
            event_id INTEGER NOT NULL REFERENCES events(id),
            scrambles VARCHAR({width}) NOT NULL,
            UNIQUE(competition_id, event_id)
        );
        INSERT INTO competition_events_rebuild (id, competition_id, event_id, scrambles)
            SELECT id, competition_id, event_id, scrambles FROM competition_events;
        DROP TABLE competition_events;
        ALTER TABLE competition_events_rebuild RENAME TO competition_events;
        CREATE INDEX idx_competition_events_competition ON competition_events(competition_id);
        "#
    ))
}

fn widen_scrambles_up(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    rebuild_competition_events(tx, SCRAMBLES_WIDTH)
}

fn widen_scrambles_down(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    rebuild_competition_events(tx, 2048)
}

// ============================================================================
// Version 4
// ============================================================================

/// Version 4 was meant to add a CHECK constraint on `events.format`. The
/// rebuild it needs held a write lock on `events` long enough to time out
/// the running bot, so it was shipped as a no-op. The number stays reserved
/// so databases that recorded it keep a consistent history.
fn skipped(_tx: &Transaction<'_>) -> rusqlite::Result<()> {
    warn!("Migration 4 is intentionally empty");
    Ok(())
}

// ============================================================================
// Version 5
// ============================================================================

const DESCRIPTIONS: &[(&str, &str)] = &[
    ("2x2", "The 2x2x2 Pocket Cube."),
    ("3x3", "The classic 3x3x3 Rubik's Cube."),
    ("4x4", "The 4x4x4 Rubik's Revenge."),
    ("5x5", "The 5x5x5 Professor's Cube."),
    ("6x6", "The 6x6x6 cube, scored as a mean of 3."),
    ("7x7", "The 7x7x7 cube, scored as a mean of 3."),
    ("3BLD", "3x3 blindfolded: inspect, put on the blindfold, solve. Best of 3."),
    ("4BLD", "4x4 blindfolded. Best of 3."),
    ("5BLD", "5x5 blindfolded. Best of 3."),
    ("3x3OH", "3x3 solved with one hand."),
    ("Pyraminx", "The tetrahedral Pyraminx, tips included."),
    ("Megaminx", "The dodecahedral Megaminx, Pochmann notation."),
    ("Skewb", "The corner-turning Skewb."),
    ("Square-1", "The shape-shifting Square-1."),
    ("Clock", "Rubik's Clock, WCA pin notation."),
    ("FMC", "Fewest moves: find the shortest solution you can in one hour. Mean of 3."),
    ("COLL", "Solve the last layer from a COLL case in one algorithm. The case changes weekly."),
    ("2GEN", "3x3 scrambled with R and U turns only."),
    ("LSE", "Last six edges of Roux: M and U turns only."),
    ("F2L", "First two layers with the cross already solved."),
    ("Kilominx", "The 2x2 equivalent of the Megaminx."),
    ("3x3 Relay of 3", "Three 3x3 solves back to back, one timer."),
    ("2-3-4 Relay", "2x2, 3x3 and 4x4 back to back, one timer."),
];

fn seed_descriptions_up(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    let mut update = tx.prepare("UPDATE events SET description = ?1 WHERE name = ?2")?;
    for (name, description) in DESCRIPTIONS {
        update.execute(params![description, name])?;
    }
    Ok(())
}

fn seed_descriptions_down(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    let mut clear = tx.prepare("UPDATE events SET description = NULL WHERE name = ?1")?;
    for (name, _) in DESCRIPTIONS {
        clear.execute(params![name])?;
    }
    Ok(())
}

/// Seeded description of an event, for rows inserted after version 5
pub fn default_description(event: Event) -> Option<&'static str> {
    let name = event.to_string();
    DESCRIPTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}

// ============================================================================
// Version 6
// ============================================================================

fn gift_codes_up(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE gift_codes (
            id INTEGER PRIMARY KEY,
            code VARCHAR(64) NOT NULL UNIQUE,
            value_cents INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE gift_code_redemptions (
            id INTEGER PRIMARY KEY,
            gift_code_id INTEGER NOT NULL UNIQUE REFERENCES gift_codes(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            competition_id INTEGER NOT NULL REFERENCES competitions(id),
            redeemed_at INTEGER NOT NULL
        );
        CREATE INDEX idx_gift_code_redemptions_user ON gift_code_redemptions(user_id);
        "#,
    )
}

fn gift_codes_down(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        DROP TABLE gift_code_redemptions;
        DROP TABLE gift_codes;
        "#,
    )
}

// ============================================================================
// Version 7
// ============================================================================

fn admin_users_up(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("ALTER TABLE users ADD COLUMN is_admin INTEGER NOT NULL DEFAULT 0")
}

fn admin_users_down(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("ALTER TABLE users DROP COLUMN is_admin")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version as usize, i + 1);
        }
        assert_eq!(latest_version(), 7);
    }

    #[test]
    fn test_migrate_up_to_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = migrate_to(&mut conn, latest_version()).unwrap();
        assert_eq!(applied, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(current_version(&conn).unwrap(), 7);
        assert!(columns(&conn, "events").contains(&"description".to_string()));
        assert!(columns(&conn, "users").contains(&"is_admin".to_string()));
        assert!(table_exists(&conn, "gift_codes"));

        let description: Option<String> = conn
            .query_row("SELECT description FROM events WHERE name = 'LSE'", [], |r| r.get(0))
            .unwrap();
        assert!(description.unwrap().contains("M and U"));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 7).unwrap();
        assert!(migrate_to(&mut conn, 7).unwrap().is_empty());
    }

    #[test]
    fn test_migrate_down_and_back_up() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 7).unwrap();

        let reverted = migrate_to(&mut conn, 4).unwrap();
        assert_eq!(reverted, vec![7, 6, 5]);
        assert_eq!(current_version(&conn).unwrap(), 4);
        assert!(!table_exists(&conn, "gift_codes"));
        assert!(!columns(&conn, "users").contains(&"is_admin".to_string()));
        let described: i64 = conn
            .query_row("SELECT COUNT(*) FROM events WHERE description IS NOT NULL", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(described, 0);

        migrate_to(&mut conn, 0).unwrap();
        assert!(!table_exists(&conn, "events"));

        migrate_to(&mut conn, 7).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 7);
    }

    #[test]
    fn test_widening_keeps_rows_and_solves() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 2).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO competitions (id, number, title, started_at) VALUES (1, 1, 'Week 1', 0);
            INSERT INTO competition_events (id, competition_id, event_id, scrambles)
                VALUES (10, 1, 2, 'R U R''');
            INSERT INTO users (id, reddit_name, created_at) VALUES (5, 'alice', 0);
            INSERT INTO user_solves (user_id, competition_event_id, solve_index, value)
                VALUES (5, 10, 0, 1234);
            "#,
        )
        .unwrap();

        migrate_to(&mut conn, 3).unwrap();
        let scrambles: String = conn
            .query_row("SELECT scrambles FROM competition_events WHERE id = 10", [], |r| r.get(0))
            .unwrap();
        assert_eq!(scrambles, "R U R'");
        let solves: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_solves", [], |r| r.get(0))
            .unwrap();
        assert_eq!(solves, 1);

        let ddl: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = 'competition_events'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(ddl.contains("VARCHAR(8192)"));
    }

    #[test]
    fn test_rejects_unknown_target() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = migrate_to(&mut conn, 99).unwrap_err();
        assert!(matches!(err, CubeCompError::Migration(_)));
    }

    #[test]
    fn test_every_event_has_a_description() {
        for event in Event::iter() {
            assert!(default_description(event).is_some(), "{event}");
        }
    }
}
