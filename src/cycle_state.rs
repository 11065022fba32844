//! Weekly rotation state
//!
//! The bot keeps a small record between runs: which events are currently
//! featured, the competition number, the COLL case index and the ids of the
//! current and previous competition posts. It is read once at the start of a
//! run and rewritten wholesale at the end.
//!
//! # Rotation
//!
//! ```text
//! competition_number  n        -> n + 1
//! weekly_event        w        -> (w + 1) mod |weekly pool|
//! bonus_event_a/b     (a, b)   -> (b + 1, b + 2) mod |bonus pool|
//! coll_index          c        -> (c + 1) mod |COLL cases|
//! previous_post_id    p        -> current_post_id
//! current_post_id     q        -> None (set once the new post exists)
//! ```
//!
//! The very first rotation (no `last_rotated_at`) only bumps the competition
//! number so that competition 1 starts at index 0 of every pool.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{CubeCompError, Result};
use crate::types::Event;

/// Persisted rotation state, field order is part of the file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub weekly_event: usize,
    pub bonus_event_a: usize,
    pub bonus_event_b: usize,
    pub competition_number: u32,
    pub coll_index: usize,
    pub current_post_id: Option<String>,
    pub previous_post_id: Option<String>,
    /// Unix seconds of the last rotation
    pub last_rotated_at: Option<u64>,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            weekly_event: 0,
            bonus_event_a: 0,
            bonus_event_b: 1,
            competition_number: 0,
            coll_index: 0,
            current_post_id: None,
            previous_post_id: None,
            last_rotated_at: None,
        }
    }
}

/// Sizes of everything the state indexes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSizes {
    pub weekly: usize,
    pub bonus: usize,
    pub coll: usize,
}

impl CycleState {
    /// Load state from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;
        debug!("Loaded cycle state from {:?}: {:?}", path, state);
        Ok(state)
    }

    /// Save state by writing a sibling temp file and renaming it over the
    /// target, so a crash never leaves a half-written state file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!(
            "Saved cycle state (competition {}) to {:?}",
            self.competition_number, path
        );
        Ok(())
    }

    /// Returns the state for the next competition. Pure: `self` is untouched.
    pub fn advance(&self, sizes: RotationSizes, now: u64) -> Result<Self> {
        if sizes.weekly == 0 {
            return Err(CubeCompError::state("weekly event pool is empty"));
        }
        if sizes.bonus < 2 {
            return Err(CubeCompError::state("bonus event pool needs at least two events"));
        }
        if sizes.coll == 0 {
            return Err(CubeCompError::state("COLL table is empty"));
        }

        let first_rotation = self.last_rotated_at.is_none();
        let (weekly_event, bonus_event_a, bonus_event_b, coll_index) = if first_rotation {
            (
                self.weekly_event % sizes.weekly,
                self.bonus_event_a % sizes.bonus,
                self.bonus_event_b % sizes.bonus,
                self.coll_index % sizes.coll,
            )
        } else {
            let a = (self.bonus_event_b + 1) % sizes.bonus;
            (
                (self.weekly_event + 1) % sizes.weekly,
                a,
                (a + 1) % sizes.bonus,
                (self.coll_index + 1) % sizes.coll,
            )
        };

        Ok(Self {
            weekly_event,
            bonus_event_a,
            bonus_event_b,
            competition_number: self.competition_number + 1,
            coll_index,
            current_post_id: None,
            previous_post_id: self.current_post_id.clone(),
            last_rotated_at: Some(now),
        })
    }

    /// Record the id of the freshly submitted competition post
    pub fn with_post(mut self, post_id: impl Into<String>) -> Self {
        self.current_post_id = Some(post_id.into());
        self
    }

    /// The featured weekly event from `pool`
    pub fn weekly(&self, pool: &[Event]) -> Option<Event> {
        pool.get(self.weekly_event).copied()
    }

    /// The two bonus events from `pool`
    pub fn bonus(&self, pool: &[Event]) -> Option<(Event, Event)> {
        Some((*pool.get(self.bonus_event_a)?, *pool.get(self.bonus_event_b)?))
    }
}
