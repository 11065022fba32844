//! Bot configuration file handling.
//!
//! The configuration is plain JSON. Events are typed enums, so a typo in an
//! event name fails at load time rather than halfway through a rotation.
//! Secrets never live here: they are read from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cycle_state::RotationSizes;
use crate::types::Event;

/// Environment variable holding the Reddit app secret
pub const CLIENT_SECRET_ENV: &str = "REDDIT_CLIENT_SECRET";
/// Environment variable holding the bot account password
pub const PASSWORD_ENV: &str = "REDDIT_PASSWORD";

/// Bot configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    // Reddit
    pub subreddit: String,
    pub user_agent: String,
    pub client_id: String,
    pub username: String,

    // Files
    pub state_path: PathBuf,
    pub database_path: PathBuf,
    pub queue_path: PathBuf,

    // Competition layout
    pub core_events: Vec<Event>,
    pub weekly_pool: Vec<Event>,
    pub bonus_pool: Vec<Event>,

    /// Wiki page that receives the results tables, if any
    pub results_wiki_page: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            subreddit: "cubers".to_string(),
            user_agent: "linux:cubecomp:v1.0 (weekly competition bot)".to_string(),
            client_id: String::new(),
            username: String::new(),
            state_path: PathBuf::from("cubecomp_state.json"),
            database_path: PathBuf::from("cubecomp.db"),
            queue_path: PathBuf::from("cubecomp_queue.db"),
            core_events: vec![
                Event::TwoByTwo,
                Event::ThreeByThree,
                Event::FourByFour,
                Event::FiveByFive,
                Event::SixBySix,
                Event::SevenBySeven,
                Event::ThreeBld,
                Event::OneHanded,
                Event::Pyraminx,
                Event::Megaminx,
                Event::Skewb,
                Event::Square1,
                Event::Clock,
                Event::Fmc,
                Event::Coll,
            ],
            weekly_pool: vec![Event::TwoGen, Event::Lse, Event::F2l],
            bonus_pool: vec![
                Event::Kilominx,
                Event::RelayOfThree,
                Event::Relay234,
                Event::FourBld,
                Event::FiveBld,
            ],
            results_wiki_page: None,
        }
    }
}

impl BotConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Subreddit names: 3-21 chars, letters, digits and underscores
        let subreddit = self.subreddit.trim();
        if subreddit.len() < 3 || subreddit.len() > 21 {
            anyhow::bail!("Subreddit name must be 3-21 characters long");
        }
        if !subreddit.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            anyhow::bail!("Subreddit name can only contain letters, numbers, and underscores");
        }

        if self.user_agent.trim().is_empty() {
            anyhow::bail!("User agent must be specified");
        }

        if self.core_events.is_empty() {
            anyhow::bail!("At least one core event is required");
        }
        if self.weekly_pool.is_empty() {
            anyhow::bail!("Weekly event pool must not be empty");
        }
        if self.bonus_pool.len() < 2 {
            anyhow::bail!("Bonus event pool needs at least two events");
        }

        let mut seen = HashSet::new();
        for event in self
            .core_events
            .iter()
            .chain(&self.weekly_pool)
            .chain(&self.bonus_pool)
        {
            if !seen.insert(*event) {
                anyhow::bail!("Event {} appears more than once across core events and pools", event);
            }
        }

        if let Some(page) = &self.results_wiki_page {
            if page.trim().is_empty() || page.contains("..") {
                anyhow::bail!("Results wiki page name is invalid: {:?}", page);
            }
        }

        Ok(())
    }

    /// Credentials are only needed for live runs, so they are checked apart
    /// from [`BotConfig::validate`]
    pub fn validate_credentials(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            anyhow::bail!("Reddit client_id must be specified");
        }
        if self.username.trim().is_empty() {
            anyhow::bail!("Reddit username must be specified");
        }
        Ok(())
    }

    pub fn rotation_sizes(&self, coll_cases: usize) -> RotationSizes {
        RotationSizes {
            weekly: self.weekly_pool.len(),
            bonus: self.bonus_pool.len(),
            coll: coll_cases,
        }
    }
}
