//! cubecomp library
//!
//! Core of the weekly speedcubing competition bot: scramble generation,
//! result scoring, the rotation state, the SQLite store with its migrations,
//! the background job queue and the Reddit client.

pub mod cli;
pub mod clock;
pub mod coll;
pub mod config_file;
pub mod cycle_state;
pub mod engine;
pub mod error;
pub mod queue;
pub mod reddit;
pub mod scoring;
pub mod scramble;
pub mod sidebar;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use coll::{CollTable, invert_algorithm, invert_move, setup_scramble};
pub use config_file::BotConfig;
pub use cycle_state::{CycleState, RotationSizes};
pub use engine::{CompetitionPlan, RotationOutcome, ScoringOutcome, run_rotation, score_competition};
pub use error::{CubeCompError, Result};
pub use queue::{Job, QueueBackend, TaskQueue, select_backend};
pub use reddit::{DryRunReddit, RedditApi, RedditClient};
pub use scoring::{Attempt, CompetitionResults, Outcome};
pub use store::Store;
pub use types::{Event, EventFormat};
