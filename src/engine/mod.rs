//! Engine modules: the runs the bot performs each week.
//!
//! `rotation` turns the saved cycle state into a new competition post;
//! `results` scores a competition thread. Both talk to Reddit through
//! [`crate::reddit::RedditApi`] so `--dry-run` and tests swap in a recorder.

pub mod results;
pub mod rotation;

pub use results::{ScoringOutcome, score_competition};
pub use rotation::{CompetitionPlan, RotationOutcome, plan_next, run_rotation};
