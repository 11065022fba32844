use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cubecomp - weekly speedcubing competition bot for Reddit
#[derive(Parser)]
#[command(name = "cubecomp")]
#[command(about = "Posts weekly speedcubing competitions to Reddit and scores the results")]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dry-run mode: log every Reddit call instead of making it.
    ///
    /// Nothing is persisted: the cycle state file and the database are
    /// read but never written.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Post the next weekly competition
    Rotate {
        /// Seed for the scramble generator (reproducible posts)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Score a competition thread and publish the results
    Score {
        /// Post id to score (defaults to the running competition)
        #[arg(long)]
        post_id: Option<String>,
    },
    /// Print scrambles for one event
    Scramble {
        /// Event name, e.g. "3x3", "Square-1", "LSE"
        event: String,
        /// Number of scrambles (defaults to the event's solve count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// COLL case for COLL scrambles
        #[arg(long)]
        case: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print a setup scramble for a COLL case
    Coll {
        /// Case key, e.g. "B1"
        case: String,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Migrate the database schema
    Migrate {
        /// Target version (defaults to the latest; lower values roll back)
        #[arg(long)]
        target: Option<u32>,
    },
    /// Put a job on the task queue
    Enqueue {
        #[command(subcommand)]
        job: JobCommands,
    },
    /// Run queued jobs
    Worker {
        /// Process at most one job
        #[arg(long)]
        once: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        path: PathBuf,
    },
    /// Show the cycle state
    State {
        /// Write a fresh state file if none exists
        #[arg(long)]
        init: bool,
    },
    /// Manage prize gift codes
    GiftCode {
        #[command(subcommand)]
        action: GiftCodeCommands,
    },
    /// Grant or revoke admin rights for a Reddit user
    Admin {
        name: String,
        #[arg(long)]
        revoke: bool,
    },
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Rotate to the next competition
    Rotate,
    /// Score a competition
    Score {
        #[arg(long)]
        post_id: Option<String>,
    },
    /// Migrate the database to the latest schema
    Migrate,
}

#[derive(Subcommand)]
pub enum GiftCodeCommands {
    /// Add a code to the prize pool
    Add {
        code: String,
        /// Value in cents
        #[arg(long, default_value_t = 0)]
        value_cents: u32,
    },
    /// Count unredeemed codes
    Count,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
