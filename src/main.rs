//! cubecomp - Main entry point
//!
//! Parses the command line, sets up logging and dispatches to the library.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use cubecomp::cli::{Cli, Commands, GiftCodeCommands, JobCommands};
use cubecomp::clock::unix_now;
use cubecomp::coll::{self, CollTable};
use cubecomp::config_file::BotConfig;
use cubecomp::engine::{rotation, run_rotation, score_competition};
use cubecomp::queue::{self, DEFAULT_QUEUE_NAME, Job, TaskQueue};
use cubecomp::reddit::{DryRunReddit, RedditApi, RedditClient, RedditCredentials};
use cubecomp::scramble;
use cubecomp::store::{self, Store};
use cubecomp::types::Event;

/// Initialize tracing; `RUST_LOG` overrides the verbosity flag
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "cubecomp=debug,info",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn load_config(path: Option<&Path>) -> Result<BotConfig> {
    match path {
        Some(path) => {
            debug!("Loading configuration from {:?}", path);
            BotConfig::load_from_file(path)
        }
        None => {
            debug!("No configuration file given, using defaults");
            Ok(BotConfig::default())
        }
    }
}

/// Live client, or a recorder for `--dry-run`
fn reddit_for(config: &BotConfig, dry_run: bool) -> cubecomp::Result<Box<dyn RedditApi>> {
    if dry_run {
        info!("Dry run: Reddit calls are logged, not sent");
        return Ok(Box::new(DryRunReddit::new()));
    }
    let credentials = RedditCredentials::from_config(config)?;
    Ok(Box::new(RedditClient::new(credentials, config.user_agent.clone())?))
}

/// The database, unless this is a dry run
fn store_for(config: &BotConfig, dry_run: bool) -> cubecomp::Result<Option<Store>> {
    if dry_run {
        return Ok(None);
    }
    Store::open(&config.database_path).map(Some)
}

fn rotate(config: &BotConfig, dry_run: bool, seed: Option<u64>) -> cubecomp::Result<()> {
    let mut reddit = reddit_for(config, dry_run)?;
    let mut store = store_for(config, dry_run)?;
    let mut rng = rng_from(seed);
    let state = rotation::load_state(&config.state_path)?;

    let outcome = run_rotation(
        config,
        &state,
        reddit.as_mut(),
        store.as_mut(),
        CollTable::builtin(),
        &mut rng,
        unix_now(),
    )?;

    if dry_run {
        println!("{}\n\n{}", outcome.plan.title(), outcome.plan.body());
    } else {
        outcome.state.save(&config.state_path)?;
        println!("Posted {} at {}", outcome.plan.title(), outcome.submission.url);
    }
    Ok(())
}

fn score(config: &BotConfig, dry_run: bool, post_id: Option<&str>) -> cubecomp::Result<()> {
    let mut reddit = reddit_for(config, dry_run)?;
    let mut store = store_for(config, dry_run)?;
    let state = rotation::load_state(&config.state_path)?;

    let outcome = score_competition(
        config,
        &state,
        post_id,
        reddit.as_mut(),
        store.as_mut(),
        unix_now(),
    )?;

    println!(
        "Scored {} competitors on {} ({} solves recorded)",
        outcome.results.participant_count(),
        outcome.post_id,
        outcome.recorded
    );
    if let Some((winner, code)) = &outcome.gift_code {
        println!("Gift code for u/{winner}: {code}");
    }
    if dry_run {
        println!("\n{}", outcome.results.to_markdown());
    }
    Ok(())
}

fn migrate(config: &BotConfig, dry_run: bool, target: Option<u32>) -> cubecomp::Result<()> {
    if dry_run {
        info!("Dry run: skipping migration of {:?}", config.database_path);
        return Ok(());
    }
    let executed = store::migrate_database(&config.database_path, target)?;
    if executed.is_empty() {
        println!("Database already at the requested version");
    } else {
        println!("Ran migrations {:?}", executed);
    }
    Ok(())
}

fn run_job(config: &BotConfig, dry_run: bool, job: &Job) -> cubecomp::Result<()> {
    match job {
        Job::RotateCompetition => rotate(config, dry_run, None),
        Job::ScoreCompetition { post_id } => score(config, dry_run, post_id.as_deref()),
        Job::Migrate => migrate(config, dry_run, None),
    }
}

fn gift_codes(config: &BotConfig, dry_run: bool, action: GiftCodeCommands) -> cubecomp::Result<()> {
    let Some(store) = store_for(config, dry_run)? else {
        info!("Dry run: not touching gift codes in {:?}", config.database_path);
        return Ok(());
    };
    match action {
        GiftCodeCommands::Add { code, value_cents } => {
            store.add_gift_code(&code, value_cents, unix_now())?;
            println!("Added gift code ({} unredeemed)", store.unredeemed_gift_codes()?);
        }
        GiftCodeCommands::Count => {
            println!("{} unredeemed gift codes", store.unredeemed_gift_codes()?);
        }
    }
    Ok(())
}

fn set_admin(config: &BotConfig, dry_run: bool, name: &str, is_admin: bool) -> cubecomp::Result<()> {
    let Some(store) = store_for(config, dry_run)? else {
        info!("Dry run: not changing admin rights of u/{}", name);
        return Ok(());
    };
    store.upsert_user(name, unix_now())?;
    store.set_admin(name, is_admin)?;
    println!(
        "u/{} is {}an admin",
        name,
        if store.is_admin(name)? { "" } else { "not " }
    );
    Ok(())
}

fn print_scrambles(event: &str, count: Option<usize>, case: Option<&str>, seed: Option<u64>) -> Result<()> {
    let event: Event = event
        .parse()
        .map_err(|_| cubecomp::CubeCompError::UnknownEvent(event.to_string()))?;
    let mut rng = rng_from(seed);
    let table = CollTable::builtin();
    let count = count.unwrap_or_else(|| event.solve_count());
    println!("{event} ({})", event.format());
    for i in 1..=count {
        let scramble = scramble::scramble_event(event, &mut rng, table, case)?;
        println!("{i}. {scramble}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    debug!("CLI arguments parsed");

    let config = load_config(cli.config.as_deref())?;
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Rotate { seed } => {
            config.validate()?;
            rotate(&config, dry_run, seed).context("Rotation failed")?;
        }
        Commands::Score { post_id } => {
            config.validate()?;
            score(&config, dry_run, post_id.as_deref()).context("Scoring failed")?;
        }
        Commands::Scramble {
            event,
            count,
            case,
            seed,
        } => print_scrambles(&event, count, case.as_deref(), seed)?,
        Commands::Coll { case, seed } => {
            let mut rng = rng_from(seed);
            println!("{}", coll::setup_scramble(&case, &mut rng)?);
        }
        Commands::Migrate { target } => {
            migrate(&config, dry_run, target).context("Migration failed")?;
        }
        Commands::Enqueue { job } => {
            let job = match job {
                JobCommands::Rotate => Job::RotateCompetition,
                JobCommands::Score { post_id } => Job::ScoreCompetition { post_id },
                JobCommands::Migrate => Job::Migrate,
            };
            let mut queue = queue::from_env(&config.queue_path, DEFAULT_QUEUE_NAME)?;
            queue.enqueue(&job)?;
            let waiting = queue.len()?;
            println!("Queued {} on {} ({} waiting)", job, queue.name(), waiting);
        }
        Commands::Worker { once } => {
            config.validate()?;
            let mut queue = queue::from_env(&config.queue_path, DEFAULT_QUEUE_NAME)?;
            let stats = queue::drain(&mut queue, once.then_some(1), |job| {
                run_job(&config, dry_run, job)
            })?;
            println!(
                "Processed {} jobs ({} failed)",
                stats.processed(),
                stats.failed
            );
            if stats.failed > 0 {
                error!("{} jobs failed", stats.failed);
                std::process::exit(1);
            }
        }
        Commands::Validate { path } => {
            info!("Validating configuration file: {:?}", path);
            let config = BotConfig::load_from_file(&path)?;
            match config.validate() {
                Ok(()) => println!("✓ Configuration file is valid: {:?}", path),
                Err(e) => {
                    error!("Configuration validation failed: {}", e);
                    eprintln!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::State { init } => {
            let state = rotation::load_state(&config.state_path)?;
            if init && !config.state_path.exists() && !dry_run {
                state.save(&config.state_path)?;
            }
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::GiftCode { action } => gift_codes(&config, dry_run, action)?,
        Commands::Admin { name, revoke } => set_admin(&config, dry_run, &name, !revoke)?,
    }

    Ok(())
}
