// Integration tests for cubecomp
//
// Whole weekly cycles against the dry-run Reddit recorder, with the state
// file, database and file queue living in a temp directory.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

use cubecomp::coll::CollTable;
use cubecomp::config_file::BotConfig;
use cubecomp::cycle_state::CycleState;
use cubecomp::engine::rotation::load_state;
use cubecomp::engine::{run_rotation, score_competition};
use cubecomp::queue::{self, Job, QueueBackend, TaskQueue};
use cubecomp::reddit::{Comment, DryRunReddit, RedditCall};
use cubecomp::store::{self, Store};
use cubecomp::types::Event;

fn config_in(dir: &Path) -> BotConfig {
    BotConfig {
        username: "cubecomp_bot".to_string(),
        state_path: dir.join("state").join("cycle.json"),
        database_path: dir.join("cubecomp.db"),
        queue_path: dir.join("queue.db"),
        ..BotConfig::default()
    }
}

fn comment(author: &str, body: &str) -> Comment {
    Comment {
        id: format!("c_{author}"),
        author: author.to_string(),
        body: body.to_string(),
    }
}

#[test]
fn test_three_week_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(dir.path());
    let mut store = Store::open(&config.database_path).expect("open store");
    let mut reddit = DryRunReddit::new();
    reddit.sidebar = "Welcome to the sub.".to_string();
    let mut rng = StdRng::seed_from_u64(2024);

    let mut weekly = Vec::new();
    for week in 1..=3u64 {
        let state = load_state(&config.state_path).expect("load state");
        let outcome = run_rotation(
            &config,
            &state,
            &mut reddit,
            Some(&mut store),
            CollTable::builtin(),
            &mut rng,
            week * 604_800,
        )
        .expect("rotation");
        outcome.state.save(&config.state_path).expect("save state");
        weekly.push(outcome.plan.weekly);
        assert_eq!(outcome.plan.number as u64, week);
    }

    // The weekly pool is walked in order
    assert_eq!(weekly, vec![Event::TwoGen, Event::Lse, Event::F2l]);

    let state = CycleState::load(&config.state_path).expect("reload");
    assert_eq!(state.competition_number, 3);
    assert_eq!(state.current_post_id.as_deref(), Some("dryrun3"));
    assert_eq!(state.previous_post_id.as_deref(), Some("dryrun2"));
    assert_eq!(state.coll_index, 2);

    // Moderator text is untouched and only one bot block exists
    assert!(reddit.sidebar.starts_with("Welcome to the sub."));
    assert!(reddit.sidebar.contains("Weekly Competition 3"));
    assert_eq!(reddit.sidebar.matches("[](#comp-start)").count(), 1);

    let unstickied: Vec<&RedditCall> = reddit
        .calls
        .iter()
        .filter(|c| matches!(c, RedditCall::SetSticky { sticky: false, .. }))
        .collect();
    assert_eq!(unstickied.len(), 2);

    let active: Vec<u32> = (1..=3)
        .filter(|n| store.competition_by_number(*n).unwrap().unwrap().active)
        .collect();
    assert_eq!(active, vec![3]);
}

#[test]
fn test_rotate_then_score() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(dir.path());
    let mut store = Store::open(&config.database_path).expect("open store");
    let mut reddit = DryRunReddit::new();
    let mut rng = StdRng::seed_from_u64(7);

    let outcome = run_rotation(
        &config,
        &CycleState::default(),
        &mut reddit,
        Some(&mut store),
        CollTable::builtin(),
        &mut rng,
        1,
    )
    .expect("rotation");
    let post_id = outcome.submission.id.clone();

    let mut reddit = reddit.with_comments(
        &post_id,
        vec![
            comment("alice", "3x3: 9.00, 9.50, 10.00, 8.75, 9.25\n2GEN: 6, 6, 6, 6, 6"),
            comment("bob", "**3x3**: 11, 12, DNF, 11.5, 12\nFMC: 30, 28, 31"),
            comment("cubecomp_bot", "3x3: 1, 1, 1, 1, 1"),
        ],
    );
    store.add_gift_code("WINNER-01", 1000, 0).expect("gift code");

    let scored = score_competition(
        &config,
        &outcome.state,
        None,
        &mut reddit,
        Some(&mut store),
        2,
    )
    .expect("scoring");

    assert_eq!(scored.post_id, post_id);
    assert_eq!(scored.competition_number, Some(1));
    assert_eq!(scored.results.participant_count(), 2);
    assert_eq!(scored.recorded, 5 + 5 + 5 + 3);
    assert_eq!(scored.gift_code.as_ref().map(|(u, _)| u.as_str()), Some("alice"));

    let three = &scored.results.events[&Event::ThreeByThree];
    assert_eq!(three[0].entry.user, "alice");
    assert_eq!(three[1].entry.user, "bob");
    assert!(reddit.calls.contains(&RedditCall::SubmitComment { post_id }));
}

#[test]
fn test_file_queue_drives_jobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_in(dir.path());

    let mut backend =
        queue::select_backend(|_| None, &config.queue_path, queue::DEFAULT_QUEUE_NAME)
            .expect("backend");
    assert!(matches!(backend, QueueBackend::File(_)));

    backend.enqueue(&Job::Migrate).expect("enqueue");
    backend.enqueue(&Job::RotateCompetition).expect("enqueue");
    backend
        .enqueue(&Job::ScoreCompetition { post_id: None })
        .expect("enqueue");

    let mut reddit = DryRunReddit::new();
    let mut rng = StdRng::seed_from_u64(1);
    let stats = queue::drain(&mut backend, None, |job| match job {
        Job::Migrate => store::migrate_database(&config.database_path, None).map(|_| ()),
        Job::RotateCompetition => {
            let state = load_state(&config.state_path)?;
            let mut store = Store::open(&config.database_path)?;
            let outcome = run_rotation(
                &config,
                &state,
                &mut reddit,
                Some(&mut store),
                CollTable::builtin(),
                &mut rng,
                10,
            )?;
            outcome.state.save(&config.state_path)
        }
        Job::ScoreCompetition { post_id } => {
            let state = load_state(&config.state_path)?;
            let mut store = Store::open(&config.database_path)?;
            score_competition(&config, &state, post_id.as_deref(), &mut reddit, Some(&mut store), 20)
                .map(|_| ())
        }
    })
    .expect("drain");

    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 0);
    assert!(backend.is_empty().expect("len"));
    assert!(
        reddit
            .calls
            .iter()
            .any(|c| matches!(c, RedditCall::SubmitComment { .. }))
    );
}

#[test]
fn test_migrate_database_down_and_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cubecomp.db");

    let up = store::migrate_database(&path, None).expect("up");
    assert_eq!(up, (1..=store::latest_version()).collect::<Vec<_>>());

    {
        let mut store = Store::open(&path).expect("open");
        store
            .insert_competition(1, "Weekly Competition 1", 0, &[])
            .expect("insert");
    }

    let down = store::migrate_database(&path, Some(5)).expect("down");
    assert_eq!(down, vec![7, 6]);

    // Reopening brings the schema back and keeps the data
    let store = Store::open(&path).expect("reopen");
    assert_eq!(
        store::current_version(store.connection()).expect("version"),
        store::latest_version()
    );
    assert!(store.competition_by_number(1).expect("query").is_some());
}
