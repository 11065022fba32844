//! Scoring a finished competition thread.
//!
//! Top-level comments are parsed into submissions, ranked per event and
//! published either to the results wiki page or as a reply on the thread.
//! With a database open, every accepted solve is recorded and the overall
//! winner is handed the next unredeemed gift code.

use tracing::{debug, info, warn};

use crate::config_file::BotConfig;
use crate::cycle_state::CycleState;
use crate::engine::rotation::competition_events;
use crate::error::{CubeCompError, Result};
use crate::reddit::{Comment, RedditApi};
use crate::scoring::CompetitionResults;
use crate::store::Store;
use crate::types::Event;

/// Authors whose comments are never submissions
const IGNORED_AUTHORS: &[&str] = &["[deleted]", "AutoModerator"];

#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    pub post_id: String,
    pub competition_number: Option<u32>,
    pub results: CompetitionResults,
    /// Solves written to the database
    pub recorded: usize,
    /// `(winner, code)` when a gift code was handed out
    pub gift_code: Option<(String, String)>,
}

/// The post to score: the explicit id, else the running competition
pub fn target_post(state: &CycleState, post_id: Option<&str>) -> Result<String> {
    post_id
        .map(str::to_string)
        .or_else(|| state.current_post_id.clone())
        .ok_or_else(|| CubeCompError::state("no competition post to score"))
}

fn submissions<'a>(comments: &'a [Comment], bot_user: &str) -> Vec<(&'a str, &'a str)> {
    comments
        .iter()
        .filter(|c| {
            let ignored = IGNORED_AUTHORS.contains(&c.author.as_str())
                || c.author.eq_ignore_ascii_case(bot_user);
            if ignored {
                debug!("Skipping comment {} by {}", c.id, c.author);
            }
            !ignored
        })
        .map(|c| (c.author.as_str(), c.body.as_str()))
        .collect()
}

pub fn score_competition(
    config: &BotConfig,
    state: &CycleState,
    post_id: Option<&str>,
    reddit: &mut dyn RedditApi,
    mut store: Option<&mut Store>,
    now: u64,
) -> Result<ScoringOutcome> {
    let post_id = target_post(state, post_id)?;

    let record = match store.as_deref() {
        Some(store) => store.competition_by_post(&post_id)?,
        None => None,
    };
    let events: Vec<Event> = match &record {
        Some(record) => record.events.clone(),
        None => {
            debug!("Competition for {} not in the database; using the cycle state", post_id);
            competition_events(config, state)?
                .into_iter()
                .map(|(event, _)| event)
                .collect()
        }
    };

    let comments = reddit.fetch_comments(&post_id)?;
    let results = CompetitionResults::score(&events, submissions(&comments, &config.username));
    info!(
        "Scored {} competitors across {} events from {} comments",
        results.participant_count(),
        results.events.len(),
        comments.len()
    );

    let mut recorded = 0;
    let mut gift_code = None;
    if let (Some(store), Some(record)) = (store.as_deref_mut(), &record) {
        for (event, placements) in &results.events {
            for placement in placements {
                let user_id = store.upsert_user(&placement.entry.user, now)?;
                store.record_solves(record.id, *event, user_id, &placement.entry.attempts)?;
                recorded += placement.entry.attempts.len();
            }
        }

        if let Some(awarded) = store.redemption_for(record.id)? {
            debug!("Competition {} already awarded its gift code to u/{}", record.number, awarded.0);
            gift_code = Some(awarded);
        } else if let Some((winner, _)) = results.standings().first() {
            let user_id = store.upsert_user(winner, now)?;
            match store.redeem_next_gift_code(user_id, record.id, now)? {
                Some(code) => {
                    info!("Gift code reserved for u/{}", winner);
                    gift_code = Some((winner.clone(), code));
                }
                None => warn!("No gift codes left for u/{}", winner),
            }
        }
    }

    let title = match &record {
        Some(r) => format!("Results: {}", r.title),
        None => format!("Results for {post_id}"),
    };
    let markdown = format!("# {title}\n\n{}", results.to_markdown());
    match &config.results_wiki_page {
        Some(page) => reddit.edit_wiki_page(&config.subreddit, page, &markdown)?,
        None => reddit.submit_comment(&post_id, &markdown)?,
    }

    Ok(ScoringOutcome {
        post_id,
        competition_number: record.map(|r| r.number),
        results,
        recorded,
        gift_code,
    })
}
