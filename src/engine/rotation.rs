//! Weekly rotation: from the saved cycle state to a live competition post.
//!
//! # Steps
//!
//! | Step | Effect |
//! |------|--------|
//! | Load | [`load_state`]; a missing file starts from scratch |
//! | Advance | next competition number, events and COLL case |
//! | Plan | generate every scramble and render the post |
//! | Submit | create the post |
//! | Unsticky | release the previous competition post, if any |
//! | Sticky | pin the new post |
//! | Sidebar | rewrite the bot's sidebar block |
//! | Record | store the competition in the database, if one is open |
//! | Save | [`CycleState::save`] on the returned state |
//!
//! [`run_rotation`] covers Advance through Record. Load and Save stay with
//! the caller so a dry run can skip the save. Nothing is written to Reddit
//! before every scramble has been generated.

use rand::Rng;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::coll::CollTable;
use crate::config_file::BotConfig;
use crate::cycle_state::CycleState;
use crate::error::{CubeCompError, Result};
use crate::reddit::{RedditApi, Submission};
use crate::scramble;
use crate::sidebar::{self, SidebarInfo};
use crate::store::{NewCompetitionEvent, Store};
use crate::types::Event;

/// Why an event is in a competition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRole {
    Core,
    Weekly,
    Bonus,
}

impl fmt::Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Weekly => write!(f, "event of the week"),
            Self::Bonus => write!(f, "bonus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEvent {
    pub event: Event,
    pub role: EventRole,
    pub scrambles: Vec<String>,
}

/// Everything needed to post one competition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionPlan {
    pub number: u32,
    pub weekly: Event,
    pub bonus: (Event, Event),
    /// Set when the competition runs COLL
    pub coll_case: Option<String>,
    pub events: Vec<PlannedEvent>,
}

/// Core events first, then the weekly event, then the two bonus events
pub fn competition_events(config: &BotConfig, state: &CycleState) -> Result<Vec<(Event, EventRole)>> {
    let weekly = state
        .weekly(&config.weekly_pool)
        .ok_or_else(|| CubeCompError::state("weekly index is outside the weekly pool"))?;
    let (bonus_a, bonus_b) = state
        .bonus(&config.bonus_pool)
        .ok_or_else(|| CubeCompError::state("bonus index is outside the bonus pool"))?;

    let mut events: Vec<(Event, EventRole)> = config
        .core_events
        .iter()
        .map(|e| (*e, EventRole::Core))
        .collect();
    events.push((weekly, EventRole::Weekly));
    events.push((bonus_a, EventRole::Bonus));
    events.push((bonus_b, EventRole::Bonus));
    Ok(events)
}

impl CompetitionPlan {
    /// Generates the scrambles of the competition described by `state`
    /// (an already advanced state)
    pub fn build<R: Rng + ?Sized>(
        config: &BotConfig,
        state: &CycleState,
        coll_table: &CollTable,
        rng: &mut R,
    ) -> Result<Self> {
        let roles = competition_events(config, state)?;
        let runs_coll = roles.iter().any(|(e, _)| *e == Event::Coll);
        let coll_case = if runs_coll {
            let case = coll_table
                .case_at(state.coll_index)
                .ok_or_else(|| CubeCompError::state("COLL table is empty"))?;
            Some(case.key.clone())
        } else {
            None
        };

        let mut events = Vec::with_capacity(roles.len());
        for (event, role) in roles {
            let scrambles =
                scramble::scrambles_for(event, rng, coll_table, coll_case.as_deref())?;
            events.push(PlannedEvent {
                event,
                role,
                scrambles,
            });
        }

        let weekly = events
            .iter()
            .find(|e| e.role == EventRole::Weekly)
            .map(|e| e.event)
            .ok_or_else(|| CubeCompError::state("plan has no weekly event"))?;
        let mut bonus = events.iter().filter(|e| e.role == EventRole::Bonus).map(|e| e.event);
        let bonus = match (bonus.next(), bonus.next()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(CubeCompError::state("plan needs two bonus events")),
        };

        Ok(Self {
            number: state.competition_number,
            weekly,
            bonus,
            coll_case,
            events,
        })
    }

    pub fn title(&self) -> String {
        format!("Weekly Competition {}", self.number)
    }

    /// Markdown body of the competition post
    pub fn body(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Welcome to Weekly Competition {}! This week's featured event is **{}**, \
             with **{}** and **{}** as bonus events.\n\n",
            self.number, self.weekly, self.bonus.0, self.bonus.1
        ));
        if let Some(case) = &self.coll_case {
            out.push_str(&format!("The COLL case this week is **{case}**.\n\n"));
        }
        out.push_str(
            "Post one top-level comment with a line per event, for example:\n\n\
             `3x3: 12.34, 11.02, DNF, 13.00, 12.50`\n\n\
             Use DNF or DNS for failed or skipped solves and a trailing + for a \
             +2 penalty. FMC results are move counts.\n\n---\n\n",
        );

        for planned in &self.events {
            match planned.role {
                EventRole::Core => out.push_str(&format!(
                    "**{}** ({})\n\n",
                    planned.event,
                    planned.event.format()
                )),
                role => out.push_str(&format!(
                    "**{}** ({}, {})\n\n",
                    planned.event,
                    planned.event.format(),
                    role
                )),
            }
            for (i, scramble) in planned.scrambles.iter().enumerate() {
                // multi-line scrambles stay inside their list item
                let scramble = scramble.lines().collect::<Vec<_>>().join("  \n   ");
                out.push_str(&format!("{}. {}\n", i + 1, scramble));
            }
            out.push('\n');
        }
        out
    }

    pub fn sidebar_info<'a>(&'a self, post_url: Option<&'a str>) -> SidebarInfo<'a> {
        SidebarInfo {
            competition_number: self.number,
            post_url,
            weekly: self.weekly,
            bonus: self.bonus,
            coll_case: self.coll_case.as_deref(),
        }
    }
}

/// What a rotation did
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub state: CycleState,
    pub plan: CompetitionPlan,
    pub submission: Submission,
}

/// Advances `state` and plans the next competition without side effects
pub fn plan_next<R: Rng + ?Sized>(
    config: &BotConfig,
    state: &CycleState,
    coll_table: &CollTable,
    rng: &mut R,
    now: u64,
) -> Result<(CycleState, CompetitionPlan)> {
    let next = state.advance(config.rotation_sizes(coll_table.len()), now)?;
    let plan = CompetitionPlan::build(config, &next, coll_table, rng)?;
    Ok((next, plan))
}

/// Reads the cycle state, starting fresh when the file does not exist yet
pub fn load_state(path: &Path) -> Result<CycleState> {
    if !path.exists() {
        warn!("No cycle state at {:?}; starting from competition 1", path);
        return Ok(CycleState::default());
    }
    CycleState::load(path)
}

/// Rotates from `state` against Reddit and, when given, the database.
/// The returned state carries the new post id and still has to be saved.
pub fn run_rotation<R: Rng + ?Sized>(
    config: &BotConfig,
    state: &CycleState,
    reddit: &mut dyn RedditApi,
    store: Option<&mut Store>,
    coll_table: &CollTable,
    rng: &mut R,
    now: u64,
) -> Result<RotationOutcome> {
    let (next, plan) = plan_next(config, state, coll_table, rng, now)?;
    info!(
        "Rotating to competition {}: weekly {}, bonus {} and {}",
        plan.number, plan.weekly, plan.bonus.0, plan.bonus.1
    );

    let submission = reddit.submit_post(&config.subreddit, &plan.title(), &plan.body())?;
    info!("Posted {} as {}", plan.title(), submission.url);

    if let Some(previous) = &next.previous_post_id {
        reddit.set_sticky(previous, false)?;
    }
    reddit.set_sticky(&submission.id, true)?;

    let current_sidebar = reddit.fetch_sidebar(&config.subreddit)?;
    let updated = sidebar::update_sidebar(&current_sidebar, &plan.sidebar_info(Some(&submission.url)));
    if updated != current_sidebar {
        reddit.edit_sidebar(&config.subreddit, &updated)?;
    }

    if let Some(store) = store {
        let events: Vec<NewCompetitionEvent> = plan
            .events
            .iter()
            .map(|e| NewCompetitionEvent {
                event: e.event,
                scrambles: e.scrambles.clone(),
            })
            .collect();
        store.insert_competition(plan.number, &plan.title(), now, &events)?;
        store.set_competition_post(plan.number, &submission.id)?;
    }

    let next = next.with_post(submission.id.clone());
    Ok(RotationOutcome {
        state: next,
        plan,
        submission,
    })
}
