//! Result parsing, aggregation and ranking.
//!
//! Times are held in hundredths of a second. FMC move counts use the same
//! unit (28 moves is `2800`) so a mean of 3 keeps two decimals.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{CubeCompError, Result};
use crate::types::{Event, EventFormat};

/// Penalty added by a trailing `+`, in hundredths
const PLUS_TWO: u32 = 200;

/// Longest FMC solution accepted
const MAX_FMC_MOVES: u32 = 80;

/// Longest time accepted: two hours, in hundredths
const MAX_TIME: u32 = 2 * 60 * 60 * 100;

/// A single submitted solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attempt {
    /// Time in hundredths of a second, or FMC moves times 100
    Value(u32),
    Dnf,
    Dns,
}

impl Attempt {
    /// Parses one solve as written in a comment.
    ///
    /// Accepts `12.34`, `1:02.50`, `45`, `12.34+`, `DNF`, `DNF(12.34)` and
    /// `DNS`. For FMC the value is a whole move count.
    pub fn parse(raw: &str, event: Event) -> Result<Self> {
        let token = raw.trim().trim_matches(|c: char| c == '(' || c == ')');
        let upper = token.to_ascii_uppercase();
        if upper.starts_with("DNF") {
            return Ok(Self::Dnf);
        }
        if upper.starts_with("DNS") {
            return Ok(Self::Dns);
        }
        if event.is_fewest_moves() {
            let moves: u32 = token
                .parse()
                .map_err(|_| CubeCompError::parse(format!("invalid move count '{raw}'")))?;
            if moves == 0 {
                return Err(CubeCompError::parse("move count must be positive"));
            }
            if moves > MAX_FMC_MOVES {
                return Err(CubeCompError::parse(format!(
                    "move count {moves} is over the {MAX_FMC_MOVES} move limit"
                )));
            }
            return Ok(Self::Value(moves * 100));
        }

        let (body, penalty) = match token.strip_suffix('+') {
            Some(body) => (body, PLUS_TWO),
            None => (token, 0),
        };
        let hundredths = parse_clock_time(body)
            .ok_or_else(|| CubeCompError::parse(format!("invalid time '{raw}'")))?;
        if hundredths == 0 {
            return Err(CubeCompError::parse(format!("time must be positive: '{raw}'")));
        }
        match hundredths.checked_add(penalty) {
            Some(total) if total <= MAX_TIME => Ok(Self::Value(total)),
            _ => Err(CubeCompError::parse(format!("time out of range: '{raw}'"))),
        }
    }
}

/// `[[h:]m:]s[.ff]` to hundredths
fn parse_clock_time(text: &str) -> Option<u32> {
    let mut parts = text.rsplit(':');
    let seconds_part = parts.next()?;
    let (whole, fraction) = match seconds_part.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds_part, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let seconds: u32 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let hundredths: u32 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u32>().ok()? * 10,
        _ => fraction.get(..2)?.parse().ok()?,
    };

    let mut total = seconds.checked_mul(100)?.checked_add(hundredths)?;
    let mut scale = 6000u32;
    for unit in parts {
        let value: u32 = unit.parse().ok()?;
        total = total.checked_add(value.checked_mul(scale)?)?;
        scale = scale.checked_mul(60)?;
    }
    Some(total)
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", format_hundredths(*v)),
            Self::Dnf => write!(f, "DNF"),
            Self::Dns => write!(f, "DNS"),
        }
    }
}

/// Formats hundredths as `s.ff` or `m:ss.ff`
pub fn format_hundredths(value: u32) -> String {
    let minutes = value / 6000;
    let seconds = (value % 6000) / 100;
    let fraction = value % 100;
    if minutes > 0 {
        format!("{minutes}:{seconds:02}.{fraction:02}")
    } else {
        format!("{seconds}.{fraction:02}")
    }
}

/// Escapes characters Reddit Markdown would treat as formatting
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|' | '^' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The aggregated result of one competitor in one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Value(u32),
    Dnf,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", format_hundredths(*v)),
            Self::Dnf => write!(f, "DNF"),
        }
    }
}

/// Mean rounded half up to the nearest hundredth
fn rounded_mean(values: &[u32]) -> u32 {
    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    let n = values.len().max(1) as u64;
    ((2 * sum + n) / (2 * n)) as u32
}

/// Aggregates attempts according to the event format.
///
/// - Ao5: best and worst dropped, one failed attempt counts as the worst,
///   two or more make the average DNF.
/// - Mo3: mean, any failed attempt makes it DNF.
/// - Bo3 / Bo1: best successful attempt.
pub fn aggregate(format: EventFormat, attempts: &[Attempt]) -> Result<Outcome> {
    if attempts.len() != format.solve_count() {
        return Err(CubeCompError::parse(format!(
            "{format} needs {} solves, got {}",
            format.solve_count(),
            attempts.len()
        )));
    }

    let outcome = match format {
        EventFormat::Ao5 => {
            let mut sorted = attempts.to_vec();
            sorted.sort();
            let middle: Vec<u32> = sorted[1..4]
                .iter()
                .filter_map(|a| match a {
                    Attempt::Value(v) => Some(*v),
                    _ => None,
                })
                .collect();
            if middle.len() == 3 {
                Outcome::Value(rounded_mean(&middle))
            } else {
                Outcome::Dnf
            }
        }
        EventFormat::Mo3 => {
            let values: Vec<u32> = attempts
                .iter()
                .filter_map(|a| match a {
                    Attempt::Value(v) => Some(*v),
                    _ => None,
                })
                .collect();
            if values.len() == attempts.len() {
                Outcome::Value(rounded_mean(&values))
            } else {
                Outcome::Dnf
            }
        }
        EventFormat::Bo3 | EventFormat::Bo1 => attempts
            .iter()
            .filter_map(|a| match a {
                Attempt::Value(v) => Some(Outcome::Value(*v)),
                _ => None,
            })
            .min()
            .unwrap_or(Outcome::Dnf),
    };
    Ok(outcome)
}

/// One parsed `Event: t1, t2, ...` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSubmission {
    pub event: Event,
    pub attempts: Vec<Attempt>,
}

/// Parses a submission comment.
///
/// Lines without a recognised event name are commentary and are skipped.
/// Lines for a known event with unparseable times or the wrong number of
/// solves are dropped with a warning. A repeated event keeps the first line.
pub fn parse_submission(body: &str) -> Vec<EventSubmission> {
    let mut submissions: Vec<EventSubmission> = Vec::new();
    for line in body.lines() {
        let cleaned = line.replace(['*', '`'], "");
        let Some((name, times)) = cleaned.split_once(':') else {
            continue;
        };
        let name = name.trim().trim_start_matches(['-', '#', '>']).trim();
        let Ok(event) = name.parse::<Event>() else {
            debug!("Skipping comment line without an event: {:?}", name);
            continue;
        };
        if submissions.iter().any(|s| s.event == event) {
            warn!("Ignoring repeated {} line", event);
            continue;
        }

        let attempts: Result<Vec<Attempt>> = times
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.trim().is_empty())
            .map(|t| Attempt::parse(t, event))
            .collect();
        match attempts {
            Ok(attempts) if attempts.len() == event.solve_count() => {
                submissions.push(EventSubmission { event, attempts });
            }
            Ok(attempts) => warn!(
                "Rejecting {} submission: expected {} solves, got {}",
                event,
                event.solve_count(),
                attempts.len()
            ),
            Err(e) => warn!("Rejecting {} submission: {}", event, e),
        }
    }
    submissions
}

/// A competitor's scored entry in one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    pub user: String,
    pub attempts: Vec<Attempt>,
    pub outcome: Outcome,
}

/// A ranked entry; tied results share a place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub place: usize,
    pub entry: EventEntry,
}

/// Ranks entries best first.
///
/// Equal outcomes share a place and the next place skips accordingly
/// (1, 2, 2, 4). Names order tied entries for stable output.
pub fn rank(mut entries: Vec<EventEntry>) -> Vec<Placement> {
    entries.sort_by(|a, b| match a.outcome.cmp(&b.outcome) {
        Ordering::Equal => a.user.to_lowercase().cmp(&b.user.to_lowercase()),
        other => other,
    });

    let mut placements = Vec::with_capacity(entries.len());
    let mut previous: Option<(Outcome, usize)> = None;
    for (index, entry) in entries.into_iter().enumerate() {
        let place = match previous {
            Some((outcome, place)) if outcome == entry.outcome => place,
            _ => index + 1,
        };
        previous = Some((entry.outcome, place));
        placements.push(Placement { place, entry });
    }
    placements
}

/// Scored results of a whole competition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionResults {
    pub events: BTreeMap<Event, Vec<Placement>>,
}

impl CompetitionResults {
    /// Scores a set of `(user, comment body)` submissions against the
    /// competition's events; lines for other events are ignored.
    pub fn score<'a>(
        events: &[Event],
        submissions: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut per_event: BTreeMap<Event, Vec<EventEntry>> = BTreeMap::new();
        for (user, body) in submissions {
            for submission in parse_submission(body) {
                if !events.contains(&submission.event) {
                    debug!("{} submitted {} which is not in this competition", user, submission.event);
                    continue;
                }
                let entries = per_event.entry(submission.event).or_default();
                if entries.iter().any(|e| e.user == user) {
                    continue;
                }
                match aggregate(submission.event.format(), &submission.attempts) {
                    Ok(outcome) => entries.push(EventEntry {
                        user: user.to_string(),
                        attempts: submission.attempts,
                        outcome,
                    }),
                    Err(e) => warn!("Could not score {} for {}: {}", submission.event, user, e),
                }
            }
        }

        Self {
            events: per_event
                .into_iter()
                .map(|(event, entries)| (event, rank(entries)))
                .collect(),
        }
    }

    /// Overall standings: each event awards `competitors - place + 1` points
    /// to every non-DNF result. Sorted by points, then name.
    pub fn standings(&self) -> Vec<(String, usize)> {
        let mut points: BTreeMap<String, usize> = BTreeMap::new();
        for placements in self.events.values() {
            let competitors = placements.len();
            for p in placements {
                if p.entry.outcome == Outcome::Dnf {
                    points.entry(p.entry.user.clone()).or_insert(0);
                    continue;
                }
                *points.entry(p.entry.user.clone()).or_insert(0) += competitors + 1 - p.place;
            }
        }
        let mut standings: Vec<(String, usize)> = points.into_iter().collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        standings
    }

    pub fn participant_count(&self) -> usize {
        let mut users: Vec<&str> = self
            .events
            .values()
            .flatten()
            .map(|p| p.entry.user.as_str())
            .collect();
        users.sort_unstable();
        users.dedup();
        users.len()
    }

    /// Markdown tables, one per event, followed by the overall standings
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for (event, placements) in &self.events {
            out.push_str(&format!("**{event}** ({})\n\n", event.format()));
            out.push_str("| Place | User | Result | Solves |\n|---|---|---|---|\n");
            for p in placements {
                let solves = p
                    .entry
                    .attempts
                    .iter()
                    .map(Attempt::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(
                    "| {} | u/{} | {} | {} |\n",
                    p.place,
                    escape_markdown(&p.entry.user),
                    p.entry.outcome,
                    solves
                ));
            }
            out.push('\n');
        }

        let standings = self.standings();
        if !standings.is_empty() {
            out.push_str("**Overall**\n\n| Rank | User | Points |\n|---|---|---|\n");
            for (i, (user, points)) in standings.iter().enumerate() {
                out.push_str(&format!(
                    "| {} | u/{} | {} |\n",
                    i + 1,
                    escape_markdown(user),
                    points
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(hundredths: u32) -> Attempt {
        Attempt::Value(hundredths)
    }

    #[test]
    fn test_parse_times() {
        let e = Event::ThreeByThree;
        assert_eq!(Attempt::parse("12.34", e).unwrap(), v(1234));
        assert_eq!(Attempt::parse("1:02.50", e).unwrap(), v(6250));
        assert_eq!(Attempt::parse("45", e).unwrap(), v(4500));
        assert_eq!(Attempt::parse("9.5", e).unwrap(), v(950));
        assert_eq!(Attempt::parse("12.34+", e).unwrap(), v(1434));
        assert_eq!(Attempt::parse("(10.01)", e).unwrap(), v(1001));
        assert_eq!(Attempt::parse("dnf", e).unwrap(), Attempt::Dnf);
        assert_eq!(Attempt::parse("DNF(12.00)", e).unwrap(), Attempt::Dnf);
        assert_eq!(Attempt::parse("DNS", e).unwrap(), Attempt::Dns);
        assert!(Attempt::parse("fast", e).is_err());
        assert!(Attempt::parse("0.00", e).is_err());
        assert!(Attempt::parse("1:xx", e).is_err());
    }

    #[test]
    fn test_parse_rejects_huge_times() {
        let e = Event::ThreeByThree;
        assert!(Attempt::parse("42949672.95+", e).is_err());
        assert!(Attempt::parse("99999999", e).is_err());
        assert!(Attempt::parse("2:00:00.01", e).is_err());
        assert_eq!(Attempt::parse("1:59:59.99", e).unwrap(), v(719_999));
    }

    #[test]
    fn test_parse_fmc_moves() {
        assert_eq!(Attempt::parse("28", Event::Fmc).unwrap(), v(2800));
        assert!(Attempt::parse("28.5", Event::Fmc).is_err());
        assert!(Attempt::parse("0", Event::Fmc).is_err());
        assert!(Attempt::parse("81", Event::Fmc).is_err());
        assert!(Attempt::parse("50000000", Event::Fmc).is_err());
    }

    #[test]
    fn test_format_hundredths() {
        assert_eq!(format_hundredths(1234), "12.34");
        assert_eq!(format_hundredths(905), "9.05");
        assert_eq!(format_hundredths(6250), "1:02.50");
    }

    #[test]
    fn test_ao5() {
        let attempts = [v(1000), v(1200), v(1100), v(900), v(1500)];
        assert_eq!(
            aggregate(EventFormat::Ao5, &attempts).unwrap(),
            Outcome::Value(1100)
        );

        let one_dnf = [v(1000), Attempt::Dnf, v(1100), v(900), v(1500)];
        assert_eq!(
            aggregate(EventFormat::Ao5, &one_dnf).unwrap(),
            Outcome::Value(1200)
        );

        let two_dnf = [v(1000), Attempt::Dnf, v(1100), Attempt::Dns, v(1500)];
        assert_eq!(aggregate(EventFormat::Ao5, &two_dnf).unwrap(), Outcome::Dnf);
    }

    #[test]
    fn test_mean_rounds_half_up() {
        // (1000 + 1000 + 1001) / 3 = 1000.33
        let attempts = [v(1000), v(1000), v(1001)];
        assert_eq!(
            aggregate(EventFormat::Mo3, &attempts).unwrap(),
            Outcome::Value(1000)
        );
        // (2800 + 2900 + 2900) / 3 = 2866.67
        let fmc = [v(2800), v(2900), v(2900)];
        assert_eq!(aggregate(EventFormat::Mo3, &fmc).unwrap(), Outcome::Value(2867));
        let dnf = [v(2800), Attempt::Dnf, v(2900)];
        assert_eq!(aggregate(EventFormat::Mo3, &dnf).unwrap(), Outcome::Dnf);
    }

    #[test]
    fn test_best_of_three() {
        let attempts = [Attempt::Dnf, v(6000), v(5500)];
        assert_eq!(aggregate(EventFormat::Bo3, &attempts).unwrap(), Outcome::Value(5500));
        let all_dnf = [Attempt::Dnf, Attempt::Dnf, Attempt::Dns];
        assert_eq!(aggregate(EventFormat::Bo3, &all_dnf).unwrap(), Outcome::Dnf);
    }

    #[test]
    fn test_wrong_solve_count() {
        assert!(aggregate(EventFormat::Ao5, &[v(1), v(2)]).is_err());
    }

    #[test]
    fn test_parse_submission() {
        let body = "Nice scrambles this week!\n\
                    **3x3**: 12.34, 11.02, DNF, 13.00, 12.50\n\
                    2x2: 3.01 4.20 2.99 3.50 3.33\n\
                    4x4: 40.00, 41.00\n\
                    Pyraminx: 5.00, abc, 5.00, 5.00, 5.00\n\
                    3x3: 10.00, 10.00, 10.00, 10.00, 10.00\n\
                    Time spent: 1:00";
        let subs = parse_submission(body);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].event, Event::ThreeByThree);
        assert_eq!(subs[0].attempts[2], Attempt::Dnf);
        assert_eq!(subs[1].event, Event::TwoByTwo);
    }

    #[test]
    fn test_rank_shares_tied_places() {
        let entry = |user: &str, outcome| EventEntry {
            user: user.to_string(),
            attempts: vec![],
            outcome,
        };
        let placements = rank(vec![
            entry("dave", Outcome::Dnf),
            entry("carol", Outcome::Value(1200)),
            entry("bob", Outcome::Value(1100)),
            entry("alice", Outcome::Value(1100)),
        ]);
        let summary: Vec<(usize, &str)> = placements
            .iter()
            .map(|p| (p.place, p.entry.user.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(1, "alice"), (1, "bob"), (3, "carol"), (4, "dave")]
        );
    }

    #[test]
    fn test_competition_scoring_and_standings() {
        let events = [Event::ThreeByThree, Event::TwoByTwo];
        let results = CompetitionResults::score(
            &events,
            [
                ("alice", "3x3: 10, 10, 10, 10, 10\n2x2: 3, 3, 3, 3, 3"),
                ("bob", "3x3: 12, 12, 12, 12, 12\nSkewb: 5, 5, 5, 5, 5"),
                ("alice", "3x3: 9, 9, 9, 9, 9"),
            ],
        );
        assert_eq!(results.events.len(), 2);
        assert!(!results.events.contains_key(&Event::Skewb));
        let three = &results.events[&Event::ThreeByThree];
        assert_eq!(three[0].entry.user, "alice");
        assert_eq!(three[0].entry.outcome, Outcome::Value(1000));
        assert_eq!(results.participant_count(), 2);
        // 3x3: alice 2, bob 1; 2x2: alice 1
        assert_eq!(
            results.standings(),
            vec![("alice".to_string(), 3), ("bob".to_string(), 1)]
        );
        let markdown = results.to_markdown();
        assert!(markdown.contains("| 1 | u/alice | 10.00 |"));
        assert!(markdown.contains("**Overall**"));
    }

    #[test]
    fn test_markdown_escapes_user_names() {
        let results = CompetitionResults::score(
            &[Event::TwoByTwo],
            [("__cube_*master*", "2x2: 3, 3, 3, 3, 3")],
        );
        let markdown = results.to_markdown();
        assert!(markdown.contains(r"u/\_\_cube\_\*master\*"));
        assert!(!markdown.contains("u/__cube"));
    }
}
