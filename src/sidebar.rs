//! Sidebar templating.
//!
//! The bot owns one block of the subreddit sidebar, delimited by two empty
//! Markdown links that render as nothing. Everything outside the block is
//! left exactly as the moderators wrote it.

use crate::types::Event;

pub const BLOCK_START: &str = "[](#comp-start)";
pub const BLOCK_END: &str = "[](#comp-end)";

/// What the sidebar advertises about the running competition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarInfo<'a> {
    pub competition_number: u32,
    pub post_url: Option<&'a str>,
    pub weekly: Event,
    pub bonus: (Event, Event),
    pub coll_case: Option<&'a str>,
}

/// Renders the bot's block, markers included
pub fn render_block(info: &SidebarInfo<'_>) -> String {
    let title = match info.post_url {
        Some(url) => format!("[Weekly Competition {}]({})", info.competition_number, url),
        None => format!("Weekly Competition {}", info.competition_number),
    };
    let mut lines = vec![
        BLOCK_START.to_string(),
        format!("**{title}**"),
        String::new(),
        format!("* Event of the week: {}", info.weekly),
        format!("* Bonus events: {} and {}", info.bonus.0, info.bonus.1),
    ];
    if let Some(case) = info.coll_case {
        lines.push(format!("* COLL case: {case}"));
    }
    lines.push(BLOCK_END.to_string());
    lines.join("\n")
}

/// Byte range of the last complete start..end pair. Stray markers outside
/// it belong to the moderators' text.
fn block_range(existing: &str) -> Option<(usize, usize)> {
    let end = existing.rfind(BLOCK_END)?;
    let start = existing[..end].rfind(BLOCK_START)?;
    Some((start, end + BLOCK_END.len()))
}

/// Replaces the bot's block in `existing`, or appends it when the markers
/// are missing or out of order
pub fn update_sidebar(existing: &str, info: &SidebarInfo<'_>) -> String {
    let block = render_block(info);
    if let Some((start, end)) = block_range(existing) {
        return format!("{}{}{}", &existing[..start], block, &existing[end..]);
    }

    if existing.trim().is_empty() {
        block
    } else {
        format!("{}\n\n{}", existing.trim_end(), block)
    }
}
