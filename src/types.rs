//! Type-safe event types for cubecomp
//!
//! Events are proper Rust enums instead of free-form strings, so an event
//! named in a config file or a submission comment is validated at parse time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString};

/// How the solves of an event are aggregated into a single result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum EventFormat {
    /// Average of 5: best and worst are dropped, the middle three are averaged
    #[strum(serialize = "Ao5")]
    Ao5,
    /// Mean of 3
    #[strum(serialize = "Mo3")]
    Mo3,
    /// Best of 3
    #[strum(serialize = "Bo3")]
    Bo3,
    /// A single attempt
    #[strum(serialize = "Bo1")]
    Bo1,
}

impl EventFormat {
    /// Number of solves a competitor submits for this format
    pub const fn solve_count(self) -> usize {
        match self {
            Self::Ao5 => 5,
            Self::Mo3 | Self::Bo3 => 3,
            Self::Bo1 => 1,
        }
    }
}

/// A competition event.
///
/// `Display` renders the name used in posts and submission comments;
/// parsing is case-insensitive and accepts a few common aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Event {
    #[strum(to_string = "2x2", serialize = "222")]
    TwoByTwo,
    #[strum(to_string = "3x3", serialize = "333")]
    ThreeByThree,
    #[strum(to_string = "4x4", serialize = "444")]
    FourByFour,
    #[strum(to_string = "5x5", serialize = "555")]
    FiveByFive,
    #[strum(to_string = "6x6", serialize = "666")]
    SixBySix,
    #[strum(to_string = "7x7", serialize = "777")]
    SevenBySeven,
    #[strum(to_string = "3BLD", serialize = "3x3 Blindfolded")]
    ThreeBld,
    #[strum(to_string = "4BLD", serialize = "4x4 Blindfolded")]
    FourBld,
    #[strum(to_string = "5BLD", serialize = "5x5 Blindfolded")]
    FiveBld,
    #[strum(to_string = "3x3OH", serialize = "OH", serialize = "3x3 One-Handed")]
    OneHanded,
    #[strum(to_string = "Pyraminx", serialize = "Pyra")]
    Pyraminx,
    #[strum(to_string = "Megaminx", serialize = "Mega")]
    Megaminx,
    #[strum(to_string = "Skewb")]
    Skewb,
    #[strum(to_string = "Square-1", serialize = "Sq1", serialize = "Square 1")]
    Square1,
    #[strum(to_string = "Clock")]
    Clock,
    #[strum(to_string = "FMC", serialize = "Fewest Moves")]
    Fmc,
    #[strum(to_string = "COLL")]
    Coll,
    #[strum(to_string = "2GEN", serialize = "2-GEN")]
    TwoGen,
    #[strum(to_string = "LSE")]
    Lse,
    #[strum(to_string = "F2L")]
    F2l,
    #[strum(to_string = "Kilominx", serialize = "Kilo")]
    Kilominx,
    #[strum(to_string = "3x3 Relay of 3", serialize = "Relay of 3")]
    RelayOfThree,
    #[strum(to_string = "2-3-4 Relay", serialize = "234 Relay")]
    Relay234,
}

impl Event {
    /// Aggregation format used for this event
    pub const fn format(self) -> EventFormat {
        match self {
            Self::SixBySix | Self::SevenBySeven | Self::Fmc => EventFormat::Mo3,
            Self::ThreeBld | Self::FourBld | Self::FiveBld => EventFormat::Bo3,
            Self::RelayOfThree | Self::Relay234 => EventFormat::Bo1,
            _ => EventFormat::Ao5,
        }
    }

    /// Number of scrambles (and solves) per competitor
    pub const fn solve_count(self) -> usize {
        self.format().solve_count()
    }

    /// FMC results are move counts, not times
    pub const fn is_fewest_moves(self) -> bool {
        matches!(self, Self::Fmc)
    }

    /// Stable lowercase identifier stored in the database
    pub fn code(self) -> String {
        self.to_string().to_lowercase().replace([' ', '-'], "_")
    }
}

// Config files and job payloads use the display names ("3x3", "LSE")
impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown event '{name}'")))
    }
}
