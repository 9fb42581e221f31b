use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
            Self::Winter => "winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown season `{0}` (expected spring|summer|fall|winter)")]
pub struct UnknownSeason(pub String);

impl FromStr for Season {
    type Err = UnknownSeason;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" | "autumn" => Ok(Self::Fall),
            "winter" => Ok(Self::Winter),
            other => Err(UnknownSeason(other.to_owned())),
        }
    }
}

/// Optional recommendation focus. Exactly one variant is active per request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContextSpec {
    #[default]
    None,
    Occasion(String),
    Season(Season),
    Category(String),
}

impl ContextSpec {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Human readable description used in prompts. `None` when no context is active.
    pub fn describe(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Occasion(occasion) => Some(format!("occasion: {occasion}")),
            Self::Season(season) => Some(format!("season: {season}")),
            Self::Category(category) => Some(format!("category: {category}")),
        }
    }
}
