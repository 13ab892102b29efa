use super::response::{BrainstormIdea, TextResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordWeight {
    pub word: String,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOption {
    pub index: usize,
    pub label: String,
    pub average_rank: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NpsBreakdown {
    pub promoters: u64,
    pub passives: u64,
    pub detractors: u64,
    /// Standard net promoter score in [-100, 100].
    pub score: f64,
}

/// The computed summary of all responses to a question, shaped per family.
/// Broadcast to the presenter scope live, and to the session scope on
/// reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Aggregate {
    Choice {
        counts: Vec<u64>,
        /// Rounded to one decimal for display; ties display equal values.
        percentages: Vec<f64>,
        total: u64,
    },
    Numeric {
        count: u64,
        mean: f64,
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nps: Option<NpsBreakdown>,
    },
    WordCloud {
        words: Vec<WordWeight>,
    },
    Ranking {
        options: Vec<RankedOption>,
        total: u64,
    },
    Pins {
        points: Vec<PinPoint>,
    },
    Texts {
        responses: Vec<TextResponse>,
    },
    Ideas {
        ideas: Vec<BrainstormIdea>,
    },
}
