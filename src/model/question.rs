use super::{QuestionId, SessionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of question types. Aggregation, validation and scoring all
/// match exhaustively on this, so adding a variant fails to compile until
/// every engine handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Poll,
    WordCloud,
    Scale,
    Ranking,
    PinImage,
    QuizMc,
    QuizTf,
    QuizTyped,
    QuizSlider,
    QuizOrder,
    OpenEnded,
    Nps,
    Brainstorm,
}

impl QuestionKind {
    /// Quiz-family kinds are graded and feed the leaderboard.
    pub fn is_quiz(self) -> bool {
        matches!(
            self,
            QuestionKind::QuizMc
                | QuestionKind::QuizTf
                | QuestionKind::QuizTyped
                | QuestionKind::QuizSlider
                | QuestionKind::QuizOrder
        )
    }
}

/// Type-dependent knobs. Unused fields stay `None` for kinds they do not
/// apply to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSettings {
    /// Word cloud: words accepted per submission (first-N wins).
    pub max_words: Option<usize>,
    /// Typed quiz: similarity ratio threshold. Slider quiz: numeric margin.
    pub tolerance: Option<f64>,
    /// Scale/slider bounds.
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

/// Canonical correct-answer payload, shaped per quiz family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectAnswer {
    OptionIndex { index: usize },
    Number { value: f64 },
    Order { order: Vec<usize> },
    Text { accepted: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub session_id: SessionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub settings: QuestionSettings,
    pub answer: Option<CorrectAnswer>,
    pub time_limit_ms: Option<u64>,
    pub position: u32,
    pub is_active: bool,
    pub is_locked: bool,
    pub results_visible: bool,
}

impl Question {
    pub fn new(session_id: SessionId, kind: QuestionKind, prompt: String, position: u32) -> Self {
        Question {
            id: Uuid::new_v4(),
            session_id,
            kind,
            prompt,
            options: None,
            settings: QuestionSettings::default(),
            answer: None,
            time_limit_ms: None,
            position,
            is_active: false,
            is_locked: false,
            results_visible: false,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_answer(mut self, answer: CorrectAnswer) -> Self {
        self.answer = Some(answer);
        self
    }

    pub fn with_time_limit_ms(mut self, limit: u64) -> Self {
        self.time_limit_ms = Some(limit);
        self
    }

    pub fn with_settings(mut self, settings: QuestionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn option_count(&self) -> usize {
        self.options.as_ref().map_or(0, Vec::len)
    }

    /// Projection broadcast to the session scope. Strips the correct-answer
    /// payload so participants never see it before reveal.
    pub fn public(&self) -> QuestionPublic {
        QuestionPublic {
            id: self.id,
            kind: self.kind,
            prompt: self.prompt.clone(),
            options: self.options.clone(),
            settings: self.settings.clone(),
            time_limit_ms: self.time_limit_ms,
            position: self.position,
            is_locked: self.is_locked,
        }
    }
}

/// What every connected client is allowed to see about a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPublic {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub settings: QuestionSettings,
    pub time_limit_ms: Option<u64>,
    pub position: u32,
    pub is_locked: bool,
}
