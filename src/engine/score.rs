use super::validate::{
    fuzzy_match, within_tolerance, DEFAULT_SLIDER_TOLERANCE, DEFAULT_TEXT_TOLERANCE,
};
use crate::model::{CorrectAnswer, Question, QuestionKind, ResponsePayload};

/// Points for a correct answer submitted instantly.
pub const MAX_SCORE: i64 = 1000;

/// Points for a correct answer submitted at the time limit. Decay between
/// the two is linear in elapsed time.
pub const MIN_CORRECT_SCORE: i64 = 500;

/// Time-decayed quiz score. Incorrect answers score zero; elapsed time is
/// clamped to `[0, limit_ms]` so late arrivals can neither go negative nor
/// exceed the maximum.
pub fn quiz_score(correct: bool, elapsed_ms: u64, limit_ms: u64) -> i64 {
    if !correct {
        return 0;
    }
    if limit_ms == 0 {
        return MAX_SCORE;
    }
    let elapsed = elapsed_ms.min(limit_ms);
    let span = (MAX_SCORE - MIN_CORRECT_SCORE) as f64;
    let fraction = elapsed as f64 / limit_ms as f64;
    MAX_SCORE - (span * fraction).round() as i64
}

/// Grade a payload against the question's canonical answer. `None` for
/// non-quiz kinds or when the question carries no answer payload.
pub fn grade(question: &Question, payload: &ResponsePayload) -> Option<bool> {
    if !question.kind.is_quiz() {
        return None;
    }
    let answer = question.answer.as_ref()?;

    let correct = match (question.kind, answer, payload) {
        (
            QuestionKind::QuizMc | QuestionKind::QuizTf,
            CorrectAnswer::OptionIndex { index },
            ResponsePayload::OptionIndex { index: submitted },
        ) => submitted == index,
        (
            QuestionKind::QuizOrder,
            CorrectAnswer::Order { order },
            ResponsePayload::Ranking { order: submitted },
        ) => submitted == order,
        (
            QuestionKind::QuizTyped,
            CorrectAnswer::Text { accepted },
            ResponsePayload::Text { text },
        ) => {
            let tolerance = question.settings.tolerance.unwrap_or(DEFAULT_TEXT_TOLERANCE);
            fuzzy_match(text, accepted, tolerance)
        }
        (
            QuestionKind::QuizSlider,
            CorrectAnswer::Number { value },
            ResponsePayload::Number { value: submitted },
        ) => {
            let tolerance = question
                .settings
                .tolerance
                .unwrap_or(DEFAULT_SLIDER_TOLERANCE);
            within_tolerance(*submitted, *value, tolerance)
        }
        // Payload shape does not fit the answer shape.
        _ => false,
    };

    Some(correct)
}
