use thiserror::Error;

pub const NICKNAME_MIN_LEN: usize = 2;
pub const NICKNAME_MAX_LEN: usize = 30;

/// Shortest word a cloud submission may contribute, post-normalization.
pub const WORD_MIN_LEN: usize = 2;

/// Words accepted per cloud submission when the question sets no limit.
pub const DEFAULT_MAX_WORDS: usize = 3;

/// Similarity threshold for typed-quiz answers when the question sets none.
pub const DEFAULT_TEXT_TOLERANCE: f64 = 0.8;

/// Numeric margin for slider-quiz answers when the question sets none.
pub const DEFAULT_SLIDER_TOLERANCE: f64 = 5.0;

/// Content filtering is an external concern; the engine only consumes a
/// pure predicate.
pub trait ContentFilter: Send + Sync {
    fn is_allowed(&self, text: &str) -> bool;
}

/// Substring deny-list, the backend used by the dev server and tests. A
/// production deployment injects its own filter.
pub struct DenyListFilter {
    terms: Vec<String>,
}

impl DenyListFilter {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms: terms.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// A filter that allows everything.
    pub fn permissive() -> Self {
        Self { terms: Vec::new() }
    }
}

impl ContentFilter for DenyListFilter {
    fn is_allowed(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        !self.terms.iter().any(|term| lowered.contains(term))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NicknameError {
    #[error("nickname must be at least {NICKNAME_MIN_LEN} characters")]
    TooShort,
    #[error("nickname must be at most {NICKNAME_MAX_LEN} characters")]
    TooLong,
    #[error("nickname rejected by content filter")]
    Profane,
}

/// Trim, length-bound and content-check a nickname.
pub fn sanitize_nickname(raw: &str, filter: &dyn ContentFilter) -> Result<String, NicknameError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < NICKNAME_MIN_LEN {
        return Err(NicknameError::TooShort);
    }
    if len > NICKNAME_MAX_LEN {
        return Err(NicknameError::TooLong);
    }
    if !filter.is_allowed(trimmed) {
        return Err(NicknameError::Profane);
    }
    Ok(trimmed.to_string())
}

/// Normalize one word: lowercase, trim, strip non-alphanumerics. Returns
/// `None` when fewer than `WORD_MIN_LEN` characters survive. Idempotent.
pub fn normalize_word(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    if normalized.chars().count() < WORD_MIN_LEN {
        None
    } else {
        Some(normalized)
    }
}

/// Normalize a submission batch, capped at `max_words` (first-N wins; the
/// extras are silently dropped).
pub fn normalize_words(batch: &[String], max_words: usize) -> Vec<String> {
    batch
        .iter()
        .take(max_words)
        .filter_map(|w| normalize_word(w))
        .collect()
}

/// Similarity ratio in [0, 1] between two answers, case-insensitive and
/// whitespace-normalized: `1 - levenshtein / max_len`. Symmetric by
/// construction.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = canonical_text(a);
    let b = canonical_text(b);
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let max_len = a_len.max(b_len);
    if max_len == 0 {
        return 1.0;
    }
    let dist = levenshtein(&a, &b);
    1.0 - (dist as f64 / max_len as f64)
}

/// True when `submitted` matches any accepted answer at or above the
/// similarity tolerance.
pub fn fuzzy_match(submitted: &str, accepted: &[String], tolerance: f64) -> bool {
    accepted
        .iter()
        .any(|answer| similarity(submitted, answer) >= tolerance)
}

/// Slider-quiz acceptance: `|submitted - correct| <= tolerance`.
pub fn within_tolerance(submitted: f64, correct: f64, tolerance: f64) -> bool {
    (submitted - correct).abs() <= tolerance
}

fn canonical_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
