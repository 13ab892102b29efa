use crate::model::{
    Aggregate, BrainstormIdea, NpsBreakdown, PinPoint, Question, QuestionKind, RankedOption,
    ResponsePayload, StoredResponse, StoredWord, TextResponse, WordWeight,
};
use std::collections::HashMap;

/// Compute the type-appropriate aggregate for a question from the raw rows
/// the store returns. Word-cloud, open-text and brainstorm kinds read their
/// dedicated row shapes; everything else reads the shared response row.
pub fn for_question(
    question: &Question,
    responses: &[StoredResponse],
    words: &[StoredWord],
    texts: &[TextResponse],
    ideas: &[BrainstormIdea],
) -> Aggregate {
    match question.kind {
        QuestionKind::Poll | QuestionKind::QuizMc | QuestionKind::QuizTf => {
            choice(question.option_count(), responses)
        }
        QuestionKind::Scale | QuestionKind::QuizSlider => numeric(responses, false),
        QuestionKind::Nps => numeric(responses, true),
        QuestionKind::WordCloud => word_cloud(words),
        QuestionKind::Ranking | QuestionKind::QuizOrder => {
            ranking(question.options.as_deref().unwrap_or(&[]), responses)
        }
        QuestionKind::PinImage => pins(responses),
        QuestionKind::OpenEnded => Aggregate::Texts {
            responses: texts.to_vec(),
        },
        QuestionKind::Brainstorm => Aggregate::Ideas {
            ideas: ideas_by_votes(ideas),
        },
        QuestionKind::QuizTyped => Aggregate::Texts {
            responses: typed_as_texts(responses),
        },
    }
}

/// Frequency count per option index. Percentages are rounded for display;
/// tied options simply show equal values.
pub fn choice(option_count: usize, responses: &[StoredResponse]) -> Aggregate {
    let mut counts = vec![0u64; option_count];
    let mut total = 0u64;
    for response in responses {
        if let ResponsePayload::OptionIndex { index } = &response.payload {
            if *index < counts.len() {
                counts[*index] += 1;
                total += 1;
            }
        }
    }
    let percentages = counts
        .iter()
        .map(|&c| {
            if total == 0 {
                0.0
            } else {
                (c as f64 * 1000.0 / total as f64).round() / 10.0
            }
        })
        .collect();
    Aggregate::Choice {
        counts,
        percentages,
        total,
    }
}

/// Count, arithmetic mean, min and max over the submitted numeric values.
/// With `with_nps` set, also buckets 0-10 answers into the standard
/// promoter/passive/detractor breakdown.
pub fn numeric(responses: &[StoredResponse], with_nps: bool) -> Aggregate {
    let values: Vec<f64> = responses
        .iter()
        .filter_map(|r| match &r.payload {
            ResponsePayload::Number { value } => Some(*value),
            _ => None,
        })
        .collect();

    if values.is_empty() {
        return Aggregate::Numeric {
            count: 0,
            mean: 0.0,
            min: 0.0,
            max: 0.0,
            nps: with_nps.then(|| NpsBreakdown {
                promoters: 0,
                passives: 0,
                detractors: 0,
                score: 0.0,
            }),
        };
    }

    let count = values.len() as u64;
    let mean = values.iter().sum::<f64>() / count as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let nps = with_nps.then(|| {
        let mut promoters = 0u64;
        let mut passives = 0u64;
        let mut detractors = 0u64;
        for v in &values {
            if *v >= 9.0 {
                promoters += 1;
            } else if *v >= 7.0 {
                passives += 1;
            } else {
                detractors += 1;
            }
        }
        NpsBreakdown {
            promoters,
            passives,
            detractors,
            score: (promoters as f64 - detractors as f64) * 100.0 / count as f64,
        }
    });

    Aggregate::Numeric {
        count,
        mean,
        min,
        max,
        nps,
    }
}

/// Tally normalized words by occurrence. Flagged words are excluded from
/// the visible cloud. Entries sort by weight descending, then
/// alphabetically so equal weights render deterministically.
pub fn word_cloud(words: &[StoredWord]) -> Aggregate {
    let mut tally: HashMap<&str, u64> = HashMap::new();
    for word in words.iter().filter(|w| !w.flagged) {
        *tally.entry(word.word.as_str()).or_insert(0) += 1;
    }
    let mut entries: Vec<WordWeight> = tally
        .into_iter()
        .map(|(word, weight)| WordWeight {
            word: word.to_string(),
            weight,
        })
        .collect();
    entries.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.word.cmp(&b.word)));
    Aggregate::WordCloud { words: entries }
}

/// Per-option average rank (1-based; lower is better), sorted ascending so
/// the display order is the crowd's order.
pub fn ranking(options: &[String], responses: &[StoredResponse]) -> Aggregate {
    let mut sums = vec![0u64; options.len()];
    let mut total = 0u64;
    for response in responses {
        if let ResponsePayload::Ranking { order } = &response.payload {
            if order.len() != options.len() {
                continue;
            }
            for (rank, option_index) in order.iter().enumerate() {
                if let Some(sum) = sums.get_mut(*option_index) {
                    *sum += rank as u64 + 1;
                }
            }
            total += 1;
        }
    }

    let mut ranked: Vec<RankedOption> = options
        .iter()
        .enumerate()
        .map(|(index, label)| RankedOption {
            index,
            label: label.clone(),
            average_rank: if total == 0 {
                0.0
            } else {
                sums[index] as f64 / total as f64
            },
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.average_rank
            .partial_cmp(&b.average_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Aggregate::Ranking {
        options: ranked,
        total,
    }
}

/// The raw coordinate list; the consumer renders it as heatmap or scatter.
pub fn pins(responses: &[StoredResponse]) -> Aggregate {
    let points = responses
        .iter()
        .filter_map(|r| match &r.payload {
            ResponsePayload::Pin { x, y } => Some(PinPoint { x: *x, y: *y }),
            _ => None,
        })
        .collect();
    Aggregate::Pins { points }
}

/// Ideas sorted by vote count descending; ties keep submission order.
pub fn ideas_by_votes(ideas: &[BrainstormIdea]) -> Vec<BrainstormIdea> {
    let mut sorted = ideas.to_vec();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes));
    sorted
}

fn typed_as_texts(responses: &[StoredResponse]) -> Vec<TextResponse> {
    responses
        .iter()
        .filter_map(|r| match &r.payload {
            ResponsePayload::Text { text } => Some(TextResponse {
                id: r.id,
                question_id: r.question_id,
                participant_id: r.participant_id,
                text: text.clone(),
                submitted_at: r.submitted_at,
            }),
            _ => None,
        })
        .collect()
}
