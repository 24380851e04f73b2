//! Question sourcing: external fetch, normalization, and entry-quiz
//! selection.
//!
//! The fetch runs off the room runtime's critical path; the runtime
//! schedules it and receives the normalized result as a message so that
//! cache assignment on the room stays serialized.

pub mod fallback;
pub mod html;

use crate::config::QuizConfig;
use crate::protocol::Question;
use rand::RngExt;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Fisher-Yates shuffle over a slice.
fn shuffle<T, R: RngExt>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

#[derive(Debug, Error)]
pub enum QuizFetchError {
    #[error("quiz fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quiz document has no questions array")]
    NoQuestions,
    #[error("quiz document contained no valid questions")]
    Empty,
}

/// Fetches and normalizes externally sourced question sets.
#[derive(Debug, Clone)]
pub struct QuizService {
    client: reqwest::Client,
    config: QuizConfig,
}

impl QuizService {
    pub fn new(config: QuizConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Fetch the quiz document for `quiz_id` and normalize its questions.
    /// Every failure mode maps to [`QuizFetchError`]; callers fall back to
    /// [`fallback::local_pool`].
    pub async fn fetch_questions(&self, quiz_id: &str) -> Result<Vec<Question>, QuizFetchError> {
        let url = format!("{}/{quiz_id}", self.config.base_url.trim_end_matches('/'));
        tracing::debug!(%quiz_id, %url, "Fetching external quiz document");

        let doc: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let questions = normalize_document(&doc)?;
        tracing::info!(%quiz_id, count = questions.len(), "Normalized external quiz");
        Ok(questions)
    }
}

/// Extract and validate questions from a provider document. The document
/// shape varies between API versions; `quiz.info.questions` and
/// `quiz.questions` are tried first, then any nested `questions` array.
pub fn normalize_document(doc: &Value) -> Result<Vec<Question>, QuizFetchError> {
    let raw = doc
        .pointer("/quiz/info/questions")
        .or_else(|| doc.pointer("/quiz/questions"))
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .or_else(|| find_questions_array(doc, 0))
        .ok_or(QuizFetchError::NoQuestions)?;

    let questions: Vec<Question> = raw
        .iter()
        .enumerate()
        .filter_map(|(i, q)| normalize_question(q, i))
        .collect();

    if questions.is_empty() {
        return Err(QuizFetchError::Empty);
    }
    Ok(questions)
}

/// Depth-bounded search for a `questions` array anywhere in the document.
fn find_questions_array(value: &Value, depth: usize) -> Option<&[Value]> {
    if depth > 6 {
        return None;
    }
    let obj = value.as_object()?;
    if let Some(arr) = obj.get("questions").and_then(Value::as_array) {
        return Some(arr.as_slice());
    }
    obj.values()
        .find_map(|v| find_questions_array(v, depth + 1))
}

fn normalize_question(raw: &Value, index: usize) -> Option<Question> {
    let id = raw
        .get("_id")
        .or_else(|| raw.get("id"))
        .and_then(Value::as_str)
        .map_or_else(|| format!("q_{index}"), str::to_string);

    let structure = raw.get("structure")?;
    let text = html::sanitize(structure.pointer("/query/text")?.as_str()?);

    let options: Vec<String> = structure
        .get("options")?
        .as_array()?
        .iter()
        .filter_map(|opt| opt.get("text").and_then(Value::as_str))
        .map(html::sanitize)
        .collect();

    let correct_index = usize::try_from(structure.get("answer")?.as_i64()?).ok()?;

    // Drop malformed questions rather than failing the whole set.
    if text.is_empty() || options.len() < 2 || correct_index >= options.len() {
        return None;
    }

    let images = structure
        .pointer("/query/media")
        .and_then(Value::as_array)
        .map(|media| {
            media
                .iter()
                .filter_map(|m| m.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Question {
        id,
        text,
        options,
        correct_index,
        images,
    })
}

/// Pick `count` questions for a player's entry quiz. Unattempted questions
/// come first; when they run out the remainder is drawn uniformly from the
/// pool; an empty or undersized pool is padded from the local fallback.
pub fn select_for_player(
    pool: &[Question],
    attempted: &HashSet<String>,
    count: usize,
) -> Vec<Question> {
    let mut rng = rand::rng();

    let mut fresh: Vec<&Question> = pool
        .iter()
        .filter(|q| !attempted.contains(&q.id))
        .collect();
    shuffle(&mut fresh, &mut rng);

    let mut picked: Vec<Question> = fresh.into_iter().take(count).cloned().collect();

    // Fill with uniform repeats from the pool.
    while picked.len() < count && !pool.is_empty() {
        let idx = rng.random_range(0..pool.len());
        // SAFETY: `idx` is produced by `random_range(0..len)`.
        #[allow(clippy::indexing_slicing)]
        picked.push(pool[idx].clone());
    }

    // Pool empty or too small: pad with the bundled fallback.
    if picked.len() < count {
        let local = fallback::local_pool();
        let mut local_fresh: Vec<Question> = local
            .iter()
            .filter(|q| !attempted.contains(&q.id))
            .cloned()
            .collect();
        shuffle(&mut local_fresh, &mut rng);
        picked.extend(local_fresh.into_iter().take(count - picked.len()));

        while picked.len() < count {
            let idx = rng.random_range(0..local.len());
            // SAFETY: `idx` is produced by `random_range(0..len)` and the
            // bundled pool is never empty.
            #[allow(clippy::indexing_slicing)]
            picked.push(local[idx].clone());
        }
    }

    picked
}
