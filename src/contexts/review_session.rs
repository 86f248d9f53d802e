use super::conversation_builder::{build_review, candidates_frame, review_frame};
use super::model::{ModelError, ModelHandle};
use crate::data::ReviewRecord;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Review text did not parse into `ReviewRecord`s.
///
/// Reviews are advisory: callers fall back to the raw text on this error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReviewOutput {
    #[error("review reply contains no JSON list of scores")]
    NoJsonList,

    #[error("review reply lists no scored snippets")]
    Empty,

    #[error("review score for snippet '{snippet}' is not a percentage: {score}")]
    InvalidScore { snippet: String, score: String },
}

/// One independent review exchange.
///
/// The review prompt is captured when the session is created, so replacing
/// the orchestrator's prompt later never affects a review already running.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    model: ModelHandle,
    prompt: String,
}

impl ReviewSession {
    pub fn new(model: ModelHandle, prompt: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
        }
    }

    /// Scores one generated component; returns the reviewer's raw reply.
    pub async fn review(
        &self,
        description: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ModelError> {
        let frame = review_frame(description, code);
        debug!("{}", frame);
        let conversation = build_review(&self.prompt, frame);
        self.model.send(&conversation, cancel).await
    }

    /// Scores several candidates for the same description in one exchange.
    pub async fn review_candidates(
        &self,
        description: &str,
        candidates: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, ModelError> {
        let conversation = build_review(&self.prompt, candidates_frame(description, candidates));
        self.model.send(&conversation, cancel).await
    }
}

#[derive(Deserialize)]
struct RawRecord {
    snippet_name: serde_json::Value,
    accuracy_score: serde_json::Value,
    #[serde(default)]
    accuracy_summary: String,
}

/// Parses the first JSON list of `{snippet_name, accuracy_score, accuracy_summary}`
/// objects found in a review reply.
///
/// Scores may be integers, floats or strings like `"85%"`; anything outside
/// 0–100 is rejected.
pub fn parse_review_records(text: &str) -> Result<Vec<ReviewRecord>, MalformedReviewOutput> {
    let raw = text
        .match_indices('[')
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&text[start..])
                .into_iter::<Vec<RawRecord>>()
                .next()
                .and_then(Result::ok)
        })
        .ok_or(MalformedReviewOutput::NoJsonList)?;

    if raw.is_empty() {
        return Err(MalformedReviewOutput::Empty);
    }

    raw.into_iter()
        .map(|record| {
            let snippet_name = match record.snippet_name {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            let accuracy_score = parse_score(&record.accuracy_score).ok_or_else(|| {
                MalformedReviewOutput::InvalidScore {
                    snippet: snippet_name.clone(),
                    score: record.accuracy_score.to_string(),
                }
            })?;
            Ok(ReviewRecord {
                snippet_name,
                accuracy_score,
                accuracy_summary: record.accuracy_summary,
            })
        })
        .collect()
}

fn parse_score(value: &serde_json::Value) -> Option<u8> {
    let score = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if (0.0..=100.0).contains(&score) {
        Some(score.round() as u8)
    } else {
        None
    }
}

/// Picks the highest-scoring candidate among `candidate_count` snippets
/// numbered from 1. Ties go to the earliest snippet. Returns a 0-based index.
pub fn best_candidate(records: &[ReviewRecord], candidate_count: usize) -> Option<usize> {
    records
        .iter()
        .filter_map(|record| {
            let number = record.snippet_name.trim().trim_start_matches('#').parse::<usize>().ok()?;
            (1..=candidate_count)
                .contains(&number)
                .then_some((number - 1, record.accuracy_score))
        })
        .fold(None, |best: Option<(usize, u8)>, (idx, score)| match best {
            Some((best_idx, best_score))
                if best_score > score || (best_score == score && best_idx < idx) =>
            {
                Some((best_idx, best_score))
            }
            _ => Some((idx, score)),
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::model::ChatModel;
    use crate::data::{Conversation, Role};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingModel {
        seen: Mutex<Vec<Conversation>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn send(&self, conversation: &Conversation, _temperature: f32) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(conversation.clone());
            Ok("[{\"snippet_name\": 1, \"accuracy_score\": 90, \"accuracy_summary\": \"ok\"}]".to_string())
        }
    }

    #[tokio::test]
    async fn test_review_uses_prompt_and_frame() {
        let model = Arc::new(RecordingModel {
            seen: Mutex::new(Vec::new()),
        });
        let handle = ModelHandle::new(model.clone(), 0.2, Duration::from_secs(5));
        let session = ReviewSession::new(handle, "RUBRIC");

        let reply = session
            .review("desc", "def foo():\n    pass", &CancellationToken::new())
            .await
            .unwrap();
        assert!(reply.contains("accuracy_score"));

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let turns = seen[0].turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[0].content, "RUBRIC");
        assert_eq!(
            turns[1].content,
            "Component request: desc\nGenerated component:\n```\ndef foo():\n    pass\n```\n"
        );
    }

    #[test]
    fn test_parse_records_from_prose() {
        let text = r#"Here is my review:
```json
[
  {"snippet_name": 1, "accuracy_score": 85, "accuracy_summary": "Good use of the template."},
  {"snippet_name": "2", "accuracy_score": "60%", "accuracy_summary": "Imports at top level."}
]
```"#;

        let records = parse_review_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].snippet_name, "1");
        assert_eq!(records[0].accuracy_score, 85);
        assert_eq!(records[1].snippet_name, "2");
        assert_eq!(records[1].accuracy_score, 60);
        assert_eq!(records[1].accuracy_summary, "Imports at top level.");
    }

    #[test]
    fn test_parse_skips_non_json_brackets() {
        let text = "Scores [see below]:\n[{\"snippet_name\": 1, \"accuracy_score\": 70.4}]";
        let records = parse_review_records(text).unwrap();
        assert_eq!(records[0].accuracy_score, 70);
        assert_eq!(records[0].accuracy_summary, "");
    }

    #[test]
    fn test_parse_free_text_is_malformed() {
        assert_eq!(
            parse_review_records("Accuracy: 80%. Looks fine."),
            Err(MalformedReviewOutput::NoJsonList)
        );
        assert_eq!(parse_review_records("[]"), Err(MalformedReviewOutput::Empty));
    }

    #[test]
    fn test_parse_rejects_out_of_range_score() {
        let text = r#"[{"snippet_name": 1, "accuracy_score": 140, "accuracy_summary": "?"}]"#;
        assert!(matches!(
            parse_review_records(text),
            Err(MalformedReviewOutput::InvalidScore { .. })
        ));
    }

    fn record(name: &str, score: u8) -> ReviewRecord {
        ReviewRecord {
            snippet_name: name.to_string(),
            accuracy_score: score,
            accuracy_summary: String::new(),
        }
    }

    #[test]
    fn test_best_candidate_picks_highest() {
        let records = vec![record("1", 70), record("2", 95), record("3", 80)];
        assert_eq!(best_candidate(&records, 3), Some(1));
    }

    #[test]
    fn test_best_candidate_tie_goes_to_first() {
        let records = vec![record("2", 90), record("1", 90)];
        assert_eq!(best_candidate(&records, 2), Some(0));
    }

    #[test]
    fn test_best_candidate_ignores_unknown_snippets() {
        let records = vec![record("7", 99), record("abc", 99)];
        assert_eq!(best_candidate(&records, 3), None);
    }
}
