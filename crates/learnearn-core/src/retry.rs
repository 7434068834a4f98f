//! Bounded question-fetch retries with cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::engine::ProgressReporter;
use crate::error::{FetchError, SourceError};
use crate::model::{Question, TopicId};
use crate::traits::QuestionSource;

/// How many times to try a fetch and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1500),
        }
    }
}

/// Cancellation flag shared between the owner of a session and its
/// in-flight fetch.
///
/// Clones observe the same flag. Switching topics cancels the old token and
/// hands a fresh one to the new fetch.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Questions and potential reward of a topic, fetched in one attempt.
#[derive(Debug, Clone)]
pub struct FetchedTopic {
    pub questions: Vec<Question>,
    pub potential_reward: u64,
}

/// One attempt: the questions, then the reward of a non-empty set.
async fn fetch_topic(
    source: &dyn QuestionSource,
    topic_id: TopicId,
) -> anyhow::Result<FetchedTopic> {
    let questions = source.fetch_questions(topic_id).await?;
    if questions.is_empty() {
        return Ok(FetchedTopic {
            questions,
            potential_reward: 0,
        });
    }
    let potential_reward = source.fetch_reward_amount(topic_id).await?;
    Ok(FetchedTopic {
        questions,
        potential_reward,
    })
}

/// Fetch the questions and reward of `topic_id`, retrying transient failures.
///
/// A failed reward lookup fails the whole attempt, so both calls share the
/// same attempt budget. Stops early on permanent errors (unknown topic,
/// unusable response) and on an empty question set. Cancellation is checked
/// before every attempt and raced against every wait and fetch.
pub async fn fetch_with_retry(
    source: &dyn QuestionSource,
    topic_id: TopicId,
    policy: &RetryPolicy,
    token: &CancelToken,
    progress: &dyn ProgressReporter,
) -> Result<FetchedTopic, FetchError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::select! {
                _ = tokio::time::sleep(policy.backoff) => {}
                _ = token.cancelled() => return Err(FetchError::Cancelled),
            }
        }
        if token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        progress.on_fetch_attempt(topic_id, attempt);
        let fetched = tokio::select! {
            fetched = fetch_topic(source, topic_id) => fetched,
            _ = token.cancelled() => return Err(FetchError::Cancelled),
        };

        match fetched {
            Ok(topic) if topic.questions.is_empty() => {
                return Err(FetchError::EmptyQuestionSet(topic_id));
            }
            Ok(topic) => return Ok(topic),
            Err(e) => {
                match e.downcast_ref::<SourceError>() {
                    Some(SourceError::NotFound(id)) => return Err(FetchError::NotFound(*id)),
                    Some(permanent) if permanent.is_permanent() => {
                        return Err(FetchError::InvalidQuestionSet {
                            topic_id,
                            reason: permanent.to_string(),
                        });
                    }
                    _ => {}
                }

                let will_retry = attempt < attempts;
                tracing::warn!(
                    topic_id,
                    attempt,
                    will_retry,
                    "question fetch failed: {e:#}"
                );
                progress.on_fetch_error(topic_id, attempt, &e.to_string(), will_retry);
                last_error = Some(e);
            }
        }
    }

    Err(FetchError::Exhausted {
        attempts,
        last_error: last_error
            .map(|e| format!("{e:#}"))
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}
