//! Async quiz engine.
//!
//! Drives a [`QuizSession`] through its suspension points: loading questions
//! (with retries and cancellation), grading a submission exactly once, and
//! crediting the earned reward.

use std::sync::Arc;

use anyhow::Result;

use crate::error::QuizError;
use crate::model::{ScoreResult, TopicId};
use crate::retry::{fetch_with_retry, CancelToken, RetryPolicy};
use crate::session::{Advance, LoadOutcome, QuizSession, SessionState};
use crate::traits::{Grader, QuestionSource, RewardSink};

/// Message stored on a session whose submission failed.
pub const SUBMISSION_FAILED_MESSAGE: &str = "Failed to submit quiz. Please try again.";

/// Configuration for the quiz engine.
#[derive(Debug, Clone)]
pub struct QuizEngineConfig {
    /// Retry policy for question fetches.
    pub retry: RetryPolicy,
    /// User the submissions are made for.
    pub user_id: u64,
}

impl Default for QuizEngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            user_id: 0,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_fetch_attempt(&self, topic_id: TopicId, attempt: u32);
    fn on_fetch_error(&self, topic_id: TopicId, attempt: u32, error: &str, will_retry: bool);
    fn on_session_ready(&self, session: &QuizSession);
    fn on_session_failed(&self, session: &QuizSession);
    fn on_quiz_completed(&self, session: &QuizSession, result: &ScoreResult);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_fetch_attempt(&self, _: TopicId, _: u32) {}
    fn on_fetch_error(&self, _: TopicId, _: u32, _: &str, _: bool) {}
    fn on_session_ready(&self, _: &QuizSession) {}
    fn on_session_failed(&self, _: &QuizSession) {}
    fn on_quiz_completed(&self, _: &QuizSession, _: &ScoreResult) {}
}

/// The quiz engine.
pub struct QuizEngine {
    source: Arc<dyn QuestionSource>,
    grader: Arc<dyn Grader>,
    sink: Arc<dyn RewardSink>,
    config: QuizEngineConfig,
}

impl QuizEngine {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        grader: Arc<dyn Grader>,
        sink: Arc<dyn RewardSink>,
        config: QuizEngineConfig,
    ) -> Self {
        Self {
            source,
            grader,
            sink,
            config,
        }
    }

    pub fn source(&self) -> &dyn QuestionSource {
        self.source.as_ref()
    }

    pub fn config(&self) -> &QuizEngineConfig {
        &self.config
    }

    /// Fetch the questions and potential reward of a topic.
    pub async fn fetch(
        &self,
        topic_id: TopicId,
        token: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> LoadOutcome {
        match fetch_with_retry(
            self.source.as_ref(),
            topic_id,
            &self.config.retry,
            token,
            progress,
        )
        .await
        {
            Ok(fetched) => LoadOutcome::Loaded {
                topic_id,
                questions: fetched.questions,
                potential_reward: fetched.potential_reward,
            },
            Err(error) => LoadOutcome::Failed { topic_id, error },
        }
    }

    /// Open a session for `topic_id` and load it.
    ///
    /// Returns `None` if `token` was cancelled before the load finished; the
    /// partially loaded session is dropped so it can never overwrite a newer
    /// one.
    pub async fn start(
        &self,
        topic_id: TopicId,
        token: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> Option<QuizSession> {
        let mut session = QuizSession::new(topic_id);
        if self.load(&mut session, token, progress).await {
            Some(session)
        } else {
            None
        }
    }

    /// Load questions into a session sitting in `Loading`.
    ///
    /// Returns `false` if the outcome was discarded.
    pub async fn load(
        &self,
        session: &mut QuizSession,
        token: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> bool {
        let outcome = self.fetch(session.topic_id(), token, progress).await;
        if token.is_cancelled() || !session.apply_load(outcome) {
            return false;
        }
        match session.state() {
            SessionState::Ready => progress.on_session_ready(session),
            _ => progress.on_session_failed(session),
        }
        true
    }

    /// Advance the session; on the last question grade it.
    ///
    /// The grader runs exactly once per transition into `Submitting`. Grader
    /// failures leave the session in `Failed` with its answers intact.
    pub async fn submit(
        &self,
        session: &mut QuizSession,
        progress: &dyn ProgressReporter,
    ) -> Result<Advance, QuizError> {
        let step = session.advance()?;
        if step != Advance::Submitting {
            return Ok(step);
        }

        let submission = session.submission(self.config.user_id);
        let graded = self.grader.grade(&submission).await;
        match graded {
            Ok(result) => {
                session.complete_submission(Ok(result))?;
                progress.on_quiz_completed(session, &result);
            }
            Err(e) => {
                tracing::error!(
                    topic_id = session.topic_id(),
                    grader = self.grader.name(),
                    "submission failed: {e:#}"
                );
                session.complete_submission(Err(SUBMISSION_FAILED_MESSAGE.to_string()))?;
                progress.on_session_failed(session);
            }
        }
        Ok(step)
    }

    /// Credit the reward of a completed session.
    ///
    /// Returns the new balance, or `None` when nothing was earned.
    pub async fn credit(&self, session: &QuizSession) -> Result<Option<u64>> {
        let Some(result) = session.result() else {
            anyhow::bail!(
                "cannot credit a session that is {}",
                session.state().label()
            );
        };
        if result.earned_reward == 0 {
            return Ok(None);
        }
        let balance = self
            .sink
            .credit(session.topic_id(), result.earned_reward)
            .await?;
        tracing::info!(
            topic_id = session.topic_id(),
            amount = result.earned_reward,
            balance,
            "reward credited"
        );
        Ok(Some(balance))
    }
}
