//! Collaborator traits for question sources, graders and reward sinks.
//!
//! These async traits are implemented by the `learnearn-providers` crate.
//! Implementations report backend failures as [`SourceError`] wrapped in
//! `anyhow::Error` so the retry executor can classify them.
//!
//! [`SourceError`]: crate::error::SourceError

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Answer, Question, QuestionId, ScoreResult, TopicId, TopicSummary};
use crate::scoring::score;

// ---------------------------------------------------------------------------
// Question source
// ---------------------------------------------------------------------------

/// Where topics and their questions come from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Human-readable source name (e.g. "builtin").
    fn name(&self) -> &str;

    /// List the available topics.
    async fn fetch_topics(&self) -> anyhow::Result<Vec<TopicSummary>>;

    /// Fetch the ordered question set of a topic.
    ///
    /// An existing topic without questions returns an empty vector; an
    /// unknown topic fails with `SourceError::NotFound`.
    async fn fetch_questions(&self, topic_id: TopicId) -> anyhow::Result<Vec<Question>>;

    /// Potential reward configured for a topic.
    async fn fetch_reward_amount(&self, topic_id: TopicId) -> anyhow::Result<u64>;
}

// ---------------------------------------------------------------------------
// Grader
// ---------------------------------------------------------------------------

/// A completed answer sheet handed to a grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub topic_id: TopicId,
    pub user_id: u64,
    pub questions: Vec<Question>,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub potential_reward: u64,
}

/// Turns a submission into a score.
#[async_trait]
pub trait Grader: Send + Sync {
    fn name(&self) -> &str;

    async fn grade(&self, submission: &Submission) -> anyhow::Result<ScoreResult>;
}

/// Grades in-process with [`score`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalGrader;

#[async_trait]
impl Grader for LocalGrader {
    fn name(&self) -> &str {
        "local"
    }

    async fn grade(&self, submission: &Submission) -> anyhow::Result<ScoreResult> {
        Ok(score(
            &submission.questions,
            &submission.answers,
            submission.potential_reward,
        )?)
    }
}

// ---------------------------------------------------------------------------
// Reward sink
// ---------------------------------------------------------------------------

/// Receives earned rewards after a session completes.
#[async_trait]
pub trait RewardSink: Send + Sync {
    /// Credit `amount` tokens earned on `topic_id`. Returns the new balance.
    async fn credit(&self, topic_id: TopicId, amount: u64) -> anyhow::Result<u64>;
}
