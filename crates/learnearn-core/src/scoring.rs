//! Quiz scoring and reward tiering.
//!
//! `score` is pure: no I/O, no clock, no randomness. Crediting the reward is
//! the caller's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::QuizError;
use crate::model::{Answer, Question, QuestionId, ScoreResult};

/// Minimum percentage for the full reward (inclusive).
pub const FULL_REWARD_THRESHOLD: f64 = 80.0;

/// Minimum percentage for the half reward (inclusive).
pub const HALF_REWARD_THRESHOLD: f64 = 60.0;

/// Reward bucket a percentage falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardTier {
    Full,
    Half,
    None,
}

impl RewardTier {
    pub fn for_percentage(percentage: f64) -> Self {
        if percentage >= FULL_REWARD_THRESHOLD {
            RewardTier::Full
        } else if percentage >= HALF_REWARD_THRESHOLD {
            RewardTier::Half
        } else {
            RewardTier::None
        }
    }

    /// Amount earned from `potential_reward` in this tier.
    pub fn apply(self, potential_reward: u64) -> u64 {
        match self {
            RewardTier::Full => potential_reward,
            RewardTier::Half => potential_reward / 2,
            RewardTier::None => 0,
        }
    }
}

/// Score `answers` against `questions`.
///
/// Missing answers count as incorrect. Answers for ids outside `questions`
/// are ignored. Fails only when `questions` is empty.
pub fn score(
    questions: &[Question],
    answers: &BTreeMap<QuestionId, Answer>,
    potential_reward: u64,
) -> Result<ScoreResult, QuizError> {
    let total_questions = questions.len();
    if total_questions == 0 {
        return Err(QuizError::NoQuestions);
    }

    let correct_count = questions
        .iter()
        .filter(|q| {
            answers
                .get(&q.id)
                .is_some_and(|a| a.selected_option == q.correct_option)
        })
        .count();

    let percentage_correct = 100.0 * correct_count as f64 / total_questions as f64;
    let earned_reward = RewardTier::for_percentage(percentage_correct).apply(potential_reward);

    Ok(ScoreResult {
        correct_count,
        total_questions,
        percentage_correct,
        earned_reward,
    })
}
