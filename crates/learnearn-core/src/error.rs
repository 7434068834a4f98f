//! Error types for the quiz core.
//!
//! `SourceError` is defined here rather than in `learnearn-providers` so the
//! retry executor can downcast collaborator errors and classify them for
//! retry decisions without string matching.

use thiserror::Error;

/// Errors raised by a question source or grader backend.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The topic does not exist.
    #[error("topic not found: {0}")]
    NotFound(u32),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SourceError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SourceError::NotFound(_) | SourceError::InvalidResponse(_)
        )
    }
}

/// Terminal outcome of a question fetch after retries.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt failed with a transient error.
    #[error("failed to load quiz questions after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The source has no such topic.
    #[error("quiz topic {0} not found")]
    NotFound(u32),

    /// The source knows the topic but returned no questions.
    #[error("quiz topic {0} has no questions")]
    EmptyQuestionSet(u32),

    /// The fetched questions break a structural rule.
    #[error("quiz topic {topic_id} has an invalid question set: {reason}")]
    InvalidQuestionSet { topic_id: u32, reason: String },

    /// The retry chain was cancelled before it finished.
    #[error("question fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Message shown to the user when the session lands in `Failed`.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Exhausted { .. } => {
                "Failed to load quiz questions. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Local validation failures. These never change session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select an answer before continuing")]
    NoAnswerSelected,

    #[error("not all questions answered ({answered} of {total})")]
    NotAllAnswered { answered: usize, total: usize },

    #[error("option {index} is out of range for a question with {options} options")]
    OptionOutOfRange { index: usize, options: usize },
}

/// Errors reported synchronously by session transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The transition is not defined for the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Scoring was asked to grade an empty question set.
    #[error("cannot score an empty question set")]
    NoQuestions,
}
