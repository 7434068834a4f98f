//! Quiz session state machine.
//!
//! A `QuizSession` is a plain value owned by whoever drives it (a CLI loop,
//! a bot handler, a UI view). Every transition is a synchronous method that
//! either applies completely or returns an error and leaves the session
//! untouched. The only asynchronous steps, fetching questions and grading,
//! happen outside and are fed back in through [`QuizSession::apply_load`]
//! and [`QuizSession::complete_submission`].
//!
//! ```text
//! Loading --apply_load(ok)--> Ready --advance(last)--> Submitting --ok--> Completed
//!    |                          ^                          |                  |
//!    +--apply_load(err)--> Failed <-------------err--------+                  |
//!                           |  ^----------------------------------------------+
//!                           +--reset--> Ready (questions kept) | Loading (none)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FetchError, QuizError, ValidationError};
use crate::model::{check_question_set, Answer, Question, QuestionId, ScoreResult, TopicId};
use crate::traits::Submission;

/// Which step a failed session failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fetch,
    Submission,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Submitting,
    Completed,
    Failed { stage: FailureStage, message: String },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Submitting => "submitting",
            SessionState::Completed => "completed",
            SessionState::Failed { .. } => "failed",
        }
    }
}

/// Result of a successful `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the question at `index`.
    Moved { index: usize },
    /// Every question is answered; the session now waits for grading.
    Submitting,
    /// A submission is already in flight; nothing changed.
    Ignored,
}

/// Result of a `reset` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Back at the first question with the already loaded question set.
    Ready,
    /// No questions were ever loaded; the caller must fetch again.
    NeedsFetch,
}

/// Outcome of a question fetch for one topic.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        topic_id: TopicId,
        questions: Vec<Question>,
        potential_reward: u64,
    },
    Failed {
        topic_id: TopicId,
        error: FetchError,
    },
}

impl LoadOutcome {
    pub fn topic_id(&self) -> TopicId {
        match self {
            LoadOutcome::Loaded { topic_id, .. } | LoadOutcome::Failed { topic_id, .. } => {
                *topic_id
            }
        }
    }
}

/// One user's attempt at one topic.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    topic_id: TopicId,
    potential_reward: u64,
    questions: Vec<Question>,
    answers: BTreeMap<QuestionId, Answer>,
    current_index: usize,
    /// Highlighted option for the current question. The authoritative record
    /// lives in `answers`.
    selected_option: Option<usize>,
    result: Option<ScoreResult>,
    state: SessionState,
}

impl QuizSession {
    /// A new session in `Loading` for `topic_id`.
    pub fn new(topic_id: TopicId) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, topic_id, "session created");
        Self {
            id,
            topic_id,
            potential_reward: 0,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            current_index: 0,
            selected_option: None,
            result: None,
            state: SessionState::Loading,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    pub fn potential_reward(&self) -> u64 {
        self.potential_reward
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, Answer> {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn selected_option(&self) -> Option<usize> {
        self.selected_option
    }

    pub fn result(&self) -> Option<&ScoreResult> {
        self.result.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The user-visible error message, if the session failed.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// The question currently on screen. `None` unless the session is
    /// `Ready`.
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::Ready => self.questions.get(self.current_index),
            _ => None,
        }
    }

    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty() && self.current_index == self.questions.len() - 1
    }

    /// Apply the outcome of a question fetch.
    ///
    /// Returns `false` when the outcome was discarded: it belongs to another
    /// topic, it came from a cancelled chain, or the session is no longer
    /// loading.
    pub fn apply_load(&mut self, outcome: LoadOutcome) -> bool {
        if outcome.topic_id() != self.topic_id {
            tracing::warn!(
                session = %self.id,
                expected = self.topic_id,
                got = outcome.topic_id(),
                "discarding questions for a different topic"
            );
            return false;
        }
        if self.state != SessionState::Loading {
            tracing::debug!(session = %self.id, state = self.state.label(), "ignoring late load");
            return false;
        }

        match outcome {
            LoadOutcome::Loaded {
                topic_id,
                questions,
                potential_reward,
            } => {
                if questions.is_empty() {
                    let error = FetchError::EmptyQuestionSet(topic_id);
                    self.fail(FailureStage::Fetch, error.user_message());
                    return true;
                }
                if let Err(reason) = check_question_set(&questions) {
                    let error = FetchError::InvalidQuestionSet { topic_id, reason };
                    self.fail(FailureStage::Fetch, error.user_message());
                    return true;
                }
                self.questions = questions;
                self.potential_reward = potential_reward;
                self.clear_progress();
                self.state = SessionState::Ready;
                tracing::debug!(
                    session = %self.id,
                    questions = self.questions.len(),
                    potential_reward,
                    "session ready"
                );
                true
            }
            LoadOutcome::Failed {
                error: FetchError::Cancelled,
                ..
            } => {
                tracing::debug!(session = %self.id, "discarding cancelled fetch");
                false
            }
            LoadOutcome::Failed { error, .. } => {
                self.fail(FailureStage::Fetch, error.user_message());
                true
            }
        }
    }

    /// Record `option` as the answer to the current question.
    ///
    /// No-op when there is no current question. Answering again replaces the
    /// earlier answer.
    pub fn answer_question(&mut self, option: usize) -> Result<(), QuizError> {
        let Some(question) = self.current_question() else {
            tracing::debug!(session = %self.id, state = self.state.label(), "no current question");
            return Ok(());
        };
        if option >= question.options.len() {
            return Err(ValidationError::OptionOutOfRange {
                index: option,
                options: question.options.len(),
            }
            .into());
        }

        let question_id = question.id;
        self.answers.insert(
            question_id,
            Answer {
                question_id,
                selected_option: option,
            },
        );
        self.selected_option = Some(option);
        Ok(())
    }

    /// Move to the next question, or enter `Submitting` on the last one.
    ///
    /// Also retries a failed submission. Ignored while a submission is in
    /// flight.
    pub fn advance(&mut self) -> Result<Advance, QuizError> {
        match &self.state {
            SessionState::Submitting => {
                tracing::debug!(session = %self.id, "submission in flight, ignoring advance");
                return Ok(Advance::Ignored);
            }
            SessionState::Ready
            | SessionState::Failed {
                stage: FailureStage::Submission,
                ..
            } => {}
            other => {
                return Err(QuizError::InvalidTransition {
                    action: "advance",
                    state: other.label(),
                })
            }
        }

        if self.selected_option.is_none() {
            return Err(ValidationError::NoAnswerSelected.into());
        }

        if !self.is_last_question() {
            self.current_index += 1;
            self.selected_option = None;
            return Ok(Advance::Moved {
                index: self.current_index,
            });
        }

        if self.answers.len() != self.questions.len() {
            return Err(ValidationError::NotAllAnswered {
                answered: self.answers.len(),
                total: self.questions.len(),
            }
            .into());
        }

        self.state = SessionState::Submitting;
        tracing::debug!(session = %self.id, "submitting answers");
        Ok(Advance::Submitting)
    }

    /// The answer sheet for the grader. Only meaningful while `Submitting`.
    pub fn submission(&self, user_id: u64) -> Submission {
        Submission {
            topic_id: self.topic_id,
            user_id,
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            potential_reward: self.potential_reward,
        }
    }

    /// Finish the in-flight submission with the grader's verdict.
    pub fn complete_submission(
        &mut self,
        outcome: Result<ScoreResult, String>,
    ) -> Result<(), QuizError> {
        if self.state != SessionState::Submitting {
            return Err(QuizError::InvalidTransition {
                action: "complete a submission",
                state: self.state.label(),
            });
        }

        match outcome {
            Ok(result) => {
                tracing::info!(
                    session = %self.id,
                    topic_id = self.topic_id,
                    correct = result.correct_count,
                    total = result.total_questions,
                    earned = result.earned_reward,
                    "quiz completed"
                );
                self.result = Some(result);
                self.state = SessionState::Completed;
            }
            Err(message) => self.fail(FailureStage::Submission, message),
        }
        Ok(())
    }

    /// Start over. Keeps the loaded questions.
    pub fn reset(&mut self) -> Result<ResetOutcome, QuizError> {
        match self.state {
            SessionState::Completed | SessionState::Failed { .. } => {}
            _ => {
                return Err(QuizError::InvalidTransition {
                    action: "reset",
                    state: self.state.label(),
                })
            }
        }

        self.clear_progress();
        if self.questions.is_empty() {
            self.state = SessionState::Loading;
            Ok(ResetOutcome::NeedsFetch)
        } else {
            self.state = SessionState::Ready;
            Ok(ResetOutcome::Ready)
        }
    }

    fn clear_progress(&mut self) {
        self.current_index = 0;
        self.answers.clear();
        self.selected_option = None;
        self.result = None;
    }

    fn fail(&mut self, stage: FailureStage, message: String) {
        tracing::warn!(session = %self.id, ?stage, %message, "session failed");
        self.state = SessionState::Failed { stage, message };
    }
}
