//! Mock backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use learnearn_core::error::SourceError;
use learnearn_core::model::{Difficulty, Question, ScoreResult, TopicId, TopicSummary};
use learnearn_core::traits::{Grader, LocalGrader, QuestionSource, Submission};

/// A scripted question source and grader.
///
/// Question fetches fail with a transport error until `fetch_failures` calls
/// have been made; gradings fail the same way for `grade_failures` calls.
/// Successful gradings use [`LocalGrader`].
pub struct MockBackend {
    /// Topic id → (questions, reward).
    topics: HashMap<TopicId, (Vec<Question>, u64)>,
    fetch_failures: u32,
    grade_failures: u32,
    fetch_count: AtomicU32,
    grade_count: AtomicU32,
    last_submission: Mutex<Option<Submission>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            fetch_failures: 0,
            grade_failures: 0,
            fetch_count: AtomicU32::new(0),
            grade_count: AtomicU32::new(0),
            last_submission: Mutex::new(None),
        }
    }

    /// Register a topic.
    pub fn with_topic(mut self, topic_id: TopicId, questions: Vec<Question>, reward: u64) -> Self {
        self.topics.insert(topic_id, (questions, reward));
        self
    }

    /// Fail the first `n` question fetches.
    pub fn failing_fetches(mut self, n: u32) -> Self {
        self.fetch_failures = n;
        self
    }

    /// Fail the first `n` gradings.
    pub fn failing_grades(mut self, n: u32) -> Self {
        self.grade_failures = n;
        self
    }

    /// Number of question fetches made so far.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Number of gradings requested so far.
    pub fn grade_count(&self) -> u32 {
        self.grade_count.load(Ordering::Relaxed)
    }

    /// The last submission handed to the grader.
    pub fn last_submission(&self) -> Option<Submission> {
        self.last_submission.lock().unwrap().clone()
    }

    fn topic(&self, topic_id: TopicId) -> anyhow::Result<&(Vec<Question>, u64)> {
        self.topics
            .get(&topic_id)
            .ok_or_else(|| SourceError::NotFound(topic_id).into())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionSource for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_topics(&self) -> anyhow::Result<Vec<TopicSummary>> {
        let mut topics: Vec<TopicSummary> = self
            .topics
            .iter()
            .map(|(id, (questions, reward))| TopicSummary {
                id: *id,
                title: format!("Mock topic {id}"),
                description: String::new(),
                difficulty: Difficulty::Beginner,
                reward_amount: *reward,
                questions_count: questions.len(),
            })
            .collect();
        topics.sort_by_key(|t| t.id);
        Ok(topics)
    }

    async fn fetch_questions(&self, topic_id: TopicId) -> anyhow::Result<Vec<Question>> {
        let call = self.fetch_count.fetch_add(1, Ordering::Relaxed) + 1;
        if call <= self.fetch_failures {
            return Err(SourceError::Transport(format!("mock fetch failure #{call}")).into());
        }
        Ok(self.topic(topic_id)?.0.clone())
    }

    async fn fetch_reward_amount(&self, topic_id: TopicId) -> anyhow::Result<u64> {
        Ok(self.topic(topic_id)?.1)
    }
}

#[async_trait]
impl Grader for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn grade(&self, submission: &Submission) -> anyhow::Result<ScoreResult> {
        let call = self.grade_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_submission.lock().unwrap() = Some(submission.clone());
        if call <= self.grade_failures {
            return Err(SourceError::ApiError {
                status: 503,
                message: "mock grading failure".into(),
            }
            .into());
        }
        LocalGrader.grade(submission).await
    }
}
