//! Remote quiz API backend.
//!
//! Talks JSON over HTTP to a quiz service exposing:
//!
//! - `GET {base}/quizzes`: topic listing
//! - `GET {base}/quizzes/{id}/questions`: ordered question set
//! - `POST {base}/quizzes/submit`: server-side grading

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::instrument;

use learnearn_core::error::SourceError;
use learnearn_core::model::{Difficulty, Question, QuestionId, ScoreResult, TopicId, TopicSummary};
use learnearn_core::scoring::RewardTier;
use learnearn_core::traits::{Grader, QuestionSource, Submission};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP question source and grader.
pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send a request and decode a JSON body, mapping failures to
    /// [`SourceError`]. A 404 maps to `NotFound(topic_id)` when the request
    /// targets a single topic.
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        topic_id: Option<TopicId>,
    ) -> Result<T, SourceError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout_secs)
            } else {
                SourceError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 404 {
            if let Some(id) = topic_id {
                return Err(SourceError::NotFound(id));
            }
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(SourceError::ApiError { status, message });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("failed to parse response: {e}")))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTopic {
    id: TopicId,
    title: String,
    #[serde(default)]
    description: String,
    difficulty: String,
    #[serde(default)]
    questions_count: usize,
    reward_amount: u64,
}

impl WireTopic {
    fn into_summary(self) -> Result<TopicSummary, SourceError> {
        let difficulty: Difficulty = self
            .difficulty
            .parse()
            .map_err(|e: String| SourceError::InvalidResponse(format!("topic {}: {e}", self.id)))?;
        Ok(TopicSummary {
            id: self.id,
            title: self.title,
            description: self.description,
            difficulty,
            reward_amount: self.reward_amount,
            questions_count: self.questions_count,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQuestion {
    id: QuestionId,
    question: String,
    options: Vec<String>,
    correct_answer: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSubmission {
    topic_id: TopicId,
    user_id: u64,
    answers: Vec<WireAnswer>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAnswer {
    question_id: QuestionId,
    answer_id: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireScore {
    correct_count: usize,
    total_questions: usize,
    percentage_correct: f64,
    earned_reward: u64,
}

impl WireScore {
    /// Check the server's score against the submission it grades.
    fn into_result(self, submission: &Submission) -> Result<ScoreResult, SourceError> {
        let invalid = |reason: String| SourceError::InvalidResponse(format!("score: {reason}"));

        let expected_total = submission.questions.len();
        if self.total_questions == 0 || self.total_questions != expected_total {
            return Err(invalid(format!(
                "{} questions graded, {expected_total} submitted",
                self.total_questions
            )));
        }
        if self.correct_count > self.total_questions {
            return Err(invalid(format!(
                "{} correct out of {}",
                self.correct_count, self.total_questions
            )));
        }
        if !(0.0..=100.0).contains(&self.percentage_correct) {
            return Err(invalid(format!(
                "percentage {} out of range",
                self.percentage_correct
            )));
        }
        let expected_reward =
            RewardTier::for_percentage(self.percentage_correct).apply(submission.potential_reward);
        if self.earned_reward != expected_reward {
            return Err(invalid(format!(
                "earned reward {} does not match {expected_reward} for {}%",
                self.earned_reward, self.percentage_correct
            )));
        }

        Ok(ScoreResult {
            correct_count: self.correct_count,
            total_questions: self.total_questions,
            percentage_correct: self.percentage_correct,
            earned_reward: self.earned_reward,
        })
    }
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

#[async_trait]
impl QuestionSource for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_topics(&self) -> anyhow::Result<Vec<TopicSummary>> {
        let request = self.client.get(format!("{}/quizzes", self.base_url));
        let topics: Vec<WireTopic> = self.call(request, None).await?;
        let topics = topics
            .into_iter()
            .map(WireTopic::into_summary)
            .collect::<Result<Vec<_>, SourceError>>()?;
        Ok(topics)
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_questions(&self, topic_id: TopicId) -> anyhow::Result<Vec<Question>> {
        let request = self
            .client
            .get(format!("{}/quizzes/{topic_id}/questions", self.base_url));
        let questions: Vec<WireQuestion> = self.call(request, Some(topic_id)).await?;
        tracing::debug!(count = questions.len(), "questions received");

        Ok(questions
            .into_iter()
            .map(|q| Question {
                id: q.id,
                prompt: q.question,
                options: q.options,
                correct_option: q.correct_answer,
            })
            .collect())
    }

    async fn fetch_reward_amount(&self, topic_id: TopicId) -> anyhow::Result<u64> {
        let topics = self.fetch_topics().await?;
        topics
            .iter()
            .find(|t| t.id == topic_id)
            .map(|t| t.reward_amount)
            .ok_or_else(|| SourceError::NotFound(topic_id).into())
    }
}

#[async_trait]
impl Grader for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, submission), fields(topic_id = submission.topic_id))]
    async fn grade(&self, submission: &Submission) -> anyhow::Result<ScoreResult> {
        let body = WireSubmission {
            topic_id: submission.topic_id,
            user_id: submission.user_id,
            answers: submission
                .answers
                .values()
                .map(|a| WireAnswer {
                    question_id: a.question_id,
                    answer_id: a.selected_option,
                })
                .collect(),
        };
        let request = self
            .client
            .post(format!("{}/quizzes/submit", self.base_url))
            .json(&body);
        let score: WireScore = self.call(request, Some(submission.topic_id)).await?;
        let result = score.into_result(submission)?;
        tracing::debug!(
            correct = result.correct_count,
            earned = result.earned_reward,
            "submission graded"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use learnearn_core::engine::{NoopReporter, QuizEngine, QuizEngineConfig};
    use learnearn_core::model::Answer;
    use learnearn_core::retry::CancelToken;
    use learnearn_core::session::{FailureStage, SessionState};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::ledger::Ledger;

    fn topics_body() -> serde_json::Value {
        serde_json::json!([
            {
                "id": 1,
                "title": "Blockchain Basics",
                "description": "Learn the fundamental concepts of blockchain technology",
                "imageUrl": "https://example.com/blockchain.png",
                "questionsCount": 5,
                "difficulty": "Beginner",
                "rewardAmount": 10
            },
            {
                "id": 3,
                "title": "DeFi Fundamentals",
                "description": "Explore the world of decentralized finance",
                "questionsCount": 5,
                "difficulty": "Advanced",
                "rewardAmount": 30
            }
        ])
    }

    fn question(id: QuestionId) -> Question {
        Question {
            id,
            prompt: format!("Question {id}"),
            options: vec!["a".into(), "b".into()],
            correct_option: 0,
        }
    }

    fn two_question_submission(potential_reward: u64) -> Submission {
        let answers = BTreeMap::from([
            (
                101,
                Answer {
                    question_id: 101,
                    selected_option: 0,
                },
            ),
            (
                102,
                Answer {
                    question_id: 102,
                    selected_option: 0,
                },
            ),
        ]);
        Submission {
            topic_id: 1,
            user_id: 0,
            questions: vec![question(101), question(102)],
            answers,
            potential_reward,
        }
    }

    fn score_body(correct: usize, total: usize, percentage: f64, earned: u64) -> serde_json::Value {
        serde_json::json!({
            "correctCount": correct,
            "totalQuestions": total,
            "percentageCorrect": percentage,
            "earnedReward": earned
        })
    }

    async fn grade_with_score(score: serde_json::Value) -> anyhow::Result<ScoreResult> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quizzes/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(score))
            .mount(&server)
            .await;
        let backend = HttpBackend::new(&server.uri(), None).unwrap();
        backend.grade(&two_question_submission(10)).await
    }

    #[tokio::test]
    async fn lists_topics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quizzes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(topics_body()))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri(), None).unwrap();
        let topics = backend.fetch_topics().await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[1].difficulty, Difficulty::Advanced);
        assert_eq!(backend.fetch_reward_amount(3).await.unwrap(), 30);

        let err = backend.fetch_reward_amount(2).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::NotFound(2))
        ));
    }

    #[tokio::test]
    async fn fetches_questions_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quizzes/1/questions"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": 101,
                    "question": "What is a blockchain?",
                    "options": ["A coin", "A distributed ledger", "A database", "A language"],
                    "correctAnswer": 1
                }
            ])))
            .mount(&server)
            .await;

        let base_url = format!("{}/", server.uri());
        let backend = HttpBackend::new(&base_url, Some("secret".into())).unwrap();
        let questions = backend.fetch_questions(1).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].prompt, "What is a blockchain?");
        assert_eq!(questions[0].correct_option, 1);
    }

    #[tokio::test]
    async fn missing_topic_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quizzes/9/questions"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri(), None).unwrap();
        let err = backend.fetch_questions(9).await.unwrap_err();
        let source_err = err.downcast_ref::<SourceError>().unwrap();
        assert!(matches!(source_err, SourceError::NotFound(9)));
        assert!(source_err.is_permanent());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quizzes/1/questions"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({"message": "maintenance"})),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri(), None).unwrap();
        let err = backend.fetch_questions(1).await.unwrap_err();
        let source_err = err.downcast_ref::<SourceError>().unwrap();
        match source_err {
            SourceError::ApiError { status, message } => {
                assert_eq!(*status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!source_err.is_permanent());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quizzes/1/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri(), None).unwrap();
        let err = backend.fetch_questions(1).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn grades_remotely() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quizzes/submit"))
            .and(body_json(serde_json::json!({
                "topicId": 1,
                "userId": 7,
                "answers": [
                    {"questionId": 101, "answerId": 1},
                    {"questionId": 102, "answerId": 0}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "correctCount": 1,
                "totalQuestions": 2,
                "percentageCorrect": 50.0,
                "earnedReward": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answers = BTreeMap::from([
            (
                101,
                Answer {
                    question_id: 101,
                    selected_option: 1,
                },
            ),
            (
                102,
                Answer {
                    question_id: 102,
                    selected_option: 0,
                },
            ),
        ]);
        let submission = Submission {
            topic_id: 1,
            user_id: 7,
            questions: vec![question(101), question(102)],
            answers,
            potential_reward: 10,
        };

        let backend = HttpBackend::new(&server.uri(), None).unwrap();
        let result = backend.grade(&submission).await.unwrap();
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.total_questions, 2);
        assert_eq!(result.earned_reward, 0);
    }

    #[tokio::test]
    async fn inflated_score_is_rejected() {
        let err = grade_with_score(serde_json::json!({
            "correctCount": 9,
            "totalQuestions": 0,
            "percentageCorrect": 250.0,
            "earnedReward": 1000000
        }))
        .await
        .unwrap_err();
        let source_err = err.downcast_ref::<SourceError>().unwrap();
        assert!(matches!(source_err, SourceError::InvalidResponse(_)));
        assert!(source_err.is_permanent());
    }

    #[tokio::test]
    async fn inconsistent_scores_are_rejected() {
        let bad = [
            // graded a different number of questions
            score_body(2, 3, 66.0, 5),
            // more correct than asked
            score_body(3, 2, 100.0, 10),
            score_body(2, 2, 100.5, 10),
            score_body(0, 2, -1.0, 0),
            // reward outside the tier
            score_body(1, 2, 50.0, 5),
            score_body(2, 2, 100.0, 11),
        ];
        for score in bad {
            let err = grade_with_score(score.clone()).await.unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<SourceError>(),
                    Some(SourceError::InvalidResponse(_))
                ),
                "accepted {score}"
            );
        }
    }

    #[tokio::test]
    async fn perfect_remote_score_is_accepted() {
        let result = grade_with_score(score_body(2, 2, 100.0, 10)).await.unwrap();
        assert_eq!(result.earned_reward, 10);
        assert!(result.passed());
    }

    #[tokio::test]
    async fn rejected_score_fails_submission_and_keeps_answers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quizzes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(topics_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quizzes/1/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 101, "question": "First?", "options": ["a", "b"], "correctAnswer": 0},
                {"id": 102, "question": "Second?", "options": ["a", "b"], "correctAnswer": 1}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/quizzes/submit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(score_body(9, 0, 250.0, 1_000_000)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = Arc::new(HttpBackend::new(&server.uri(), None).unwrap());
        let ledger = Arc::new(Ledger::new("LEARN"));
        let engine = QuizEngine::new(
            backend.clone(),
            backend,
            ledger.clone(),
            QuizEngineConfig::default(),
        );
        let mut session = engine
            .start(1, &CancelToken::new(), &NoopReporter)
            .await
            .unwrap();
        assert_eq!(*session.state(), SessionState::Ready);

        for option in [0, 1] {
            session.answer_question(option).unwrap();
            engine.submit(&mut session, &NoopReporter).await.unwrap();
        }

        assert!(matches!(
            session.state(),
            SessionState::Failed {
                stage: FailureStage::Submission,
                ..
            }
        ));
        assert_eq!(session.answers().len(), 2);
        assert!(session.result().is_none());
        assert!(engine.credit(&session).await.is_err());
        assert_eq!(ledger.balance(), 0);
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let backend = HttpBackend::new("http://127.0.0.1:1", None).unwrap();
        let err = backend.fetch_topics().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::Transport(_))
        ));
    }
}
