//! Core data model types for learnearn.
//!
//! Topics, questions and answers are the inputs to a quiz session;
//! `ScoreResult` is what a completed session produces.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a quiz topic.
pub type TopicId = u32;

/// Identifier of a question, unique within its topic.
pub type QuestionId = u32;

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// The question text shown to the user.
    pub prompt: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_option: usize,
}

impl Question {
    /// Check the structural rules a question must satisfy before it can be
    /// played: at least two options and a correct index inside them.
    pub fn check(&self) -> Result<(), String> {
        if self.options.len() < 2 {
            return Err(format!(
                "question {} has {} option(s), at least 2 are required",
                self.id,
                self.options.len()
            ));
        }
        if self.correct_option >= self.options.len() {
            return Err(format!(
                "question {} marks option {} as correct but only has {} options",
                self.id,
                self.correct_option,
                self.options.len()
            ));
        }
        Ok(())
    }
}

/// Check a whole question set: every question is well formed and ids are
/// unique.
pub fn check_question_set(questions: &[Question]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for q in questions {
        q.check()?;
        if !seen.insert(q.id) {
            return Err(format!("duplicate question id {}", q.id));
        }
    }
    Ok(())
}

/// A recorded answer for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option: usize,
}

/// Outcome of scoring a completed quiz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub correct_count: usize,
    pub total_questions: usize,
    /// Unrounded percentage in `[0, 100]`.
    pub percentage_correct: f64,
    pub earned_reward: u64,
}

impl ScoreResult {
    /// Percentage rounded for display.
    pub fn display_percentage(&self) -> u32 {
        self.percentage_correct.round() as u32
    }

    /// Whether the result cleared the lowest reward threshold.
    pub fn passed(&self) -> bool {
        self.percentage_correct >= crate::scoring::HALF_REWARD_THRESHOLD
    }
}

/// Difficulty label of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "Beginner"),
            Difficulty::Intermediate => write!(f, "Intermediate"),
            Difficulty::Advanced => write!(f, "Advanced"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" | "easy" => Ok(Difficulty::Beginner),
            "intermediate" | "medium" => Ok(Difficulty::Intermediate),
            "advanced" | "hard" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A quiz topic with its questions and potential reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    /// Maximum tokens a user can earn on this topic.
    pub reward_amount: u64,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Topic {
    pub fn questions_count(&self) -> usize {
        self.questions.len()
    }

    /// The topic without its questions, as listed on the home screen.
    pub fn summary(&self) -> TopicSummary {
        TopicSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            difficulty: self.difficulty,
            reward_amount: self.reward_amount,
            questions_count: self.questions.len(),
        }
    }
}

fn default_difficulty() -> Difficulty {
    Difficulty::Beginner
}

/// Listing view of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: TopicId,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub reward_amount: u64,
    pub questions_count: usize,
}

/// A collection of topics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Catalog {
    pub fn topic(&self, id: TopicId) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    /// Merge another catalog into this one. Later topics replace earlier
    /// ones with the same id.
    pub fn merge(&mut self, other: Catalog) {
        for topic in other.topics {
            match self.topics.iter_mut().find(|t| t.id == topic.id) {
                Some(existing) => *existing = topic,
                None => self.topics.push(topic),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: QuestionId, options: usize, correct: usize) -> Question {
        Question {
            id,
            prompt: format!("Question {id}?"),
            options: (0..options).map(|i| format!("option {i}")).collect(),
            correct_option: correct,
        }
    }

    #[test]
    fn difficulty_display_and_parse() {
        assert_eq!(Difficulty::Beginner.to_string(), "Beginner");
        assert_eq!(
            "Intermediate".parse::<Difficulty>().unwrap(),
            Difficulty::Intermediate
        );
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn question_check_rules() {
        assert!(question(1, 4, 3).check().is_ok());
        assert!(question(1, 1, 0).check().unwrap_err().contains("at least 2"));
        assert!(question(1, 3, 3).check().unwrap_err().contains("only has 3"));
    }

    #[test]
    fn question_set_rejects_duplicate_ids() {
        let set = vec![question(1, 2, 0), question(1, 2, 1)];
        assert!(check_question_set(&set).unwrap_err().contains("duplicate"));
        assert!(check_question_set(&[question(1, 2, 0), question(2, 2, 1)]).is_ok());
    }

    #[test]
    fn catalog_merge_replaces_by_id() {
        let mut catalog = Catalog {
            topics: vec![Topic {
                id: 1,
                title: "Old".into(),
                description: String::new(),
                difficulty: Difficulty::Beginner,
                reward_amount: 10,
                questions: vec![],
            }],
        };
        catalog.merge(Catalog {
            topics: vec![
                Topic {
                    id: 1,
                    title: "New".into(),
                    description: String::new(),
                    difficulty: Difficulty::Advanced,
                    reward_amount: 30,
                    questions: vec![question(1, 2, 0)],
                },
                Topic {
                    id: 2,
                    title: "Other".into(),
                    description: String::new(),
                    difficulty: Difficulty::Beginner,
                    reward_amount: 5,
                    questions: vec![],
                },
            ],
        });
        assert_eq!(catalog.topics.len(), 2);
        assert_eq!(catalog.topic(1).unwrap().title, "New");
        assert_eq!(catalog.topic(1).unwrap().summary().questions_count, 1);
    }

    #[test]
    fn score_result_display_rounding() {
        let result = ScoreResult {
            correct_count: 2,
            total_questions: 3,
            percentage_correct: 200.0 / 3.0,
            earned_reward: 5,
        };
        assert_eq!(result.display_percentage(), 67);
        assert!(result.passed());
    }
}
