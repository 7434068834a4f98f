//! TOML topic catalog parser.
//!
//! Loads topic catalogs from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Catalog, Difficulty, Question, Topic, TopicId};

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    #[serde(default)]
    topics: Vec<TomlTopic>,
}

#[derive(Debug, Deserialize)]
struct TomlTopic {
    id: TopicId,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_difficulty_str")]
    difficulty: String,
    reward_amount: u64,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

fn default_difficulty_str() -> String {
    "beginner".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: u32,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
}

/// Parse a single TOML file into a `Catalog`.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a `Catalog`.
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let topics = parsed
        .topics
        .into_iter()
        .map(|t| {
            let difficulty: Difficulty = t
                .difficulty
                .parse()
                .map_err(|e: String| anyhow::anyhow!("topic {}: {}", t.id, e))?;

            let questions = t
                .questions
                .into_iter()
                .map(|q| Question {
                    id: q.id,
                    prompt: q.prompt,
                    options: q.options,
                    correct_option: q.correct_option,
                })
                .collect();

            Ok(Topic {
                id: t.id,
                title: t.title,
                description: t.description,
                difficulty,
                reward_amount: t.reward_amount,
                questions,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Catalog { topics })
}

/// Recursively load and merge all `.toml` catalog files from a directory.
///
/// Files are visited in name order so later files win on duplicate topic
/// ids. Malformed files are skipped with a warning.
pub fn load_catalog_directory(dir: &Path) -> Result<Catalog> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    let mut catalog = Catalog::default();
    for path in entries {
        if path.is_dir() {
            catalog.merge(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(parsed) => catalog.merge(parsed),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalog)
}

/// Load a catalog from a file or a directory.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        parse_catalog(path)
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The topic ID (if applicable).
    pub topic_id: Option<TopicId>,
    /// Warning message.
    pub message: String,
}

/// Validate a catalog for common issues.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_topics = HashSet::new();
    for topic in &catalog.topics {
        if !seen_topics.insert(topic.id) {
            warnings.push(ValidationWarning {
                topic_id: Some(topic.id),
                message: format!("duplicate topic ID: {}", topic.id),
            });
        }
    }

    for topic in &catalog.topics {
        let warn = |message: String| ValidationWarning {
            topic_id: Some(topic.id),
            message,
        };

        if topic.questions.is_empty() {
            warnings.push(warn("topic has no questions".into()));
        }
        if topic.reward_amount == 0 {
            warnings.push(warn("reward_amount is 0, nothing can be earned".into()));
        }

        let mut seen_questions = HashSet::new();
        for q in &topic.questions {
            if !seen_questions.insert(q.id) {
                warnings.push(warn(format!("duplicate question ID: {}", q.id)));
            }
            if q.prompt.trim().is_empty() {
                warnings.push(warn(format!("question {} has an empty prompt", q.id)));
            }
            if let Err(reason) = q.check() {
                warnings.push(warn(reason));
            }
        }
    }

    warnings
}
