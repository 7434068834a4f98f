//! In-memory question source backed by a topic catalog.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use learnearn_core::error::SourceError;
use learnearn_core::model::{Catalog, Question, Topic, TopicId, TopicSummary};
use learnearn_core::parser::{load_catalog, parse_catalog_str};
use learnearn_core::traits::QuestionSource;

const BUILTIN_CATALOG: &str = include_str!("../../../topics/learn-earn.toml");

/// Serves topics and questions from a [`Catalog`].
///
/// Unknown topics fail with [`SourceError::NotFound`]. A known topic without
/// questions returns an empty set and lets the session decide what that
/// means.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    name: String,
    catalog: Catalog,
    latency: Duration,
}

impl CatalogSource {
    pub fn new(name: impl Into<String>, catalog: Catalog) -> Self {
        Self {
            name: name.into(),
            catalog,
            latency: Duration::ZERO,
        }
    }

    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self> {
        let catalog = parse_catalog_str(BUILTIN_CATALOG, Path::new("topics/learn-earn.toml"))
            .context("built-in catalog is malformed")?;
        Ok(Self::new("builtin", catalog))
    }

    /// Load a catalog file or directory of catalog files.
    pub fn from_path(path: &Path) -> Result<Self> {
        let catalog = load_catalog(path)?;
        tracing::debug!(
            path = %path.display(),
            topics = catalog.topics.len(),
            "loaded catalog"
        );
        Ok(Self::new("file", catalog))
    }

    /// Delay every fetch by `latency`, to behave like a remote backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn lookup(&self, topic_id: TopicId) -> Result<&Topic> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.catalog
            .topic(topic_id)
            .ok_or_else(|| SourceError::NotFound(topic_id).into())
    }
}

#[async_trait]
impl QuestionSource for CatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_topics(&self) -> Result<Vec<TopicSummary>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.catalog.topics.iter().map(Topic::summary).collect())
    }

    async fn fetch_questions(&self, topic_id: TopicId) -> Result<Vec<Question>> {
        Ok(self.lookup(topic_id).await?.questions.clone())
    }

    async fn fetch_reward_amount(&self, topic_id: TopicId) -> Result<u64> {
        Ok(self.lookup(topic_id).await?.reward_amount)
    }
}
