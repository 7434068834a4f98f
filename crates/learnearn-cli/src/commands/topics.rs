//! The `learnearn topics` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

pub async fn execute(catalog: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let (config, backend) = super::load_backend(catalog, config_path)?;
    let topics = backend
        .source
        .fetch_topics()
        .await
        .with_context(|| format!("failed to list topics from {}", backend.source.name()))?;

    if topics.is_empty() {
        println!("No topics available. Run `learnearn init` to create an example catalog.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Difficulty", "Questions", "Reward"]);
    for topic in &topics {
        table.add_row(vec![
            Cell::new(topic.id),
            Cell::new(&topic.title),
            Cell::new(topic.difficulty),
            Cell::new(topic.questions_count),
            Cell::new(format!("{} {}", topic.reward_amount, config.token_symbol)),
        ]);
    }

    println!("{table}");
    Ok(())
}
