//! The `learnearn validate` command.

use std::path::PathBuf;

use anyhow::Result;

use learnearn_core::parser::{load_catalog, validate_catalog};

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalog = load_catalog(&catalog_path)?;
    let question_count: usize = catalog.topics.iter().map(|t| t.questions_count()).sum();
    println!(
        "Catalog: {} ({} topics, {} questions)",
        catalog_path.display(),
        catalog.topics.len(),
        question_count
    );

    let warnings = validate_catalog(&catalog);
    for w in &warnings {
        let prefix = w
            .topic_id
            .map(|id| format!("  [topic {id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All topics valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
