//! The `learnearn init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("learnearn.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("topics")?;
    write_if_missing(Path::new("topics/example.toml"), EXAMPLE_CATALOG)?;

    println!("\nNext steps:");
    println!("  1. Edit topics/example.toml to add your own questions");
    println!("  2. Run: learnearn validate --catalog topics");
    println!("  3. Run: learnearn play --topic 100");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# learnearn configuration

token_symbol = "LEARN"
starting_balance = 0
user_id = 0

# Question fetches are retried on transient failures.
retry_attempts = 3
retry_delay_ms = 1500

[source]
type = "file"
path = "topics"

# To use a remote quiz API instead:
# [source]
# type = "http"
# base_url = "https://quiz.example.com"
# api_key = "${LEARNEARN_API_KEY}"
"#;

const EXAMPLE_CATALOG: &str = r#"[[topics]]
id = 100
title = "Wallet Basics"
description = "Keys, addresses and how a crypto wallet works"
difficulty = "beginner"
reward_amount = 5

[[topics.questions]]
id = 1
prompt = "What must you never share with anyone?"
options = ["Your public address", "Your seed phrase", "Your wallet app name"]
correct_option = 1

[[topics.questions]]
id = 2
prompt = "What does a wallet actually store?"
options = ["Coins", "Private keys", "Blocks"]
correct_option = 1

[[topics.questions]]
id = 3
prompt = "Who controls funds sent to your public address?"
options = ["Whoever holds the private key", "The wallet app vendor", "The miners"]
correct_option = 0
"#;
