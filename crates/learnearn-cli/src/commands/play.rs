//! The `learnearn play` command.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use learnearn_core::engine::{ProgressReporter, QuizEngine};
use learnearn_core::error::{QuizError, ValidationError};
use learnearn_core::model::{Question, ScoreResult, TopicId};
use learnearn_core::retry::CancelToken;
use learnearn_core::scoring::HALF_REWARD_THRESHOLD;
use learnearn_core::session::{FailureStage, QuizSession, SessionState};
use learnearn_providers::{Ledger, Transaction};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_fetch_attempt(&self, topic_id: TopicId, attempt: u32) {
        if attempt > 1 {
            eprintln!("  Retrying topic {topic_id} (attempt {attempt})");
        }
    }

    fn on_fetch_error(&self, _topic_id: TopicId, attempt: u32, error: &str, will_retry: bool) {
        if will_retry {
            eprintln!("  Attempt {attempt} failed: {error}");
        }
    }

    fn on_session_ready(&self, session: &QuizSession) {
        eprintln!(
            "Loaded {} questions for topic {} (up to {} tokens)",
            session.questions().len(),
            session.topic_id(),
            session.potential_reward()
        );
    }

    fn on_session_failed(&self, session: &QuizSession) {
        if let SessionState::Failed {
            stage: FailureStage::Submission,
            message,
        } = session.state()
        {
            eprintln!("  {message}");
        }
    }

    fn on_quiz_completed(&self, session: &QuizSession, result: &ScoreResult) {
        tracing::debug!(
            session = %session.id(),
            correct = result.correct_count,
            "quiz graded"
        );
    }
}

/// Where answers come from: the `--answers` flag or stdin.
enum AnswerInput {
    Scripted(std::vec::IntoIter<usize>),
    Interactive(Lines<BufReader<Stdin>>),
}

impl AnswerInput {
    fn scripted(answers: &str) -> Result<Self> {
        let choices = answers
            .split(',')
            .map(|a| parse_choice(a.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(AnswerInput::Scripted(choices.into_iter()))
    }

    fn stdin() -> Self {
        AnswerInput::Interactive(BufReader::new(tokio::io::stdin()).lines())
    }

    fn is_interactive(&self) -> bool {
        matches!(self, AnswerInput::Interactive(_))
    }

    /// Number of scripted answers not yet used.
    fn remaining(&self) -> usize {
        match self {
            AnswerInput::Scripted(choices) => choices.len(),
            AnswerInput::Interactive(_) => 0,
        }
    }

    /// The next 0-based option index, or `None` once input runs out.
    async fn next_choice(&mut self) -> Result<Option<usize>> {
        match self {
            AnswerInput::Scripted(choices) => Ok(choices.next()),
            AnswerInput::Interactive(lines) => loop {
                eprint!("> ");
                let Some(line) = lines.next_line().await? else {
                    return Ok(None);
                };
                match parse_choice(line.trim()) {
                    Ok(choice) => return Ok(Some(choice)),
                    Err(e) => eprintln!("  {e}"),
                }
            },
        }
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool> {
        match self {
            AnswerInput::Scripted(_) => Ok(false),
            AnswerInput::Interactive(lines) => {
                eprint!("{prompt} [y/N] ");
                let line = lines.next_line().await?.unwrap_or_default();
                Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
            }
        }
    }
}

/// Await `step` unless the quiz is cancelled first.
async fn unless_cancelled<T>(
    token: &CancelToken,
    step: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => bail!("quiz cancelled"),
        done = step => done,
    }
}

/// Parse a 1-based option number into an option index.
fn parse_choice(s: &str) -> Result<usize> {
    let number: usize = s
        .parse()
        .with_context(|| format!("invalid answer {s:?}: expected an option number"))?;
    if number == 0 {
        bail!("options are numbered from 1");
    }
    Ok(number - 1)
}

#[derive(Serialize)]
struct PlayReport<'a> {
    session_id: String,
    topic_id: TopicId,
    result: &'a ScoreResult,
    token_symbol: &'a str,
    balance: u64,
    transactions: Vec<Transaction>,
}

pub async fn execute(
    topic_id: TopicId,
    answers: Option<String>,
    format: String,
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let json = match format.as_str() {
        "text" => false,
        "json" => true,
        other => bail!("unknown format: {other} (expected text or json)"),
    };
    let mut input = match answers {
        Some(answers) => AnswerInput::scripted(&answers)?,
        None => AnswerInput::stdin(),
    };

    let (config, backend) = super::load_backend(catalog, config_path)?;
    let ledger = Arc::new(Ledger::with_balance(
        config.token_symbol.clone(),
        config.starting_balance,
    ));
    let engine = QuizEngine::new(
        backend.source,
        backend.grader,
        ledger.clone(),
        config.engine_config(),
    );
    let reporter = ConsoleReporter;

    // Ctrl-C cancels the quiz at any await point until it is graded.
    let token = CancelToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    let Some(mut session) = engine.start(topic_id, &token, &reporter).await else {
        bail!("quiz cancelled");
    };
    if let Some(message) = session.error() {
        bail!("{message}");
    }

    run_quiz(&engine, &mut session, &mut input, &reporter, &token).await?;

    let result = *session
        .result()
        .with_context(|| format!("quiz ended while {}", session.state().label()))?;
    engine.credit(&session).await?;

    if json {
        let report = PlayReport {
            session_id: session.id().to_string(),
            topic_id,
            result: &result,
            token_symbol: ledger.token_symbol(),
            balance: ledger.balance(),
            transactions: ledger.transactions(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "You got {} out of {} questions correct ({}%)",
        result.correct_count,
        result.total_questions,
        result.display_percentage()
    );
    if result.earned_reward > 0 {
        println!(
            "Congratulations! You earned {} {} tokens!",
            result.earned_reward,
            ledger.token_symbol()
        );
    } else {
        println!("You need to score at least {HALF_REWARD_THRESHOLD}% to earn rewards. Try again!");
    }
    println!(
        "Wallet balance: {} {}",
        ledger.balance(),
        ledger.token_symbol()
    );

    Ok(())
}

/// Answer every question and submit, offering a retry if grading fails.
async fn run_quiz(
    engine: &QuizEngine,
    session: &mut QuizSession,
    input: &mut AnswerInput,
    reporter: &ConsoleReporter,
    token: &CancelToken,
) -> Result<()> {
    let interactive = input.is_interactive();
    let total = session.questions().len();
    if input.remaining() > total {
        bail!("{} answers given for {total} questions", input.remaining());
    }

    while let Some(question) = session.current_question().cloned() {
        let number = session.current_index() + 1;
        if interactive {
            print_question(number, total, &question);
        }

        let Some(choice) = unless_cancelled(token, input.next_choice()).await? else {
            bail!("no answer given for question {number} of {total}");
        };
        match session.answer_question(choice) {
            Ok(()) => {}
            Err(QuizError::Validation(ValidationError::OptionOutOfRange { options, .. })) => {
                let message = format!(
                    "answer {} is not an option for question {number} (choose 1-{options})",
                    choice + 1
                );
                if interactive {
                    eprintln!("  {message}");
                    continue;
                }
                bail!(message);
            }
            Err(e) => return Err(e.into()),
        }
        let submit = async {
            engine
                .submit(session, reporter)
                .await
                .map_err(anyhow::Error::from)
        };
        unless_cancelled(token, submit).await?;

        while matches!(
            session.state(),
            SessionState::Failed {
                stage: FailureStage::Submission,
                ..
            }
        ) {
            if !unless_cancelled(token, input.confirm("Retry submission?")).await? {
                bail!("{}", session.error().unwrap_or("submission failed"));
            }
            let retry = async {
                engine
                    .submit(session, reporter)
                    .await
                    .map_err(anyhow::Error::from)
            };
            unless_cancelled(token, retry).await?;
        }
    }

    Ok(())
}

fn print_question(number: usize, total: usize, question: &Question) {
    eprintln!("\nQuestion {number}/{total}: {}", question.prompt);
    for (i, option) in question.options.iter().enumerate() {
        eprintln!("  {}. {option}", i + 1);
    }
}
