use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::document::{Document, load_document};
use crate::pipeline::{ChatSession, ChunkOutcome, IngestionSummary, RagPipeline};
use crate::prompt::suggest_question;

/// In-loop command words
const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];
const HISTORY_COMMAND: &str = "/history";
const SUGGEST_COMMAND: &str = "/suggest";

async fn open_pipeline(config_dir: &Path) -> Result<RagPipeline> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    RagPipeline::from_config(&config)
        .await
        .context("Failed to initialize the question-answering pipeline")
}

async fn ingest_with_progress(
    pipeline: &RagPipeline,
    session: &mut ChatSession,
    document: &Document,
) -> IngestionSummary {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(document.name.clone());

    let summary = pipeline
        .ingest_with_progress(session, document, |outcome, total| {
            bar.set_length(total as u64);
            bar.inc(1);
            if let ChunkOutcome::Dropped { position, reason } = outcome {
                bar.println(format!(
                    "{} chunk {} skipped: {}",
                    style("⚠").yellow(),
                    position,
                    reason
                ));
            }
        })
        .await;

    bar.finish_and_clear();
    summary
}

fn print_summary(document: &Document, summary: &IngestionSummary) {
    if summary.total_chunks() == 0 {
        eprintln!(
            "{}",
            style(format!("{} contains no text to index.", document.name)).yellow()
        );
        return;
    }

    let line = format!(
        "Indexed {} of {} chunks from {}",
        summary.indexed_count(),
        summary.total_chunks(),
        document.name
    );
    if summary.dropped_count() == 0 {
        eprintln!("{}", style(format!("✓ {}", line)).green());
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ {} ({} dropped)", line, summary.dropped_count())).yellow()
        );
    }
}

fn print_history(session: &ChatSession) {
    let history = session.history();
    if history.is_empty() {
        eprintln!("{}", style("No questions asked yet.").dim());
        return;
    }

    eprintln!("{}", style("Chat History").bold().cyan());
    for (number, turn) in history.iter().enumerate() {
        println!();
        println!("{} {}", style(format!("[{}] You:", number + 1)).bold(), turn.question);
        println!("{} {}", style("AI:").bold().green(), turn.answer);
    }
}

/// Load a document, index it, then answer questions until the user quits
#[inline]
pub async fn chat(config_dir: &Path, file: &Path) -> Result<()> {
    let pipeline = open_pipeline(config_dir).await?;
    let document = load_document(file).context("Failed to read document")?;

    let mut session = ChatSession::new();
    let summary = ingest_with_progress(&pipeline, &mut session, &document).await;
    print_summary(&document, &summary);

    eprintln!();
    eprintln!(
        "Try asking: {}",
        style(suggest_question(&mut rand::rng())).italic()
    );
    eprintln!(
        "{}",
        style("Commands: /history, /suggest, /quit").dim()
    );

    loop {
        eprintln!();
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&question) {
            break;
        }
        if question == HISTORY_COMMAND {
            print_history(&session);
            continue;
        }
        if question == SUGGEST_COMMAND {
            eprintln!(
                "Try asking: {}",
                style(suggest_question(&mut rand::rng())).italic()
            );
            continue;
        }

        let answer = pipeline.ask(&mut session, question).await;
        info!(
            "Answered with intent {} from {} context chunks",
            answer.intent, answer.context_chunks
        );
        println!("{} {}", style("AI:").bold().green(), answer.text);
    }

    info!("Chat ended after {} turns", session.history().len());
    Ok(())
}

/// Index a document and answer a single question about it
#[inline]
pub async fn ask(config_dir: &Path, file: &Path, question: &str) -> Result<()> {
    let pipeline = open_pipeline(config_dir).await?;
    let document = load_document(file).context("Failed to read document")?;

    let mut session = ChatSession::new();
    let summary = ingest_with_progress(&pipeline, &mut session, &document).await;
    print_summary(&document, &summary);

    if summary.indexed_count() == 0 && summary.total_chunks() > 0 {
        warn!("No chunks were indexed; answering without document context");
    }

    let answer = pipeline.ask(&mut session, question).await;
    println!("{}", answer.text);
    Ok(())
}

/// Print one starter question
#[inline]
pub fn suggest() {
    println!("{}", suggest_question(&mut rand::rng()));
}
