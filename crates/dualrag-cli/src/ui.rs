//! UI utilities for the console

use colored::*;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, size},
};
use std::io::{self, IsTerminal, Write};

use dualrag_core::{Answer, BackendKind, Error, InferenceBackend, Result};

use crate::app::App;

const RULE_WIDTH: usize = 70;

pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "How do I install Ollama?",
    "What is RAG and how does it work?",
    "What are the benefits of running models locally?",
    "When should I choose cloud over local models?",
    "Which models are available in Ollama?",
    "Should I use RAG or fine-tuning?",
];

/// Display startup banner
pub fn display_banner() {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);
    let banner_width = 64.min(terminal_width.saturating_sub(4)).max(40);
    let inner = banner_width - 2;

    let top_border = format!("┌{}┐", "─".repeat(inner));
    let bottom_border = format!("└{}┘", "─".repeat(inner));
    let empty_line = format!("│{}│", " ".repeat(inner));
    let padded = |text: &str| {
        let width = text.chars().count();
        format!("│  {}{}│", text, " ".repeat(inner.saturating_sub(width + 2)))
    };

    println!();
    println!("{}", top_border.blue());
    println!("{}", empty_line.blue());
    println!("{}", padded("dualrag - grounded answers, cloud or local").blue().bold());
    println!("{}", empty_line.blue());

    for line in [
        "Ask questions about your own documents.",
        "",
        "• Answers grounded in retrieved passages",
        "• Switch between cloud and local models at any time",
        "• Command history with the up/down arrows",
        "",
        concat!("v", env!("CARGO_PKG_VERSION")),
    ] {
        if line.is_empty() {
            println!("{}", empty_line.blue());
        } else {
            println!("{}", padded(line).blue());
        }
    }

    println!("{}", empty_line.blue());
    println!("{}", bottom_border.blue());
    println!();
    println!(
        "{}",
        "Tip: type a question, or 'help' for commands".dimmed()
    );
    println!();
}

fn redraw(prompt: &str, input: &str) -> io::Result<()> {
    print!("\r{} {}  \r{} {}", prompt.green().bold(), " ".repeat(RULE_WIDTH), prompt.green().bold(), input);
    io::stdout().flush()
}

/// Read one line with history navigation.
///
/// Returns `None` at end of input or on Ctrl-C/Ctrl-D; Esc yields an empty line.
pub async fn handle_input_with_history(prompt: &str, history: &mut Vec<String>) -> Result<Option<String>> {
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim().to_string();
        if !input.is_empty() {
            history.push(input.clone());
        }
        return Ok(Some(input));
    }

    enable_raw_mode()?;
    let result = read_raw_line(prompt, history);
    disable_raw_mode()?;
    println!();
    result
}

fn read_raw_line(prompt: &str, history: &mut Vec<String>) -> Result<Option<String>> {
    let mut input = String::new();
    let mut history_index: Option<usize> = None;

    print!("{} ", prompt.green().bold());
    io::stdout().flush()?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };

        match key_event.code {
            KeyCode::Char('c') | KeyCode::Char('d')
                if key_event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                return Ok(None);
            }
            KeyCode::Enter => {
                let line = input.trim().to_string();
                if !line.is_empty() {
                    history.push(line.clone());
                }
                return Ok(Some(line));
            }
            KeyCode::Char(c) => {
                input.push(c);
                print!("{}", c);
                io::stdout().flush()?;
            }
            KeyCode::Backspace => {
                if input.pop().is_some() {
                    redraw(prompt, &input)?;
                }
            }
            KeyCode::Up => {
                if !history.is_empty() {
                    let new_index = match history_index {
                        None => history.len() - 1,
                        Some(idx) => idx.saturating_sub(1),
                    };
                    history_index = Some(new_index);
                    input = history[new_index].clone();
                    redraw(prompt, &input)?;
                }
            }
            KeyCode::Down => {
                if let Some(idx) = history_index {
                    if idx + 1 < history.len() {
                        history_index = Some(idx + 1);
                        input = history[idx + 1].clone();
                    } else {
                        history_index = None;
                        input.clear();
                    }
                    redraw(prompt, &input)?;
                }
            }
            KeyCode::Esc => return Ok(Some(String::new())),
            _ => {}
        }
    }
}

/// Display help message
pub fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}      - Ask a question", "ask".cyan());
    println!("  {}   - Switch between the cloud and local backend", "switch".cyan());
    println!("  {}     - Show current configuration", "info".cyan());
    println!("  {} - Show example questions", "examples".cyan());
    println!("  {}     - Show this menu", "help".cyan());
    println!("  {}     - Exit the application", "quit".cyan());
    println!();
    println!("{}", "Anything else is treated as a question.".dimmed());
}

pub fn show_examples() {
    println!("{}", "Example questions:".bold());
    for (i, question) in EXAMPLE_QUESTIONS.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
}

/// Display the active backend, embedding and index settings
pub fn show_info(app: &App) {
    let current = app.orchestrator.gateway().current();
    let descriptor = current.descriptor();
    let config = &app.config;

    println!("{}", "Current configuration:".bold());
    println!("  {:<16}{}", "Backend:", current.kind().as_str().to_uppercase().green());
    println!("  {:<16}{}", "Model:", descriptor.model);
    println!("  {:<16}{}", "Endpoint:", descriptor.endpoint);
    println!(
        "  {:<16}{} ({} dimensions)",
        "Embeddings:", app.embedding.model, app.embedding.dimension
    );
    println!("  {:<16}{}", "Documents:", app.docs_dir.display());
    println!("  {:<16}{}", "Index:", config.index_dir.display());
    match app.index.stats() {
        Ok(stats) => println!(
            "  {:<16}{} chunks from {} sources",
            "Indexed:", stats.entries, stats.sources
        ),
        Err(e) => println!("  {:<16}{}", "Indexed:", e.to_string().red()),
    }
    println!("  {:<16}{} tokens", "Chunk size:", config.chunking.chunk_size);
    println!("  {:<16}{} tokens", "Chunk overlap:", config.chunking.chunk_overlap);
    println!("  {:<16}{}", "Top k:", app.orchestrator.top_k());
}

pub fn print_switched(backend: &InferenceBackend) {
    println!(
        "{} Switched to {} ({})",
        "✓".green(),
        backend.kind().as_str().to_uppercase(),
        backend.descriptor().model
    );
    let note = match backend.kind() {
        BackendKind::Cloud => "→ Now using cloud-based inference",
        BackendKind::Local => "→ Now using local inference",
    };
    println!("  {}", note.dimmed());
}

pub fn print_thinking() {
    println!("{}", "Thinking...".cyan().dimmed());
}

/// Display an answer, its backend and its sources
pub fn print_answer(query: &str, answer: &Answer, verbose: bool) {
    let rule = "=".repeat(RULE_WIDTH);

    println!();
    println!("{}", rule);
    println!("{} {}", "Question:".cyan().bold(), query);
    println!(
        "{} {} ({})",
        "Model:".cyan().bold(),
        answer.model,
        answer.backend_used
    );
    println!("{}", rule);
    println!();
    println!("{}", answer.text);
    println!();

    if answer.is_grounded() {
        println!("{}", "Sources:".bold());
        for chunk in &answer.grounding_chunks {
            println!("  • {} (chunk {})", chunk.source, chunk.sequence_index);
        }
    } else {
        println!("{}", "No relevant context was found in the documents.".yellow());
    }

    if verbose {
        println!();
        println!("{}", "Prompt:".bold());
        println!("{}", answer.prompt.dimmed());
    }
    println!("{}", rule);
}

/// Display a failure as one readable message
pub fn print_error(error: &Error) {
    println!("{} Error: {}", "✗".red(), error);
    let cause = error.root_cause();
    if cause.requires_reindex() {
        println!("  {}", "Run again with --reindex to rebuild the index.".yellow());
    } else if matches!(cause, Error::BackendUnavailable { .. }) {
        println!(
            "  {}",
            "Check that the backend is running, or use 'switch' to try the other one.".yellow()
        );
    }
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}
