use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dualrag_cli::{ui, App, AppConfig, Console, StartupOptions};
use dualrag_core::BackendKind;

const DEFAULT_DOCS_DIR: &str = "./sample_docs";

#[derive(Parser)]
#[command(name = "dualrag")]
#[command(about = "Answer questions from your documents with a cloud or local model", long_about = None)]
struct Cli {
    /// Directory of .txt, .md and .rst documents to index
    #[arg(long, default_value = DEFAULT_DOCS_DIR)]
    docs: PathBuf,

    /// Clear the stored index and embed every document again
    #[arg(long)]
    reindex: bool,

    /// Answer one question and exit
    #[arg(long)]
    ask: Option<String>,

    /// Generation backend to start with (cloud|local), overrides LLM_PROVIDER
    #[arg(long)]
    provider: Option<BackendKind>,

    /// Number of chunks to retrieve per question, overrides TOP_K
    #[arg(long)]
    top_k: Option<usize>,

    /// Debug logging and full prompts in answers
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(provider) = cli.provider {
        config.llm_backend = provider;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    config.validate().context("invalid configuration")?;

    let interactive = cli.ask.is_none();
    if interactive {
        ui::display_banner();
        println!("{}", "Setting up...".cyan().bold());
    }

    let options = StartupOptions {
        create_samples: cli.docs == PathBuf::from(DEFAULT_DOCS_DIR),
        docs_dir: cli.docs,
        reindex: cli.reindex,
    };
    let app = App::build(config, &options)
        .await
        .context("failed to start the RAG pipeline")?;

    if interactive {
        let report = &app.report;
        println!(
            "  {} {} documents indexed ({} chunks), {} unchanged, {} failed",
            "✓".green(),
            report.documents_indexed,
            report.chunks_indexed,
            report.documents_unchanged,
            report.documents_failed
        );
        for error in &report.errors {
            ui::print_warning(error);
        }
        let current = app.orchestrator.gateway().current();
        println!("  {} Using {}", "✓".green(), current);
    }

    match cli.ask {
        Some(question) => match app.orchestrator.answer(&question).await {
            Ok(answer) => ui::print_answer(&question, &answer, cli.verbose),
            Err(e) => {
                ui::print_error(&e);
                std::process::exit(1);
            }
        },
        None => Console::new(&app, cli.verbose).run().await?,
    }

    Ok(())
}
