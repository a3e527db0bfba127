//! Interactive console loop

use serde::Serialize;

use dualrag_core::BackendKind;

use crate::app::App;
use crate::ui;

const PROMPT: &str = "rag>";
const QUESTION_PROMPT: &str = "question>";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConsoleCommand {
    /// `ask`, optionally followed by the question on the same line
    Ask(Option<String>),
    Switch,
    Info,
    Examples,
    Help,
    Quit,
    /// Any other non-empty input
    Question(String),
    Empty,
}

impl ConsoleCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (word, rest) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        match (word.to_lowercase().as_str(), rest.is_empty()) {
            ("", _) => ConsoleCommand::Empty,
            ("ask" | "query", true) => ConsoleCommand::Ask(None),
            ("ask" | "query", false) => ConsoleCommand::Ask(Some(rest.to_string())),
            ("switch", true) => ConsoleCommand::Switch,
            ("info", true) => ConsoleCommand::Info,
            ("examples", true) => ConsoleCommand::Examples,
            ("help" | "h" | "?", true) => ConsoleCommand::Help,
            ("quit" | "exit" | "q", true) => ConsoleCommand::Quit,
            _ => ConsoleCommand::Question(input.to_string()),
        }
    }
}

/// Interactive session over a built `App`
pub struct Console<'a> {
    app: &'a App,
    history: Vec<String>,
    verbose: bool,
}

impl<'a> Console<'a> {
    pub fn new(app: &'a App, verbose: bool) -> Self {
        Self {
            app,
            history: Vec::new(),
            verbose,
        }
    }

    /// Answer one question and print the outcome
    pub async fn ask(&self, question: &str) {
        ui::print_thinking();
        match self.app.orchestrator.answer(question).await {
            Ok(answer) => ui::print_answer(question, &answer, self.verbose),
            Err(e) => ui::print_error(&e),
        }
    }

    fn switch(&self) {
        let backend = self.app.orchestrator.gateway().switch();
        ui::print_switched(&backend);
        if backend.kind() == BackendKind::Cloud && !self.app.config.openai.has_api_key() {
            ui::print_warning("OPENAI_API_KEY is not set; cloud requests will be rejected.");
        }
    }

    pub async fn run(&mut self) -> dualrag_core::Result<()> {
        ui::print_help();

        loop {
            println!();
            let Some(line) = ui::handle_input_with_history(PROMPT, &mut self.history).await? else {
                break;
            };

            match ConsoleCommand::parse(&line) {
                ConsoleCommand::Empty => {}
                ConsoleCommand::Quit => break,
                ConsoleCommand::Help => ui::print_help(),
                ConsoleCommand::Examples => ui::show_examples(),
                ConsoleCommand::Info => ui::show_info(self.app),
                ConsoleCommand::Switch => self.switch(),
                ConsoleCommand::Ask(Some(question)) | ConsoleCommand::Question(question) => {
                    self.ask(&question).await
                }
                ConsoleCommand::Ask(None) => {
                    let Some(question) =
                        ui::handle_input_with_history(QUESTION_PROMPT, &mut self.history).await?
                    else {
                        break;
                    };
                    if !question.is_empty() {
                        self.ask(&question).await;
                    }
                }
            }
        }

        println!();
        println!("Goodbye!");
        Ok(())
    }
}
