#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use completion_provider_mock::{MockOutcome, MockProvider};
use gptrepl::{
    CompletionClient, Context, LineReader, Message, Printer, ReplError, Session, SessionOptions,
    TextEditor,
};

#[derive(Debug, Default)]
pub struct PrinterTrace {
    pub prints: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl PrinterTrace {
    pub fn stdout(&self) -> String {
        self.prints.concat()
    }
}

pub struct RecordingPrinter {
    state: Arc<Mutex<PrinterTrace>>,
}

impl RecordingPrinter {
    pub fn new() -> (Self, Arc<Mutex<PrinterTrace>>) {
        let state = Arc::new(Mutex::new(PrinterTrace::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl Printer for RecordingPrinter {
    fn print(&mut self, text: &str) {
        lock_unpoisoned(&self.state).prints.push(text.to_string());
    }

    fn warn(&mut self, text: &str) {
        lock_unpoisoned(&self.state).warnings.push(text.to_string());
    }

    fn error(&mut self, text: &str) {
        lock_unpoisoned(&self.state).errors.push(text.to_string());
    }
}

pub struct ScriptedLineReader {
    lines: VecDeque<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLineReader {
    pub fn new<I, S>(lines: I) -> (Self, Arc<Mutex<Vec<String>>>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                lines: lines.into_iter().map(Into::into).collect(),
                prompts: Arc::clone(&prompts),
            },
            prompts,
        )
    }
}

impl LineReader for ScriptedLineReader {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        lock_unpoisoned(&self.prompts).push(prompt.to_string());
        self.lines.pop_front()
    }
}

/// Returns the same text every time it is opened.
pub struct StaticEditor {
    text: String,
}

impl TextEditor for StaticEditor {
    fn edit(&mut self) -> Result<String, ReplError> {
        Ok(self.text.clone())
    }
}

pub struct Harness {
    pub session: Session,
    pub output: Arc<Mutex<PrinterTrace>>,
    pub provider: Arc<MockProvider>,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Harness {
    pub fn messages(&self) -> Vec<Message> {
        self.session.context().messages().to_vec()
    }

    pub fn output(&self) -> MutexGuard<'_, PrinterTrace> {
        lock_unpoisoned(&self.output)
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock_unpoisoned(&self.sleeps).clone()
    }
}

pub struct HarnessBuilder {
    options: SessionOptions,
    messages: Vec<Message>,
    outcomes: Vec<MockOutcome>,
    max_retries: u32,
    editor_text: String,
}

impl HarnessBuilder {
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages = messages.into_iter().collect();
        self
    }

    pub fn outcomes(mut self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.outcomes = outcomes.into_iter().collect();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn editor_text(mut self, text: &str) -> Self {
        self.editor_text = text.to_string();
        self
    }

    pub fn build(self) -> Harness {
        colored::control::set_override(false);

        let provider = Arc::new(MockProvider::with_script(self.outcomes));
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&sleeps);
        let client = CompletionClient::new(provider.clone(), self.max_retries)
            .with_fixed_jitter(0.0)
            .with_sleeper(move |delay| lock_unpoisoned(&recorded).push(delay));
        let (printer, output) = RecordingPrinter::new();
        let editor = StaticEditor {
            text: self.editor_text,
        };

        Harness {
            session: Session::new(
                self.options,
                Context::from_messages(self.messages),
                client,
                Box::new(printer),
                Box::new(editor),
            ),
            output,
            provider,
            sleeps,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        options: SessionOptions::default(),
        messages: Vec::new(),
        outcomes: Vec::new(),
        max_retries: 5,
        editor_text: String::new(),
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
