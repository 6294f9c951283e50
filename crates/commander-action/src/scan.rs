//! Interactive input for payload phases.
//!
//! Payload functions ask the operator for values through a [`Scanner`].
//! The terminal implementation reads stdin; the scripted one replays a
//! fixed list of answers for tests and non-interactive sessions.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use commander_core::SharedConfig;
use tracing::warn;

use crate::builder::PayloadFn;
use crate::value::Value;

/// Errors from reading operator input.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input closed")]
    Closed,
    #[error("Could not parse {input:?} as {expected}")]
    Parse { input: String, expected: ScanHint },
}

/// Reads one answer from the operator.
pub trait Scanner: Send + Sync {
    /// Show `prompt` and read one line, without its line terminator.
    ///
    /// An empty line is an empty answer, not an error.
    fn scan_line(&self, prompt: &str) -> Result<String, ScanError>;

    /// Read one trimmed line.
    fn scan_text(&self, prompt: &str) -> Result<String, ScanError> {
        Ok(self.scan_line(prompt)?.trim().to_string())
    }

    fn scan_integer(&self, prompt: &str) -> Result<i64, ScanError> {
        let input = self.scan_text(prompt)?;
        input.parse().map_err(|_| ScanError::Parse {
            input,
            expected: ScanHint::Integer,
        })
    }

    fn scan_float(&self, prompt: &str) -> Result<f64, ScanError> {
        let input = self.scan_text(prompt)?;
        input.parse().map_err(|_| ScanError::Parse {
            input,
            expected: ScanHint::Float,
        })
    }
}

/// Scanner reading from the process's stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinScanner;

impl Scanner for StdinScanner {
    fn scan_line(&self, prompt: &str) -> Result<String, ScanError> {
        {
            let mut out = std::io::stdout().lock();
            write!(out, "{}\n>>> ", prompt)?;
            out.flush()?;
        }
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(ScanError::Closed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Scanner replaying queued answers. Running out of answers is
/// [`ScanError::Closed`].
#[derive(Debug, Default)]
pub struct ScriptedScanner {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedScanner {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, answer: impl Into<String>) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer.into());
    }

    pub fn remaining(&self) -> usize {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every prompt shown so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Scanner for ScriptedScanner {
    fn scan_line(&self, prompt: &str) -> Result<String, ScanError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(ScanError::Closed)
    }
}

/// The kind of value a [`Question`] expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanHint {
    Text,
    Integer,
    Float,
}

impl fmt::Display for ScanHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanHint::Text => write!(f, "text"),
            ScanHint::Integer => write!(f, "integer"),
            ScanHint::Float => write!(f, "float"),
        }
    }
}

/// A prompt whose answer is stored under `key`, falling back to `default`
/// when the answer cannot be read or parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub prompt: String,
    pub key: String,
    pub hint: ScanHint,
    pub default: Value,
}

impl Question {
    pub fn new(prompt: impl Into<String>, key: impl Into<String>, hint: ScanHint) -> Self {
        let default = match hint {
            ScanHint::Text => Value::Text(String::new()),
            ScanHint::Integer => Value::Integer(0),
            ScanHint::Float => Value::Float(0.0),
        };
        Self {
            prompt: prompt.into(),
            key: key.into(),
            hint,
            default,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    /// Ask the question, returning the key and the parsed answer.
    pub fn ask(&self, scanner: &dyn Scanner) -> Result<(String, Value), ScanError> {
        let value = match self.hint {
            ScanHint::Text => Value::Text(scanner.scan_text(&self.prompt)?),
            ScanHint::Integer => Value::Integer(scanner.scan_integer(&self.prompt)?),
            ScanHint::Float => Value::Float(scanner.scan_float(&self.prompt)?),
        };
        Ok((self.key.clone(), value))
    }

    /// Ask the question, substituting the default on failure.
    pub fn ask_or_default(&self, scanner: &dyn Scanner) -> (String, Value) {
        match self.ask(scanner) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Using default answer");
                (self.key.clone(), self.default.clone())
            }
        }
    }
}

/// A payload asking every question in turn and returning a mapping of key
/// to answer. Failed answers fall back to each question's default.
pub fn ask_all(scanner: Arc<dyn Scanner>, questions: Vec<Question>) -> PayloadFn {
    Arc::new(move |_: &SharedConfig| {
        let answers: BTreeMap<String, Value> = questions
            .iter()
            .map(|q| q.ask_or_default(scanner.as_ref()))
            .collect();
        Ok(Value::Mapping(answers))
    })
}
