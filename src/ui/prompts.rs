//! ui::prompts
//!
//! Interactive confirmations.
//!
//! # Design
//!
//! The engine never reads stdin itself. It receives a [`Confirm`]
//! capability: [`TerminalPrompt`] for real runs, [`ScriptedPrompt`] for
//! tests. End of input always means "no", so a closed stdin can never
//! approve a mutation.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),
}

/// Asks the user to approve an action.
pub trait Confirm {
    /// Yes/no question. An empty answer takes `default`.
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError>;

    /// Succeeds only if the user types `expected` exactly.
    ///
    /// Used for destructive actions; never answered automatically.
    fn confirm_exact(&self, message: &str, expected: &str) -> Result<bool, PromptError>;

    /// Free-text answer, trimmed. `None` if nothing was entered.
    ///
    /// Never answered automatically.
    fn input(&self, message: &str) -> Result<Option<String>, PromptError>;
}

fn non_empty(answer: Option<String>) -> Option<String> {
    answer
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
}

/// Interpret a yes/no answer.
///
/// ```
/// use refsync::ui::prompts::parse_answer;
///
/// assert!(parse_answer("", true));
/// assert!(!parse_answer("n", true));
/// assert!(parse_answer("YES", false));
/// assert!(!parse_answer("maybe", false));
/// ```
pub fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

fn hint(default: bool) -> &'static str {
    if default {
        "[Y/n]"
    } else {
        "[y/N]"
    }
}

/// Prompts on stderr and reads answers from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    /// `assume_yes` answers [`Confirm::confirm`] with "yes" without asking.
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Read one line; `None` on end of input.
    fn read_answer(&self, prompt: &str) -> Result<Option<String>, PromptError> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt} ").map_err(|e| PromptError::IoError(e.to_string()))?;
        stderr
            .flush()
            .map_err(|e| PromptError::IoError(e.to_string()))?;

        let mut input = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut input)
            .map_err(|e| PromptError::IoError(e.to_string()))?;
        if read == 0 {
            eprintln!();
            return Ok(None);
        }
        Ok(Some(input))
    }
}

impl Confirm for TerminalPrompt {
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        if self.assume_yes {
            eprintln!("{message} {} yes", hint(default));
            return Ok(true);
        }
        let answer = self.read_answer(&format!("{message} {}", hint(default)))?;
        Ok(answer.is_some_and(|a| parse_answer(&a, default)))
    }

    fn confirm_exact(&self, message: &str, expected: &str) -> Result<bool, PromptError> {
        let answer = self.read_answer(&format!("{message} (type '{expected}' to confirm):"))?;
        Ok(answer.is_some_and(|a| a.trim() == expected))
    }
    fn input(&self, message: &str) -> Result<Option<String>, PromptError> {
        Ok(non_empty(self.read_answer(message)?))
    }
}

/// Answers prompts from a fixed script and records what was asked.
///
/// Once the script runs out every prompt is declined, as on a closed stdin.
///
/// ```
/// use refsync::ui::prompts::{Confirm, ScriptedPrompt};
///
/// let prompt = ScriptedPrompt::new(["", "n"]);
/// assert!(prompt.confirm("first?", true).unwrap());
/// assert!(!prompt.confirm("second?", true).unwrap());
/// assert!(!prompt.confirm("third?", true).unwrap());
/// assert_eq!(prompt.asked().len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    /// Script the answers, in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Decline everything.
    pub fn declining() -> Self {
        Self::default()
    }

    /// Messages of every prompt shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    fn next(&self, message: &str) -> Option<String> {
        self.asked.lock().unwrap().push(message.to_string());
        self.answers.lock().unwrap().pop_front()
    }
}

impl Confirm for ScriptedPrompt {
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        Ok(self
            .next(message)
            .is_some_and(|a| parse_answer(&a, default)))
    }

    fn confirm_exact(&self, message: &str, expected: &str) -> Result<bool, PromptError> {
        Ok(self.next(message).is_some_and(|a| a.trim() == expected))
    }
    fn input(&self, message: &str) -> Result<Option<String>, PromptError> {
        Ok(non_empty(self.next(message)))
    }
}
