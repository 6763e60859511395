//! ui::prompts
//!
//! The `ask` capability used to resolve prompt-backed options.
//!
//! # Design
//!
//! Prompting is a fallback: every prompt can be satisfied up front with its
//! option. [`TerminalAsker`] reads from the terminal, hiding input for secret
//! prompts; [`ScriptedAsker`] answers from a queue and records the questions
//! it was asked.

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Something that can ask the user a question.
pub trait Ask: Send + Sync {
    /// Ask `question` and return the answer without its trailing newline.
    ///
    /// When `hidden` is true the answer is not echoed.
    fn ask(&self, question: &str, hidden: bool) -> Result<String, PromptError>;
}

/// Asks on stderr and reads from stdin.
///
/// Hidden questions use `rpassword` when stdin is a terminal; otherwise the
/// answer is read as a plain line so piped input keeps working.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalAsker;

impl Ask for TerminalAsker {
    fn ask(&self, question: &str, hidden: bool) -> Result<String, PromptError> {
        let prompt = format!("{} ", question.trim_end());

        if hidden && io::stdin().is_terminal() {
            return rpassword::prompt_password(prompt)
                .map_err(|e| PromptError::IoError(e.to_string()));
        }

        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt).map_err(|e| PromptError::IoError(e.to_string()))?;
        stderr
            .flush()
            .map_err(|e| PromptError::IoError(e.to_string()))?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| PromptError::IoError(e.to_string()))?;
        if read == 0 {
            return Err(PromptError::Cancelled);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Answers from a fixed queue. Running out of answers cancels the prompt.
#[derive(Debug, Default)]
pub struct ScriptedAsker {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<(String, bool)>>,
}

impl ScriptedAsker {
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

    /// Questions asked so far, with their `hidden` flag.
    pub fn asked(&self) -> Vec<(String, bool)> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Ask for ScriptedAsker {
    fn ask(&self, question: &str, hidden: bool) -> Result<String, PromptError> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((question.to_string(), hidden));
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(PromptError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers_in_order() {
        let asker = ScriptedAsker::new(["bob", "hunter2"]);
        assert_eq!(asker.ask("User?", false).unwrap(), "bob");
        assert_eq!(asker.ask("Password?", true).unwrap(), "hunter2");
        assert!(matches!(
            asker.ask("More?", false),
            Err(PromptError::Cancelled)
        ));
        assert_eq!(
            asker.asked(),
            vec![
                ("User?".to_string(), false),
                ("Password?".to_string(), true),
                ("More?".to_string(), false),
            ]
        );
    }
}
