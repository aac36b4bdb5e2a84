// src/shell/prompt.rs

//! Secret prompts

use crate::error::{Error, Result};
use dialoguer::Password;
use std::collections::VecDeque;

pub trait Prompter {
    /// Ask for a secret without echoing it
    fn secret(&mut self, prompt: &str) -> Result<String>;
}

/// Reads secrets from the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn secret(&mut self, prompt: &str) -> Result<String> {
        // dialoguer appends its own ": "
        Password::new()
            .with_prompt(prompt.trim_end().trim_end_matches(':'))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}

/// Answers prompts from a fixed list, in order
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn secret(&mut self, prompt: &str) -> Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| Error::Prompt(format!("no answer left for '{}'", prompt)))
    }
}
