//! Interactive input behind the `Prompter` capability.

use anyhow::Result;
use dialoguer::Input;

pub trait Prompter {
    /// Ask one question and return the raw answer.
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Reads answers from the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        let answer: String = Input::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }
}
