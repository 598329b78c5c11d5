// ABOUTME: Interactive confirmation before destructive operations.
// ABOUTME: Blocks on a line of input; only "y" or "yes" count as consent.

use crate::output::Output;
use std::io::{self, BufRead};

/// Source of answers to yes/no questions.
pub trait Prompt: Send + Sync {
    /// Show `question` and return the raw answer.
    fn ask(&self, output: &Output, question: &str) -> io::Result<String>;
}

/// Reads answers from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&self, output: &Output, question: &str) -> io::Result<String> {
        output.ask(question);
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer)
    }
}

/// Case-insensitive "y" or "yes", ignoring surrounding whitespace.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
