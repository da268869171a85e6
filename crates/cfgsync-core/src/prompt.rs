//! Prompt collaborator
//!
//! Stores ask for values they cannot resolve from the catalog or the
//! credential vault through this trait, so they never talk to the terminal
//! directly.

use crate::error::Result;

/// How a value should be asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptOptions {
    /// One-line explanation shown above the prompt
    pub description: String,
    /// Value used when the user just presses enter, or when prompting is disabled
    pub default_value: Option<String>,
    /// Hide input (passwords, tokens)
    pub secret: bool,
}

impl PromptOptions {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Source of user-supplied values
pub trait Prompter: Send + Sync {
    /// Ask for the value named `name`
    fn get_val_from_user(&self, name: &str, opts: &PromptOptions) -> Result<String>;
}
