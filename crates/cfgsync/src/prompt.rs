//! Terminal prompter backed by dialoguer

use cfgsync_core::{Error, PromptOptions, Prompter, Result};
use console::style;
use dialoguer::{Input, Password};

/// Asks on the terminal
///
/// Runs with `--no-prompt` never reach this type; `UserOptions::ask` answers
/// them from defaults instead.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn get_val_from_user(&self, name: &str, opts: &PromptOptions) -> Result<String> {
        if !opts.description.is_empty() {
            eprintln!("{}", style(&opts.description).dim());
        }

        let value = if opts.secret {
            Password::new()
                .with_prompt(name)
                .interact()
                .map_err(|e| Error::Prompt(e.to_string()))?
        } else {
            let mut input = Input::<String>::new().with_prompt(name);
            if let Some(default) = &opts.default_value {
                input = input.default(default.clone());
            }
            input
                .interact_text()
                .map_err(|e| Error::Prompt(e.to_string()))?
        };

        if value.is_empty() {
            return Err(Error::missing_value(name));
        }
        Ok(value)
    }
}
