//! User decisions: the confirmation gate and per-item conflict answers.

use crate::conflict::ConflictChoice;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt failed: {0}")]
    Dialog(#[from] dialoguer::Error),
}

/// Source of user decisions.
pub trait Prompt {
    /// Yes/no question. Dismissing the prompt counts as "no".
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError>;

    /// What to do about `source` whose destination is already taken.
    /// `None` leaves the conflict unresolved.
    fn choose_conflict(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<Option<ConflictChoice>, PromptError>;
}

/// Interactive terminal prompts.
#[derive(Default)]
pub struct DialoguerPrompt {
    theme: ColorfulTheme,
}

impl Prompt for DialoguerPrompt {
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(default)
            .interact_opt()?;
        Ok(answer.unwrap_or(false))
    }

    fn choose_conflict(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<Option<ConflictChoice>, PromptError> {
        const CHOICES: [(&str, ConflictChoice); 3] = [
            ("Overwrite", ConflictChoice::Overwrite),
            ("Keep both (numbered name)", ConflictChoice::Rename),
            ("Skip", ConflictChoice::Skip),
        ];

        let selection = Select::with_theme(&self.theme)
            .with_prompt(format!(
                "{} already exists (from {})",
                destination.display(),
                source.display()
            ))
            .items(&CHOICES.map(|(label, _)| label))
            .default(1)
            .interact_opt()?;
        Ok(selection.and_then(|i| CHOICES.get(i)).map(|(_, choice)| *choice))
    }
}

/// Non-interactive answers for `--yes`: confirm everything, decide no conflicts.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompt for AssumeYes {
    fn confirm(&self, _message: &str, _default: bool) -> Result<bool, PromptError> {
        Ok(true)
    }

    fn choose_conflict(
        &self,
        _source: &Path,
        _destination: &Path,
    ) -> Result<Option<ConflictChoice>, PromptError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_yes_confirms_but_leaves_conflicts() {
        let prompt = AssumeYes;
        assert!(prompt.confirm("Proceed?", false).unwrap());
        assert_eq!(
            prompt
                .choose_conflict(Path::new("/in/a.png"), Path::new("/out/a.png"))
                .unwrap(),
            None
        );
    }
}
