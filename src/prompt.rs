use std::io::{BufRead, Write};

use crate::error::{Result, SetupError};
use crate::setup::{SetupVars, UserRole};

/// Operator-facing decisions the workflow needs.
pub trait DecisionSurface {
    /// Yes/no gate; `Ok(false)` is a deliberate "no", not an error.
    fn confirm(&mut self, title: &str) -> Result<bool>;

    /// Fills role, delete-spare and the final review confirmation into `vars`.
    fn collect_user_choices(&mut self, vars: &mut SetupVars) -> Result<()>;
}

/// Line-oriented prompts over any reader/writer pair.
pub struct CliDecisionSurface<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> CliDecisionSurface<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Numbered single choice. Empty input picks `default`; a number or a label
    /// prefix (case-insensitive) picks that option; anything else re-prompts.
    fn select<T: Copy>(
        &mut self,
        title: &str,
        description: Option<&str>,
        options: &[(&str, T)],
        default: usize,
    ) -> Result<T> {
        loop {
            writeln!(self.output, "{title}")?;
            if let Some(description) = description {
                writeln!(self.output, "{}", description.trim_end())?;
            }
            for (index, (label, _)) in options.iter().enumerate() {
                let marker = if index == default { " (default)" } else { "" };
                writeln!(self.output, "  {}) {label}{marker}", index + 1)?;
            }
            write!(self.output, "> ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(SetupError::Prompt(format!(
                    "input closed while waiting for an answer to '{title}'"
                )));
            }
            match pick(line.trim(), options, default) {
                Some(value) => return Ok(value),
                None => writeln!(self.output, "Please choose 1-{}.", options.len())?,
            }
        }
    }
}

fn pick<T: Copy>(answer: &str, options: &[(&str, T)], default: usize) -> Option<T> {
    if answer.is_empty() {
        return options.get(default).map(|(_, value)| *value);
    }
    if let Ok(number) = answer.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| options.get(index))
            .map(|(_, value)| *value);
    }
    let answer = answer.to_ascii_lowercase();
    let mut matches = options
        .iter()
        .filter(|(label, _)| label.to_ascii_lowercase().starts_with(&answer));
    match (matches.next(), matches.next()) {
        (Some((_, value)), None) => Some(*value),
        _ => None,
    }
}

impl<R: BufRead, W: Write> DecisionSurface for CliDecisionSurface<R, W> {
    fn confirm(&mut self, title: &str) -> Result<bool> {
        self.select(title, None, &[("Yes", true), ("No", false)], 0)
    }

    fn collect_user_choices(&mut self, vars: &mut SetupVars) -> Result<()> {
        vars.user_role = self.select(
            "Will the new user be standard or dev?",
            None,
            &[("Standard", UserRole::Standard), ("Dev", UserRole::Admin)],
            0,
        )?;
        vars.delete_spare = self.select(
            "Delete spare user, if it exists?",
            None,
            &[("Yes", true), ("No", false)],
            0,
        )?;
        let review = vars.review_text();
        vars.confirm = self.select(
            "Is this information correct?",
            Some(&review),
            &[("Yes (Send Command)", true), ("No (Exit)", false)],
            0,
        )?;
        Ok(())
    }
}

/// Surface used when stdin is not a terminal; every prompt fails.
pub struct DenyDecisionSurface;

impl DecisionSurface for DenyDecisionSurface {
    fn confirm(&mut self, title: &str) -> Result<bool> {
        Err(SetupError::Prompt(format!(
            "cannot ask '{title}': interactive terminal required"
        )))
    }

    fn collect_user_choices(&mut self, _vars: &mut SetupVars) -> Result<()> {
        Err(SetupError::Prompt(
            "cannot collect user setup choices: interactive terminal required".into(),
        ))
    }
}
