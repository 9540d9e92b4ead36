// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User interaction.
//!
//! Anything that mutates the system asks first. Every question defaults to
//! "no", and any failure to get an answer, e.g., interrupt, EOF, or no
//! terminal at all, counts as "no" as well.

use inquire::{Confirm as ConfirmPrompt, Select};
use std::io::IsTerminal;
use tracing::debug;

/// Ask the user a yes or no question.
pub trait Confirm {
    /// Return true only for an explicit affirmative answer.
    fn confirm(&self, message: &str) -> bool;
}

/// Confirmation through an interactive terminal prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, message: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            debug!("stdin is not a terminal, treat {message:?} as no");
            return false;
        }

        match ConfirmPrompt::new(message).with_default(false).prompt() {
            Ok(answer) => answer,
            Err(error) => {
                debug!("treat prompt failure as no: {error}");
                false
            }
        }
    }
}

/// Let the user pick one of the named commands from a menu.
///
/// Returns `None` if stdin is not a terminal, or the user backs out.
pub fn select_command(names: Vec<String>) -> Option<String> {
    if names.is_empty() || !std::io::stdin().is_terminal() {
        return None;
    }

    Select::new("command to run", names)
        .with_help_message("↑↓ to move, enter to run, esc to quit")
        .prompt_skippable()
        .unwrap_or_else(|error| {
            debug!("menu closed: {error}");
            None
        })
}
